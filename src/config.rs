use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::column_classifier::DEFAULT_FINANCIAL_COLUMN_KEYWORDS;
use crate::error::{Error, Result};
use crate::pattern_matchers::{AmountMatchMode, DEFAULT_FINANCIAL_KEYWORDS};

const MIN_CHART_SIDE: u32 = 100;
const MAX_CHART_SIDE: u32 = 4000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub processing_timeout_secs: u64,
    pub amount_match_mode: AmountMatchMode,
    pub keywords: Vec<String>,
    pub financial_column_keywords: Vec<String>,
    pub analysis: AnalysisConfig,
    pub chart: ChartConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_keywords: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub width: u32,
    pub height: u32,
    pub histogram_bins: usize,
    pub keyword_chart_limit: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            processing_timeout_secs: 60,
            amount_match_mode: AmountMatchMode::default(),
            keywords: DEFAULT_FINANCIAL_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            financial_column_keywords: DEFAULT_FINANCIAL_COLUMN_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            analysis: AnalysisConfig::default(),
            chart: ChartConfig::default(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig { top_keywords: 5 }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig {
            width: 1000,
            height: 600,
            histogram_bins: 20,
            keyword_chart_limit: 10,
        }
    }
}

impl AnalyzerConfig {
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AnalyzerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.is_file() => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("failed to read {}: {e}", path.to_string_lossy()))
                })?;
                Self::from_toml_str(&content)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.processing_timeout_secs == 0 {
            return Err(Error::Config(
                "processing_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(Error::Config("keywords must not be empty".to_string()));
        }
        if self.analysis.top_keywords == 0 {
            return Err(Error::Config("analysis.top_keywords must be at least 1".to_string()));
        }
        let chart = &self.chart;
        for (name, side) in [("chart.width", chart.width), ("chart.height", chart.height)] {
            if !(MIN_CHART_SIDE..=MAX_CHART_SIDE).contains(&side) {
                return Err(Error::Config(format!(
                    "{name} must be between {MIN_CHART_SIDE} and {MAX_CHART_SIDE} pixels"
                )));
            }
        }
        if chart.histogram_bins == 0 || chart.keyword_chart_limit == 0 {
            return Err(Error::Config(
                "chart.histogram_bins and chart.keyword_chart_limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
