use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::chart_render::ChartArtifact;
use crate::config::AnalyzerConfig;
use crate::document_charts::generate_document_charts;
use crate::error::{Error, Result};
use crate::pdf_text_import::extract_pdf_candidates;
use crate::record_normalizer::normalize_records;
use crate::records::{CandidateRecord, NormalizedRecord};
use crate::spreadsheet_import::extract_tabular_candidates;
use crate::summary_analytics::{analyze_records, AnalysisSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Xlsx,
    Xls,
    Csv,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Xlsx => "xlsx",
            DocumentKind::Xls => "xls",
            DocumentKind::Csv => "csv",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "xlsx" => Ok(DocumentKind::Xlsx),
            "xls" => Ok(DocumentKind::Xls),
            "csv" => Ok(DocumentKind::Csv),
            _ => Err(Error::UnsupportedFormat(raw.to_string())),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn extract_candidates(
    bytes: &[u8],
    kind: DocumentKind,
    config: &AnalyzerConfig,
) -> Result<Vec<CandidateRecord>> {
    match kind {
        DocumentKind::Pdf => extract_pdf_candidates(bytes, config),
        DocumentKind::Xlsx | DocumentKind::Xls | DocumentKind::Csv => {
            extract_tabular_candidates(bytes, kind.as_str(), config)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub error_category: Option<&'static str>,
    pub data: Option<Vec<NormalizedRecord>>,
    pub analysis: Option<AnalysisSummary>,
    pub charts: Option<Vec<ChartArtifact>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_records: Option<usize>,
}

impl ProcessingReport {
    pub fn completed(
        data: Vec<NormalizedRecord>,
        analysis: AnalysisSummary,
        charts: Vec<ChartArtifact>,
    ) -> Self {
        ProcessingReport {
            success: true,
            error: None,
            error_category: None,
            total_records: Some(data.len()),
            data: Some(data),
            analysis: Some(analysis),
            charts: Some(charts),
        }
    }

    pub fn failure(err: &Error) -> Self {
        ProcessingReport {
            success: false,
            error: Some(err.to_string()),
            error_category: Some(err.category()),
            data: None,
            analysis: None,
            charts: None,
            total_records: None,
        }
    }
}

fn run_pipeline(bytes: &[u8], type_tag: &str, config: &AnalyzerConfig) -> Result<ProcessingReport> {
    let kind: DocumentKind = type_tag.parse()?;
    let candidates = extract_candidates(bytes, kind, config)?;
    let records = normalize_records(&candidates);
    let analysis = analyze_records(&records, config.analysis.top_keywords);
    let charts = generate_document_charts(&records, &config.chart)?;
    info!(
        kind = %kind,
        candidates = candidates.len(),
        records = records.len(),
        charts = charts.len(),
        "document processed"
    );
    Ok(ProcessingReport::completed(records, analysis, charts))
}

pub fn process_document(bytes: &[u8], type_tag: &str, config: &AnalyzerConfig) -> ProcessingReport {
    let started = Instant::now();
    match run_pipeline(bytes, type_tag, config) {
        Ok(report) => report,
        Err(err) => {
            warn!(
                type_tag,
                category = err.category(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "document processing failed"
            );
            ProcessingReport::failure(&err)
        }
    }
}

// A job that overruns is left to finish in the background; its result is discarded.
pub async fn run_with_timeout<T, F>(budget: Duration, job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(job);
    match tokio::time::timeout(budget, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(Error::Worker(join_err.to_string())),
        Err(_) => Err(Error::Timeout(budget)),
    }
}

pub async fn process_document_with_timeout(
    bytes: Vec<u8>,
    type_tag: String,
    config: AnalyzerConfig,
) -> ProcessingReport {
    let budget = config.processing_timeout();
    let job = move || process_document(&bytes, &type_tag, &config);
    match run_with_timeout(budget, job).await {
        Ok(report) => report,
        Err(err) => {
            warn!(budget_secs = budget.as_secs_f64(), error = %err, "document processing aborted");
            ProcessingReport::failure(&err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_tags_parse_case_insensitively() {
        assert_eq!("PDF".parse::<DocumentKind>().expect("pdf"), DocumentKind::Pdf);
        assert_eq!(".xlsx".parse::<DocumentKind>().expect("xlsx"), DocumentKind::Xlsx);
        let err = "docx".parse::<DocumentKind>().expect_err("docx");
        assert_eq!(err.category(), "UNSUPPORTED_FORMAT");
    }

    #[test]
    fn failure_report_has_null_payload_fields() {
        let report = process_document(b"irrelevant", "docx", &AnalyzerConfig::default());
        assert!(!report.success);
        assert_eq!(report.error_category, Some("UNSUPPORTED_FORMAT"));
        let value = serde_json::to_value(&report).expect("json");
        assert_eq!(value["success"], json!(false));
        assert!(value["error"].as_str().expect("error text").contains("docx"));
        assert_eq!(value["data"], json!(null));
        assert_eq!(value["analysis"], json!(null));
        assert_eq!(value["charts"], json!(null));
        assert!(value.get("total_records").is_none());
        assert!(value.get("error_category").is_none());
    }

    #[test]
    fn csv_document_produces_full_report() {
        let mut config = AnalyzerConfig::default();
        config.chart.width = 200;
        config.chart.height = 120;
        let csv = "Fecha,Concepto,Ingreso,Gasto\n\
                   2023-04-01,Invoice 12,1500,\n\
                   04/02/2023,Office purchase,,250\n";
        let report = process_document(csv.as_bytes(), "csv", &config);
        assert!(report.success, "{:?}", report.error);
        assert_eq!(report.total_records, Some(2));

        let analysis = report.analysis.expect("analysis");
        // sign signal (1500 + 250) plus labeled columns (Ingreso 1500, Gasto 250)
        assert_eq!(analysis.total_income, 3250.0);
        assert_eq!(analysis.total_expenses, 250.0);
        let range = analysis.date_range.expect("date range");
        assert_eq!((range.start.as_str(), range.end.as_str()), ("2023-04-01", "2023-04-02"));
        assert!(!report.charts.expect("charts").is_empty());
    }

    #[tokio::test]
    async fn overrunning_job_times_out() {
        let err = run_with_timeout(Duration::from_millis(20), || {
            std::thread::sleep(Duration::from_millis(300));
            1
        })
        .await
        .expect_err("timeout");
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(err.category(), "TIMEOUT_ERROR");
    }

    #[tokio::test]
    async fn timeout_wrapper_returns_the_report() {
        let report = process_document_with_timeout(
            b"date,amount\n2023-01-01,10\n".to_vec(),
            "csv".to_string(),
            AnalyzerConfig::default(),
        )
        .await;
        assert!(report.success);
        assert_eq!(report.total_records, Some(1));
    }
}
