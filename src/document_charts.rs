use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

use crate::chart_render::{
    draw_bar_panel, draw_line_panel, render_artifact, Bar, ChartArtifact, ChartKind, LineSeries,
    Orientation, DANGER, PRIMARY, SUCCESS,
};
use crate::config::ChartConfig;
use crate::error::Result;
use crate::records::NormalizedRecord;
use crate::summary_analytics::{all_amounts, income_expense_signals, keyword_frequencies};

pub const AMOUNT_DISTRIBUTION_TITLE: &str = "Amount Distribution";
pub const INCOME_EXPENSE_TITLE: &str = "Income vs Expenses";
pub const KEYWORDS_TITLE: &str = "Top Keywords";
pub const TEMPORAL_TITLE: &str = "Temporal Trend";

pub fn histogram_bins(amounts: &[f64], bins: usize) -> Vec<(f64, f64, usize)> {
    let values: Vec<f64> = amounts.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }
    let mut min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        min -= 0.5;
        max += 0.5;
    }
    let width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for value in values {
        let idx = (((value - min) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| {
            let start = min + width * idx as f64;
            (start, start + width, count)
        })
        .collect()
}

fn render_histogram(amounts: &[f64], config: &ChartConfig) -> Result<ChartArtifact> {
    let bins = histogram_bins(amounts, config.histogram_bins);
    let slots = bins.len();
    let bars: Vec<Bar> = bins
        .iter()
        .enumerate()
        .map(|(idx, &(_, _, count))| Bar::in_slot(idx, 1.0, 0.0, count as f64, PRIMARY))
        .collect();
    render_artifact(AMOUNT_DISTRIBUTION_TITLE, ChartKind::Histogram, config, |root| {
        draw_bar_panel(root, &bars, slots, Orientation::Vertical)
    })
}

fn render_income_expense(
    income: Option<f64>,
    expenses: Option<f64>,
    config: &ChartConfig,
) -> Result<ChartArtifact> {
    let mut bars = Vec::new();
    for (total, color) in [(income, SUCCESS), (expenses, DANGER)] {
        if let Some(total) = total {
            bars.push(Bar::in_slot(bars.len(), 0.6, 0.0, total, color));
        }
    }
    let slots = bars.len();
    render_artifact(INCOME_EXPENSE_TITLE, ChartKind::Bar, config, |root| {
        draw_bar_panel(root, &bars, slots, Orientation::Vertical)
    })
}

fn render_keywords(counts: &[(String, usize)], config: &ChartConfig) -> Result<ChartArtifact> {
    let slots = counts.len();
    // Most frequent keyword on top.
    let bars: Vec<Bar> = counts
        .iter()
        .enumerate()
        .map(|(idx, (_, count))| Bar::in_slot(slots - 1 - idx, 0.7, 0.0, *count as f64, PRIMARY))
        .collect();
    render_artifact(KEYWORDS_TITLE, ChartKind::Bar, config, |root| {
        draw_bar_panel(root, &bars, slots, Orientation::Horizontal)
    })
}

// Sum of every amount paired with every date on the same record, per date, oldest first.
pub fn amounts_by_date(records: &[NormalizedRecord]) -> Vec<(String, f64)> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        for date in &record.dates {
            for amount in &record.amounts {
                *totals.entry(date.as_str()).or_insert(0.0) += amount;
            }
        }
    }
    totals
        .into_iter()
        .map(|(date, total)| (date.to_string(), total))
        .collect()
}

fn parse_axis_date(label: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(label, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(label, "%d/%m/%Y"))
        .ok()
}

pub fn temporal_positions(labels: &[String]) -> Vec<f64> {
    let parsed: Option<Vec<NaiveDate>> = labels.iter().map(|l| parse_axis_date(l)).collect();
    match parsed {
        Some(dates) => dates
            .iter()
            .map(|date| date.num_days_from_ce() as f64)
            .collect(),
        None => (0..labels.len()).map(|idx| idx as f64).collect(),
    }
}

fn render_temporal(series: &[(String, f64)], config: &ChartConfig) -> Result<ChartArtifact> {
    let labels: Vec<String> = series.iter().map(|(date, _)| date.clone()).collect();
    let points = temporal_positions(&labels)
        .into_iter()
        .zip(series.iter().map(|(_, total)| *total))
        .collect();
    let line = LineSeries {
        points,
        color: PRIMARY,
        width: 2,
        markers: true,
        fill: false,
    };
    render_artifact(TEMPORAL_TITLE, ChartKind::Line, config, |root| {
        draw_line_panel(root, std::slice::from_ref(&line))
    })
}

pub fn generate_document_charts(
    records: &[NormalizedRecord],
    config: &ChartConfig,
) -> Result<Vec<ChartArtifact>> {
    let mut charts = Vec::new();
    if records.is_empty() {
        return Ok(charts);
    }

    let amounts = all_amounts(records);
    if !amounts.is_empty() {
        charts.push(render_histogram(&amounts, config)?);
    }

    let signals = income_expense_signals(records);
    if !signals.income.is_empty() || !signals.expenses.is_empty() {
        let side_total = |values: &[f64]| (!values.is_empty()).then(|| values.iter().sum());
        charts.push(render_income_expense(
            side_total(&signals.income),
            side_total(&signals.expenses),
            config,
        )?);
    }

    let mut keywords = keyword_frequencies(records);
    if !keywords.is_empty() {
        keywords.truncate(config.keyword_chart_limit);
        charts.push(render_keywords(&keywords, config)?);
    }

    let by_date = amounts_by_date(records);
    if !by_date.is_empty() {
        charts.push(render_temporal(&by_date, config)?);
    }

    debug!(charts = charts.len(), "generated document charts");
    Ok(charts)
}
