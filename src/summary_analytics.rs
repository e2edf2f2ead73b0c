use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use crate::records::NormalizedRecord;

pub const INCOME_FIELD_LABELS: &[&str] = &["ingreso", "income", "revenue"];
pub const EXPENSE_FIELD_LABELS: &[&str] = &["gasto", "expense", "cost"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
    // Number of distinct dates, not the calendar span.
    pub total_days: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AmountDistribution {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisSummary {
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_balance: f64,
    pub total_records: usize,
    pub date_range: Option<DateRange>,
    pub top_keywords: Vec<(String, usize)>,
    pub amount_distribution: AmountDistribution,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncomeExpenseSignals {
    pub income: Vec<f64>,
    pub expenses: Vec<f64>,
}

fn label_matches(name: &str, labels: &[&str]) -> bool {
    let lowered = name.to_lowercase();
    labels.iter().any(|label| lowered.contains(label))
}

// Sign of each amount plus income/expense labels on numeric fields.
// The two signals are summed as-is, so a value present both in `amounts`
// and in a labeled field is counted twice. Zero values count toward neither side.
pub fn income_expense_signals(records: &[NormalizedRecord]) -> IncomeExpenseSignals {
    let mut signals = IncomeExpenseSignals::default();
    for record in records {
        for &amount in &record.amounts {
            if amount > 0.0 {
                signals.income.push(amount);
            } else if amount < 0.0 {
                signals.expenses.push(amount.abs());
            }
        }
        for field in &record.fields {
            if field.value == 0.0 {
                continue;
            }
            if label_matches(&field.name, INCOME_FIELD_LABELS) {
                signals.income.push(field.value.abs());
            } else if label_matches(&field.name, EXPENSE_FIELD_LABELS) {
                signals.expenses.push(field.value.abs());
            }
        }
    }
    signals
}

pub fn date_range(records: &[NormalizedRecord]) -> Option<DateRange> {
    let dates: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.dates.iter().map(String::as_str))
        .collect();
    Some(DateRange {
        start: dates.first()?.to_string(),
        end: dates.last()?.to_string(),
        total_days: dates.len(),
    })
}

pub fn keyword_frequencies(records: &[NormalizedRecord]) -> Vec<(String, usize)> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for keyword in records.iter().flat_map(|record| record.keywords.iter()) {
        match positions.get(keyword.as_str()) {
            Some(&idx) => counts[idx].1 += 1,
            None => {
                positions.insert(keyword.as_str(), counts.len());
                counts.push((keyword.clone(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn all_amounts(records: &[NormalizedRecord]) -> Vec<f64> {
    records
        .iter()
        .flat_map(|record| record.amounts.iter().copied())
        .collect()
}

pub fn amount_distribution(amounts: &[f64]) -> AmountDistribution {
    if amounts.is_empty() {
        return AmountDistribution::default();
    }
    let mut sorted = amounts.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let count = sorted.len();
    let median = if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    };
    AmountDistribution {
        min: sorted[0],
        max: sorted[count - 1],
        avg: sorted.iter().sum::<f64>() / count as f64,
        median,
    }
}

pub fn analyze_records(records: &[NormalizedRecord], top_keywords: usize) -> AnalysisSummary {
    if records.is_empty() {
        return AnalysisSummary::default();
    }

    let signals = income_expense_signals(records);
    let total_income: f64 = signals.income.iter().sum();
    let total_expenses: f64 = signals.expenses.iter().sum();

    let mut keywords = keyword_frequencies(records);
    keywords.truncate(top_keywords);

    let summary = AnalysisSummary {
        total_income,
        total_expenses,
        net_balance: total_income - total_expenses,
        total_records: records.len(),
        date_range: date_range(records),
        top_keywords: keywords,
        amount_distribution: amount_distribution(&all_amounts(records)),
    };
    info!(
        records = summary.total_records,
        total_income = summary.total_income,
        total_expenses = summary.total_expenses,
        "computed analysis summary"
    );
    summary
}
