use chrono::NaiveDate;
use tracing::debug;

use crate::records::{CandidateRecord, CellValue, LabeledAmount, NormalizedRecord, RawAmount};

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%m-%d-%Y"];

pub fn parse_amount(raw: &RawAmount) -> Option<f64> {
    let value = match raw {
        RawAmount::Number(value) => *value,
        RawAmount::Text(text) => {
            let cleaned: String = text
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
                .collect();
            cleaned.parse::<f64>().ok()?
        }
    };
    value.is_finite().then_some(value)
}

pub fn normalize_date(raw: &str) -> Option<String> {
    let text = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(|date| date.format("%Y-%m-%d").to_string())
}

pub fn normalize_record(candidate: &CandidateRecord) -> Option<NormalizedRecord> {
    let mut amounts = Vec::with_capacity(candidate.amounts.len());
    for raw in &candidate.amounts {
        match parse_amount(raw) {
            Some(value) => amounts.push(value),
            None => debug!(row = candidate.row, amount = ?raw, "dropping unparseable amount"),
        }
    }

    let mut dates = Vec::with_capacity(candidate.dates.len());
    for raw in &candidate.dates {
        match normalize_date(raw) {
            Some(date) => dates.push(date),
            None => debug!(row = candidate.row, date = %raw, "dropping unparseable date"),
        }
    }

    if amounts.is_empty() && dates.is_empty() && candidate.keywords.is_empty() {
        return None;
    }

    let total_amount = (!amounts.is_empty()).then(|| amounts.iter().sum());
    let fields = candidate
        .fields
        .iter()
        .filter_map(|field| match field.value {
            CellValue::Number(value) if value.is_finite() => Some(LabeledAmount {
                name: field.name.clone(),
                value,
            }),
            _ => None,
        })
        .collect();

    Some(NormalizedRecord {
        amounts,
        total_amount,
        dates,
        keywords: candidate.keywords.clone(),
        original_text: candidate.original_text.clone(),
        source: candidate.source.clone(),
        row: candidate.row,
        fields,
    })
}

pub fn normalize_records(candidates: &[CandidateRecord]) -> Vec<NormalizedRecord> {
    let records: Vec<NormalizedRecord> = candidates.iter().filter_map(normalize_record).collect();
    debug!(
        candidates = candidates.len(),
        normalized = records.len(),
        "normalized candidate records"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FieldValue, RecordSource};

    #[test]
    fn text_amounts_are_stripped_before_parsing() {
        assert_eq!(parse_amount(&RawAmount::Text("$1,200.50".into())), Some(1200.5));
        assert_eq!(parse_amount(&RawAmount::Text("450 usd".into())), Some(450.0));
        assert_eq!(parse_amount(&RawAmount::Text("-$75".into())), Some(-75.0));
        assert_eq!(parse_amount(&RawAmount::Text("1.2.3".into())), None);
        assert_eq!(parse_amount(&RawAmount::Number(f64::INFINITY)), None);
    }

    #[test]
    fn dates_normalize_to_iso_and_stay_idempotent() {
        assert_eq!(normalize_date("04/01/2023").as_deref(), Some("2023-04-01"));
        assert_eq!(normalize_date("4-2-2023").as_deref(), Some("2023-04-02"));
        assert_eq!(normalize_date("2023-04-03").as_deref(), Some("2023-04-03"));
        assert_eq!(normalize_date("13/45/2023"), None);
    }

    #[test]
    fn record_without_surviving_signal_is_dropped() {
        let mut candidate = CandidateRecord::new(RecordSource::Page(1), 3);
        candidate.amounts.push(RawAmount::Text("n/a".into()));
        candidate.dates.push("13/45/2023".into());
        assert_eq!(normalize_record(&candidate), None);
    }

    #[test]
    fn numeric_fields_are_kept_by_name() {
        let mut candidate = CandidateRecord::new(RecordSource::Sheet("Hoja1".into()), 1);
        candidate.amounts.push(RawAmount::Number(500.0));
        candidate.amounts.push(RawAmount::Text("$20".into()));
        candidate.fields = vec![
            FieldValue { name: "Total Income".into(), value: CellValue::Number(500.0) },
            FieldValue { name: "Memo".into(), value: CellValue::Text("bonus".into()) },
        ];
        let record = normalize_record(&candidate).expect("normalized");
        assert_eq!(record.amounts, vec![500.0, 20.0]);
        assert_eq!(record.total_amount, Some(520.0));
        assert_eq!(record.fields, vec![LabeledAmount { name: "Total Income".into(), value: 500.0 }]);
    }
}
