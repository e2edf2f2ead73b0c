use serde::{Serialize, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    pub fn text(raw: &str) -> Self {
        let trimmed = trim_cell(raw);
        if trimmed.is_empty() {
            CellValue::Missing
        } else {
            CellValue::Text(trimmed)
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    Sheet(String),
    Page(u32),
    Unknown,
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSource::Sheet(name) => f.write_str(name),
            RecordSource::Page(page) => write!(f, "page {page}"),
            RecordSource::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for RecordSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordSource::Sheet(name) => serializer.serialize_str(name),
            RecordSource::Page(page) => serializer.serialize_u32(*page),
            RecordSource::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    pub name: String,
    pub value: CellValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRecord {
    pub source: RecordSource,
    pub row: usize,
    pub amounts: Vec<RawAmount>,
    pub dates: Vec<String>,
    pub keywords: Vec<String>,
    pub original_text: String,
    pub fields: Vec<FieldValue>,
}

impl CandidateRecord {
    pub fn new(source: RecordSource, row: usize) -> Self {
        CandidateRecord {
            source,
            row,
            amounts: Vec::new(),
            dates: Vec::new(),
            keywords: Vec::new(),
            original_text: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn has_signal(&self) -> bool {
        !(self.amounts.is_empty() && self.dates.is_empty() && self.keywords.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledAmount {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub amounts: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    pub dates: Vec<String>,
    pub keywords: Vec<String>,
    pub original_text: String,
    pub source: RecordSource,
    pub row: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<LabeledAmount>,
}

pub(crate) fn trim_cell(text: &str) -> String {
    text.trim()
        .trim_start_matches('\u{feff}')
        .trim()
        .to_string()
}
