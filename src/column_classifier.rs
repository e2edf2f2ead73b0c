use serde::Serialize;

use crate::records::CellValue;

pub const DEFAULT_FINANCIAL_COLUMN_KEYWORDS: &[&str] = &[
    "ingreso",
    "gasto",
    "pago",
    "cobro",
    "monto",
    "cantidad",
    "precio",
    "total",
    "subtotal",
    "saldo",
    "income",
    "expense",
    "amount",
    "price",
    "ingresos",
    "gastos",
    "ganancia",
    "profit",
    "revenue",
    "cost",
    "payment",
    "balance",
];

const DATE_COLUMN_TOKENS: &[&str] = &["fecha", "date"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnName {
    Text(String),
    Placeholder(String),
}

impl ColumnName {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnName::Text(s) => Some(s),
            ColumnName::Placeholder(_) => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            ColumnName::Text(s) | ColumnName::Placeholder(s) => s,
        }
    }

    pub(crate) fn unnamed(index: usize) -> Self {
        ColumnName::Text(format!("Unnamed: {index}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialColumn {
    pub index: usize,
    pub name: String,
    pub keyword: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnRoles {
    pub financial_keyword: Option<String>,
    pub date: bool,
    pub free_text: bool,
}

impl ColumnRoles {
    pub fn is_financial(&self) -> bool {
        self.financial_keyword.is_some()
    }
}

fn column_key(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn financial_keyword_for<S: AsRef<str>>(name: &ColumnName, vocabulary: &[S]) -> Option<String> {
    let key = column_key(name.as_text()?);
    vocabulary
        .iter()
        .map(|kw| AsRef::<str>::as_ref(kw))
        .find(|kw| !kw.is_empty() && key.contains(&kw.to_lowercase()))
        .map(str::to_string)
}

pub fn identify_financial_columns<S: AsRef<str>>(
    columns: &[ColumnName],
    vocabulary: &[S],
) -> Vec<FinancialColumn> {
    columns
        .iter()
        .enumerate()
        .filter_map(|(index, column)| {
            financial_keyword_for(column, vocabulary).map(|keyword| FinancialColumn {
                index,
                name: column.label().to_string(),
                keyword,
            })
        })
        .collect()
}

pub fn is_date_column(name: &ColumnName) -> bool {
    name.as_text()
        .map(|text| {
            let lowered = text.to_lowercase();
            DATE_COLUMN_TOKENS.iter().any(|t| lowered.contains(t))
        })
        .unwrap_or(false)
}

pub fn is_free_text_column<'a>(values: impl IntoIterator<Item = &'a CellValue>) -> bool {
    values
        .into_iter()
        .any(|value| matches!(value, CellValue::Text(_)))
}

pub fn classify_columns<S: AsRef<str>>(
    header: &[ColumnName],
    rows: &[Vec<CellValue>],
    vocabulary: &[S],
) -> Vec<ColumnRoles> {
    header
        .iter()
        .enumerate()
        .map(|(idx, name)| ColumnRoles {
            financial_keyword: financial_keyword_for(name, vocabulary),
            date: is_date_column(name),
            free_text: is_free_text_column(rows.iter().filter_map(|row| row.get(idx))),
        })
        .collect()
}
