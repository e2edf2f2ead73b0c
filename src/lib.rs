pub mod chart_render;
pub mod column_classifier;
pub mod config;
pub mod document_charts;
pub mod document_pipeline;
pub mod error;
mod extraction_chain;
pub mod pattern_matchers;
pub mod pdf_text_import;
pub mod record_normalizer;
pub mod records;
pub mod spreadsheet_import;
pub mod summary_analytics;
pub mod transaction_analytics;

pub use chart_render::{render_placeholder, ChartArtifact, ChartKind};
pub use config::{AnalysisConfig, AnalyzerConfig, ChartConfig};
pub use document_pipeline::{
    extract_candidates, process_document, process_document_with_timeout, run_with_timeout,
    DocumentKind, ProcessingReport,
};
pub use error::{Error, Result};
pub use pattern_matchers::AmountMatchMode;
pub use record_normalizer::{normalize_record, normalize_records};
pub use records::{CandidateRecord, NormalizedRecord, RecordSource};
pub use summary_analytics::{analyze_records, AnalysisSummary};
pub use transaction_analytics::{
    balance_evolution, category_expense_totals, income_expense_distribution,
    render_balance_evolution, render_category_expenses, render_income_expense_distribution,
    summarize_transactions, Transaction, TransactionType,
};
