use lopdf::Document;
use pdf_extract::extract_text_from_mem;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::column_classifier::ColumnName;
use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::extraction_chain::{run_strategies, Strategy};
use crate::pattern_matchers::scan_line;
use crate::records::{trim_cell, CandidateRecord, CellValue, FieldValue, RawAmount, RecordSource};

const MIN_TABLE_LINES: usize = 2;
const MIN_TABLE_COLUMNS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct PdfPage {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn cell_gap_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\t+|\s{2,}").expect("cell gap regex"))
}

fn table_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\$?-?[\d,]*\d[\d,]*(?:\.\d+)?$").expect("table number regex"))
}

// Blank pages are dropped but keep their page number reserved.
pub fn split_pages(full_text: &str) -> Vec<PdfPage> {
    full_text
        .split('\u{000C}')
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(idx, text)| PdfPage {
            number: idx as u32 + 1,
            text: text.to_string(),
        })
        .collect()
}

fn split_layout_cells(line: &str) -> Vec<String> {
    cell_gap_re()
        .split(line.trim())
        .map(trim_cell)
        .filter(|cell| !cell.is_empty())
        .collect()
}

pub fn detect_layout_tables(page_text: &str) -> Vec<LayoutTable> {
    let mut tables = Vec::new();
    let mut run: Vec<Vec<String>> = Vec::new();

    let mut flush = |run: &mut Vec<Vec<String>>| {
        if run.len() >= MIN_TABLE_LINES {
            let mut lines = std::mem::take(run).into_iter();
            if let Some(header) = lines.next() {
                tables.push(LayoutTable {
                    header,
                    rows: lines.collect(),
                });
            }
        }
        run.clear();
    };

    for line in page_text.lines() {
        let cells = split_layout_cells(line);
        if cells.len() < MIN_TABLE_COLUMNS {
            flush(&mut run);
            continue;
        }
        if run.first().is_some_and(|first| first.len() != cells.len()) {
            flush(&mut run);
        }
        run.push(cells);
    }
    flush(&mut run);
    tables
}

fn table_cell(raw: &str) -> CellValue {
    if table_number_re().is_match(raw) {
        let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',')).collect();
        if let Ok(value) = cleaned.parse::<f64>() {
            if value.is_finite() {
                return CellValue::Number(value);
            }
        }
    }
    CellValue::text(raw)
}

fn table_header(idx: usize, raw: &str) -> ColumnName {
    if raw.is_empty() {
        ColumnName::unnamed(idx)
    } else if table_cell(raw).as_number().is_some() {
        ColumnName::Placeholder(raw.to_string())
    } else {
        ColumnName::Text(raw.to_string())
    }
}

// Header-to-cell rows only. Amounts, dates and keywords on these lines come
// from the text scan of the same page, so table rows carry none of their own.
pub fn extract_layout_table_records(page: u32, table: &LayoutTable) -> Vec<CandidateRecord> {
    let header: Vec<ColumnName> = table
        .header
        .iter()
        .enumerate()
        .map(|(idx, raw)| table_header(idx, raw))
        .collect();
    table
        .rows
        .iter()
        .filter(|row| row.len() == header.len())
        .enumerate()
        .map(|(idx, row)| {
            let mut record = CandidateRecord::new(RecordSource::Page(page), idx + 1);
            record.fields = header
                .iter()
                .zip(row)
                .map(|(name, cell)| FieldValue {
                    name: name.label().to_string(),
                    value: table_cell(cell),
                })
                .collect();
            record
        })
        .collect()
}

// Lines are numbered from 1.
pub fn extract_text_records(
    text: &str,
    source: RecordSource,
    config: &AnalyzerConfig,
) -> Vec<CandidateRecord> {
    text.lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let signals = scan_line(line, config.amount_match_mode, &config.keywords);
            if signals.is_empty() {
                return None;
            }
            let mut record = CandidateRecord::new(source.clone(), idx + 1);
            record.amounts = signals.amounts.into_iter().map(RawAmount::Text).collect();
            record.dates = signals.dates;
            record.keywords = signals.keywords;
            record.original_text = line.to_string();
            Some(record)
        })
        .collect()
}

pub fn extract_page_records(page: &PdfPage, config: &AnalyzerConfig) -> Vec<CandidateRecord> {
    let mut records: Vec<CandidateRecord> = detect_layout_tables(&page.text)
        .iter()
        .flat_map(|table| extract_layout_table_records(page.number, table))
        .collect();
    records.extend(extract_text_records(
        &page.text,
        RecordSource::Page(page.number),
        config,
    ));
    records
}

fn pdf_extract_pages(bytes: &[u8], config: &AnalyzerConfig) -> Result<Vec<CandidateRecord>> {
    let full_text = extract_text_from_mem(bytes).map_err(|e| Error::extraction("pdf-extract", e))?;
    let pages = split_pages(&full_text);
    debug!(pages = pages.len(), "pdf-extract read document text");

    Ok(pages
        .iter()
        .flat_map(|page| extract_page_records(page, config))
        .collect())
}

fn lopdf_pages(bytes: &[u8], config: &AnalyzerConfig) -> Result<Vec<CandidateRecord>> {
    let document = Document::load_mem(bytes).map_err(|e| Error::extraction("lopdf", e))?;
    let mut records = Vec::new();
    for number in document.get_pages().into_keys() {
        let text = document
            .extract_text(&[number])
            .map_err(|e| Error::extraction("lopdf", format!("page {number}: {e}")))?;
        records.extend(extract_text_records(&text, RecordSource::Page(number), config));
    }
    Ok(records)
}

const PDF_STRATEGIES: &[Strategy<Vec<CandidateRecord>>] = &[
    Strategy { name: "pdf-extract", run: pdf_extract_pages },
    Strategy { name: "lopdf", run: lopdf_pages },
];

pub fn extract_pdf_candidates(bytes: &[u8], config: &AnalyzerConfig) -> Result<Vec<CandidateRecord>> {
    let records = run_strategies(bytes, config, PDF_STRATEGIES)?;
    info!(candidates = records.len(), "pdf extraction finished");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_normalizer::normalize_records;
    use crate::summary_analytics::analyze_records;

    #[test]
    fn blank_pages_keep_their_number_reserved() {
        let pages = split_pages("first page\u{000C}   \u{000C}third page");
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[1].number, 3);
        assert_eq!(pages[1].text, "third page");
    }

    #[test]
    fn text_lines_become_records_with_line_numbers() {
        let config = AnalyzerConfig::default();
        let text = "Statement\nRevenue: $1,200.50 on 2023-04-01\n\nExpense $300 2023-04-02";
        let records = extract_text_records(text, RecordSource::Page(2), &config);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row, 2);
        assert_eq!(records[0].source, RecordSource::Page(2));
        assert_eq!(records[0].amounts, vec![RawAmount::Text("$1,200.50".into())]);
        assert_eq!(records[0].original_text, "Revenue: $1,200.50 on 2023-04-01");
        assert_eq!(records[1].row, 4);
        assert_eq!(records[1].dates, vec!["2023-04-02"]);
        assert_eq!(records[1].keywords, vec!["expense"]);
    }

    #[test]
    fn aligned_columns_are_detected_as_tables() {
        let page = "Monthly statement\n\
                    Date        Description      Amount\n\
                    2023-04-01  Client payment   $1,250.00\n\
                    2023-04-03  Office rent      -800\n\
                    Thank you for banking with us";
        let tables = detect_layout_tables(page);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].header, vec!["Date", "Description", "Amount"]);
        assert_eq!(tables[0].rows.len(), 2);

        let records = extract_layout_table_records(1, &tables[0]);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| !record.has_signal()));
        assert_eq!(records[0].fields[0].value, CellValue::Text("2023-04-01".into()));
        assert_eq!(records[0].fields[2].name, "Amount");
        assert_eq!(records[0].fields[2].value, CellValue::Number(1250.0));
        assert_eq!(records[1].fields[2].value, CellValue::Number(-800.0));
        assert_eq!(records[1].row, 2);
    }

    #[test]
    fn table_lines_are_counted_once_per_page() {
        let page = PdfPage {
            number: 1,
            text: "Date        Description      Amount\n\
                   2023-04-01  Client payment   $1,250.00\n\
                   2023-04-03  Office rent      $800.00"
                .to_string(),
        };
        let config = AnalyzerConfig::default();
        let candidates = extract_page_records(&page, &config);
        assert_eq!(candidates.len(), 5);

        let records = normalize_records(&candidates);
        assert_eq!(records.len(), 3);
        let summary = analyze_records(&records, config.analysis.top_keywords);
        assert_eq!(summary.total_income, 2050.0);
        assert_eq!(summary.total_expenses, 0.0);
        let payment = summary.top_keywords.iter().find(|(kw, _)| kw == "payment");
        assert_eq!(payment, Some(&("payment".to_string(), 1)));
    }

    #[test]
    fn a_single_aligned_line_is_not_a_table() {
        assert!(detect_layout_tables("Total  Due\nplain prose line").is_empty());
    }

    #[test]
    fn unreadable_pdf_reports_both_strategies() {
        let err = extract_pdf_candidates(b"%PDF-garbage", &AnalyzerConfig::default())
            .expect_err("garbage pdf");
        match err {
            Error::ExtractionExhausted(messages) => {
                assert_eq!(messages.len(), 2);
                assert!(messages[0].starts_with("pdf-extract failed"));
                assert!(messages[1].starts_with("lopdf failed"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
