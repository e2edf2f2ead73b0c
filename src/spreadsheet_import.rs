use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Reader, Xls, Xlsx};
use std::io::Cursor;
use tracing::{debug, info};

use crate::column_classifier::{classify_columns, ColumnName};
use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};
use crate::extraction_chain::{run_strategies, Strategy};
use crate::pattern_matchers::find_keywords;
use crate::records::{trim_cell, CandidateRecord, CellValue, FieldValue, RawAmount, RecordSource};

const CSV_SHEET_NAME: &str = "csv";

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<ColumnName>,
    pub rows: Vec<Vec<CellValue>>,
}

// Serials outside chrono's range come back as None; negative ones are never dates.
pub(crate) fn excel_date(stamp: &ExcelDateTime) -> Option<String> {
    let serial = stamp.as_f64();
    if !stamp.is_datetime() || !serial.is_finite() || serial <= 0.0 {
        return None;
    }
    let date = stamp.as_datetime()?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn cell_from_data(cell: &Data) -> CellValue {
    match cell {
        Data::Int(value) => CellValue::Number(*value as f64),
        Data::Float(value) => CellValue::Number(*value),
        Data::String(text) | Data::DateTimeIso(text) | Data::DurationIso(text) => {
            CellValue::text(text)
        }
        Data::Bool(flag) => CellValue::Text(flag.to_string()),
        Data::DateTime(stamp) => match excel_date(stamp) {
            Some(date) => CellValue::Text(date),
            None => CellValue::Number(stamp.as_f64()),
        },
        Data::Error(_) | Data::Empty => CellValue::Missing,
    }
}

fn header_from_data(idx: usize, cell: &Data) -> ColumnName {
    match cell {
        Data::String(text) => {
            let name = trim_cell(text);
            if name.is_empty() {
                ColumnName::unnamed(idx)
            } else {
                ColumnName::Text(name)
            }
        }
        Data::Empty | Data::Error(_) => ColumnName::unnamed(idx),
        other => ColumnName::Placeholder(trim_cell(&other.to_string())),
    }
}

fn read_workbook<RS, R>(mut workbook: R, strategy: &'static str) -> Result<Vec<Sheet>>
where
    RS: std::io::Read + std::io::Seek,
    R: Reader<RS>,
    R::Error: std::fmt::Display,
{
    let sheet_names = workbook.sheet_names();
    if sheet_names.is_empty() {
        return Err(Error::extraction(strategy, "workbook has no worksheets"));
    }

    let mut sheets = Vec::new();
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| Error::extraction(strategy, format!("failed to read sheet {name}: {e}")))?;
        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            debug!(sheet = %name, "skipping empty sheet");
            continue;
        };
        let header = header_row
            .iter()
            .enumerate()
            .map(|(idx, cell)| header_from_data(idx, cell))
            .collect();
        let rows = rows
            .map(|row| row.iter().map(cell_from_data).collect())
            .collect();
        sheets.push(Sheet { name, header, rows });
    }
    Ok(sheets)
}

fn read_xlsx(bytes: &[u8], _: &AnalyzerConfig) -> Result<Vec<Sheet>> {
    let workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| Error::extraction("calamine-xlsx", e))?;
    read_workbook(workbook, "calamine-xlsx")
}

fn read_xls(bytes: &[u8], _: &AnalyzerConfig) -> Result<Vec<Sheet>> {
    let workbook: Xls<_> =
        Xls::new(Cursor::new(bytes)).map_err(|e| Error::extraction("calamine-xls", e))?;
    read_workbook(workbook, "calamine-xls")
}

fn read_any_workbook(bytes: &[u8], _: &AnalyzerConfig) -> Result<Vec<Sheet>> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| Error::extraction("calamine-auto", e))?;
    read_workbook(workbook, "calamine-auto")
}

fn parse_csv_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

// A column is numeric only when every non-empty cell parses.
pub fn read_csv_sheet(bytes: &[u8]) -> Result<Sheet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid: Vec<Vec<String>> = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| Error::extraction("csv", format!("failed to read row: {e}")))?;
        grid.push(
            record
                .iter()
                .map(|field| trim_cell(&String::from_utf8_lossy(field)))
                .collect(),
        );
    }
    if grid.is_empty() {
        return Err(Error::extraction("csv", "file has no rows"));
    }

    let header_cells = grid.remove(0);
    let width = grid
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header_cells.len()))
        .max()
        .unwrap_or(0);
    let header = (0..width)
        .map(|idx| match header_cells.get(idx) {
            Some(name) if !name.is_empty() => ColumnName::Text(name.clone()),
            _ => ColumnName::unnamed(idx),
        })
        .collect();

    let numeric_columns: Vec<bool> = (0..width)
        .map(|idx| {
            grid.iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !cell.is_empty())
                .all(|cell| parse_csv_number(cell).is_some())
        })
        .collect();

    let rows = grid
        .iter()
        .map(|row| {
            (0..width)
                .map(|idx| match row.get(idx).map(String::as_str) {
                    None | Some("") => CellValue::Missing,
                    Some(cell) if numeric_columns[idx] => {
                        parse_csv_number(cell).map_or(CellValue::Missing, CellValue::Number)
                    }
                    Some(cell) => CellValue::text(cell),
                })
                .collect()
        })
        .collect();

    Ok(Sheet {
        name: CSV_SHEET_NAME.to_string(),
        header,
        rows,
    })
}

fn read_csv(bytes: &[u8], _: &AnalyzerConfig) -> Result<Vec<Sheet>> {
    Ok(vec![read_csv_sheet(bytes)?])
}

const XLSX_STRATEGIES: &[Strategy<Vec<Sheet>>] = &[
    Strategy { name: "calamine-xlsx", run: read_xlsx },
    Strategy { name: "calamine-auto", run: read_any_workbook },
];

const XLS_STRATEGIES: &[Strategy<Vec<Sheet>>] = &[
    Strategy { name: "calamine-xls", run: read_xls },
    Strategy { name: "calamine-auto", run: read_any_workbook },
];

const CSV_STRATEGIES: &[Strategy<Vec<Sheet>>] = &[Strategy { name: "csv", run: read_csv }];

pub fn extract_table_records(
    source: &RecordSource,
    header: &[ColumnName],
    rows: &[Vec<CellValue>],
    config: &AnalyzerConfig,
) -> Vec<CandidateRecord> {
    let roles = classify_columns(header, rows, &config.financial_column_keywords);
    let financial: Vec<&str> = header
        .iter()
        .zip(&roles)
        .filter(|(_, role)| role.is_financial())
        .map(|(name, _)| name.label())
        .collect();
    if !financial.is_empty() {
        info!(source = %source, columns = ?financial, "detected financial columns");
    }

    let mut records = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        let mut record = CandidateRecord::new(source.clone(), idx + 1);
        for ((name, role), value) in header.iter().zip(&roles).zip(row) {
            if role.is_financial() {
                if let Some(amount) = value.as_number() {
                    record.amounts.push(RawAmount::Number(amount));
                }
            }
            if role.date && !value.is_missing() {
                record.dates.push(value.to_string());
            }
            if role.free_text {
                if let CellValue::Text(text) = value {
                    record.keywords.extend(find_keywords(text, &config.keywords));
                }
            }
            record.fields.push(FieldValue {
                name: name.label().to_string(),
                value: value.clone(),
            });
        }
        if record.has_signal() {
            records.push(record);
        }
    }
    records
}

pub fn extract_sheet_records(sheet: &Sheet, config: &AnalyzerConfig) -> Vec<CandidateRecord> {
    let source = RecordSource::Sheet(sheet.name.clone());
    let records = extract_table_records(&source, &sheet.header, &sheet.rows, config);
    debug!(
        sheet = %sheet.name,
        rows = sheet.rows.len(),
        candidates = records.len(),
        "extracted sheet"
    );
    records
}

pub fn read_sheets(bytes: &[u8], kind: &str, config: &AnalyzerConfig) -> Result<Vec<Sheet>> {
    let strategies = match kind {
        "xlsx" => XLSX_STRATEGIES,
        "xls" => XLS_STRATEGIES,
        "csv" => CSV_STRATEGIES,
        other => return Err(Error::UnsupportedFormat(other.to_string())),
    };
    let sheets = run_strategies(bytes, config, strategies)?;
    info!(sheets = sheets.len(), "workbook loaded");
    Ok(sheets)
}

pub fn extract_tabular_candidates(
    bytes: &[u8],
    kind: &str,
    config: &AnalyzerConfig,
) -> Result<Vec<CandidateRecord>> {
    let sheets = read_sheets(bytes, kind, config)?;
    Ok(sheets
        .iter()
        .flat_map(|sheet| extract_sheet_records(sheet, config))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::ExcelDateTimeType;
    use rust_xlsxwriter::{Format, Workbook};

    fn sample_workbook() -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Enero").expect("sheet name");
        sheet.write_string(0, 0, "Fecha").expect("header");
        sheet.write_string(0, 1, "Descripción").expect("header");
        sheet.write_string(0, 2, "Monto").expect("header");
        sheet.write_number(0, 3, 2024).expect("numeric header");
        sheet.write_string(1, 0, "04/01/2023").expect("cell");
        sheet.write_string(1, 1, "Invoice 17 paid").expect("cell");
        sheet.write_number(1, 2, 1200.5).expect("cell");
        sheet.write_string(2, 1, "lunch").expect("cell");
        sheet.write_string(3, 1, "refund").expect("cell");
        sheet.write_number(3, 2, -45).expect("cell");

        let second = workbook.add_worksheet();
        second.set_name("Notas").expect("sheet name");
        second.write_string(0, 0, "Comentario").expect("header");
        second.write_string(1, 0, "nothing to see").expect("cell");
        workbook.save_to_buffer().expect("save workbook")
    }

    #[test]
    fn excel_dates_follow_the_workbook_date_system() {
        let stamp = |value, is_1904| ExcelDateTime::new(value, ExcelDateTimeType::DateTime, is_1904);
        assert_eq!(excel_date(&stamp(45017.0, false)).as_deref(), Some("2023-04-01"));
        assert_eq!(excel_date(&stamp(45017.75, false)).as_deref(), Some("2023-04-01"));
        assert_eq!(excel_date(&stamp(43555.0, true)).as_deref(), Some("2023-04-01"));
        assert_eq!(excel_date(&stamp(-3.0, false)), None);
        assert_eq!(excel_date(&stamp(1e15, false)), None);
        assert_eq!(excel_date(&stamp(-1e300, false)), None);
        let duration = ExcelDateTime::new(1.5, ExcelDateTimeType::TimeDelta, false);
        assert_eq!(excel_date(&duration), None);
    }

    #[test]
    fn out_of_range_date_cell_is_skipped_not_fatal() {
        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Fecha").expect("header");
        sheet.write_string(0, 1, "Monto").expect("header");
        sheet
            .write_number_with_format(1, 0, 45017.0, &date_format)
            .expect("cell");
        sheet.write_number(1, 1, 100).expect("cell");
        sheet
            .write_number_with_format(2, 0, 1e15, &date_format)
            .expect("cell");
        sheet.write_number(2, 1, 50).expect("cell");
        let bytes = workbook.save_to_buffer().expect("save workbook");

        let records =
            extract_tabular_candidates(&bytes, "xlsx", &AnalyzerConfig::default()).expect("extract");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].dates, vec!["2023-04-01"]);
        assert_eq!(records[0].amounts, vec![RawAmount::Number(100.0)]);
        assert_eq!(records[1].amounts, vec![RawAmount::Number(50.0)]);
    }

    #[test]
    fn empty_csv_is_a_csv_extraction_failure() {
        match read_csv_sheet(b"") {
            Err(Error::Extraction { strategy, .. }) => assert_eq!(strategy, "csv"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn xlsx_rows_become_candidates_with_provenance() {
        let bytes = sample_workbook();
        let config = AnalyzerConfig::default();
        let sheets = read_sheets(&bytes, "xlsx", &config).expect("read workbook");
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].header[3], ColumnName::Placeholder("2024".into()));

        let records = extract_tabular_candidates(&bytes, "xlsx", &config).expect("extract");
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.source, RecordSource::Sheet("Enero".into()));
        assert_eq!(first.row, 1);
        assert_eq!(first.amounts, vec![RawAmount::Number(1200.5)]);
        assert_eq!(first.dates, vec!["04/01/2023"]);
        assert_eq!(first.keywords, vec!["invoice"]);
        assert_eq!(first.fields.len(), 4);

        let refund = &records[1];
        assert_eq!(refund.row, 3);
        assert_eq!(refund.amounts, vec![RawAmount::Number(-45.0)]);
        assert!(refund.dates.is_empty());
    }

    #[test]
    fn xlsx_bytes_declared_as_xls_fall_back_to_sniffing() {
        let bytes = sample_workbook();
        let records =
            extract_tabular_candidates(&bytes, "xls", &AnalyzerConfig::default()).expect("fallback");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn csv_columns_are_typed_per_column() {
        let csv = "\u{feff}date,amount,memo,\n2023-04-01,150.25,Deposit from client,x\n2023-04-02,,coffee,\n,abc,,\n";
        let sheet = read_csv_sheet(csv.as_bytes()).expect("read csv");
        assert_eq!(sheet.header[0], ColumnName::Text("date".into()));
        assert_eq!(sheet.header[3], ColumnName::Text("Unnamed: 3".into()));
        // "abc" makes the amount column text, so no numeric amounts come out
        assert_eq!(sheet.rows[0][1], CellValue::Text("150.25".into()));

        let records = extract_sheet_records(&sheet, &AnalyzerConfig::default());
        assert_eq!(records.len(), 2);
        assert!(records[0].amounts.is_empty());
        assert_eq!(records[0].keywords, vec!["deposit"]);
        assert_eq!(records[1].dates, vec!["2023-04-02"]);
    }

    #[test]
    fn garbage_spreadsheet_exhausts_every_strategy() {
        let err = extract_tabular_candidates(b"not a workbook", "xlsx", &AnalyzerConfig::default())
            .expect_err("garbage");
        match err {
            Error::ExtractionExhausted(messages) => assert_eq!(messages.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        let err = read_sheets(b"", "ods", &AnalyzerConfig::default()).expect_err("unknown kind");
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}
