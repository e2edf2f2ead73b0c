use finscope_lib::pdf_text_import::{extract_pdf_candidates, extract_text_records};
use finscope_lib::{
    analyze_records, normalize_records, process_document, AnalyzerConfig, ChartKind,
    RecordSource,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use rust_xlsxwriter::Workbook;

fn small_charts() -> AnalyzerConfig {
    let mut config = AnalyzerConfig::default();
    config.chart.width = 240;
    config.chart.height = 160;
    config
}

fn text_pdf(lines: &[&str]) -> Vec<u8> {
    text_pdf_with_font(
        lines,
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        },
    )
}

/// Single-page PDF with one text block per line, all set in `font`.
fn text_pdf_with_font(lines: &[&str], font: Dictionary) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(font);
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut operations = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new(
            "Td",
            vec![72.into(), (720 - 24 * idx as i64).into()],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

#[test]
fn statement_lines_count_positive_amounts_as_income() {
    let config = AnalyzerConfig::default();
    let text = "Revenue: $1,200.50 on 2023-04-01\nExpense $300 2023-04-02";
    let candidates = extract_text_records(text, RecordSource::Unknown, &config);
    assert_eq!(candidates.len(), 2);

    let records = normalize_records(&candidates);
    assert_eq!(records[0].amounts, vec![1200.5]);
    assert_eq!(records[1].amounts, vec![300.0]);
    assert_eq!(records[0].dates, vec!["2023-04-01"]);
    assert_eq!(records[1].dates, vec!["2023-04-02"]);

    let summary = analyze_records(&records, config.analysis.top_keywords);
    assert_eq!(summary.total_income, 1500.5);
    assert_eq!(summary.total_expenses, 0.0);
    assert_eq!(summary.net_balance, 1500.5);
    assert_eq!(summary.top_keywords, vec![("expense".to_string(), 1)]);
}

#[test]
fn pdf_statement_is_processed_end_to_end() {
    let bytes = text_pdf(&["Revenue: $1,200.50 on 2023-04-01", "Expense $300 2023-04-02"]);
    let report = process_document(&bytes, "pdf", &small_charts());
    assert!(report.success, "{:?}", report.error);

    let data = report.data.expect("records");
    assert!(data.iter().all(|record| record.source == RecordSource::Page(1)));
    let analysis = report.analysis.expect("analysis");
    assert_eq!(analysis.total_income, 1500.5);
    let range = analysis.date_range.expect("date range");
    assert_eq!(range.start, "2023-04-01");
    assert_eq!(range.end, "2023-04-02");

    let kinds: Vec<ChartKind> = report
        .charts
        .expect("charts")
        .iter()
        .map(|chart| chart.kind)
        .collect();
    assert!(kinds.contains(&ChartKind::Histogram));
    assert!(kinds.contains(&ChartKind::Line));
}

#[test]
fn lopdf_reads_statements_pdf_extract_cannot() {
    // pdf-extract refuses a Type3 font without an /Encoding; lopdf falls back to
    // the standard encoding for it.
    let bytes = text_pdf_with_font(
        &["Revenue: $1,200.50 on 2023-04-01", "Expense $300 2023-04-02"],
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type3",
        },
    );
    let primary = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes));
    assert!(!matches!(primary, Ok(Ok(_))));

    let config = small_charts();
    let candidates = extract_pdf_candidates(&bytes, &config).expect("lopdf fallback");
    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.source == RecordSource::Page(1)));
    assert_eq!(candidates[1].original_text, "Expense $300 2023-04-02");

    let report = process_document(&bytes, "pdf", &config);
    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.analysis.expect("analysis").total_income, 1500.5);
}

#[test]
fn labeled_income_column_feeds_total_income() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Total Income").expect("header");
    sheet.write_string(0, 1, "Notes").expect("header");
    sheet.write_number(1, 0, 500).expect("cell");
    let bytes = workbook.save_to_buffer().expect("save workbook");

    let report = process_document(&bytes, "xlsx", &small_charts());
    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.total_records, Some(1));
    let analysis = report.analysis.expect("analysis");
    assert!(analysis.total_income >= 500.0);
    assert_eq!(analysis.total_expenses, 0.0);
    assert_eq!(analysis.net_balance, analysis.total_income - analysis.total_expenses);
}

#[test]
fn malformed_dates_are_dropped_without_failing() {
    let csv = "date,amount\n13/45/2023,25\n";
    let report = process_document(csv.as_bytes(), "csv", &small_charts());
    assert!(report.success, "{:?}", report.error);

    let data = report.data.expect("records");
    assert_eq!(data.len(), 1);
    assert!(data[0].dates.is_empty());
    assert_eq!(data[0].amounts, vec![25.0]);
    assert!(report.analysis.expect("analysis").date_range.is_none());
}

#[test]
fn document_without_signal_yields_empty_summary_and_no_charts() {
    let csv = "notes\nsee you soon\n";
    let report = process_document(csv.as_bytes(), "csv", &small_charts());
    assert!(report.success);
    assert_eq!(report.total_records, Some(0));
    assert!(report.charts.expect("charts").is_empty());
    let analysis = report.analysis.expect("analysis");
    assert_eq!(analysis.total_income, 0.0);
    assert_eq!(analysis.amount_distribution.max, 0.0);
}

#[test]
fn unreadable_pdf_is_a_failure_report() {
    let report = process_document(b"definitely not a pdf", "pdf", &small_charts());
    assert!(!report.success);
    assert_eq!(report.error_category, Some("EXTRACTION_ERROR"));
    assert!(report
        .error
        .expect("error text")
        .starts_with("All extraction strategies failed"));
}
