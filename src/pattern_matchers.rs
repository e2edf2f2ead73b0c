use regex::Regex;
use serde::Deserialize;
use std::ops::Range;
use std::sync::OnceLock;

pub const DEFAULT_FINANCIAL_KEYWORDS: &[&str] = &[
    "income",
    "expense",
    "payment",
    "collection",
    "transfer",
    "deposit",
    "withdrawal",
    "purchase",
    "sale",
    "invoice",
    "receipt",
    "balance",
    "amount",
    "quantity",
    "price",
    "total",
    "subtotal",
    "tax",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountMatchMode {
    // Bare numbers are dropped when they overlap a currency match or a date.
    #[default]
    Distinct,
    // Every pattern is applied independently; one number may be reported several times.
    Overlapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AmountPattern {
    CurrencySymbol,
    CurrencyWord,
    BareNumber,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineSignals {
    pub amounts: Vec<String>,
    pub dates: Vec<String>,
    pub keywords: Vec<String>,
}

impl LineSignals {
    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty() && self.dates.is_empty() && self.keywords.is_empty()
    }
}

fn currency_symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$[\d,]+\.?\d*").expect("currency symbol regex"))
}

fn currency_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)[\d,]+\.?\d*\s*(?:pesos|dolares|dólares|usd)").expect("currency word regex")
    })
}

fn bare_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\d,]+\.?\d*").expect("bare number regex"))
}

fn date_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            Regex::new(r"\d{1,2}/\d{1,2}/\d{4}").expect("mm/dd/yyyy regex"),
            Regex::new(r"\d{4}-\d{1,2}-\d{1,2}").expect("yyyy-mm-dd regex"),
            Regex::new(r"\d{1,2}-\d{1,2}-\d{4}").expect("mm-dd-yyyy regex"),
        ]
    })
}

fn amount_patterns() -> [(AmountPattern, &'static Regex); 3] {
    [
        (AmountPattern::CurrencySymbol, currency_symbol_re()),
        (AmountPattern::CurrencyWord, currency_word_re()),
        (AmountPattern::BareNumber, bare_number_re()),
    ]
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn date_spans(line: &str) -> Vec<Range<usize>> {
    date_res()
        .iter()
        .flat_map(|re| re.find_iter(line).map(|m| m.range()))
        .collect()
}

pub fn find_amounts(line: &str) -> Vec<String> {
    amount_patterns()
        .iter()
        .flat_map(|(_, re)| re.find_iter(line).map(|m| m.as_str().to_string()))
        .collect()
}

pub fn find_distinct_amounts(line: &str) -> Vec<String> {
    let dates = date_spans(line);
    let mut kept: Vec<(Range<usize>, String)> = Vec::new();
    for (pattern, re) in amount_patterns() {
        for m in re.find_iter(line) {
            let span = m.range();
            if pattern != AmountPattern::CurrencySymbol {
                if !m.as_str().chars().any(|c| c.is_ascii_digit()) {
                    continue;
                }
                if dates.iter().any(|d| overlaps(d, &span)) {
                    continue;
                }
                if kept.iter().any(|(k, _)| overlaps(k, &span)) {
                    continue;
                }
            }
            kept.push((span, m.as_str().to_string()));
        }
    }
    kept.into_iter().map(|(_, text)| text).collect()
}

pub fn find_amounts_with_mode(line: &str, mode: AmountMatchMode) -> Vec<String> {
    match mode {
        AmountMatchMode::Distinct => find_distinct_amounts(line),
        AmountMatchMode::Overlapping => find_amounts(line),
    }
}

pub fn find_dates(line: &str) -> Vec<String> {
    date_res()
        .iter()
        .flat_map(|re| re.find_iter(line).map(|m| m.as_str().to_string()))
        .collect()
}

pub fn find_keywords<S: AsRef<str>>(text: &str, vocabulary: &[S]) -> Vec<String> {
    let lowered = text.to_lowercase();
    vocabulary
        .iter()
        .map(|kw| AsRef::<str>::as_ref(kw))
        .filter(|kw| !kw.is_empty() && lowered.contains(&kw.to_lowercase()))
        .map(str::to_string)
        .collect()
}

pub fn scan_line<S: AsRef<str>>(line: &str, mode: AmountMatchMode, vocabulary: &[S]) -> LineSignals {
    LineSignals {
        amounts: find_amounts_with_mode(line, mode),
        dates: find_dates(line),
        keywords: find_keywords(line, vocabulary),
    }
}
