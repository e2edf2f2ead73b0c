use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::chart_render::{
    draw_bar_panel, draw_line_panel, draw_pie_panel, render_artifact, render_placeholder, Bar,
    ChartArtifact, ChartKind, LineSeries, Orientation, CATEGORY_PALETTE, DANGER, INFO, PRIMARY,
    SUCCESS, WARNING,
};
use crate::config::ChartConfig;
use crate::error::Result;

pub const NO_TRANSACTIONS_MESSAGE: &str = "No transaction data";
pub const NO_EXPENSES_MESSAGE: &str = "No expenses recorded";
pub const NO_INCOME_OR_EXPENSE_MESSAGE: &str = "No income or expense transactions";

pub const CATEGORY_EXPENSES_TITLE: &str = "Expenses by Category";
pub const BALANCE_EVOLUTION_TITLE: &str = "Balance Evolution";
pub const DISTRIBUTION_TITLE: &str = "Income vs Expense Distribution";

const POPULAR_CATEGORY_LIMIT: usize = 5;
const TRANSACTION_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
    #[default]
    Other,
}

impl From<String> for TransactionType {
    fn from(raw: String) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "ingreso" => TransactionType::Income,
            "gasto" => TransactionType::Expense,
            _ => TransactionType::Other,
        }
    }
}

impl<'de> Deserialize<'de> for TransactionType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            Some(Value::String(raw)) => TransactionType::from(raw),
            _ => TransactionType::Other,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Transaction {
    #[serde(rename = "Amount", default, deserialize_with = "lenient_amount")]
    pub amount: Option<f64>,
    #[serde(rename = "Type", default)]
    pub kind: TransactionType,
    #[serde(rename = "TransactionDate", default, deserialize_with = "lenient_date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "CategoryName", default)]
    pub category: Option<String>,
}

impl Transaction {
    fn valid_amount(&self) -> Option<f64> {
        self.amount.filter(|value| value.is_finite())
    }

    fn is_income(&self) -> bool {
        self.kind == TransactionType::Income
    }

    fn is_expense(&self) -> bool {
        self.kind == TransactionType::Expense
    }

    fn signed_change(&self) -> f64 {
        match (self.kind, self.valid_amount()) {
            (TransactionType::Income, Some(amount)) => amount,
            (TransactionType::Expense, Some(amount)) => -amount,
            _ => 0.0,
        }
    }
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|amount| amount.is_finite()))
}

pub fn parse_transaction_date(raw: &str) -> Option<NaiveDate> {
    let token = raw.trim().split(['T', ' ']).next()?;
    TRANSACTION_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
}

fn lenient_date<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => parse_transaction_date(&text),
        _ => None,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryExpense {
    pub category: String,
    pub total: f64,
    pub count: usize,
    pub mean: f64,
    pub first_date: Option<NaiveDate>,
}

pub fn category_expense_totals(transactions: &[Transaction]) -> Vec<CategoryExpense> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (f64, usize, Option<NaiveDate>)> = HashMap::new();
    for tx in transactions.iter().filter(|tx| tx.is_expense()) {
        let (Some(category), Some(amount)) = (tx.category.as_ref(), tx.valid_amount()) else {
            continue;
        };
        let entry = groups.entry(category.clone()).or_insert_with(|| {
            order.push(category.clone());
            (0.0, 0, None)
        });
        entry.0 += amount;
        entry.1 += 1;
        entry.2 = match (entry.2, tx.date) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }

    let mut totals: Vec<CategoryExpense> = order
        .into_iter()
        .filter_map(|category| {
            let (total, count, first_date) = groups.remove(&category)?;
            Some(CategoryExpense {
                category,
                total: round2(total),
                count,
                mean: round2(total / count as f64),
                first_date,
            })
        })
        .collect();
    totals.sort_by(|a, b| b.total.total_cmp(&a.total));
    totals
}

pub fn render_category_expenses(
    transactions: &[Transaction],
    config: &ChartConfig,
) -> Result<ChartArtifact> {
    if transactions.is_empty() {
        return render_placeholder(NO_TRANSACTIONS_MESSAGE, config);
    }
    let totals = category_expense_totals(transactions);
    if totals.is_empty() {
        return render_placeholder(NO_EXPENSES_MESSAGE, config);
    }

    let bars: Vec<Bar> = totals
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let color = CATEGORY_PALETTE[idx % CATEGORY_PALETTE.len()];
            Bar::in_slot(idx, 0.7, 0.0, entry.total, color)
        })
        .collect();
    let shares: Vec<f64> = totals.iter().map(|entry| entry.total).collect();
    render_artifact(CATEGORY_EXPENSES_TITLE, ChartKind::Bar, config, |root| {
        let panels = root.split_evenly((1, 2));
        draw_bar_panel(&panels[0], &bars, totals.len(), Orientation::Vertical)?;
        draw_pie_panel(&panels[1], &shares)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalancePoint {
    pub date: NaiveDate,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub slope: f64,
    pub intercept: f64,
}

impl Trend {
    pub fn at(&self, index: usize) -> f64 {
        self.intercept + self.slope * index as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyNet {
    pub month: String,
    pub net: f64,
    pub transactions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceEvolution {
    pub daily: Vec<BalancePoint>,
    pub trend: Option<Trend>,
    pub monthly: Vec<MonthlyNet>,
}

pub fn linear_trend(values: &[f64]) -> Option<Trend> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = values.iter().sum::<f64>() / n;
    let (mut num, mut den) = (0.0, 0.0);
    for (idx, value) in values.iter().enumerate() {
        let dx = idx as f64 - mean_x;
        num += dx * (value - mean_y);
        den += dx * dx;
    }
    let slope = num / den;
    Some(Trend {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

pub fn balance_evolution(transactions: &[Transaction]) -> BalanceEvolution {
    let mut dated: Vec<(NaiveDate, &Transaction)> = transactions
        .iter()
        .filter_map(|tx| tx.date.map(|date| (date, tx)))
        .collect();
    dated.sort_by_key(|(date, _)| *date);

    let mut daily: Vec<BalancePoint> = Vec::new();
    let mut balance = 0.0;
    let mut monthly: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for (date, tx) in dated {
        let change = tx.signed_change();
        balance += change;
        match daily.last_mut() {
            Some(point) if point.date == date => point.balance = balance,
            _ => daily.push(BalancePoint { date, balance }),
        }
        let month = monthly.entry(month_key(date)).or_insert((0.0, 0));
        month.0 += change;
        month.1 += 1;
    }

    let balances: Vec<f64> = daily.iter().map(|point| point.balance).collect();
    BalanceEvolution {
        trend: linear_trend(&balances),
        daily,
        monthly: monthly
            .into_iter()
            .map(|(month, (net, transactions))| MonthlyNet {
                month,
                net,
                transactions,
            })
            .collect(),
    }
}

pub fn render_balance_evolution(
    transactions: &[Transaction],
    config: &ChartConfig,
) -> Result<ChartArtifact> {
    let evolution = balance_evolution(transactions);
    if evolution.daily.is_empty() {
        return render_placeholder(NO_TRANSACTIONS_MESSAGE, config);
    }

    let xs: Vec<f64> = evolution
        .daily
        .iter()
        .map(|point| point.date.num_days_from_ce() as f64)
        .collect();
    let mut lines = vec![LineSeries {
        points: xs
            .iter()
            .zip(&evolution.daily)
            .map(|(&x, point)| (x, point.balance))
            .collect(),
        color: PRIMARY,
        width: 2,
        markers: true,
        fill: true,
    }];
    if let Some(trend) = evolution.trend {
        lines.push(LineSeries {
            points: xs.iter().enumerate().map(|(idx, &x)| (x, trend.at(idx))).collect(),
            color: DANGER,
            width: 2,
            markers: false,
            fill: false,
        });
    }
    let bars: Vec<Bar> = evolution
        .monthly
        .iter()
        .enumerate()
        .map(|(idx, month)| {
            let color = if month.net > 0.0 { SUCCESS } else { DANGER };
            Bar::in_slot(idx, 0.7, 0.0, month.net, color)
        })
        .collect();

    render_artifact(BALANCE_EVOLUTION_TITLE, ChartKind::Line, config, |root| {
        let panels = root.split_evenly((2, 1));
        draw_line_panel(&panels[0], &lines)?;
        draw_bar_panel(&panels[1], &bars, evolution.monthly.len(), Orientation::Vertical)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyComparison {
    pub month: String,
    pub income: f64,
    pub expenses: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionTotals {
    pub income: f64,
    pub expenses: f64,
    pub balance: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IncomeExpenseDistribution {
    pub income_count: usize,
    pub expense_count: usize,
    pub monthly: Vec<MonthlyComparison>,
    pub expense_by_category: Vec<(String, f64)>,
    pub expense_by_weekday: [f64; 7],
    pub totals: DistributionTotals,
}

pub fn income_expense_distribution(transactions: &[Transaction]) -> IncomeExpenseDistribution {
    let mut dist = IncomeExpenseDistribution::default();
    let mut monthly: BTreeMap<String, (f64, f64)> = BTreeMap::new();

    for tx in transactions {
        let Some(amount) = tx.valid_amount() else {
            continue;
        };
        if tx.is_income() {
            dist.income_count += 1;
            dist.totals.income += amount;
            if let Some(date) = tx.date {
                monthly.entry(month_key(date)).or_insert((0.0, 0.0)).0 += amount;
            }
        } else if tx.is_expense() {
            dist.expense_count += 1;
            dist.totals.expenses += amount;
            if let Some(date) = tx.date {
                monthly.entry(month_key(date)).or_insert((0.0, 0.0)).1 += amount;
                dist.expense_by_weekday[date.weekday().num_days_from_monday() as usize] += amount;
            }
        }
    }
    dist.totals.balance = dist.totals.income - dist.totals.expenses;
    dist.monthly = monthly
        .into_iter()
        .map(|(month, (income, expenses))| MonthlyComparison {
            month,
            income,
            expenses,
        })
        .collect();

    let mut by_category: Vec<(String, f64)> = category_expense_totals(transactions)
        .into_iter()
        .map(|entry| (entry.category, entry.total))
        .collect();
    by_category.reverse();
    dist.expense_by_category = by_category;
    dist
}

pub fn render_income_expense_distribution(
    transactions: &[Transaction],
    config: &ChartConfig,
) -> Result<ChartArtifact> {
    if transactions.is_empty() {
        return render_placeholder(NO_TRANSACTIONS_MESSAGE, config);
    }
    let dist = income_expense_distribution(transactions);
    if dist.income_count == 0 && dist.expense_count == 0 {
        return render_placeholder(NO_INCOME_OR_EXPENSE_MESSAGE, config);
    }

    // Side-by-side monthly bars only make sense with both sides present.
    let monthly_bars: Vec<Bar> = if dist.income_count > 0 && dist.expense_count > 0 {
        dist.monthly
            .iter()
            .enumerate()
            .flat_map(|(idx, month)| {
                [
                    Bar::in_slot(idx, 0.35, -0.175, month.income, SUCCESS),
                    Bar::in_slot(idx, 0.35, 0.175, month.expenses, DANGER),
                ]
            })
            .collect()
    } else {
        Vec::new()
    };
    let category_bars: Vec<Bar> = dist
        .expense_by_category
        .iter()
        .enumerate()
        .map(|(idx, (_, total))| {
            let color = CATEGORY_PALETTE[idx % CATEGORY_PALETTE.len()];
            Bar::in_slot(idx, 0.7, 0.0, *total, color)
        })
        .collect();
    let weekday_bars: Vec<Bar> = dist
        .expense_by_weekday
        .iter()
        .enumerate()
        .map(|(idx, total)| Bar::in_slot(idx, 0.7, 0.0, *total, INFO))
        .collect();
    let totals = &dist.totals;
    let balance_color = if totals.balance >= 0.0 { PRIMARY } else { WARNING };
    let summary_bars = [
        Bar::in_slot(0, 0.6, 0.0, totals.income, SUCCESS),
        Bar::in_slot(1, 0.6, 0.0, totals.expenses, DANGER),
        Bar::in_slot(2, 0.6, 0.0, totals.balance, balance_color),
    ];

    render_artifact(DISTRIBUTION_TITLE, ChartKind::Bar, config, |root| {
        let panels = root.split_evenly((2, 2));
        if !monthly_bars.is_empty() {
            draw_bar_panel(&panels[0], &monthly_bars, dist.monthly.len(), Orientation::Vertical)?;
        }
        if dist.expense_count > 0 {
            draw_bar_panel(
                &panels[1],
                &category_bars,
                category_bars.len(),
                Orientation::Horizontal,
            )?;
            draw_bar_panel(&panels[2], &weekday_bars, 7, Orientation::Vertical)?;
        }
        draw_bar_panel(&panels[3], &summary_bars, 3, Orientation::Vertical)
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransactionSummary {
    pub popular_categories: Vec<(String, usize)>,
    // Keyed by month number (1-12), all years merged.
    pub expenses_by_month: BTreeMap<u32, f64>,
    pub incomes_by_month: BTreeMap<u32, f64>,
    pub total_categories: usize,
}

pub fn summarize_transactions(transactions: &[Transaction]) -> TransactionSummary {
    let mut summary = TransactionSummary::default();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for tx in transactions {
        if let Some(category) = tx.category.as_deref() {
            match positions.get(category) {
                Some(&idx) => counts[idx].1 += 1,
                None => {
                    positions.insert(category, counts.len());
                    counts.push((category.to_string(), 1));
                }
            }
        }
        let (Some(date), Some(amount)) = (tx.date, tx.valid_amount()) else {
            continue;
        };
        if tx.is_expense() {
            *summary.expenses_by_month.entry(date.month()).or_insert(0.0) += amount;
        } else if tx.is_income() {
            *summary.incomes_by_month.entry(date.month()).or_insert(0.0) += amount;
        }
    }

    summary.total_categories = counts.len();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(POPULAR_CATEGORY_LIMIT);
    summary.popular_categories = counts;
    debug!(
        transactions = transactions.len(),
        categories = summary.total_categories,
        "summarized transactions"
    );
    summary
}
