use finscope_lib::{
    process_document_with_timeout, render_balance_evolution, render_category_expenses,
    render_income_expense_distribution, summarize_transactions, AnalyzerConfig, ChartArtifact,
    Error, Transaction,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

const CONFIG_ENV: &str = "FINSCOPE_CONFIG";

#[derive(Debug, Deserialize)]
struct AdapterRequest {
    schema_version: u64,
    case: Option<AdapterCaseMeta>,
    endpoint: AdapterEndpoint,
    document: Option<AdapterDocument>,
    #[serde(default)]
    transactions: Vec<Transaction>,
}

#[derive(Debug, Deserialize)]
struct AdapterCaseMeta {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdapterEndpoint {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdapterDocument {
    path: Option<String>,
    #[serde(rename = "type")]
    type_tag: Option<String>,
}

#[derive(Debug, Serialize)]
struct AdapterErrorBody {
    category: String,
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status")]
enum AdapterResponse {
    #[serde(rename = "success")]
    Success { payload: Value },
    #[serde(rename = "error")]
    Error { error: AdapterErrorBody },
}

#[derive(Debug)]
struct AdapterFailure {
    category: String,
    message: String,
    error_type: &'static str,
}

impl AdapterFailure {
    fn protocol(message: impl Into<String>) -> Self {
        AdapterFailure {
            category: "ADAPTER_PROTOCOL_ERROR".to_string(),
            message: message.into(),
            error_type: "AdapterError",
        }
    }
}

impl From<Error> for AdapterFailure {
    fn from(err: Error) -> Self {
        AdapterFailure {
            category: err.category().to_string(),
            message: err.to_string(),
            error_type: "ProcessingError",
        }
    }
}

fn error_response(failure: AdapterFailure) -> AdapterResponse {
    AdapterResponse::Error {
        error: AdapterErrorBody {
            category: failure.category,
            message: failure.message,
            error_type: failure.error_type.to_string(),
        },
    }
}

fn parse_bool_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}

fn parse_value_flag(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|idx| args.get(idx + 1))
        .cloned()
}

fn init_logging(verbose: bool) {
    let filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .compact()
                .with_writer(io::stderr),
        )
        .init();
}

fn load_config(args: &[String]) -> Result<AnalyzerConfig, AdapterFailure> {
    let path = parse_value_flag(args, "--config")
        .or_else(|| env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);
    if let Some(path) = &path {
        debug!(config = %path.display(), "loading analyzer config");
    }
    Ok(AnalyzerConfig::load(path.as_deref())?)
}

fn read_stdin_json() -> Result<Value, AdapterFailure> {
    let mut raw = String::new();
    io::stdin()
        .read_to_string(&mut raw)
        .map_err(|e| AdapterFailure::protocol(format!("failed to read stdin: {e}")))?;
    if raw.trim().is_empty() {
        return Err(AdapterFailure::protocol("empty stdin request"));
    }
    serde_json::from_str::<Value>(&raw)
        .map_err(|e| AdapterFailure::protocol(format!("invalid JSON request: {e}")))
}

fn chart_payload(chart: ChartArtifact, transactions: &[Transaction]) -> Value {
    json!({
        "success": true,
        "chart": chart,
        "total_transactions": transactions.len(),
    })
}

async fn process_file(
    document: Option<AdapterDocument>,
    config: AnalyzerConfig,
) -> Result<Value, AdapterFailure> {
    let document =
        document.ok_or_else(|| AdapterFailure::protocol("request.document missing"))?;
    let path = document
        .path
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterFailure::protocol("request.document.path missing"))?;
    let path = Path::new(path);
    let type_tag = document
        .type_tag
        .or_else(|| {
            path.extension()
                .map(|ext| ext.to_string_lossy().to_string())
        })
        .unwrap_or_default();

    let bytes = std::fs::read(path).map_err(Error::from)?;
    let job_id = Uuid::new_v4().to_string();
    info!(job_id = %job_id, file = %path.display(), type_tag = %type_tag, "processing document");

    let report = process_document_with_timeout(bytes, type_tag, config).await;
    if !report.success {
        return Err(AdapterFailure {
            category: report
                .error_category
                .unwrap_or("PROCESSING_ERROR")
                .to_string(),
            message: report.error.unwrap_or_default(),
            error_type: "ProcessingError",
        });
    }

    let mut payload = serde_json::to_value(&report).map_err(Error::from)?;
    if let Some(object) = payload.as_object_mut() {
        object.insert("job_id".to_string(), json!(job_id));
        object.insert(
            "file_name".to_string(),
            json!(path.file_name().map(|name| name.to_string_lossy().to_string())),
        );
    }
    Ok(payload)
}

async fn dispatch(req: AdapterRequest, config: AnalyzerConfig) -> Result<Value, AdapterFailure> {
    if req.schema_version != 1 {
        return Err(AdapterFailure::protocol(format!(
            "unsupported schema_version: {}",
            req.schema_version
        )));
    }

    let path = req
        .endpoint
        .path
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AdapterFailure::protocol("request.endpoint.path missing"))?;

    let transactions = &req.transactions;
    match path {
        "/api/files/process" => process_file(req.document, config).await,
        "/api/categories/expense-analysis" => Ok(chart_payload(
            render_category_expenses(transactions, &config.chart)?,
            transactions,
        )),
        "/api/categories/balance-evolution" => Ok(chart_payload(
            render_balance_evolution(transactions, &config.chart)?,
            transactions,
        )),
        "/api/categories/income-expense-distribution" => Ok(chart_payload(
            render_income_expense_distribution(transactions, &config.chart)?,
            transactions,
        )),
        "/api/categories/summary" => Ok(json!({
            "success": true,
            "summary": summarize_transactions(transactions),
            "total_transactions": transactions.len(),
        })),
        _ => Err(AdapterFailure {
            category: "UNSUPPORTED_ENDPOINT".to_string(),
            message: format!("unsupported endpoint path: {path}"),
            error_type: "AdapterError",
        }),
    }
}

async fn handle(args: &[String]) -> Result<Value, AdapterFailure> {
    let config = load_config(args)?;
    let raw = read_stdin_json()?;
    let req = serde_json::from_value::<AdapterRequest>(raw)
        .map_err(|e| AdapterFailure::protocol(format!("request root invalid: {e}")))?;
    if let Some(case_id) = req.case.as_ref().and_then(|case| case.id.as_deref()) {
        debug!(case = case_id, "adapter case");
    }
    if let Some(path) = req.endpoint.path.as_deref() {
        debug!(endpoint = path, "adapter endpoint");
    }
    dispatch(req, config).await
}

#[tokio::main]
async fn main() {
    let args = env::args().skip(1).collect::<Vec<_>>();
    let pretty = parse_bool_flag(&args, "--pretty");
    init_logging(parse_bool_flag(&args, "--verbose"));

    let resp = match handle(&args).await {
        Ok(payload) => AdapterResponse::Success { payload },
        Err(failure) => error_response(failure),
    };

    let out = if pretty {
        serde_json::to_string_pretty(&resp)
    } else {
        serde_json::to_string(&resp)
    }
    .unwrap_or_else(|e| {
        json!({
            "status": "error",
            "error": {
                "category": "ADAPTER_PROTOCOL_ERROR",
                "message": format!("serialize response failed: {e}"),
                "type": "SerializeError",
            }
        })
        .to_string()
    });

    print!("{out}");
}
