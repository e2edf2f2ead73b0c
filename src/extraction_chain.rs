use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, info, warn};

use crate::config::AnalyzerConfig;
use crate::error::{Error, Result};

pub(crate) struct Strategy<T> {
    pub name: &'static str,
    pub run: fn(&[u8], &AnalyzerConfig) -> Result<T>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub(crate) fn run_strategies<T>(
    bytes: &[u8],
    config: &AnalyzerConfig,
    strategies: &[Strategy<T>],
) -> Result<T> {
    let mut failures = Vec::new();
    for strategy in strategies {
        debug!(strategy = strategy.name, "trying extraction strategy");
        let outcome = catch_unwind(AssertUnwindSafe(|| (strategy.run)(bytes, config)));
        let err = match outcome {
            Ok(Ok(value)) => {
                if !failures.is_empty() {
                    info!(strategy = strategy.name, "fallback extraction strategy succeeded");
                }
                return Ok(value);
            }
            Ok(Err(err)) => err,
            Err(payload) => Error::extraction(
                strategy.name,
                format!("reader panicked: {}", panic_message(payload.as_ref())),
            ),
        };
        warn!(strategy = strategy.name, error = %err, "extraction strategy failed");
        failures.push(err.to_string());
    }
    Err(Error::ExtractionExhausted(failures))
}
