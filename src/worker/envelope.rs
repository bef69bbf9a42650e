// src/worker/envelope.rs

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one `work` call, as recorded by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    #[serde(default)]
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_seconds: f64,
    pub worker_id: String,
}

impl ResultEnvelope {
    pub fn succeeded(worker_id: String, result: Value, duration_seconds: f64) -> Self {
        Self {
            success: true,
            result,
            error: None,
            duration_seconds,
            worker_id,
        }
    }

    pub fn failed(worker_id: String, error: String, duration_seconds: f64) -> Self {
        Self {
            success: false,
            result: Value::Null,
            error: Some(error),
            duration_seconds,
            worker_id,
        }
    }
}
