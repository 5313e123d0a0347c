//! Normalization of heterogeneous collaborator results.
//!
//! Collaborators answer in two shapes: the structured [`RunOutput`] of
//! the command runner, or a loose JSON payload from steps that never
//! issued a command. Both collapse into one [`OperationResult`] the
//! workflow can reason about.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runner::RunOutput;

/// Outcome of one provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpStatus {
    Successful,
    Failed,
}

impl OpStatus {
    /// Returns true for `Successful`.
    pub fn is_success(&self) -> bool {
        matches!(self, OpStatus::Successful)
    }
}

/// Uniform result of one collaborator invocation.
///
/// `output` carries operation-specific metadata (paths, names) in a
/// sorted map so serialized results are deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub status: OpStatus,
    pub command: Option<String>,
    pub output: BTreeMap<String, String>,
}

impl OperationResult {
    /// Metadata accessor.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.output.get(key).map(String::as_str)
    }
}

/// Raw collaborator result before normalization.
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// Structured runner output, fields accessed directly.
    Run(RunOutput),
    /// Loose JSON payload, fields accessed by key (`ok`, `command`).
    Json(Value),
}

impl From<RunOutput> for RawResponse {
    fn from(run: RunOutput) -> Self {
        RawResponse::Run(run)
    }
}

impl From<Value> for RawResponse {
    fn from(value: Value) -> Self {
        RawResponse::Json(value)
    }
}

/// Collapses a raw collaborator result into an [`OperationResult`].
///
/// Unrecognized shapes normalize to `Failed` with no command; this
/// never panics. On a failed runner result the captured output is kept
/// under the `error` metadata key so the workflow can surface it.
pub fn normalize(raw: RawResponse, mut output: BTreeMap<String, String>) -> OperationResult {
    let (success, command) = match raw {
        RawResponse::Run(run) => {
            if !run.success && !run.output.is_empty() {
                output.insert("error".to_string(), run.output.trim_end().to_string());
            }
            (run.success, Some(run.command))
        }
        RawResponse::Json(value) => {
            let success = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
            let command = value
                .get("command")
                .and_then(Value::as_str)
                .map(str::to_string);
            (success, command)
        }
    };

    OperationResult {
        status: if success {
            OpStatus::Successful
        } else {
            OpStatus::Failed
        },
        command,
        output,
    }
}

/// Convenience for building metadata maps from pairs.
pub fn metadata<const N: usize>(pairs: [(&str, String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
