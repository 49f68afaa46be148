use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Completion endpoint failure with enough context to diagnose it later.
///
/// `stage` is one of `http`, `auth`, `decode`, `empty`.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub model: String,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, model={}, stage={}): {}",
            self.provider, self.model, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    /// Nothing structured or scrapeable in the completion text.
    #[error("unparsable AI response")]
    UnparsableAiResponse,

    /// Parsed, but not into the expected result shape.
    #[error("AI response does not match the {shape} shape: {reason}")]
    Schema { shape: &'static str, reason: String },
}
