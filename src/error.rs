//! Error types for Clinic Assist.

use std::time::Duration;

/// Top-level error type for the assistant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Appointment store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Appointment not found: {id}")]
    NotFound { id: String },

    #[error("Failed to read schedule data from {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to write schedule data to {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("Schedule data is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("LLM call budget exhausted: {used} calls made, {limit} allowed per run")]
    CallBudgetExhausted { used: u32, limit: u32 },

    #[error("All {attempts} attempts failed, last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Human-review gate errors.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Review input closed before a decision was made")]
    InputClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Workflow-level errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),
}

/// Result type alias for the assistant.
pub type Result<T> = std::result::Result<T, Error>;
