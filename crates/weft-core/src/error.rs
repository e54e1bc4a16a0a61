//! Unified error types for Weft

use thiserror::Error;

/// Unified error type for all Weft operations
#[derive(Error, Debug)]
pub enum WeftError {
    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    // Insights errors
    #[error("Insights source closed")]
    InsightsClosed,

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    // Orchestration errors
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    #[error("Task spawn failed for {key}: {reason}")]
    TaskSpawn { key: String, reason: String },

    #[error("Task failed: {0}")]
    Task(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using WeftError
pub type Result<T> = std::result::Result<T, WeftError>;
