//! Error types for shunt-core

use thiserror::Error;

/// Core error type for Shunt
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Invalid configuration value
    #[error("[C002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C003: Strategy string could not be parsed
    #[error("[C003] Invalid DDL strategy '{strategy}': {reason}")]
    InvalidStrategy { strategy: String, reason: String },

    /// C004: Option not recognized for any strategy
    #[error("[C004] Unknown DDL strategy option '{option}'")]
    UnknownOption { option: String },

    /// C005: Option recognized but not legal for the chosen strategy
    #[error("[C005] Option '--{option}' is not supported by strategy '{strategy}'")]
    UnsupportedOption { option: String, strategy: String },

    /// C006: Option value missing or malformed
    #[error("[C006] Invalid value for '--{option}': {reason}")]
    InvalidOptionValue { option: String, reason: String },

    /// C007: Malformed migration UUID
    #[error("[C007] Invalid migration uuid '{value}': expected 32 hex digits in 8_4_4_4_12 form")]
    InvalidUuid { value: String },

    /// C008: Malformed identifier (keyspace, shard, context)
    #[error("[C008] Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    /// C009: Unknown status or enum text read back from storage
    #[error("[C009] Unknown {kind} '{value}'")]
    UnknownVariant { kind: &'static str, value: String },

    /// C010: IO error with file path context
    #[error("[C010] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C011: YAML parse error
    #[error("[C011] Config parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
