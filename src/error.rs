use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the maildex index
#[derive(Error, Debug)]
pub enum MaildexError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Stored embedding blob whose length is not a whole number of elements
    #[error("Malformed vector blob: {len} bytes is not a multiple of {element_width}")]
    MalformedVector { len: usize, element_width: usize },

    /// Two vectors of different lengths were compared
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding provider reports no semantic capability
    #[error("Embedding provider is unavailable")]
    ProviderUnavailable,

    /// Embedding provider failed mid-call
    #[error("Embedding provider error: {0}")]
    Provider(String),

    /// Database errors
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Serial access gate is no longer accepting work
    #[error("Serial gate error: {0}")]
    Gate(String),

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for maildex operations
pub type Result<T> = std::result::Result<T, MaildexError>;
