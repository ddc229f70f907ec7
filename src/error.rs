use thiserror::Error;

/// Crate-wide error type.
///
/// Per the error taxonomy in the core spec, only configuration errors and
/// irrecoverable ledger failures are expected to surface out of the engine
/// to its caller; source-fetch, detector, gate, and sink failures are all
/// absorbed at the component that can degrade gracefully.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-layer errors (§7: "Configuration error").
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no primary market source registered")]
    MissingPrimarySource,

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// Ledger persistence errors (§7: "Ledger persistence failure").
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("failed to read ledger file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write ledger file {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed ledger file {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
