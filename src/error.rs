use thiserror::Error;

/// Errors raised by the conversion engine and the order planner.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// Product name is not in the yield catalog.
    #[error("product not found in catalog: {0}")]
    NotFound(String),

    /// Negative or non-finite quantity, case count, or inventory.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl CoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Data-entry errors found while building or loading a yield catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("product name must not be empty")]
    EmptyName,

    #[error("duplicate product in catalog: {0}")]
    Duplicate(String),

    #[error("{product}: {reason}")]
    InvalidProduct { product: String, reason: String },

    #[error("unknown raw material: {0}")]
    UnknownRawMaterial(String),

    #[error("reference product for {material} is invalid: {reason}")]
    InvalidReference { material: String, reason: String },
}

/// Failures of the local record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid record: {0}")]
    Invalid(String),

    #[error("no order with id {0}")]
    OrderNotFound(i64),
}

/// Failures while turning a scanned document into text.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{0} produced no page images")]
    NoPages(String),
}
