use thiserror::Error;

/// Rejections raised while turning user input into entries, before any projection runs.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("Invalid decimal for {field}: {raw}")]
    Decimal { field: &'static str, raw: String },
    #[error("{field} must not be negative (got {raw})")]
    Negative { field: &'static str, raw: String },
    #[error("Invalid date: {0}. Expected YYYY-MM-DD")]
    Date(String),
    #[error("Invalid month: {0}. Expected YYYY-MM")]
    Month(String),
    #[error("No entry matches id '{0}'")]
    UnknownId(String),
    #[error("Id prefix '{0}' matches more than one entry; use more characters")]
    AmbiguousId(String),
}

/// Failures while reading a persisted snapshot document.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Invalid data format: missing {0}")]
    MissingCollection(&'static str),
    #[error("Invalid data format: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(String),
}

/// Failures of the local key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupted value for key '{key}': {source}")]
    Corrupted {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
