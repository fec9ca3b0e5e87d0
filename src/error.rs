use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    RecordError(#[from] RecordError),

    #[error("{0}")]
    ParseError(#[from] ParseError),

    #[error("{0}")]
    StoreError(#[from] StoreError),

    #[error("{0}")]
    SettingsError(#[from] SettingsError),
}

/// Set of errors raised while constructing canonical records from bad input
/// data. Any of these aborts the single ingestion; nothing is coerced.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed record: measurement name must not be empty")]
    EmptyMeasurementName,

    #[error("malformed record: measurement {name:?} has non-finite value {value}")]
    NonFiniteValue { name: String, value: f64 },

    #[error("malformed record: commit id must not be empty")]
    EmptyCommitId,

    #[error("malformed record: {field} epoch value {value} is out of range")]
    InvalidEpoch { field: &'static str, value: i64 },

    #[error("malformed record: group label must not be empty")]
    EmptyTool,
}

/// Set of errors raised while translating harness output into a run entry.
/// Both variants surface to the CI caller before the store is touched.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The payload does not match any known harness schema.
    #[error("payload does not match any supported harness format")]
    UnsupportedFormat,

    /// The payload parsed but produced zero measurements. Reported rather
    /// than dropped: an empty run usually signals a harness failure upstream.
    #[error("run produced no measurements")]
    EmptyRun,

    #[error("{0}")]
    RecordError(#[from] RecordError),
}

/// Set of errors occurring at the history store boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The artifact changed between `load` and `save`. Transient: the caller
    /// retries the full load-merge-save cycle with a fresh load.
    #[error("history artifact changed since load; reload and retry")]
    ConcurrentModification,

    #[error("history artifact is not valid benchmark data: {0}")]
    MalformedArtifact(#[source] serde_json::Error),

    #[error("{0}")]
    SerializationError(#[source] serde_json::Error),

    #[error("{0}")]
    IOError(#[from] std::io::Error),
}

impl From<tempfile::PersistError> for StoreError {
    fn from(that: tempfile::PersistError) -> Self {
        StoreError::IOError(that.error)
    }
}

/// Error variants related to configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SettingsError {
    /// Error working with environment variable
    #[error("{0}")]
    Environment(#[from] std::env::VarError),

    /// Error in configuration settings.
    #[error(transparent)]
    Configuration(#[from] config::ConfigError),

    /// Error in bootstrapping execution from configuration.
    #[error("error during system bootstrap: {message}: {setting}")]
    Bootstrap { message: String, setting: String },

    #[error("{0}")]
    IOError(#[from] std::io::Error),
}
