use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },
    #[error("no PDF link found on {0}")]
    NotFound(String),
    #[error("table extraction failed: {0}")]
    Extraction(String),
    #[error("schema mismatch: {0}")]
    Schema(#[from] SchemaError),
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("cannot prepare {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset {0} did not become ready")]
    NotReady(String),
    #[error("notification to {queue} failed: {reason}")]
    Notify { queue: String, reason: String },
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl PipelineError {
    pub fn network(url: &str, reason: impl ToString) -> Self {
        PipelineError::Network {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short tag used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Network { .. } => "network",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::Extraction(_) => "extraction",
            PipelineError::Schema(_) => "schema",
            PipelineError::Store(_) => "store",
            PipelineError::Io { .. } => "io",
            PipelineError::NotReady(_) => "not_ready",
            PipelineError::Notify { .. } => "notify",
            PipelineError::Config(_) => "config",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("expected column {0:?} is missing")]
    MissingColumn(String),
    #[error("unexpected column {0:?}")]
    UnexpectedColumn(String),
    #[error("row {row}: list number {value:?} is not an integer")]
    InvalidListNumber { row: usize, value: String },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
