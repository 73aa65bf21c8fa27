use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoffeeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("missing secret: environment variable {0} is not set")]
    MissingSecret(String),

    #[error("record store returned {status} for {table}: {body}")]
    StoreStatus {
        table: String,
        status: u16,
        body: String,
    },

    #[error("record not found: {table}/{id}")]
    RecordNotFound { table: String, id: String },

    #[error("malformed record {table}/{id}: {reason}")]
    InvalidRecord {
        table: String,
        id: String,
        reason: String,
    },

    #[error("no record could be written to {table}: {reason}")]
    NothingPersisted { table: String, reason: String },

    #[error("batch of {0} records exceeds the per-request limit of 10")]
    BatchTooLarge(usize),

    #[error("messaging gateway rejected message to {recipient}: {reason}")]
    Gateway { recipient: String, reason: String },

    #[error("invalid week start '{0}': expected YYYY-MM-DD")]
    InvalidWeekStart(String),

    #[error("invalid matching context '{0}': expected 'global' or 'community:<slug>'")]
    InvalidPool(String),

    #[error("invalid community slug '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidSlug(String),

    #[error("invalid {kind} value: {value}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("invalid callback payload: {0}")]
    InvalidCallback(String),

    #[error("{job} for week {week} ({scope}) is already running (run {run_id})")]
    RunInProgress {
        job: String,
        week: String,
        scope: String,
        run_id: String,
    },

    #[error("matching failed for {pools}")]
    RunFailed { pools: String },

    #[error("run journal error: {0}")]
    Journal(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoffeeError>;
