// Error taxonomy for the lifecycle client. Every operation returns
// `crate::Result`; the binary wraps these in `anyhow` at the edges.

use std::time::Duration;

use crate::model::ModelId;

/// Client Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the lifecycle client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend answered 401. Never retried.
    #[error("unauthorized")]
    Unauthorized,

    /// The backend reported `dataset_status = error` while importing.
    #[error("error importing model {model_id}")]
    ImportFailed { model_id: ModelId },

    /// The backend reported `status = error` while training.
    #[error("error training model {model_id}")]
    TrainingFailed { model_id: ModelId },

    /// Network failure, TLS failure, unreadable body and the like.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any non-2xx status other than 401.
    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("table has no rows")]
    EmptyTable,

    /// The caller-supplied deadline elapsed before the model settled.
    #[error("model {model_id} did not settle within {deadline:?}")]
    DeadlineExceeded { model_id: ModelId, deadline: Duration },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Whether this is the distinguished 401 error.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}
