use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors raised while evaluating scripts or inspecting their results.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("QuickJS error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error("uncaught exception: {0}")]
    Exception(String),

    #[error("cannot read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot convert value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("result is not an array")]
    NotAnArray,

    #[error("result is not a number")]
    NotANumber,

    #[error("result is not a promise")]
    NotAPromise,

    #[error("promise rejected: {0}")]
    Rejected(String),

    #[error("promise {0} can never settle")]
    Stalled(u64),

    #[error("pending job raised an exception")]
    Job,

    #[error("runtime has been released")]
    Released,
}
