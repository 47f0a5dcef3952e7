use thiserror::Error;

/// Type alias for Result using the crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort a single extraction call.
///
/// Unresolved metrics, empty series and missing reference values are not
/// represented here: they are ordinary outcomes (`None`, empty output, or a
/// diagnostic counter) and never stop sibling assets from being processed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("report tree exceeds the depth bound of {limit} (reached {depth})")]
    MalformedTree { depth: usize, limit: usize },

    #[error("invalid report payload: {0}")]
    InvalidPayload(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
