use thiserror::Error;

/// Failures that abort a sync run.
///
/// A day without published quotations is not represented here; see
/// [`crate::fetcher::FetchOutcome::NotFound`].
#[derive(Error, Debug)]
pub enum Error {
    /// Browser, portal page or challenge provider failed to yield a token.
    #[error("Token acquisition failed: {0}")]
    Acquisition(String),

    /// The listing endpoint could not be reached or answered badly.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A fetched quotation could not be turned into a persistable record.
    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Upstream(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Error::Upstream(format!("malformed response body: {}", err))
        } else {
            Error::Upstream(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
