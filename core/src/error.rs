//! Error types shared by the ledger, the aggregation engine and AI normalization.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The model's reply could not be read as JSON by any extraction strategy.
    #[error("AI response could not be parsed as JSON")]
    MalformedResponse,

    /// The reply parsed, but no record carried a name and all four numeric fields.
    #[error("AI response did not contain any complete nutrition records")]
    IncompleteData,

    /// The relational store rejected a read or write.
    #[error("persistence failure: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("invalid date: {0}")]
    InvalidDate(#[from] chrono::ParseError),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
