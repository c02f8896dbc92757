//! Error taxonomy for the plan-generation core.
//!
//! Four families: caller mistakes (authorization, readiness), AI boundary
//! failures (transport, empty, malformed), persistence conflicts, and plain
//! database errors. The API layer maps each family to an HTTP status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// The referenced assessment or plan does not belong to the caller.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    /// The assessment attempt has not reached Completed status yet.
    #[error("assessment not completed: {0}")]
    NotCompletable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Serialized assessment context could not be decoded.
    #[error("assessment context corrupted: {0}")]
    ContextCorrupted(String),

    /// Transport-level failure talking to the generative-AI endpoint.
    #[error("AI service unavailable: {0}")]
    AiUnavailable(String),

    /// Provider envelope carried no text payload.
    #[error("AI response contained no text")]
    AiResponseEmpty,

    /// Text payload could not be decoded into the expected shape.
    #[error("AI response malformed: {0}")]
    AiResponseMalformed(String),

    /// Persistence conflict that survived the single internal retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
