//! Error taxonomy for the knowledge base service.
//!
//! Two sentinel kinds are client-correctable: [`KbError::NotFound`] and
//! [`KbError::InvalidInput`]. Everything else is a storage failure wrapped
//! in [`KbError::Database`] and propagated unchanged; the service performs
//! no silent recovery, and any failure inside a transaction aborts the whole
//! transaction.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KbError {
    #[error("knowledge article not found")]
    NotFound,

    #[error("invalid knowledge input: {0}")]
    InvalidInput(String),

    #[error("storage error: {0}")]
    Database(#[from] sqlx::Error),
}

impl KbError {
    pub fn invalid(message: impl Into<String>) -> Self {
        KbError::InvalidInput(message.into())
    }
}

pub type KbResult<T> = Result<T, KbError>;
