//src/error.rs
use thiserror::Error;

use crate::{catalog, config, db, transfer};

/// Any failure a use case can report.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] db::Error),
    #[error(transparent)]
    Network(#[from] catalog::Error),
    #[error(transparent)]
    Format(#[from] transfer::Error),
    #[error(transparent)]
    Config(#[from] config::Error),
    #[error("Background task failed: {0}")]
    Task(String),
}

impl Error {
    pub const fn is_not_found(&self) -> bool {
        match self {
            Self::Store(e) | Self::Format(transfer::Error::Store(e)) => e.is_not_found(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(db::Error::Connection(e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
