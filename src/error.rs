use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, decoding, or writing the account list.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed account list: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed account list: {0}")]
    Format(String),

    #[error("Malformed {account_type} account entry: {reason}")]
    Entry { account_type: String, reason: String },

    #[error("Unable to move to {}: {reason}", .target.display())]
    MoveAside { target: PathBuf, reason: String },

    #[error("Unable to back up account list to {}: {reason}", .target.display())]
    Backup { target: PathBuf, reason: String },

    #[error("Legacy account list requires the '{0}' account type, which is not registered")]
    MissingLegacyType(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn entry(account_type: &str, reason: impl ToString) -> Self {
        StoreError::Entry {
            account_type: account_type.to_string(),
            reason: reason.to_string(),
        }
    }
}
