//! Errors returned by batch writes

use thiserror::Error;

/// Why a batch was refused
///
/// Both variants are raised during validation, before anything in the batch
/// has been applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("The key \"{0}\" was not found.")]
    KeyNotFound(String),

    #[error("The key \"{0}\" is not writable.")]
    NotWritable(String),
}

impl WriteError {
    /// The key that failed validation
    pub fn key(&self) -> &str {
        match self {
            WriteError::KeyNotFound(key) | WriteError::NotWritable(key) => key,
        }
    }
}
