//! Error types for loading and saving simulator images

use std::io;
use thiserror::Error;

/// Errors from building a simulator out of files
#[derive(Debug, Error)]
pub enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("no catalog entry named {0}")]
    UnknownChip(String),

    #[error("image is {actual} bytes but the chip holds {expected}")]
    ImageSize { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, SimError>;
