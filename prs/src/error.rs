use std::io;
use std::path::PathBuf;

use crate::reader::ReaderError;

/// Everything that can go wrong while reading a directory or decoding an
/// asset.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("truncated input: {0}")]
    TruncatedInput(#[from] ReaderError),
    #[error("invalid format: {0}")]
    InvalidFormat(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("packed-data file {container:?} referenced by {directory:?} does not exist")]
    MissingContainer {
        directory: PathBuf,
        container: PathBuf,
    },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    TruncatedInput,
    InvalidFormat,
    InvalidParameters,
    MissingContainer,
    Io,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TruncatedInput(_) => ErrorKind::TruncatedInput,
            Self::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::MissingContainer { .. } => ErrorKind::MissingContainer,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    pub(crate) fn invalid_parameters(msg: impl Into<String>) -> Self {
        Self::InvalidParameters(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
