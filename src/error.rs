use std::io;

use thiserror::Error;

use crate::param::DIRSIZ;

/// Errors reported by the public filesystem surface.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no image is mounted")]
    NotMounted,

    /// A directory component of the path does not exist.
    #[error("path not found")]
    PathNotFound,

    /// The final path component is missing where it must exist.
    #[error("file not found")]
    FileNotFound,

    #[error("name exceeds {} bytes", DIRSIZ)]
    NameTooLong,

    /// Empty name, reserved `.`/`..` where a fresh name is required, or a
    /// trailing-slash demand that the operation cannot satisfy.
    #[error("malformed name")]
    NameFormat,

    #[error("destination name already exists")]
    Exists,

    #[error("directory is not empty")]
    NotEmpty,

    /// A directory was named where a file is required, or vice versa.
    #[error("entry type mismatch")]
    TypeMismatch,

    #[error("a transaction is already active")]
    TxAlreadyActive,

    #[error("no transaction is active")]
    TxNotActive,

    /// Host I/O failure, image corruption, or allocation failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T, E = FsError> = std::result::Result<T, E>;

/// Corruption detected while decoding on-disk structures.
pub(crate) fn corrupt(what: &'static str) -> FsError {
    FsError::Io(io::Error::new(io::ErrorKind::InvalidData, what))
}
