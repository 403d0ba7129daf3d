//! Error types of patch writers, readers and codecs.

use std::io;
use thiserror::Error;

/// Result type alias for patch container operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while producing or consuming a patch container.
///
/// An instance (codec, writer or reader) that returned an error must not be
/// used afterward.
#[derive(Error, Debug)]
pub enum Error {
    /// The output sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The bzip2 codec reported a fault.
    #[error("bzip2 error: {0}")]
    Bzip2(#[from] bzip2::Error),

    /// Any other codec fault, including truncated or overlong streams.
    #[error("codec error: {0}")]
    Codec(String),

    /// The caller violated the declared call sequence or sizes.
    #[error("sequence error: {0}")]
    Sequence(String),

    /// The patch bytes are malformed.
    #[error("invalid patch: {0}")]
    Format(String),

    /// The requested format/codec combination is not allowed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Error::Codec(msg.into())
    }

    pub fn sequence<S: Into<String>>(msg: S) -> Self {
        Error::Sequence(msg.into())
    }

    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Error::InvalidConfig(msg.into())
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        match e {
            Error::Io(e) => e,
            Error::Sequence(_) | Error::InvalidConfig(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, e)
            }
            _ => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
