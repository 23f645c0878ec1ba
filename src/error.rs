// error.rs
//
// Copyright (c) 2019-2023  Douglas Lau
//
use std::fmt;
use std::io;

/// Errors encountered while encoding
#[derive(Debug)]
pub enum Error {
    /// A wrapped I/O error.
    Io(io::Error),
    /// Width or height missing, zero or too large for a GIF.
    InvalidDimensions,
    /// Frame size does not match the writer's screen size.
    InvalidFrameDimensions,
    /// A frame is still being encoded; the new frame was rejected.
    EncodingInProgress,
    /// The writer was already finished; no more data accepted.
    Finished,
    /// Color index out of range for the color depth.
    InvalidColorIndex,
    /// A frame worker stopped before delivering its result.
    WorkerFailed,
}

/// Recgif result type
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(fmt),
            _ => fmt::Debug::fmt(self, fmt),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Error::EncodingInProgress.to_string(), "EncodingInProgress");
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "disk"));
        assert_eq!(err.to_string(), "disk");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn source_only_for_io() {
        assert!(std::error::Error::source(&Error::InvalidDimensions).is_none());
        assert!(std::error::Error::source(&Error::WorkerFailed).is_none());
    }
}
