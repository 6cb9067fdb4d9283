use nix::errno::Errno;
use std::{fmt, io};
use thiserror::Error;

/// The native engine an error comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Inflate,
    Deflate,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Engine::Inflate => f.write_str("inflate"),
            Engine::Deflate => f.write_str("deflate"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Invalid compression level {level}")]
    InvalidConfiguration { level: i32 },

    #[error("Failed to initialize {0} context")]
    InitializationFailure(Engine),

    #[error("Object already disposed")]
    UseAfterDispose,

    #[error("Destination buffer too small")]
    DestinationTooSmall,

    #[error("Invalid compressed data")]
    CorruptInput,

    #[error("libdeflate {engine} returned unknown code {code}")]
    EngineFailure { engine: Engine, code: i64 },

    #[error("Failed to grow destination buffer: {0}")]
    BufferGrowth(#[from] Errno),
}

impl From<CodecError> for io::Error {
    fn from(e: CodecError) -> io::Error {
        let kind = match &e {
            CodecError::InvalidConfiguration { .. } => io::ErrorKind::InvalidInput,
            CodecError::DestinationTooSmall | CodecError::CorruptInput => {
                io::ErrorKind::InvalidData
            }
            CodecError::BufferGrowth(errno) => return io::Error::from(*errno),
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            CodecError::InvalidConfiguration { level: 13 }.to_string(),
            "Invalid compression level 13"
        );
        assert_eq!(
            CodecError::InitializationFailure(Engine::Deflate).to_string(),
            "Failed to initialize deflate context"
        );
        assert_eq!(
            CodecError::EngineFailure { engine: Engine::Deflate, code: -2 }.to_string(),
            "libdeflate deflate returned unknown code -2"
        );
    }

    #[test]
    fn test_into_io_error() {
        let e: io::Error = CodecError::CorruptInput.into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
        let e: io::Error = CodecError::InvalidConfiguration { level: 0 }.into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidInput);
        let e: io::Error = CodecError::UseAfterDispose.into();
        assert_eq!(e.kind(), io::ErrorKind::Other);
        let e: io::Error = CodecError::BufferGrowth(Errno::ENOMEM).into();
        assert_eq!(e.raw_os_error(), Some(Errno::ENOMEM as i32));
    }
}
