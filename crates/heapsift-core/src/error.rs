use strum::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Not attached to any process")]
    NotAttached,

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("Failed to write process memory at address {address:#x}: {message}")]
    MemoryWriteFailed { address: u64, message: String },

    #[error("Transfer of {size} bytes exceeds the maximum of {max} bytes")]
    TransferTooLarge { size: usize, max: usize },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported decryption method: {0}")]
    UnsupportedMethod(String),

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error belongs to, used by front ends to report
/// which part of a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FailureStage {
    #[strum(serialize = "process")]
    Process,
    #[strum(serialize = "memory")]
    Memory,
    #[strum(serialize = "decryption")]
    Decryption,
    #[strum(serialize = "configuration")]
    Configuration,
}

impl Error {
    pub fn stage(&self) -> FailureStage {
        match self {
            Error::ProcessNotFound(_) | Error::ProcessOpenFailed(_) | Error::NotAttached => {
                FailureStage::Process
            }
            Error::MemoryReadFailed { .. }
            | Error::MemoryWriteFailed { .. }
            | Error::TransferTooLarge { .. }
            | Error::Cancelled => FailureStage::Memory,
            Error::UnsupportedMethod(_) | Error::Decryption(_) => FailureStage::Decryption,
            Error::InvalidPattern(_) | Error::Config(_) | Error::Io(_) | Error::Json(_) => {
                FailureStage::Configuration
            }
        }
    }

    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_not_found() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::Io(io_err);
        assert!(err.is_not_found());

        let other_io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err2 = Error::Io(other_io_err);
        assert!(!err2.is_not_found());
    }

    #[test]
    fn test_error_stage() {
        assert_eq!(
            Error::ProcessNotFound("Revolution Idol.exe".into()).stage(),
            FailureStage::Process
        );
        assert_eq!(
            Error::MemoryReadFailed {
                address: 0x1000,
                message: "unmapped".into()
            }
            .stage(),
            FailureStage::Memory
        );
        assert_eq!(
            Error::UnsupportedMethod("aes".into()).stage(),
            FailureStage::Decryption
        );
        assert_eq!(
            Error::Config("bad".into()).stage(),
            FailureStage::Configuration
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(FailureStage::Process.to_string(), "process");
        assert_eq!(FailureStage::Decryption.to_string(), "decryption");
    }
}
