//! Error handling for audioseg
//!
//! Core errors are local and synchronous. Overflow during gain or mixing is
//! never an error: sample arithmetic saturates.

use thiserror::Error;

/// Result type alias for audioseg operations
pub type Result<T> = std::result::Result<T, AudioSegError>;

/// Main error type for audioseg operations
#[derive(Error, Debug)]
pub enum AudioSegError {
    // Argument Errors
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Unsupported sample width: {width} bytes (expected 1, 2 or 4)")]
    UnsupportedSampleWidth { width: u16 },

    #[error("Format mismatch: expected {expected}, found {found}")]
    FormatMismatch { expected: String, found: String },

    // Codec Boundary Errors
    #[error("Decoding failed: {reason}")]
    DecodeFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Encoding failed: {reason}")]
    EncodeFailure {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Configuration Errors
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AudioSegError {
    /// Shorthand for an `InvalidArgument` error
    pub fn invalid(reason: impl Into<String>) -> Self {
        AudioSegError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            AudioSegError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            AudioSegError::UnsupportedSampleWidth { .. } => "UNSUPPORTED_SAMPLE_WIDTH",
            AudioSegError::FormatMismatch { .. } => "FORMAT_MISMATCH",
            AudioSegError::DecodeFailure { .. } => "DECODE_FAILURE",
            AudioSegError::EncodeFailure { .. } => "ENCODE_FAILURE",
            AudioSegError::Config { .. } => "CONFIG_ERROR",
            AudioSegError::Io(_) => "IO_ERROR",
            AudioSegError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error originated at the codec-service boundary
    ///
    /// Only these failures are worth retrying, and only by the caller that
    /// owns the external process.
    pub fn is_codec_error(&self) -> bool {
        matches!(
            self,
            AudioSegError::DecodeFailure { .. } | AudioSegError::EncodeFailure { .. }
        )
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            AudioSegError::UnsupportedSampleWidth { .. } => vec![
                "Convert the audio to 8, 16 or 32-bit PCM first",
                "24-bit WAV input is widened to 32-bit automatically",
            ],
            AudioSegError::DecodeFailure { .. } => vec![
                "Check that ffmpeg or avconv is installed and on PATH",
                "Set an explicit converter path in the configuration file",
                "Try converting the file to WAV format first",
            ],
            AudioSegError::EncodeFailure { .. } => vec![
                "Check that the converter supports the requested format",
                "Export to WAV, which needs no external converter",
            ],
            AudioSegError::Config { .. } => vec![
                "Check the configuration file is valid JSON",
                "Remove the file to fall back to defaults",
            ],
            _ => vec![],
        }
    }
}
