//! Error types and result utilities for codec stream operations.

use thiserror::Error;

/// Convenience type alias for results that may contain CodecStreamError
pub type CodecStreamResult<T> = Result<T, CodecStreamError>;

/// Error types that can occur while opening or driving a codec stream.
///
/// Every error is terminal for the stream it concerns: by the time an error
/// is reported the stream has been torn down and removed from its registry.
#[derive(Error, Debug)]
pub enum CodecStreamError {
    /// The codec engine could not be constructed.
    ///
    /// Raised for unsupported codec sample rates, channel counts outside
    /// {1, 2}, or a construction failure reported by the engine itself.
    #[error("Codec initialisation failed: {0}")]
    CodecInit(String),

    /// The sample-rate converter could not be constructed.
    #[error("Sample rate converter initialisation failed: {0}")]
    ConverterInit(String),

    /// A PCM block handed to an encoder is not a legal codec frame.
    #[error("Invalid block size: {samples} samples is not a legal {channels}-channel frame at {sample_rate}Hz")]
    InvalidBlockSize {
        /// Interleaved sample count of the rejected block
        samples: usize,
        /// Channel count of the encoder
        channels: usize,
        /// Codec sample rate of the encoder
        sample_rate: u32,
    },

    /// A payload does not match the mode of the stream it was sent to.
    #[error("Invalid stream mode: {0}")]
    InvalidStreamMode(String),

    /// An operation referenced a stream that is not open.
    #[error("Unknown stream: {0}")]
    UnknownStream(String),

    /// Opening a stream failed; the underlying cause is attached.
    #[error("Could not create stream: {source}")]
    StreamCreationFailed {
        /// The error that prevented the stream from opening
        #[source]
        source: Box<CodecStreamError>,
    },

    /// The codec engine reported a failure while encoding or decoding.
    #[error("Codec error during {operation}: {details}")]
    Codec {
        /// `"encode"` or `"decode"`
        operation: &'static str,
        /// Engine supplied description
        details: String,
    },

    /// The sample-rate converter reported a failure while processing.
    #[error("Sample rate conversion error: {0}")]
    Conversion(String),

    /// An engine configuration value was rejected.
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),
}

/// Fieldless discriminant of [`CodecStreamError`], convenient for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`CodecStreamError::CodecInit`]
    CodecInit,
    /// See [`CodecStreamError::ConverterInit`]
    ConverterInit,
    /// See [`CodecStreamError::InvalidBlockSize`]
    InvalidBlockSize,
    /// See [`CodecStreamError::InvalidStreamMode`]
    InvalidStreamMode,
    /// See [`CodecStreamError::UnknownStream`]
    UnknownStream,
    /// See [`CodecStreamError::StreamCreationFailed`]
    StreamCreationFailed,
    /// See [`CodecStreamError::Codec`]
    Codec,
    /// See [`CodecStreamError::Conversion`]
    Conversion,
    /// See [`CodecStreamError::InvalidConfig`]
    InvalidConfig,
}

impl CodecStreamError {
    /// Create a codec initialisation error
    pub fn codec_init(reason: impl Into<String>) -> Self {
        Self::CodecInit(reason.into())
    }

    /// Create a converter initialisation error
    pub fn converter_init(reason: impl Into<String>) -> Self {
        Self::ConverterInit(reason.into())
    }

    /// Create an invalid stream mode error
    pub fn invalid_mode(details: impl Into<String>) -> Self {
        Self::InvalidStreamMode(details.into())
    }

    /// Create an unknown stream error for the given identifier
    pub fn unknown_stream(id: impl Into<String>) -> Self {
        Self::UnknownStream(id.into())
    }

    /// Wrap the cause of a failed stream creation
    pub fn creation_failed(source: CodecStreamError) -> Self {
        Self::StreamCreationFailed {
            source: Box::new(source),
        }
    }

    /// Create an encoder failure
    pub fn encode(details: impl Into<String>) -> Self {
        Self::Codec {
            operation: "encode",
            details: details.into(),
        }
    }

    /// Create a decoder failure
    pub fn decode(details: impl Into<String>) -> Self {
        Self::Codec {
            operation: "decode",
            details: details.into(),
        }
    }

    /// Create a conversion failure
    pub fn conversion(details: impl Into<String>) -> Self {
        Self::Conversion(details.into())
    }

    /// The fieldless kind of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CodecInit(_) => ErrorKind::CodecInit,
            Self::ConverterInit(_) => ErrorKind::ConverterInit,
            Self::InvalidBlockSize { .. } => ErrorKind::InvalidBlockSize,
            Self::InvalidStreamMode(_) => ErrorKind::InvalidStreamMode,
            Self::UnknownStream(_) => ErrorKind::UnknownStream,
            Self::StreamCreationFailed { .. } => ErrorKind::StreamCreationFailed,
            Self::Codec { .. } => ErrorKind::Codec,
            Self::Conversion(_) => ErrorKind::Conversion,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// The innermost cause, looking through [`CodecStreamError::StreamCreationFailed`].
    pub fn root_kind(&self) -> ErrorKind {
        match self {
            Self::StreamCreationFailed { source } => source.root_kind(),
            other => other.kind(),
        }
    }
}
