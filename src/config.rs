//! Engine configuration shared by every stream a dispatcher opens.

use crate::error::{CodecStreamError, CodecStreamResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sample-rate converter flavours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConverterKind {
    /// Band-limited sinc interpolation with a long filter
    #[default]
    Default,
    /// Band-limited sinc interpolation with a short filter
    SincFastest,
    /// Repeats the nearest input sample
    ZeroOrderHold,
    /// Linear interpolation between neighbouring samples
    Linear,
}

impl FromStr for ConverterKind {
    type Err = CodecStreamError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "sinc fastest" | "sinc_fastest" => Ok(Self::SincFastest),
            "zero order hold" | "zero_order_hold" => Ok(Self::ZeroOrderHold),
            "linear" => Ok(Self::Linear),
            other => Err(CodecStreamError::converter_init(format!(
                "unsupported converter type '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ConverterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Default => "default",
            Self::SincFastest => "sinc fastest",
            Self::ZeroOrderHold => "zero order hold",
            Self::Linear => "linear",
        };
        f.write_str(name)
    }
}

/// Encoder tuning hint passed to codec backends that support it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Application {
    /// Speech oriented tuning
    Voip,
    /// General audio and music
    #[default]
    Audio,
    /// Lowest algorithmic delay
    RestrictedLowDelay,
}

impl FromStr for Application {
    type Err = CodecStreamError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "voip" => Ok(Self::Voip),
            "audio" | "music" => Ok(Self::Audio),
            "restricted low delay" | "restricted_low_delay" => Ok(Self::RestrictedLowDelay),
            other => Err(CodecStreamError::codec_init(format!(
                "unknown application type '{other}'"
            ))),
        }
    }
}

/// Configuration applied to every stream opened by a dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Converter used when the declared rate is not a codec rate
    pub converter: ConverterKind,

    /// Encoder tuning hint
    pub application: Application,

    /// Target encode block is `declared_rate / block_divisor` frames
    pub block_divisor: u32,

    /// Ask the decoder to use in-band forward error correction
    pub forward_error_correction: bool,

    /// Input frames the converter consumes per internal iteration
    pub converter_chunk_frames: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            converter: ConverterKind::Default,
            application: Application::Audio,
            block_divisor: 25,
            forward_error_correction: false,
            converter_chunk_frames: 1024,
        }
    }
}

impl EngineConfig {
    /// Create configuration optimized for low-latency applications
    pub fn low_latency() -> Self {
        Self {
            converter: ConverterKind::Linear,
            application: Application::RestrictedLowDelay,
            block_divisor: 50,
            forward_error_correction: false,
            converter_chunk_frames: 256,
        }
    }

    /// Create configuration optimized for speech over lossy links
    pub fn voice() -> Self {
        Self {
            converter: ConverterKind::SincFastest,
            application: Application::Voip,
            block_divisor: 50,
            forward_error_correction: true,
            converter_chunk_frames: 512,
        }
    }

    /// Create configuration optimized for high-quality offline encoding
    pub fn high_quality() -> Self {
        Self {
            converter: ConverterKind::Default,
            application: Application::Audio,
            block_divisor: 25,
            forward_error_correction: false,
            converter_chunk_frames: 4096,
        }
    }

    /// Approximate encode block length, in frames at the declared rate.
    ///
    /// `None` when `block_divisor` is zero.
    pub const fn approx_block_frames(&self, declared_rate: u32) -> Option<usize> {
        match declared_rate.checked_div(self.block_divisor) {
            Some(frames) => Some(frames as usize),
            None => None,
        }
    }

    /// Reject values no stream could be opened with.
    pub fn validate(&self) -> CodecStreamResult<()> {
        if self.block_divisor == 0 {
            return Err(CodecStreamError::InvalidConfig(
                "block_divisor must be greater than zero".to_string(),
            ));
        }
        if self.converter_chunk_frames == 0 {
            return Err(CodecStreamError::InvalidConfig(
                "converter_chunk_frames must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
