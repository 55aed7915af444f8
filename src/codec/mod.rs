//! Codec adapters: fixed-frame encoders and decoders behind object-safe traits.
//!
//! An encoder accepts exactly one legal frame of interleaved PCM per call
//! (see [`crate::frame_sizes`]) and hands back a packet. A decoder turns one
//! packet into one PCM frame; an empty packet asks it to conceal a lost one.
//!
//! Both return views into scratch memory owned by the adapter. The borrow
//! ends at the next call on the same handle, so callers that keep a result
//! must copy it first. Dropping a handle releases the engine.
//!
//! # Backends
//!
//! - [`Pcm16Codec`]: 16-bit little-endian PCM packets, always available.
//! - `OpusCodec`: libopus, behind the `opus` cargo feature.

pub mod pcm;

#[cfg(feature = "opus")]
pub mod opus;

pub use pcm::Pcm16Codec;

#[cfg(feature = "opus")]
pub use self::opus::OpusCodec;

use crate::config::Application;
use crate::error::{CodecStreamError, CodecStreamResult};
use crate::frame_sizes::{SUPPORTED_RATES, is_legal_block_length, is_supported_rate};
use std::fmt;

/// Interleaved channel layouts the codec accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// One channel
    Mono,
    /// Two interleaved channels
    Stereo,
}

impl ChannelLayout {
    /// Layout for a channel count; only 1 and 2 are accepted.
    pub fn from_count(channels: u16) -> CodecStreamResult<Self> {
        match channels {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            other => Err(CodecStreamError::codec_init(format!(
                "only 1 or 2 channels are supported, got {other}"
            ))),
        }
    }

    /// Number of interleaved channels.
    pub const fn count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => f.write_str("mono"),
            Self::Stereo => f.write_str("stereo"),
        }
    }
}

/// Encodes one fixed-size PCM frame at a time.
pub trait FrameEncoder: Send {
    /// Codec sample rate of this encoder.
    fn sample_rate(&self) -> u32;

    /// Channel layout of this encoder.
    fn layout(&self) -> ChannelLayout;

    /// Encode one frame of interleaved samples.
    ///
    /// `pcm.len()` must be `channels × legal frame length`, otherwise
    /// [`CodecStreamError::InvalidBlockSize`] is returned. The packet borrows
    /// the encoder's scratch buffer.
    fn encode(&mut self, pcm: &[f32]) -> CodecStreamResult<&[u8]>;
}

/// Decodes one packet at a time.
pub trait FrameDecoder: Send {
    /// Codec sample rate of this decoder.
    fn sample_rate(&self) -> u32;

    /// Channel layout of this decoder.
    fn layout(&self) -> ChannelLayout;

    /// Decode one packet into interleaved samples.
    ///
    /// An empty `packet` is treated as a lost packet to conceal. The frame
    /// borrows the decoder's scratch buffer.
    fn decode(
        &mut self,
        packet: &[u8],
        forward_error_correction: bool,
    ) -> CodecStreamResult<&[f32]>;

    /// Emit audio held back for a lost packet that no later packet recovered.
    ///
    /// Called once when a stream ends. Decoders that never defer a loss keep
    /// the default, an empty frame.
    fn flush(&mut self) -> CodecStreamResult<&[f32]> {
        Ok(&[])
    }
}

/// Factory for encoders and decoders of one codec implementation.
pub trait CodecBackend: Send + Sync {
    /// Short human readable name, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Create an encoder for a supported codec rate.
    fn create_encoder(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
        application: Application,
    ) -> CodecStreamResult<Box<dyn FrameEncoder>>;

    /// Create a decoder for a supported codec rate.
    fn create_decoder(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
    ) -> CodecStreamResult<Box<dyn FrameDecoder>>;
}

/// Fails with [`CodecStreamError::CodecInit`] unless `rate` is a codec rate.
pub fn check_codec_rate(rate: u32) -> CodecStreamResult<()> {
    if is_supported_rate(rate) {
        Ok(())
    } else {
        Err(CodecStreamError::codec_init(format!(
            "{rate}Hz is not supported, only the following - {SUPPORTED_RATES:?}"
        )))
    }
}

/// Validates an interleaved PCM block and returns its length in frames.
pub fn check_block(rate: u32, layout: ChannelLayout, samples: usize) -> CodecStreamResult<usize> {
    let channels = layout.count();
    let invalid = || CodecStreamError::InvalidBlockSize {
        samples,
        channels,
        sample_rate: rate,
    };

    if samples % channels != 0 {
        return Err(invalid());
    }
    let frames = samples / channels;
    if !is_legal_block_length(rate, frames) {
        return Err(invalid());
    }
    Ok(frames)
}
