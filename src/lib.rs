// Correctness and logic
#![warn(clippy::unit_cmp)] // Detects comparing unit types
#![warn(clippy::match_same_arms)] // Duplicate match arms

// Performance-focused
#![warn(clippy::inefficient_to_string)] // `format!("{}", x)` vs `x.to_string()`
#![warn(clippy::map_clone)] // Cloning inside `map()` unnecessarily
#![warn(clippy::unnecessary_to_owned)] // Detects redundant `.to_owned()` or `.clone()`
#![warn(clippy::large_stack_arrays)] // Helps avoid stack overflows
#![warn(clippy::box_collection)] // Warns on boxed `Vec`, `String`, etc.
#![warn(clippy::needless_collect)] // Avoids `.collect().iter()` chains

// Style and idiomatic Rust
#![warn(clippy::redundant_clone)] // Detects unnecessary `.clone()`
#![warn(clippy::identity_op)] // e.g., `x + 0`, `x * 1`
#![warn(clippy::needless_return)] // Avoids `return` at the end of functions
#![warn(clippy::let_unit_value)] // Avoids binding `()` to variables
#![warn(clippy::manual_map)] // Use `.map()` instead of manual `match`
#![warn(clippy::unwrap_used)] // Avoids using `unwrap()`

// Maintainability
#![warn(clippy::missing_panics_doc)] // Docs for functions that might panic
#![warn(clippy::missing_const_for_fn)] // Suggests making eligible functions `const`
#![deny(missing_docs)] // Documentation is a must for release

//! # codec_streams
//!
//! Streaming accumulation and chunking engine for fixed-block lossy audio
//! codecs such as Opus.
//!
//! Callers push arbitrarily sized chunks of interleaved PCM, or one packet at
//! a time, into named streams. The engine converts between the caller's
//! sample rate and the nearest rate the codec supports, accumulates PCM until
//! whole codec frames are available, pads the tail at end of stream and
//! guarantees that exactly one output of every stream is flagged as final.
//!
//! ## Layers
//!
//! - [`frame_sizes`]: supported codec rates and legal frame lengths
//! - [`codec`]: encoder/decoder traits with a 16-bit PCM backend and, behind
//!   the `opus` feature, a libopus backend
//! - [`resampler`]: streaming rate conversion over `rubato`
//! - [`stream`]: one encode or decode pipeline
//! - [`registry`]: open streams keyed by id
//! - [`dispatcher`] and [`message`]: the `begin` / `proc` / `end` protocol
//! - `worker`: a tokio task owning a dispatcher (feature `worker`, default)
//!
//! ## Features
//!
//! - `worker` (default): `Worker` actor on tokio
//! - `opus`: `codec::OpusCodec` through the `opus` crate (needs libopus)
//!
//! ## Quick Start
//!
//! ```rust
//! use codec_streams::signal::tone;
//! use codec_streams::{Dispatcher, EngineConfig, InboundMessage};
//!
//! let mut dispatcher = Dispatcher::with_pcm16(EngineConfig::default())?;
//! let pcm = tone(44100, 1, 4410, 440.0, 0.25);
//!
//! let mut replies = Vec::new();
//! dispatcher.dispatch(InboundMessage::begin_encode("mic", 44100, 1, pcm), |r| replies.push(r));
//! dispatcher.dispatch(InboundMessage::end("mic"), |r| replies.push(r));
//!
//! assert!(replies.iter().all(|r| r.error.is_none()));
//! assert_eq!(replies.iter().filter(|r| r.end == Some(true)).count(), 1);
//! assert!(replies.last().is_some_and(|r| r.end == Some(true)));
//! # Ok::<(), codec_streams::CodecStreamError>(())
//! ```
//!
//! ## Error Handling
//!
//! Every failure is a [`CodecStreamError`] and is terminal for its stream.
//! Through the dispatcher it becomes a single message carrying only the
//! stream id and the error text:
//!
//! ```rust
//! use codec_streams::{Dispatcher, EngineConfig, InboundMessage};
//!
//! let mut dispatcher = Dispatcher::with_pcm16(EngineConfig::default())?;
//! let replies = dispatcher.handle(InboundMessage::encode("nobody", vec![0.0; 16]));
//! assert_eq!(replies.len(), 1);
//! assert!(replies[0].error.as_deref().is_some_and(|e| e.contains("Unknown stream")));
//! # Ok::<(), codec_streams::CodecStreamError>(())
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events and never installs a subscriber.

pub mod buffer;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod frame_sizes;
pub mod message;
pub mod registry;
pub mod resampler;
pub mod signal;
pub mod stream;
#[cfg(feature = "worker")]
pub mod worker;

#[cfg(test)]
mod tests;

pub use crate::codec::{ChannelLayout, CodecBackend, FrameDecoder, FrameEncoder, Pcm16Codec};
pub use crate::config::{Application, ConverterKind, EngineConfig};
pub use crate::dispatcher::Dispatcher;
pub use crate::error::{CodecStreamError, CodecStreamResult, ErrorKind};
pub use crate::message::{InboundMessage, Operation, OutboundMessage};
pub use crate::registry::{StreamOutput, StreamRegistry};
pub use crate::resampler::RateConverter;
pub use crate::stream::{
    Chunk, Payload, Stream, StreamEvent, StreamFormat, StreamMode, StreamParams, StreamStats,
};
#[cfg(feature = "worker")]
pub use crate::worker::{Worker, WorkerHandle};
