//! Routes inbound messages to the stream registry and turns the results into
//! outbound messages.

use crate::codec::{CodecBackend, Pcm16Codec};
use crate::config::EngineConfig;
use crate::error::{CodecStreamError, CodecStreamResult};
use crate::message::{InboundMessage, OutboundMessage, Operation};
use crate::registry::{StreamOutput, StreamRegistry};
use crate::stream::{StreamMode, StreamParams};
use std::sync::Arc;
use tracing::{error, warn};

/// Message front end of a [`StreamRegistry`].
///
/// Each inbound message is handled to completion before the call returns.
/// Any error closes the stream it concerns and becomes a single error
/// message; it never affects other streams.
#[derive(Debug)]
pub struct Dispatcher {
    registry: StreamRegistry,
}

impl Dispatcher {
    /// Create a dispatcher over `backend`.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn CodecBackend>,
    ) -> CodecStreamResult<Self> {
        Ok(Self {
            registry: StreamRegistry::new(config, backend)?,
        })
    }

    /// Create a dispatcher over the 16-bit PCM reference codec.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::InvalidConfig`] if `config` fails validation.
    pub fn with_pcm16(config: EngineConfig) -> CodecStreamResult<Self> {
        Self::new(config, Arc::new(Pcm16Codec))
    }

    /// Create a dispatcher over libopus.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::InvalidConfig`] if `config` fails validation.
    #[cfg(feature = "opus")]
    pub fn with_opus(config: EngineConfig) -> CodecStreamResult<Self> {
        Self::new(config, Arc::new(crate::codec::OpusCodec))
    }

    /// The registry of open streams.
    pub const fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Handle one message and deliver each reply to `deliver` in order.
    pub fn dispatch<F>(&mut self, msg: InboundMessage, mut deliver: F)
    where
        F: FnMut(OutboundMessage),
    {
        for reply in self.handle(msg) {
            deliver(reply);
        }
    }

    /// Handle one message and return its replies in emission order.
    ///
    /// Returns no replies for an unknown operation.
    pub fn handle(&mut self, msg: InboundMessage) -> Vec<OutboundMessage> {
        let id = msg.stream.clone();
        let result = match msg.op {
            Operation::Begin => self.begin(msg),
            Operation::Proc => self.proc(msg),
            Operation::End => self.end(msg),
            Operation::Unknown => {
                error!(stream = %id, "invalid message operation received");
                return Vec::new();
            }
        };

        match result {
            Ok(Some(output)) => output
                .events
                .into_iter()
                .map(|event| OutboundMessage::from_event(id.as_str(), &output.format, event))
                .collect(),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(stream = %id, error = %err, "closing stream on error");
                self.registry.release(&id);
                vec![OutboundMessage::error(id, &err)]
            }
        }
    }

    fn begin(&mut self, mut msg: InboundMessage) -> CodecStreamResult<Option<StreamOutput>> {
        let Some(mode) = msg.requested_mode() else {
            return Err(CodecStreamError::invalid_mode(
                "begin carries neither PCM nor a packet",
            ));
        };

        self.registry.begin(
            &msg.stream,
            StreamParams {
                mode,
                sample_rate: msg.sample_rate,
                channels: msg.num_channels,
            },
        )?;

        // The opening payload only selects the mode when it is empty
        match msg.take_chunk(mode) {
            Some(chunk) if !chunk.is_empty() => self.registry.proc(&msg.stream, chunk).map(Some),
            _ => Ok(None),
        }
    }

    fn proc(&mut self, mut msg: InboundMessage) -> CodecStreamResult<Option<StreamOutput>> {
        let mode = self.open_mode(&msg.stream)?;
        let chunk = msg.take_chunk(mode).ok_or_else(|| {
            CodecStreamError::invalid_mode(format!(
                "stream '{}' is {mode} but the message carries no matching payload",
                msg.stream
            ))
        })?;
        self.registry.proc(&msg.stream, chunk).map(Some)
    }

    fn end(&mut self, mut msg: InboundMessage) -> CodecStreamResult<Option<StreamOutput>> {
        let mode = self.open_mode(&msg.stream)?;
        let chunk = msg.take_chunk(mode);
        self.registry.end(&msg.stream, chunk).map(Some)
    }

    fn open_mode(&self, id: &str) -> CodecStreamResult<StreamMode> {
        self.registry
            .mode(id)
            .ok_or_else(|| CodecStreamError::unknown_stream(id))
    }
}
