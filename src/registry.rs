//! Live streams keyed by caller-chosen identifiers.

use crate::codec::CodecBackend;
use crate::config::EngineConfig;
use crate::error::{CodecStreamError, CodecStreamResult};
use crate::stream::{
    Chunk, Stream, StreamEvent, StreamFormat, StreamMode, StreamParams, StreamStats,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Events produced by one call on a stream, together with the format they
/// are reported with.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutput {
    /// Rates and layout of the stream that produced the events
    pub format: StreamFormat,
    /// Outputs in emission order
    pub events: Vec<StreamEvent>,
}

/// Owns every open stream and the backend they are created with.
///
/// A stream leaves the registry when it is ended or when any call on it
/// fails, so a failed stream never accepts further input.
pub struct StreamRegistry {
    streams: HashMap<String, Stream>,
    backend: Arc<dyn CodecBackend>,
    config: EngineConfig,
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("streams", &self.streams.len())
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish()
    }
}

impl StreamRegistry {
    /// Create an empty registry.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: EngineConfig, backend: Arc<dyn CodecBackend>) -> CodecStreamResult<Self> {
        config.validate()?;
        Ok(Self {
            streams: HashMap::new(),
            backend,
            config,
        })
    }

    /// Configuration new streams are opened with.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a stream under `id`, tearing down any stream already registered
    /// under it.
    ///
    /// The previous stream is released even when opening the new one fails,
    /// in which case nothing is registered under `id`.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::StreamCreationFailed`] wrapping the codec
    /// or converter error.
    pub fn begin(&mut self, id: &str, params: StreamParams) -> CodecStreamResult<StreamFormat> {
        if let Some(previous) = self.streams.remove(id) {
            debug!(stream = %id, mode = %previous.mode(), "replacing existing stream");
        }

        let stream = Stream::open(id, params, self.backend.as_ref(), &self.config)
            .map_err(CodecStreamError::creation_failed)?;
        let format = stream.format();
        self.streams.insert(id.to_owned(), stream);
        Ok(format)
    }

    /// Drop a stream without flushing it. Returns whether one was open.
    pub fn release(&mut self, id: &str) -> bool {
        self.streams.remove(id).is_some()
    }

    /// Mode of an open stream.
    pub fn mode(&self, id: &str) -> Option<StreamMode> {
        self.streams.get(id).map(Stream::mode)
    }

    /// Feed a chunk to an open stream.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::UnknownStream`] when no stream is
    /// registered under `id`. Any other error also removes the stream.
    pub fn proc(&mut self, id: &str, chunk: Chunk) -> CodecStreamResult<StreamOutput> {
        let stream = self
            .streams
            .get_mut(id)
            .ok_or_else(|| CodecStreamError::unknown_stream(id))?;
        let format = stream.format();

        match stream.process(chunk, false) {
            Ok(events) => Ok(StreamOutput { format, events }),
            Err(err) => {
                debug!(stream = %id, error = %err, "releasing failed stream");
                self.streams.remove(id);
                Err(err)
            }
        }
    }

    /// Feed an optional final chunk, flush and release the stream.
    ///
    /// A chunk whose type does not match the stream's mode is ignored and the
    /// stream is flushed as if none had been given.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::UnknownStream`] when no stream is
    /// registered under `id`, otherwise whatever the final flush reports.
    pub fn end(&mut self, id: &str, chunk: Option<Chunk>) -> CodecStreamResult<StreamOutput> {
        let mut stream = self
            .streams
            .remove(id)
            .ok_or_else(|| CodecStreamError::unknown_stream(id))?;
        let format = stream.format();

        let chunk = chunk.filter(|c| c.mode() == stream.mode());
        let result = match chunk {
            Some(chunk) => stream.process(chunk, true),
            None => match stream.mode() {
                StreamMode::Encoding => stream.encode(Vec::new(), true),
                StreamMode::Decoding => stream.decode(None, true),
            },
        };

        match result {
            Ok(events) => Ok(StreamOutput { format, events }),
            Err(err) => {
                debug!(stream = %id, error = %err, "stream failed while ending");
                Err(err)
            }
        }
    }

    /// Counters of an open stream.
    pub fn stats(&self, id: &str) -> Option<StreamStats> {
        self.streams.get(id).map(Stream::stats)
    }

    /// Whether a stream is registered under `id`.
    pub fn is_open(&self, id: &str) -> bool {
        self.streams.contains_key(id)
    }

    /// Number of open streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream is open.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
