//! One directional codec pipeline: accumulation, conversion and coding.
//!
//! An encode stream takes PCM at its declared rate, converts it to the codec
//! rate when the two differ, accumulates it until whole codec blocks are
//! available and encodes each block into a packet. A decode stream takes one
//! packet at a time, decodes it and converts the frame back to the declared
//! rate.
//!
//! Each call returns the ordered events it produced instead of invoking a
//! callback, so a single chunk may yield zero, one or many outputs.

use crate::buffer::SampleAccumulator;
use crate::codec::{ChannelLayout, CodecBackend, FrameDecoder, FrameEncoder};
use crate::config::EngineConfig;
use crate::error::{CodecStreamError, CodecStreamResult};
use crate::frame_sizes::{choose_block_length, nearest_supported_rate};
use crate::resampler::RateConverter;
use std::fmt;
use tracing::{debug, trace};

/// Direction of a stream, fixed when it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// PCM in, packets out
    Encoding,
    /// Packets in, PCM out
    Decoding,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding => f.write_str("encoding"),
            Self::Decoding => f.write_str("decoding"),
        }
    }
}

/// Parameters a stream is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    /// Encoding or decoding
    pub mode: StreamMode,
    /// Rate of the PCM side of the stream, in Hz
    pub sample_rate: u32,
    /// Interleaved channel count, 1 or 2
    pub channels: u16,
}

/// Rates and layout reported on every output of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Declared rate of the PCM side
    pub sample_rate: u32,
    /// Rate the codec runs at
    pub codec_sample_rate: u32,
    /// Channel layout
    pub layout: ChannelLayout,
}

impl StreamFormat {
    /// Channel count as carried on the wire.
    pub const fn channels(&self) -> u16 {
        self.layout.count() as u16
    }

    /// Whether PCM must be rate converted on its way to or from the codec.
    pub const fn needs_conversion(&self) -> bool {
        self.sample_rate != self.codec_sample_rate
    }
}

/// Input handed to a stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// Interleaved PCM for an encode stream
    Pcm(Vec<f32>),
    /// One packet for a decode stream; empty means "conceal a lost packet"
    Packet(Vec<u8>),
}

impl Chunk {
    /// Mode of stream this chunk is meant for.
    pub const fn mode(&self) -> StreamMode {
        match self {
            Self::Pcm(_) => StreamMode::Encoding,
            Self::Packet(_) => StreamMode::Decoding,
        }
    }

    /// Whether the chunk carries no data.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Pcm(samples) => samples.is_empty(),
            Self::Packet(packet) => packet.is_empty(),
        }
    }
}

/// Data carried by an output event.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// An encoded packet, owned by the receiver
    Packet(Vec<u8>),
    /// Decoded interleaved PCM at the declared rate, owned by the receiver
    Samples(Vec<f32>),
}

/// One output of a stream call.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// Packet or PCM, absent on a bare end-of-stream marker
    pub payload: Option<Payload>,
    /// Set on the final output of the stream only
    pub end: bool,
}

impl StreamEvent {
    const fn terminal() -> Self {
        Self {
            payload: None,
            end: true,
        }
    }
}

/// Running counters of a stream, in interleaved samples unless noted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Samples accepted at the codec rate, after conversion
    pub samples_admitted: u64,
    /// Zero samples appended at end of stream
    pub samples_padded: u64,
    /// Samples handed to the encoder
    pub samples_encoded: u64,
    /// Packets produced or consumed
    pub packets: u64,
    /// PCM samples emitted by a decode stream
    pub samples_emitted: u64,
}

enum Pipeline {
    Encode {
        encoder: Box<dyn FrameEncoder>,
        buffer: SampleAccumulator,
        block_len: usize,
    },
    Decode {
        decoder: Box<dyn FrameDecoder>,
        forward_error_correction: bool,
    },
}

/// A stateful encode or decode session.
pub struct Stream {
    id: String,
    format: StreamFormat,
    pipeline: Pipeline,
    converter: Option<RateConverter>,
    stats: StreamStats,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("mode", &self.mode())
            .field("format", &self.format)
            .field("block_len", &self.block_len())
            .field("converter", &self.converter)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Stream {
    /// Open a stream, creating its codec handle and, when the declared rate
    /// is not a codec rate, its rate converter.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::CodecInit`] for a zero sample rate, a
    /// channel count outside {1, 2} or a codec construction failure, and
    /// [`CodecStreamError::ConverterInit`] when the converter cannot be built
    /// and [`CodecStreamError::InvalidConfig`] when `config` fails validation.
    pub fn open(
        id: impl Into<String>,
        params: StreamParams,
        backend: &dyn CodecBackend,
        config: &EngineConfig,
    ) -> CodecStreamResult<Self> {
        let id = id.into();
        config.validate()?;
        if params.sample_rate == 0 {
            return Err(CodecStreamError::codec_init(
                "sample rate must be greater than zero",
            ));
        }

        let layout = ChannelLayout::from_count(params.channels)?;
        let format = StreamFormat {
            sample_rate: params.sample_rate,
            codec_sample_rate: nearest_supported_rate(params.sample_rate),
            layout,
        };

        let ratio = match params.mode {
            StreamMode::Encoding => format.codec_sample_rate as f64 / format.sample_rate as f64,
            StreamMode::Decoding => format.sample_rate as f64 / format.codec_sample_rate as f64,
        };
        let converter = if format.needs_conversion() {
            Some(RateConverter::new(
                config.converter,
                layout.count(),
                ratio,
                config.converter_chunk_frames,
            )?)
        } else {
            None
        };

        let pipeline = match params.mode {
            StreamMode::Encoding => {
                let encoder =
                    backend.create_encoder(format.codec_sample_rate, layout, config.application)?;
                let approx = config
                    .approx_block_frames(format.sample_rate)
                    .ok_or_else(|| {
                        CodecStreamError::InvalidConfig("block_divisor is zero".to_string())
                    })?;
                let block_frames = choose_block_length(format.sample_rate, approx);
                Pipeline::Encode {
                    encoder,
                    buffer: SampleAccumulator::new(),
                    block_len: block_frames * layout.count(),
                }
            }
            StreamMode::Decoding => Pipeline::Decode {
                decoder: backend.create_decoder(format.codec_sample_rate, layout)?,
                forward_error_correction: config.forward_error_correction,
            },
        };

        debug!(
            stream = %id,
            mode = %params.mode,
            sample_rate = format.sample_rate,
            codec_sample_rate = format.codec_sample_rate,
            channels = layout.count(),
            backend = backend.name(),
            converter = ?converter.as_ref().map(RateConverter::kind),
            "opened stream"
        );

        Ok(Self {
            id,
            format,
            pipeline,
            converter,
            stats: StreamStats::default(),
        })
    }

    /// Caller supplied identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Direction of the stream.
    pub const fn mode(&self) -> StreamMode {
        match self.pipeline {
            Pipeline::Encode { .. } => StreamMode::Encoding,
            Pipeline::Decode { .. } => StreamMode::Decoding,
        }
    }

    /// Rates and layout of the stream.
    pub const fn format(&self) -> StreamFormat {
        self.format
    }

    /// Running counters.
    pub const fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Encode block length in interleaved samples; `None` for decode streams.
    pub const fn block_len(&self) -> Option<usize> {
        match self.pipeline {
            Pipeline::Encode { block_len, .. } => Some(block_len),
            Pipeline::Decode { .. } => None,
        }
    }

    /// Samples waiting in the accumulation buffer for a whole block.
    pub fn buffered_samples(&self) -> usize {
        match &self.pipeline {
            Pipeline::Encode { buffer, .. } => buffer.sample_count(),
            Pipeline::Decode { .. } => 0,
        }
    }

    /// Input frames carried over inside the rate converter.
    pub fn converter_frames_pending(&self) -> usize {
        self.converter.as_ref().map_or(0, RateConverter::frames_pending)
    }

    /// Route a chunk to the pipeline matching its type.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::InvalidStreamMode`] when the chunk type
    /// does not match the stream's mode, otherwise whatever the pipeline
    /// reports.
    pub fn process(
        &mut self,
        chunk: Chunk,
        end_of_stream: bool,
    ) -> CodecStreamResult<Vec<StreamEvent>> {
        match (self.mode(), chunk) {
            (StreamMode::Encoding, Chunk::Pcm(samples)) => self.encode(samples, end_of_stream),
            (StreamMode::Decoding, Chunk::Packet(packet)) => {
                self.decode(Some(&packet), end_of_stream)
            }
            (mode, chunk) => Err(CodecStreamError::invalid_mode(format!(
                "stream '{}' is {mode} but received a chunk for {}",
                self.id,
                chunk.mode()
            ))),
        }
    }

    /// Admit PCM at the declared rate and encode every whole block.
    ///
    /// With `end_of_stream` set, the converter is drained and the buffer is
    /// zero padded to a whole block, so nothing remains buffered and the last
    /// event carries `end`.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::InvalidStreamMode`] on a decode stream and
    /// [`CodecStreamError::InvalidBlockSize`] when `samples` is not a whole
    /// number of frames.
    pub fn encode(
        &mut self,
        samples: Vec<f32>,
        end_of_stream: bool,
    ) -> CodecStreamResult<Vec<StreamEvent>> {
        let channels = self.format.layout.count();
        let Self {
            id,
            format,
            pipeline,
            converter,
            stats,
        } = self;

        let Pipeline::Encode {
            encoder,
            buffer,
            block_len,
        } = pipeline
        else {
            return Err(CodecStreamError::invalid_mode(format!(
                "stream '{id}' is decoding but received PCM"
            )));
        };
        let block_len = *block_len;

        if samples.len() % channels != 0 {
            return Err(CodecStreamError::InvalidBlockSize {
                samples: samples.len(),
                channels,
                sample_rate: format.sample_rate,
            });
        }

        match converter {
            Some(converter) => {
                for block in converter.process(&samples, end_of_stream)? {
                    stats.samples_admitted += block.len() as u64;
                    buffer.push(block);
                }
            }
            None => {
                stats.samples_admitted += samples.len() as u64;
                buffer.push(samples);
            }
        }

        if end_of_stream {
            stats.samples_padded += buffer.pad_to_multiple(block_len) as u64;
        }

        let mut events = Vec::new();
        if let Some(run) = buffer.split_blocks(block_len) {
            let count = run.len();
            let drained = buffer.is_empty();
            events.reserve(count + 1);

            for (index, block) in run.blocks().enumerate() {
                // The encoder reuses its packet buffer on the next call
                let packet = encoder.encode(block)?.to_vec();
                stats.samples_encoded += block.len() as u64;
                stats.packets += 1;
                trace!(stream = %id, bytes = packet.len(), "encoded block");

                events.push(StreamEvent {
                    payload: Some(Payload::Packet(packet)),
                    end: end_of_stream && drained && index + 1 == count,
                });
            }
        }

        if end_of_stream && !events.last().is_some_and(|e| e.end) {
            events.push(StreamEvent::terminal());
        }
        Ok(events)
    }

    /// Decode one packet and emit the frame at the declared rate.
    ///
    /// `None` decodes nothing, which together with `end_of_stream` just drains
    /// the decoder and the converter. An empty packet asks the decoder to
    /// conceal a loss.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::InvalidStreamMode`] on an encode stream.
    pub fn decode(
        &mut self,
        packet: Option<&[u8]>,
        end_of_stream: bool,
    ) -> CodecStreamResult<Vec<StreamEvent>> {
        let Self {
            id,
            pipeline,
            converter,
            stats,
            ..
        } = self;

        let Pipeline::Decode {
            decoder,
            forward_error_correction,
        } = pipeline
        else {
            return Err(CodecStreamError::invalid_mode(format!(
                "stream '{id}' is encoding but received a packet"
            )));
        };

        let frame: &[f32] = match packet {
            Some(packet) => {
                stats.packets += 1;
                decoder.decode(packet, *forward_error_correction)?
            }
            None => &[],
        };
        trace!(stream = %id, samples = frame.len(), "decoded packet");

        let mut blocks = emit_frame(converter.as_mut(), frame, false)?;
        if end_of_stream {
            let tail = decoder.flush()?;
            blocks.extend(emit_frame(converter.as_mut(), tail, true)?);
        }

        let count = blocks.len();
        let mut events = Vec::with_capacity(count.max(1));
        for (index, block) in blocks.into_iter().enumerate() {
            stats.samples_emitted += block.len() as u64;
            events.push(StreamEvent {
                payload: Some(Payload::Samples(block)),
                end: end_of_stream && index + 1 == count,
            });
        }

        if end_of_stream && count == 0 {
            events.push(StreamEvent::terminal());
        }
        Ok(events)
    }
}

/// Bring a decoded frame to the declared rate, copying it out of the decoder.
fn emit_frame(
    converter: Option<&mut RateConverter>,
    frame: &[f32],
    end_of_input: bool,
) -> CodecStreamResult<Vec<Vec<f32>>> {
    match converter {
        // Converter output is freshly allocated
        Some(converter) => converter.process(frame, end_of_input),
        // The decoder reuses its frame buffer on the next call
        None if frame.is_empty() => Ok(Vec::new()),
        None => Ok(vec![frame.to_vec()]),
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        debug!(stream = %self.id, stats = ?self.stats, "released stream");
    }
}
