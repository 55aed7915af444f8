//! Wire messages exchanged with the dispatcher.
//!
//! Field names follow the camelCase JSON shape used by browser callers:
//!
//! ```json
//! { "op": "begin", "stream": "mic", "enc": [0.0, 0.1], "numChannels": 1, "sampleRate": 44100 }
//! { "stream": "mic", "enc": [252, 1, 0], "numChannels": 1, "sampleRate": 44100,
//!   "encSampleRate": 48000, "end": false }
//! ```

use crate::error::CodecStreamError;
use crate::stream::{Chunk, Payload, StreamEvent, StreamFormat, StreamMode};
use serde::{Deserialize, Serialize};

/// Operation code of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Open a stream, optionally with a first chunk
    Begin,
    /// Feed a chunk to an open stream
    Proc,
    /// Feed an optional last chunk, flush and close
    End,
    /// Anything else; logged and dropped
    #[serde(other)]
    Unknown,
}

/// A request to the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Operation code
    pub op: Operation,
    /// Caller-chosen stream identifier
    pub stream: String,
    /// Interleaved PCM to encode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<Vec<f32>>,
    /// A packet to decode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec: Option<Vec<u8>>,
    /// Channel count, read on `begin` only
    #[serde(default)]
    pub num_channels: u16,
    /// Declared sample rate, read on `begin` only
    #[serde(default)]
    pub sample_rate: u32,
}

impl InboundMessage {
    fn new(op: Operation, stream: impl Into<String>) -> Self {
        Self {
            op,
            stream: stream.into(),
            enc: None,
            dec: None,
            num_channels: 0,
            sample_rate: 0,
        }
    }

    /// Open an encode stream with an optional first chunk of PCM.
    pub fn begin_encode(
        stream: impl Into<String>,
        sample_rate: u32,
        num_channels: u16,
        samples: Vec<f32>,
    ) -> Self {
        Self {
            enc: Some(samples),
            num_channels,
            sample_rate,
            ..Self::new(Operation::Begin, stream)
        }
    }

    /// Open a decode stream; an empty `packet` opens it without decoding.
    pub fn begin_decode(
        stream: impl Into<String>,
        sample_rate: u32,
        num_channels: u16,
        packet: Vec<u8>,
    ) -> Self {
        Self {
            dec: Some(packet),
            num_channels,
            sample_rate,
            ..Self::new(Operation::Begin, stream)
        }
    }

    /// Feed PCM to an encode stream.
    pub fn encode(stream: impl Into<String>, samples: Vec<f32>) -> Self {
        Self {
            enc: Some(samples),
            ..Self::new(Operation::Proc, stream)
        }
    }

    /// Feed a packet to a decode stream; an empty packet conceals a loss.
    pub fn decode(stream: impl Into<String>, packet: Vec<u8>) -> Self {
        Self {
            dec: Some(packet),
            ..Self::new(Operation::Proc, stream)
        }
    }

    /// Close a stream without a final chunk.
    pub fn end(stream: impl Into<String>) -> Self {
        Self::new(Operation::End, stream)
    }

    /// Mode a `begin` asks for: PCM wins when both payloads are present.
    pub fn requested_mode(&self) -> Option<StreamMode> {
        match (&self.enc, &self.dec) {
            (Some(_), _) => Some(StreamMode::Encoding),
            (None, Some(_)) => Some(StreamMode::Decoding),
            (None, None) => None,
        }
    }

    /// Take the payload matching `mode`, leaving the other one in place.
    pub fn take_chunk(&mut self, mode: StreamMode) -> Option<Chunk> {
        match mode {
            StreamMode::Encoding => self.enc.take().map(Chunk::Pcm),
            StreamMode::Decoding => self.dec.take().map(Chunk::Packet),
        }
    }
}

/// A reply from the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    /// Stream the message belongs to
    pub stream: String,
    /// Encoded packet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc: Option<Vec<u8>>,
    /// Decoded PCM at the declared rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dec: Option<Vec<f32>>,
    /// Channel count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_channels: Option<u16>,
    /// Declared sample rate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    /// Rate the codec runs at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enc_sample_rate: Option<u32>,
    /// Set on every event; true only on the last message of a stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<bool>,
    /// Error description; the stream is already closed when this is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OutboundMessage {
    /// Wrap a stream event with the format of its stream.
    pub fn from_event(
        stream: impl Into<String>,
        format: &StreamFormat,
        event: StreamEvent,
    ) -> Self {
        let (enc, dec) = match event.payload {
            Some(Payload::Packet(packet)) => (Some(packet), None),
            Some(Payload::Samples(samples)) => (None, Some(samples)),
            None => (None, None),
        };
        Self {
            stream: stream.into(),
            enc,
            dec,
            num_channels: Some(format.channels()),
            sample_rate: Some(format.sample_rate),
            enc_sample_rate: Some(format.codec_sample_rate),
            end: Some(event.end),
            error: None,
        }
    }

    /// An error reply carrying only the stream id and the description.
    pub fn error(stream: impl Into<String>, error: &CodecStreamError) -> Self {
        Self {
            stream: stream.into(),
            error: Some(error.to_string()),
            ..Self::default()
        }
    }

    /// Whether this is the final message of its stream.
    pub fn is_end(&self) -> bool {
        self.end == Some(true) || self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ChannelLayout;

    #[test]
    fn test_inbound_from_json() {
        let msg: InboundMessage = serde_json::from_str(
            r#"{"op":"begin","stream":"mic","enc":[0.5,-0.5],"numChannels":2,"sampleRate":44100}"#,
        )
        .unwrap();
        assert_eq!(msg.op, Operation::Begin);
        assert_eq!(msg.stream, "mic");
        assert_eq!(msg.enc, Some(vec![0.5, -0.5]));
        assert_eq!(msg.dec, None);
        assert_eq!(msg.num_channels, 2);
        assert_eq!(msg.sample_rate, 44100);
        assert_eq!(msg.requested_mode(), Some(StreamMode::Encoding));
    }

    #[test]
    fn test_unknown_op_and_missing_fields() {
        let msg: InboundMessage = serde_json::from_str(r#"{"op":"flush","stream":"x"}"#).unwrap();
        assert_eq!(msg.op, Operation::Unknown);
        assert_eq!(msg.requested_mode(), None);
        assert_eq!(msg.num_channels, 0);
    }

    #[test]
    fn test_requested_mode_prefers_pcm() {
        let mut msg = InboundMessage::begin_encode("a", 48000, 1, vec![0.0]);
        msg.dec = Some(vec![1]);
        assert_eq!(msg.requested_mode(), Some(StreamMode::Encoding));

        assert_eq!(msg.take_chunk(StreamMode::Decoding), Some(Chunk::Packet(vec![1])));
        assert_eq!(msg.take_chunk(StreamMode::Decoding), None);
        assert_eq!(msg.take_chunk(StreamMode::Encoding), Some(Chunk::Pcm(vec![0.0])));
    }

    #[test]
    fn test_event_serialization() {
        let format = StreamFormat {
            sample_rate: 44100,
            codec_sample_rate: 48000,
            layout: ChannelLayout::Mono,
        };
        let msg = OutboundMessage::from_event(
            "mic",
            &format,
            StreamEvent {
                payload: Some(Payload::Packet(vec![1, 2, 3])),
                end: false,
            },
        );

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "stream": "mic",
                "enc": [1, 2, 3],
                "numChannels": 1,
                "sampleRate": 44100,
                "encSampleRate": 48000,
                "end": false
            })
        );
        assert!(!msg.is_end());
    }

    #[test]
    fn test_error_serialization() {
        let msg = OutboundMessage::error("mic", &CodecStreamError::unknown_stream("mic"));
        let json = serde_json::to_value(&msg).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["stream"], "mic");
        assert!(object["error"].as_str().unwrap().contains("mic"));
        assert!(msg.is_end());
    }
}
