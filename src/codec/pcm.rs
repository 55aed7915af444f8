//! Uncompressed reference codec.
//!
//! Packets carry the frame as little-endian signed 16-bit samples. The codec
//! enforces the same rate and frame-length rules as a real lossy codec, which
//! makes it a deterministic stand-in wherever libopus is unavailable.

use super::{
    ChannelLayout, CodecBackend, FrameDecoder, FrameEncoder, check_block, check_codec_rate,
};
use crate::config::Application;
use crate::error::{CodecStreamError, CodecStreamResult};
use tracing::trace;

const BYTES_PER_SAMPLE: usize = 2;

/// Frames of silence produced when concealing before anything was decoded.
const fn default_conceal_frames(rate: u32) -> usize {
    (rate / 50) as usize
}

fn quantize(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

fn dequantize(sample: i16) -> f32 {
    sample as f32 / i16::MAX as f32
}

/// Backend producing 16-bit PCM packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pcm16Codec;

impl CodecBackend for Pcm16Codec {
    fn name(&self) -> &'static str {
        "pcm16"
    }

    fn create_encoder(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
        _application: Application,
    ) -> CodecStreamResult<Box<dyn FrameEncoder>> {
        check_codec_rate(sample_rate)?;
        Ok(Box::new(Pcm16Encoder {
            sample_rate,
            layout,
            packet: Vec::new(),
        }))
    }

    fn create_decoder(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
    ) -> CodecStreamResult<Box<dyn FrameDecoder>> {
        check_codec_rate(sample_rate)?;
        Ok(Box::new(Pcm16Decoder {
            sample_rate,
            layout,
            pcm: Vec::new(),
            last_frames: default_conceal_frames(sample_rate),
        }))
    }
}

struct Pcm16Encoder {
    sample_rate: u32,
    layout: ChannelLayout,
    packet: Vec<u8>,
}

impl FrameEncoder for Pcm16Encoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn layout(&self) -> ChannelLayout {
        self.layout
    }

    fn encode(&mut self, pcm: &[f32]) -> CodecStreamResult<&[u8]> {
        check_block(self.sample_rate, self.layout, pcm.len())?;

        self.packet.clear();
        self.packet.reserve(pcm.len() * BYTES_PER_SAMPLE);
        for &sample in pcm {
            self.packet.extend_from_slice(&quantize(sample).to_le_bytes());
        }
        Ok(&self.packet)
    }
}

struct Pcm16Decoder {
    sample_rate: u32,
    layout: ChannelLayout,
    pcm: Vec<f32>,
    last_frames: usize,
}

impl FrameDecoder for Pcm16Decoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn layout(&self) -> ChannelLayout {
        self.layout
    }

    fn decode(
        &mut self,
        packet: &[u8],
        _forward_error_correction: bool,
    ) -> CodecStreamResult<&[f32]> {
        let channels = self.layout.count();
        self.pcm.clear();

        if packet.is_empty() {
            trace!(frames = self.last_frames, "concealing lost pcm16 packet");
            self.pcm.resize(self.last_frames * channels, 0.0);
            return Ok(&self.pcm);
        }

        if packet.len() % (BYTES_PER_SAMPLE * channels) != 0 {
            return Err(CodecStreamError::decode(format!(
                "packet of {} bytes is not a whole number of {} frames",
                packet.len(),
                self.layout
            )));
        }

        self.pcm.extend(
            packet
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|b| dequantize(i16::from_le_bytes([b[0], b[1]]))),
        );
        self.last_frames = self.pcm.len() / channels;
        Ok(&self.pcm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_rejects_unsupported_rates() {
        let backend = Pcm16Codec;
        let err = backend
            .create_encoder(44100, ChannelLayout::Mono, Application::Audio)
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::CodecInit);
        assert!(backend.create_decoder(44100, ChannelLayout::Mono).is_err());
        assert!(backend.create_decoder(48000, ChannelLayout::Stereo).is_ok());
    }

    #[test]
    fn test_encode_requires_legal_frame() {
        let mut encoder = Pcm16Codec
            .create_encoder(16000, ChannelLayout::Mono, Application::Audio)
            .unwrap();
        assert_eq!(
            encoder.encode(&[0.0; 100]).unwrap_err().kind(),
            ErrorKind::InvalidBlockSize
        );
        assert_eq!(encoder.encode(&[0.0; 320]).unwrap().len(), 640);
    }

    #[test]
    fn test_encode_then_decode_preserves_samples() {
        let mut encoder = Pcm16Codec
            .create_encoder(8000, ChannelLayout::Stereo, Application::Audio)
            .unwrap();
        let mut decoder = Pcm16Codec
            .create_decoder(8000, ChannelLayout::Stereo)
            .unwrap();

        let frame: Vec<f32> = (0..40).map(|i| (i as f32 / 40.0) - 0.5).collect();
        let packet = encoder.encode(&frame).unwrap().to_vec();
        let decoded = decoder.decode(&packet, false).unwrap();

        assert_eq!(decoded.len(), frame.len());
        for (a, b) in frame.iter().zip(decoded) {
            assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn test_encode_clamps_out_of_range() {
        let mut encoder = Pcm16Codec
            .create_encoder(8000, ChannelLayout::Mono, Application::Audio)
            .unwrap();
        let mut frame = vec![0.0f32; 20];
        frame[0] = 4.0;
        frame[1] = -4.0;
        let packet = encoder.encode(&frame).unwrap();
        assert_eq!(i16::from_le_bytes([packet[0], packet[1]]), i16::MAX);
        assert_eq!(i16::from_le_bytes([packet[2], packet[3]]), -i16::MAX);
    }

    #[test]
    fn test_empty_packet_conceals_with_last_frame_length() {
        let mut decoder = Pcm16Codec.create_decoder(48000, ChannelLayout::Mono).unwrap();

        // Nothing decoded yet: 20ms of silence
        assert_eq!(decoder.decode(&[], false).unwrap().len(), 960);

        let packet = vec![0u8; 240 * 2];
        assert_eq!(decoder.decode(&packet, false).unwrap().len(), 240);

        let concealed = decoder.decode(&[], true).unwrap();
        assert_eq!(concealed.len(), 240);
        assert!(concealed.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_decode_rejects_ragged_packets() {
        let mut decoder = Pcm16Codec
            .create_decoder(48000, ChannelLayout::Stereo)
            .unwrap();
        let err = decoder.decode(&[0u8; 6], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Codec);
    }
}
