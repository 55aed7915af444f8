//! libopus backend.
//!
//! Requires the `opus` cargo feature and a libopus the `opus` crate can link
//! against (system library or the bundled build of its sys crate).

use super::{
    ChannelLayout, CodecBackend, FrameDecoder, FrameEncoder, check_block, check_codec_rate,
};
use crate::config::Application;
use crate::error::{CodecStreamError, CodecStreamResult};

/// Upper bound on an encoded packet, as recommended by libopus.
const MAX_PACKET_BYTES: usize = 4000;

/// 120ms at 48kHz, the longest frame a packet can describe.
const MAX_FRAME_FRAMES: usize = 5760;

const fn channels(layout: ChannelLayout) -> ::opus::Channels {
    match layout {
        ChannelLayout::Mono => ::opus::Channels::Mono,
        ChannelLayout::Stereo => ::opus::Channels::Stereo,
    }
}

const fn application(application: Application) -> ::opus::Application {
    match application {
        Application::Voip => ::opus::Application::Voip,
        Application::Audio => ::opus::Application::Audio,
        Application::RestrictedLowDelay => ::opus::Application::LowDelay,
    }
}

/// Backend backed by libopus.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpusCodec;

impl CodecBackend for OpusCodec {
    fn name(&self) -> &'static str {
        "opus"
    }

    fn create_encoder(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
        app: Application,
    ) -> CodecStreamResult<Box<dyn FrameEncoder>> {
        check_codec_rate(sample_rate)?;
        let inner = ::opus::Encoder::new(sample_rate, channels(layout), application(app))
            .map_err(|e| {
                CodecStreamError::codec_init(format!("OpusEncoder creation failed - {e}"))
            })?;

        Ok(Box::new(OpusFrameEncoder {
            inner,
            sample_rate,
            layout,
            packet: vec![0; MAX_PACKET_BYTES],
        }))
    }

    fn create_decoder(
        &self,
        sample_rate: u32,
        layout: ChannelLayout,
    ) -> CodecStreamResult<Box<dyn FrameDecoder>> {
        check_codec_rate(sample_rate)?;
        let inner = ::opus::Decoder::new(sample_rate, channels(layout))
            .map_err(|e| {
                CodecStreamError::codec_init(format!("OpusDecoder creation failed - {e}"))
            })?;

        Ok(Box::new(OpusFrameDecoder {
            inner,
            sample_rate,
            layout,
            // Room for a recovered frame followed by the packet's own frame
            pcm: vec![0.0; 2 * MAX_FRAME_FRAMES * layout.count()],
            last_frames: (sample_rate / 50) as usize,
            pending_loss: false,
        }))
    }
}

struct OpusFrameEncoder {
    inner: ::opus::Encoder,
    sample_rate: u32,
    layout: ChannelLayout,
    packet: Vec<u8>,
}

impl FrameEncoder for OpusFrameEncoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn layout(&self) -> ChannelLayout {
        self.layout
    }

    fn encode(&mut self, pcm: &[f32]) -> CodecStreamResult<&[u8]> {
        check_block(self.sample_rate, self.layout, pcm.len())?;
        let len = self
            .inner
            .encode_float(pcm, &mut self.packet)
            .map_err(|e| CodecStreamError::encode(e.to_string()))?;
        Ok(&self.packet[..len])
    }
}

struct OpusFrameDecoder {
    inner: ::opus::Decoder,
    sample_rate: u32,
    layout: ChannelLayout,
    pcm: Vec<f32>,
    /// Duration of the last decoded packet, which a concealed loss repeats.
    last_frames: usize,
    /// A lost packet waiting for the redundancy carried by the next one.
    pending_loss: bool,
}

impl OpusFrameDecoder {
    /// Decode at most `frames` frames into the scratch buffer at frame `offset`.
    fn decode_into(
        &mut self,
        packet: &[u8],
        offset: usize,
        frames: usize,
        forward_error_correction: bool,
    ) -> CodecStreamResult<usize> {
        let channels = self.layout.count();
        let output = &mut self.pcm[offset * channels..(offset + frames) * channels];
        self.inner
            .decode_float(packet, output, forward_error_correction)
            .map_err(|e| CodecStreamError::decode(e.to_string()))
    }

    /// Run packet loss concealment for one frame of the last packet's length.
    fn conceal(&mut self) -> CodecStreamResult<&[f32]> {
        let frames = self.decode_into(&[], 0, self.last_frames, false)?;
        Ok(&self.pcm[..frames * self.layout.count()])
    }
}

impl FrameDecoder for OpusFrameDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn layout(&self) -> ChannelLayout {
        self.layout
    }

    fn decode(
        &mut self,
        packet: &[u8],
        forward_error_correction: bool,
    ) -> CodecStreamResult<&[f32]> {
        if packet.is_empty() {
            if forward_error_correction && !self.pending_loss {
                self.pending_loss = true;
                return Ok(&[]);
            }
            // On a second loss in a row the held one is concealed and the new
            // one stays pending
            return self.conceal();
        }

        let mut recovered = 0;
        if self.pending_loss {
            self.pending_loss = false;
            recovered = self.decode_into(packet, 0, self.last_frames, true)?;
        }
        let frames = self.decode_into(packet, recovered, MAX_FRAME_FRAMES, false)?;
        self.last_frames = frames;
        Ok(&self.pcm[..(recovered + frames) * self.layout.count()])
    }

    fn flush(&mut self) -> CodecStreamResult<&[f32]> {
        if !self.pending_loss {
            return Ok(&[]);
        }
        self.pending_loss = false;
        self.conceal()
    }
}
