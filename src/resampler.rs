//! Streaming sample-rate conversion.
//! Uses rubato for the interpolation itself.
//!
//! rubato's fixed-input resamplers consume exactly `input_frames_next()`
//! frames per call. [`RateConverter`] accepts arbitrarily sized interleaved
//! chunks, carries whatever does not fill a resampler chunk over to the next
//! call, and on end of input drains the resampler so the total output length
//! is `round(frames_in × ratio)` with the resampler's delay removed.

use crate::config::ConverterKind;
use crate::error::{CodecStreamError, CodecStreamResult};
use rubato::{
    FastFixedIn, PolynomialDegree, ResampleError, Resampler, SincFixedIn,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::trace;

/// Flush passes allowed after end of input before giving up on reaching the
/// expected output length.
const MAX_FLUSH_PASSES: usize = 64;

enum Engine {
    Sinc(Box<SincFixedIn<f32>>),
    Fast(Box<FastFixedIn<f32>>),
}

impl Engine {
    fn new(
        kind: ConverterKind,
        ratio: f64,
        chunk_frames: usize,
        channels: usize,
    ) -> CodecStreamResult<Self> {
        let engine = match kind {
            ConverterKind::Default => Self::sinc(
                ratio,
                SincInterpolationParameters {
                    sinc_len: 128,
                    f_cutoff: 0.95,
                    interpolation: SincInterpolationType::Linear,
                    oversampling_factor: 256,
                    window: WindowFunction::BlackmanHarris2,
                },
                chunk_frames,
                channels,
            ),
            ConverterKind::SincFastest => Self::sinc(
                ratio,
                SincInterpolationParameters {
                    sinc_len: 64,
                    f_cutoff: 0.91,
                    interpolation: SincInterpolationType::Nearest,
                    oversampling_factor: 128,
                    window: WindowFunction::Hann2,
                },
                chunk_frames,
                channels,
            ),
            ConverterKind::ZeroOrderHold => {
                Self::fast(ratio, PolynomialDegree::Nearest, chunk_frames, channels)
            }
            ConverterKind::Linear => {
                Self::fast(ratio, PolynomialDegree::Linear, chunk_frames, channels)
            }
        };

        engine.map_err(|e| {
            CodecStreamError::converter_init(format!(
                "{kind} converter failed to initialize (ratio={ratio}, channels={channels}): {e}"
            ))
        })
    }

    fn sinc(
        ratio: f64,
        parameters: SincInterpolationParameters,
        chunk_frames: usize,
        channels: usize,
    ) -> Result<Self, rubato::ResamplerConstructionError> {
        SincFixedIn::<f32>::new(ratio, 1.0, parameters, chunk_frames, channels)
            .map(|r| Self::Sinc(Box::new(r)))
    }

    fn fast(
        ratio: f64,
        degree: PolynomialDegree,
        chunk_frames: usize,
        channels: usize,
    ) -> Result<Self, rubato::ResamplerConstructionError> {
        FastFixedIn::<f32>::new(ratio, 1.0, degree, chunk_frames, channels)
            .map(|r| Self::Fast(Box::new(r)))
    }

    fn input_frames_next(&self) -> usize {
        match self {
            Self::Sinc(r) => r.input_frames_next(),
            Self::Fast(r) => r.input_frames_next(),
        }
    }

    fn output_delay(&self) -> usize {
        match self {
            Self::Sinc(r) => r.output_delay(),
            Self::Fast(r) => r.output_delay(),
        }
    }

    fn process<V: AsRef<[f32]>>(
        &mut self,
        wave_in: &[V],
    ) -> Result<Vec<Vec<f32>>, ResampleError> {
        match self {
            Self::Sinc(r) => r.process(wave_in, None),
            Self::Fast(r) => r.process(wave_in, None),
        }
    }

    fn process_partial(
        &mut self,
        wave_in: Option<&[Vec<f32>]>,
    ) -> Result<Vec<Vec<f32>>, ResampleError> {
        match self {
            Self::Sinc(r) => r.process_partial(wave_in, None),
            Self::Fast(r) => r.process_partial(wave_in, None),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Sinc(r) => r.reset(),
            Self::Fast(r) => r.reset(),
        }
    }
}

/// Converts interleaved audio between two rates across many calls.
pub struct RateConverter {
    engine: Engine,
    kind: ConverterKind,
    channels: usize,
    ratio: f64,
    pending: Vec<Vec<f32>>,
    delay_remaining: usize,
    frames_in: u64,
    frames_out: u64,
}

impl std::fmt::Debug for RateConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateConverter")
            .field("kind", &self.kind)
            .field("channels", &self.channels)
            .field("ratio", &self.ratio)
            .field("frames_pending", &self.frames_pending())
            .finish()
    }
}

impl RateConverter {
    /// Create a converter producing `ratio` output frames per input frame.
    ///
    /// # Arguments
    /// * `kind` - Interpolation flavour
    /// * `channels` - Interleaved channel count of input and output
    /// * `ratio` - Output sample rate / input sample rate
    /// * `chunk_frames` - Input frames consumed per internal iteration
    ///
    /// # Errors
    /// Returns [`CodecStreamError::ConverterInit`] for a non-positive or
    /// non-finite ratio, zero channels or chunk size, or when rubato rejects
    /// the parameters.
    pub fn new(
        kind: ConverterKind,
        channels: usize,
        ratio: f64,
        chunk_frames: usize,
    ) -> CodecStreamResult<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(CodecStreamError::converter_init(format!(
                "invalid conversion ratio {ratio}"
            )));
        }
        if channels == 0 || chunk_frames == 0 {
            return Err(CodecStreamError::converter_init(format!(
                "invalid converter shape: {channels} channels, {chunk_frames} frames per chunk"
            )));
        }

        let engine = Engine::new(kind, ratio, chunk_frames, channels)?;
        let delay_remaining = engine.output_delay();

        Ok(Self {
            engine,
            kind,
            channels,
            ratio,
            pending: vec![Vec::with_capacity(chunk_frames); channels],
            delay_remaining,
            frames_in: 0,
            frames_out: 0,
        })
    }

    /// Converter flavour.
    pub const fn kind(&self) -> ConverterKind {
        self.kind
    }

    /// Output rate / input rate.
    pub const fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Interleaved channel count.
    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Input frames held back because they do not yet fill a resampler chunk.
    pub fn frames_pending(&self) -> usize {
        self.pending.first().map_or(0, Vec::len)
    }

    /// Output length owed for everything admitted so far.
    fn expected_frames_out(&self) -> u64 {
        (self.frames_in as f64 * self.ratio).round() as u64
    }

    /// Convert a chunk of interleaved samples.
    ///
    /// Returns zero or more interleaved blocks, each freshly allocated and
    /// owned by the caller. With `end_of_input` set, everything carried over
    /// is flushed and the converter is reset for reuse.
    ///
    /// # Errors
    /// Returns [`CodecStreamError::Conversion`] when `samples` is not a whole
    /// number of frames or rubato fails.
    pub fn process(
        &mut self,
        samples: &[f32],
        end_of_input: bool,
    ) -> CodecStreamResult<Vec<Vec<f32>>> {
        if samples.len() % self.channels != 0 {
            return Err(CodecStreamError::conversion(format!(
                "invalid frame structure: {} samples for {} channels",
                samples.len(),
                self.channels
            )));
        }

        deinterleave_into(samples, &mut self.pending);
        self.frames_in += (samples.len() / self.channels) as u64;

        let mut blocks = Vec::new();
        let mut consumed = 0;
        loop {
            let needed = self.engine.input_frames_next();
            if self.frames_pending() - consumed < needed {
                break;
            }
            let chunk: Vec<&[f32]> = self
                .pending
                .iter()
                .map(|channel| &channel[consumed..consumed + needed])
                .collect();
            let output = self.engine.process(&chunk).map_err(conversion_error)?;
            consumed += needed;
            self.collect_output(output, None, &mut blocks);
        }
        // Consumed input is dropped once per call
        for channel in &mut self.pending {
            channel.drain(..consumed);
        }

        if end_of_input {
            self.finish(&mut blocks)?;
        }

        trace!(
            blocks = blocks.len(),
            pending = self.frames_pending(),
            end_of_input,
            "rate converter pass"
        );
        Ok(blocks)
    }

    fn finish(&mut self, blocks: &mut Vec<Vec<f32>>) -> CodecStreamResult<()> {
        let expected = self.expected_frames_out();

        if self.frames_pending() > 0 {
            let chunk = std::mem::replace(
                &mut self.pending,
                vec![Vec::new(); self.channels],
            );
            let output = self
                .engine
                .process_partial(Some(&chunk))
                .map_err(conversion_error)?;
            self.collect_output(output, Some(expected), blocks);
        }

        for _ in 0..MAX_FLUSH_PASSES {
            if self.frames_out >= expected {
                break;
            }
            let output = self.engine.process_partial(None).map_err(conversion_error)?;
            if output.first().is_none_or(Vec::is_empty) {
                break;
            }
            self.collect_output(output, Some(expected), blocks);
        }

        self.engine.reset();
        self.delay_remaining = self.engine.output_delay();
        self.frames_in = 0;
        self.frames_out = 0;
        Ok(())
    }

    /// Strips the resampler delay, applies the end-of-input length cap and
    /// interleaves what is left into a new block.
    fn collect_output(
        &mut self,
        output: Vec<Vec<f32>>,
        limit: Option<u64>,
        blocks: &mut Vec<Vec<f32>>,
    ) {
        let produced = output.first().map_or(0, Vec::len);
        let skip = self.delay_remaining.min(produced);
        self.delay_remaining -= skip;

        let mut end = produced;
        if let Some(limit) = limit {
            let owed = limit.saturating_sub(self.frames_out) as usize;
            end = end.min(skip + owed);
        }
        if end <= skip {
            return;
        }

        let block = interleave(&output, skip, end);
        self.frames_out += (end - skip) as u64;
        blocks.push(block);
    }
}

fn conversion_error(e: ResampleError) -> CodecStreamError {
    CodecStreamError::conversion(format!("Conversion error - {e}"))
}

/// Appends interleaved samples to per-channel buffers.
///
/// Input:  [L, R, L, R, ...]
/// Output: [[.., L, L], [.., R, R]]
fn deinterleave_into(samples: &[f32], planar: &mut [Vec<f32>]) {
    let channels = planar.len();
    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in planar.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
}

/// Interleaves frames `start..end` of planar data.
fn interleave(planar: &[Vec<f32>], start: usize, end: usize) -> Vec<f32> {
    let mut interleaved = Vec::with_capacity((end - start) * planar.len());
    for frame_idx in start..end {
        for channel in planar {
            interleaved.push(channel[frame_idx]);
        }
    }
    interleaved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{signal_difference, tone};

    fn total_len(blocks: &[Vec<f32>]) -> usize {
        blocks.iter().map(Vec::len).sum()
    }

    fn concat(blocks: Vec<Vec<f32>>) -> Vec<f32> {
        blocks.into_iter().flatten().collect()
    }

    #[test]
    fn test_deinterleave_and_interleave() {
        let mut planar = vec![Vec::new(), Vec::new()];
        deinterleave_into(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &mut planar);
        assert_eq!(planar[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(planar[1], vec![2.0, 4.0, 6.0]);

        assert_eq!(interleave(&planar, 1, 3), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = RateConverter::new(ConverterKind::Default, 1, ratio, 1024).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::ConverterInit);
        }
        assert!(RateConverter::new(ConverterKind::Linear, 0, 1.5, 1024).is_err());
        assert!(RateConverter::new(ConverterKind::Linear, 1, 1.5, 0).is_err());
    }

    #[test]
    fn test_rejects_ragged_input() {
        let mut converter =
            RateConverter::new(ConverterKind::Linear, 2, 48000.0 / 44100.0, 256).unwrap();
        let err = converter.process(&[0.0; 3], false).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conversion);
    }

    #[test]
    fn test_carries_partial_chunks() {
        let mut converter =
            RateConverter::new(ConverterKind::Linear, 1, 48000.0 / 44100.0, 1024).unwrap();
        let blocks = converter.process(&[0.1; 100], false).unwrap();
        assert!(blocks.is_empty());
        assert_eq!(converter.frames_pending(), 100);

        let blocks = converter.process(&[0.1; 1000], false).unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(converter.frames_pending(), 76);
    }

    #[test]
    fn test_total_length_matches_ratio_for_every_kind() {
        for kind in [
            ConverterKind::Default,
            ConverterKind::SincFastest,
            ConverterKind::ZeroOrderHold,
            ConverterKind::Linear,
        ] {
            let mut converter = RateConverter::new(kind, 1, 48000.0 / 44100.0, 1024).unwrap();
            let input = tone(44100, 1, 44100, 440.0, 0.25);

            let mut blocks = Vec::new();
            for chunk in input.chunks(777) {
                blocks.extend(converter.process(chunk, false).unwrap());
            }
            blocks.extend(converter.process(&[], true).unwrap());

            assert_eq!(total_len(&blocks), 48000, "{kind}");
            assert_eq!(converter.frames_pending(), 0);
        }
    }

    #[test]
    fn test_large_chunk_matches_small_chunks() {
        for kind in [ConverterKind::Default, ConverterKind::Linear] {
            let input = tone(44100, 2, 10 * 44100, 440.0, 0.25);

            let mut whole = RateConverter::new(kind, 2, 48000.0 / 44100.0, 1024).unwrap();
            let whole_blocks = whole.process(&input, false).unwrap();
            assert!(whole.frames_pending() < 1024);
            let mut whole_out = concat(whole_blocks);
            whole_out.extend(concat(whole.process(&[], true).unwrap()));

            let mut pieces = RateConverter::new(kind, 2, 48000.0 / 44100.0, 1024).unwrap();
            let mut pieces_out = Vec::new();
            for chunk in input.chunks(2 * 333) {
                pieces_out.extend(concat(pieces.process(chunk, false).unwrap()));
            }
            pieces_out.extend(concat(pieces.process(&[], true).unwrap()));

            assert_eq!(whole_out.len(), 2 * 10 * 48000, "{kind}");
            assert_eq!(whole_out, pieces_out, "{kind}");
        }
    }

    #[test]
    fn test_flush_without_new_input_emits_tail() {
        let mut converter =
            RateConverter::new(ConverterKind::Default, 2, 2.0, 1024).unwrap();
        let input = tone(24000, 2, 500, 440.0, 0.25);
        assert!(converter.process(&input, false).unwrap().is_empty());

        let tail = converter.process(&[], true).unwrap();
        assert_eq!(total_len(&tail), 2000);
    }

    #[test]
    fn test_convert_44100_to_48000_preserves_tone() {
        let mut converter =
            RateConverter::new(ConverterKind::Default, 1, 48000.0 / 44100.0, 1024).unwrap();
        let input = tone(44100, 1, 44100, 440.0, 0.25);
        let expected = tone(48000, 1, 48000, 440.0, 0.25);

        let output = concat(converter.process(&input, true).unwrap());
        assert_eq!(output.len(), expected.len());
        assert!(signal_difference(&output, &expected) < 0.025);
    }

    #[test]
    fn test_convert_48000_to_44100_preserves_tone() {
        let mut converter =
            RateConverter::new(ConverterKind::Default, 1, 44100.0 / 48000.0, 1024).unwrap();
        let input = tone(48000, 1, 48000, 440.0, 0.25);
        let expected = tone(44100, 1, 44100, 440.0, 0.25);

        let output = concat(converter.process(&input, true).unwrap());
        assert_eq!(output.len(), expected.len());
        assert!(signal_difference(&output, &expected) < 0.025);
    }

    #[test]
    fn test_converter_is_reusable_after_end() {
        let mut converter =
            RateConverter::new(ConverterKind::Linear, 1, 0.5, 128).unwrap();
        let first = converter.process(&[0.5; 1000], true).unwrap();
        let second = converter.process(&[0.5; 1000], true).unwrap();
        assert_eq!(total_len(&first), 500);
        assert_eq!(total_len(&second), 500);
    }
}
