//! Test-signal generation and coarse signal comparison.
//!
//! Lossy codecs do not preserve waveforms sample for sample, so streams are
//! compared by energy and zero-crossing rate instead.

use std::f64::consts::PI;

/// Generates an interleaved sine tone with identical content on every channel.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz
/// * `channels` - Number of interleaved channels
/// * `frames` - Length in frames (samples per channel)
/// * `frequency` - Tone frequency in Hz
/// * `amplitude` - Peak amplitude
pub fn tone(
    sample_rate: u32,
    channels: usize,
    frames: usize,
    frequency: f64,
    amplitude: f64,
) -> Vec<f32> {
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let value = amplitude * (2.0 * PI * frequency * i as f64 / sample_rate as f64).sin();
        samples.extend(std::iter::repeat_n(value as f32, channels));
    }
    samples
}

/// Number of frames in `seconds` of audio at `sample_rate`, rounded up.
pub fn frames_for(sample_rate: u32, seconds: f64) -> usize {
    (sample_rate as f64 * seconds).ceil() as usize
}

/// Sum of squared samples.
pub fn energy(samples: &[f32]) -> f64 {
    samples.iter().map(|&s| s as f64 * s as f64).sum()
}

/// Counts sign changes between samples two positions apart.
pub fn zero_crossings(samples: &[f32]) -> usize {
    samples.windows(3).filter(|w| w[0] * w[2] < 0.0).count()
}

/// Relative difference of two non-negative measures, 0 when both are 0.
fn relative_difference(a: f64, b: f64) -> f64 {
    let mean = 0.5 * (a + b);
    if mean == 0.0 { 0.0 } else { (a - b).abs() / mean }
}

/// Dissimilarity of two signals: `0.25 × Δenergy + 0.75 × Δzero_crossings`.
///
/// Both terms are relative differences, so identical signals score 0 and the
/// score grows with loudness or pitch mismatch. It ignores phase and small
/// time shifts, which lossy coding and rate conversion introduce.
pub fn signal_difference(a: &[f32], b: &[f32]) -> f64 {
    let energy_diff = relative_difference(energy(a), energy(b));
    let crossing_diff =
        relative_difference(zero_crossings(a) as f64, zero_crossings(b) as f64);
    0.25 * energy_diff + 0.75 * crossing_diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;

    #[test]
    fn test_tone_layout() {
        let stereo = tone(48000, 2, 100, 440.0, 0.5);
        assert_eq!(stereo.len(), 200);
        assert_eq!(stereo[0], 0.0);
        for frame in stereo.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(stereo.iter().all(|s| s.abs() <= 0.5));
    }

    #[test]
    fn test_frames_for() {
        assert_eq!(frames_for(44100, 2.0), 88200);
        assert_eq!(frames_for(8000, 0.0), 0);
    }

    #[test]
    fn test_energy_of_full_cycles() {
        // 100 full cycles of a unit sine average to 0.5 per sample
        let signal = tone(48000, 1, 48000, 100.0, 1.0);
        assert_approx_eq!(energy(&signal) / 48000.0, 0.5, 1e-3);
    }

    #[test]
    fn test_zero_crossings_of_tone() {
        // Two sign changes per cycle, each seen by two overlapping sample pairs
        let signal = tone(48000, 1, 48000, 480.0, 0.25);
        let crossings = zero_crossings(&signal) as f64;
        assert!((crossings - 1920.0).abs() / 1920.0 < 0.05, "{crossings}");
    }

    #[test]
    fn test_signal_difference() {
        let a = tone(48000, 1, 4800, 440.0, 0.25);
        assert_eq!(signal_difference(&a, &a), 0.0);
        assert_eq!(signal_difference(&[], &[]), 0.0);

        let quieter = tone(48000, 1, 4800, 440.0, 0.125);
        let higher = tone(48000, 1, 4800, 880.0, 0.25);
        assert!(signal_difference(&a, &quieter) > 0.1);
        assert!(signal_difference(&a, &higher) > 0.4);
    }
}
