//! Encode then decode at declared rates that need conversion on both legs.

use super::*;
use crate::signal::{frames_for, signal_difference, tone};
use crate::ConverterKind;

fn round_trip(
    dispatcher: &mut Dispatcher,
    sample_rate: u32,
    channels: u16,
    pcm: &[f32],
    chunk_sizes: &[usize],
) -> Vec<f32> {
    let encoded = encode_chunked(dispatcher, "enc", sample_rate, channels, pcm, chunk_sizes);
    assert_single_terminal(&encoded);

    let decoded = decode_packets(dispatcher, "dec", sample_rate, channels, packets_of(&encoded));
    assert_single_terminal(&decoded);
    assert!(decoded.iter().all(|r| r.sample_rate == Some(sample_rate)));
    samples_of(&decoded)
}

fn relative_length_error(output: &[f32], input: &[f32]) -> f64 {
    (output.len() as f64 - input.len() as f64).abs() / input.len() as f64
}

#[test]
fn test_round_trip_44100_mono() {
    let mut dispatcher = pcm16_dispatcher();
    let input = tone(44100, 1, frames_for(44100, 2.0), 480.0, 0.25);
    let output = round_trip(&mut dispatcher, 44100, 1, &input, &[4410]);

    assert!(relative_length_error(&output, &input) < 0.02);
    // Padding adds silence at the tail; compare the converted body
    let body = input.len().min(output.len());
    let diff = signal_difference(&input[..body], &output[..body]);
    assert!(diff < 0.05, "signal difference {diff}");
}

#[test]
fn test_round_trip_22050_stereo() {
    let mut dispatcher = pcm16_dispatcher();
    let input = tone(22050, 2, frames_for(22050, 1.5), 300.0, 0.25);
    let output = round_trip(&mut dispatcher, 22050, 2, &input, &[1000, 2204, 64]);

    assert_eq!(output.len() % 2, 0);
    assert!(relative_length_error(&output, &input) < 0.02);

    let left: Vec<f32> = output.iter().step_by(2).copied().collect();
    let right: Vec<f32> = output.iter().skip(1).step_by(2).copied().collect();
    assert_eq!(left, right);
}

#[test]
fn test_round_trip_every_converter_kind() {
    let input = tone(44100, 1, frames_for(44100, 1.0), 440.0, 0.25);

    for kind in [
        ConverterKind::Default,
        ConverterKind::SincFastest,
        ConverterKind::ZeroOrderHold,
        ConverterKind::Linear,
    ] {
        let config = EngineConfig {
            converter: kind,
            ..EngineConfig::default()
        };
        let mut dispatcher = Dispatcher::with_pcm16(config).unwrap();
        let output = round_trip(&mut dispatcher, 44100, 1, &input, &[441]);

        assert!(relative_length_error(&output, &input) < 0.02, "{kind}");
        let body = input.len().min(output.len());
        let diff = signal_difference(&input[..body], &output[..body]);
        assert!(diff < 0.1, "{kind}: signal difference {diff}");
    }
}

#[test]
fn test_round_trip_without_conversion_is_exact_length() {
    let mut dispatcher = pcm16_dispatcher();
    let input = tone(16000, 1, 640 * 10, 500.0, 0.25);
    let output = round_trip(&mut dispatcher, 16000, 1, &input, &[999]);

    assert_eq!(output.len(), input.len());
    for (a, b) in input.iter().zip(&output) {
        assert!((a - b).abs() < 1e-4);
    }
}
