//! Supported codec sample rates and their legal frame lengths.
//!
//! The codec accepts five sample rates and, at each rate `r`, exactly six
//! frame lengths: 2.5, 5, 10, 20, 40 and 60 ms, i.e.
//! `{r/400, r/200, r/100, r/50, r/25, 3r/50}` frames per channel.

/// Codec sample rates in ascending order.
pub const SUPPORTED_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

/// Number of legal frame lengths at every supported rate.
pub const FRAME_LENGTHS_PER_RATE: usize = 6;

/// Returns the codec rate used for a stream declared at `requested` Hz.
///
/// This is the smallest supported rate that is not below `requested`,
/// falling back to 48kHz for anything above 24kHz.
pub const fn nearest_supported_rate(requested: u32) -> u32 {
    if requested <= 8000 {
        8000
    } else if requested <= 12000 {
        12000
    } else if requested <= 16000 {
        16000
    } else if requested <= 24000 {
        24000
    } else {
        48000
    }
}

/// Whether `rate` is one of [`SUPPORTED_RATES`].
pub fn is_supported_rate(rate: u32) -> bool {
    SUPPORTED_RATES.contains(&rate)
}

/// Legal frame lengths (per channel) in ascending order.
///
/// `rate` is first resolved through [`nearest_supported_rate`], so the table
/// never fails.
pub const fn legal_block_lengths(rate: u32) -> [usize; FRAME_LENGTHS_PER_RATE] {
    let r = nearest_supported_rate(rate) as usize;
    [r / 400, r / 200, r / 100, r / 50, r / 25, 3 * r / 50]
}

/// Whether `frames` is a legal frame length at the codec rate `rate`.
pub fn is_legal_block_length(rate: u32, frames: usize) -> bool {
    is_supported_rate(rate) && legal_block_lengths(rate).contains(&frames)
}

/// Picks the codec frame length for a stream declared at `rate`.
///
/// `approx_len` is expressed in frames at the declared rate. It is scaled to
/// the codec rate, and the largest legal frame length not above the scaled
/// value is returned. When even the shortest frame is too long, the shortest
/// frame is returned.
pub fn choose_block_length(rate: u32, approx_len: usize) -> usize {
    let codec_rate = nearest_supported_rate(rate);
    let lengths = legal_block_lengths(codec_rate);
    let scaled = if rate == 0 {
        approx_len
    } else {
        (approx_len as f64 * codec_rate as f64 / rate as f64).round() as usize
    };

    lengths
        .iter()
        .rev()
        .copied()
        .find(|&len| len <= scaled)
        .unwrap_or(lengths[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_supported_rate() {
        assert_eq!(nearest_supported_rate(0), 8000);
        assert_eq!(nearest_supported_rate(8000), 8000);
        assert_eq!(nearest_supported_rate(8001), 12000);
        assert_eq!(nearest_supported_rate(11025), 12000);
        assert_eq!(nearest_supported_rate(16000), 16000);
        assert_eq!(nearest_supported_rate(22050), 24000);
        assert_eq!(nearest_supported_rate(24001), 48000);
        assert_eq!(nearest_supported_rate(44100), 48000);
        assert_eq!(nearest_supported_rate(96000), 48000);
    }

    #[test]
    fn test_legal_block_lengths_table() {
        assert_eq!(legal_block_lengths(8000), [20, 40, 80, 160, 320, 480]);
        assert_eq!(legal_block_lengths(12000), [30, 60, 120, 240, 480, 720]);
        assert_eq!(legal_block_lengths(16000), [40, 80, 160, 320, 640, 960]);
        assert_eq!(legal_block_lengths(24000), [60, 120, 240, 480, 960, 1440]);
        assert_eq!(legal_block_lengths(48000), [120, 240, 480, 960, 1920, 2880]);
    }

    #[test]
    fn test_table_is_exact_for_every_rate() {
        for rate in SUPPORTED_RATES {
            let lengths = legal_block_lengths(rate);
            assert_eq!(lengths[0] * 400, rate as usize);
            assert_eq!(lengths[5] * 50, 3 * rate as usize);
            assert!(lengths.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_is_legal_block_length() {
        assert!(is_legal_block_length(48000, 960));
        assert!(!is_legal_block_length(48000, 1000));
        // 44.1kHz is not a codec rate even though it resolves to one
        assert!(!is_legal_block_length(44100, 1920));
    }

    #[test]
    fn test_choose_block_length_forty_millis() {
        for rate in [8000, 11025, 16000, 22050, 24000, 44100, 48000] {
            let codec_rate = nearest_supported_rate(rate);
            assert_eq!(
                choose_block_length(rate, (rate / 25) as usize),
                (codec_rate / 25) as usize,
                "rate {rate}"
            );
        }
    }

    #[test]
    fn test_choose_block_length_rounds_down() {
        // 30ms at 48kHz lies between the 20ms and 40ms frames
        assert_eq!(choose_block_length(48000, 1440), 960);
        // Longer than the longest frame
        assert_eq!(choose_block_length(48000, 10_000), 2880);
        // Shorter than the shortest frame
        assert_eq!(choose_block_length(48000, 10), 120);
        assert_eq!(choose_block_length(48000, 0), 120);
    }
}
