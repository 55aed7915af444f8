//! Scenario tests driving whole streams through the dispatcher.
//!
//! Unit tests for each layer live next to the code; these cover behaviour
//! that only shows up across several messages.

use crate::{Dispatcher, EngineConfig, InboundMessage, OutboundMessage};

mod round_trip_tests;

/// Dispatcher over the 16-bit PCM codec with default settings.
pub(crate) fn pcm16_dispatcher() -> Dispatcher {
    Dispatcher::with_pcm16(EngineConfig::default()).expect("default config is valid")
}

/// Handle every message in order and collect all replies.
pub(crate) fn run(
    dispatcher: &mut Dispatcher,
    messages: impl IntoIterator<Item = InboundMessage>,
) -> Vec<OutboundMessage> {
    let mut replies = Vec::new();
    for msg in messages {
        dispatcher.dispatch(msg, |reply| replies.push(reply));
    }
    replies
}

/// Encode `pcm` on a fresh stream, cutting it into chunks of the given sizes
/// (cycled), with the first chunk riding on `begin`.
pub(crate) fn encode_chunked(
    dispatcher: &mut Dispatcher,
    id: &str,
    sample_rate: u32,
    channels: u16,
    pcm: &[f32],
    chunk_sizes: &[usize],
) -> Vec<OutboundMessage> {
    let mut chunks = Vec::new();
    let mut offset = 0;
    for &size in chunk_sizes.iter().cycle() {
        if offset >= pcm.len() {
            break;
        }
        let end = (offset + size).min(pcm.len());
        chunks.push(pcm[offset..end].to_vec());
        offset = end;
    }

    let mut chunks = chunks.into_iter();
    let first = chunks.next().unwrap_or_default();
    let mut messages = vec![InboundMessage::begin_encode(id, sample_rate, channels, first)];
    messages.extend(chunks.map(|chunk| InboundMessage::encode(id, chunk)));
    messages.push(InboundMessage::end(id));

    run(dispatcher, messages)
}

/// Decode `packets` on a fresh stream and return the replies.
pub(crate) fn decode_packets(
    dispatcher: &mut Dispatcher,
    id: &str,
    sample_rate: u32,
    channels: u16,
    packets: Vec<Vec<u8>>,
) -> Vec<OutboundMessage> {
    let mut messages = vec![InboundMessage::begin_decode(id, sample_rate, channels, Vec::new())];
    messages.extend(packets.into_iter().map(|p| InboundMessage::decode(id, p)));
    messages.push(InboundMessage::end(id));
    run(dispatcher, messages)
}

/// Packets carried by encode replies, in order.
pub(crate) fn packets_of(replies: &[OutboundMessage]) -> Vec<Vec<u8>> {
    replies.iter().filter_map(|r| r.enc.clone()).collect()
}

/// PCM carried by decode replies, concatenated.
pub(crate) fn samples_of(replies: &[OutboundMessage]) -> Vec<f32> {
    replies
        .iter()
        .filter_map(|r| r.dec.as_deref())
        .flatten()
        .copied()
        .collect()
}

/// Check that exactly one reply ends the stream and that it comes last.
pub(crate) fn assert_single_terminal(replies: &[OutboundMessage]) {
    assert!(replies.iter().all(|r| r.error.is_none()), "{replies:?}");
    assert_eq!(
        replies.iter().filter(|r| r.end == Some(true)).count(),
        1,
        "expected exactly one terminal reply"
    );
    assert_eq!(replies.last().and_then(|r| r.end), Some(true));
}
