#![no_main]

use beacon_fountain::{Decoder, DecoderState};
use libfuzzer_sys::fuzz_target;

/// Feed arbitrary frames to a decoder. The input is split on a 2-byte
/// big-endian length prefix so one run can deliver several packets.
fuzz_target!(|data: &[u8]| {
    let mut decoder = Decoder::new();
    let _handle = decoder.decode();

    let mut rest = data;
    while rest.len() >= 2 {
        let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        rest = &rest[2..];
        let frame = &rest[..len.min(rest.len())];
        rest = &rest[frame.len()..];
        let _ = decoder.enqueue(frame);
        if decoder.state() != DecoderState::Decoding {
            break;
        }
    }
});
