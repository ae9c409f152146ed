#![no_main]

use beacon_fountain::wire::{Packet, PacketHeader};
use libfuzzer_sys::fuzz_target;

/// Packet parsing must never panic; anything it accepts must re-encode to
/// the same bytes.
fuzz_target!(|data: &[u8]| {
    let mut buf = data;
    let _ = PacketHeader::decode(&mut buf);

    if let Ok(packet) = Packet::parse(data) {
        assert_eq!(&packet.encode()[..], data);
    }
});
