#![no_main]

use gateway_protocol::core::packet::RawPacket;
use gateway_protocol::protocol::registry::PacketRegistry;
use gateway_protocol::protocol::Stage;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };
    let stage = match selector % 4 {
        0 => Stage::Handshake,
        1 => Stage::Status,
        2 => Stage::Login,
        _ => Stage::Play,
    };
    let id = i32::from(selector >> 2);
    let _ = PacketRegistry::global().decode(stage, RawPacket::new(id, rest.to_vec()));
});
