#![no_main]

use bytes::BytesMut;
use gateway_protocol::core::codec::FrameCodec;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Frame reassembly with compression on: no panics, no runaway allocation
    let mut codec = FrameCodec::new();
    let _ = codec.enable_compression(256);
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
