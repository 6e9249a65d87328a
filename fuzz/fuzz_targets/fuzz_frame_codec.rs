//! Fuzz target for the length-delimited frame codec.
//!
//! Both connection ends must reject arbitrary bytes with an error, never a
//! panic, and keep making progress on the buffer.

#![no_main]

use abci_client::codec::{ClientCodec, ServerCodec};
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    let mut buffer = BytesMut::from(data);
    let mut server = ServerCodec::with_max_frame_size(64 * 1024);
    while let Ok(Some(_request)) = server.decode(&mut buffer) {}

    let mut buffer = BytesMut::from(data);
    let mut client = ClientCodec::with_max_frame_size(64 * 1024);
    while let Ok(Some(_response)) = client.decode(&mut buffer) {}
});
