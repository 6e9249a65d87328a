//! Length-delimited JSON framing.
//!
//! Format:
//! - 4 bytes: body length (big-endian)
//! - N bytes: JSON-encoded [`Frame`]

use abci_types::{Frame, Request, Response};
use bytes::{Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use std::marker::PhantomData;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Maximum frame size in bytes (16 MB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Errors that can occur while framing messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// I/O failure, including frames above [`MAX_FRAME_SIZE`].
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The frame body is not a valid message.
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encodes frames of `E` and decodes frames of `D`.
pub struct FrameCodec<E, D> {
    inner: LengthDelimitedCodec,
    _marker: PhantomData<fn(E) -> D>,
}

/// Codec for the client end of a connection.
pub type ClientCodec = FrameCodec<Request, Response>;

/// Codec for the server end of a connection.
pub type ServerCodec = FrameCodec<Response, Request>;

impl<E, D> FrameCodec<E, D> {
    /// Creates a codec limited to [`MAX_FRAME_SIZE`].
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    /// Creates a codec with a custom frame size limit.
    pub fn with_max_frame_size(max: usize) -> Self {
        Self {
            inner: LengthDelimitedCodec::builder()
                .max_frame_length(max)
                .big_endian()
                .length_field_length(4)
                .new_codec(),
            _marker: PhantomData,
        }
    }
}

impl<E, D> Default for FrameCodec<E, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Serialize, D> Encoder<Frame<E>> for FrameCodec<E, D> {
    type Error = CodecError;

    fn encode(&mut self, item: Frame<E>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = serde_json::to_vec(&item)?;
        self.inner.encode(Bytes::from(body), dst)?;
        Ok(())
    }
}

impl<E, D: DeserializeOwned> Decoder for FrameCodec<E, D> {
    type Item = Frame<D>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abci_types::{RequestEcho, ResponseEcho};
    use bytes::BufMut;

    #[test]
    fn test_request_crosses_codecs() {
        let mut client = ClientCodec::new();
        let mut server = ServerCodec::new();
        let mut buf = BytesMut::new();

        client
            .encode(Frame::new(7, Request::echo("hello")), &mut buf)
            .unwrap();
        let frame = server.decode(&mut buf).unwrap().unwrap();

        assert_eq!(frame.id, 7);
        assert_eq!(
            frame.body,
            Request::Echo(RequestEcho {
                message: "hello".into()
            })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame_waits_for_more() {
        let mut server = ServerCodec::new();
        let mut client = ClientCodec::new();
        let mut full = BytesMut::new();
        server
            .encode(
                Frame::new(
                    1,
                    Response::Echo(ResponseEcho {
                        message: "x".into(),
                    }),
                ),
                &mut full,
            )
            .unwrap();

        let mut partial = full.split_to(full.len() - 1);
        assert!(client.decode(&mut partial).unwrap().is_none());

        partial.unsplit(full);
        assert!(client.decode(&mut partial).unwrap().is_some());
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut codec = ServerCodec::with_max_frame_size(8);
        let mut buf = BytesMut::new();
        buf.put_u32(64);
        buf.put_slice(&[0u8; 64]);

        assert!(matches!(codec.decode(&mut buf), Err(CodecError::Io(_))));
    }

    #[test]
    fn test_malformed_body_rejected() {
        let mut codec = ServerCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u32(4);
        buf.put_slice(b"nope");

        assert!(matches!(codec.decode(&mut buf), Err(CodecError::Json(_))));
    }
}
