use std::io::Cursor;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::Error;
use crate::frame::{self, Frame};

/// Hard cap on a single reply frame, to bound memory against a misbehaving
/// peer. Matches the server-side default of 512 MB.
const MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Streaming reply decoder: feeds buffered bytes through [`Frame::parse`] and
/// consumes exactly one frame's worth on success.
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() > MAX_FRAME_SIZE {
            return Err(frame::Error::BadTerminator.into());
        }

        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            // Not enough data to parse a frame.
            Err(frame::Error::Incomplete) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        // The cursor never moves past the end of the buffer.
        let position = cursor.position() as usize;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }
}
