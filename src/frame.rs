// https://redis.io/docs/reference/protocol-spec

use std::fmt;
use std::io::Cursor;
use std::string::FromUtf8Error;

use bytes::{Buf, Bytes};
use itertools::Itertools;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    /// A line or bulk payload without its two-byte CRLF tail. The stream is
    /// desynced once this happens, so the connection cannot be reused.
    #[error("invalid frame terminator")]
    BadTerminator,
    #[error("invalid integer: {0}")]
    InvalidInteger(String),
    /// Invalid message encoding.
    #[error("invalid frame encoding")]
    InvalidUtf8,
}

/// One reply from the server.
///
/// Null bulk strings (`$-1`) and null arrays (`*-1`) carry `None` payloads;
/// absent data is a value, not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Option<Vec<Frame>>),
}

impl Frame {
    /// Parses one frame out of `src`, advancing the cursor past it.
    ///
    /// Returns [`Error::Incomplete`] when the buffer does not yet hold a full
    /// frame; the caller reads more bytes and tries again. Every other error
    /// is terminal. The parser is total over arbitrary input: no byte
    /// sequence makes it panic.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in a RESP-serialized payload always identifies its
        // type. Subsequent bytes constitute the type's contents.
        let first_byte = get_byte(src)?;

        match first_byte {
            b'+' => {
                let bytes = get_line(src)?.to_vec();
                Ok(Frame::Simple(String::from_utf8(bytes)?))
            }
            b'-' => {
                let bytes = get_line(src)?.to_vec();
                Ok(Frame::Error(String::from_utf8(bytes)?))
            }
            b':' => {
                let integer = parse_int(get_line(src)?)?;
                Ok(Frame::Integer(integer))
            }
            // $<length>\r\n<data>\r\n
            b'$' => {
                let length = parse_int(get_line(src)?)?;

                if length == -1 {
                    return Ok(Frame::Bulk(None));
                }

                let length = usize::try_from(length)
                    .map_err(|_| Error::InvalidInteger(length.to_string()))?;

                if src.remaining() < length + CRLF.len() {
                    return Err(Error::Incomplete);
                }

                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + length]);
                let tail = &src.get_ref()[start + length..start + length + CRLF.len()];
                let terminated = tail == CRLF;
                src.advance(length + CRLF.len());

                if !terminated {
                    return Err(Error::BadTerminator);
                }

                Ok(Frame::Bulk(Some(data)))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            b'*' => {
                let count = parse_int(get_line(src)?)?;

                if count == -1 {
                    return Ok(Frame::Array(None));
                }

                let count = usize::try_from(count)
                    .map_err(|_| Error::InvalidInteger(count.to_string()))?;

                let mut frames = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    frames.push(Self::parse(src)?);
                }

                Ok(Frame::Array(Some(frames)))
            }
            byte => Err(Error::InvalidDataType(byte)),
        }
    }

    /// Parses a frame from a buffer expected to hold it in full.
    ///
    /// Unlike [`Frame::parse`] there is no "read more" escape hatch here: a
    /// buffer that runs out before the frame is delimited is a terminator
    /// violation.
    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(buf);
        match Self::parse(&mut cursor) {
            Err(Error::Incomplete) => Err(Error::BadTerminator),
            other => other,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Frame::Simple(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(b'+');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Error(s) => {
                let mut bytes = Vec::with_capacity(1 + s.len() + CRLF.len());
                bytes.push(b'-');
                bytes.extend_from_slice(s.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Integer(i) => {
                let digits = i.to_string();
                let mut bytes = Vec::with_capacity(1 + digits.len() + CRLF.len());
                bytes.push(b':');
                bytes.extend_from_slice(digits.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Bulk(Some(data)) => {
                let length = data.len().to_string();
                let mut bytes =
                    Vec::with_capacity(1 + length.len() + CRLF.len() * 2 + data.len());
                bytes.push(b'$');
                bytes.extend_from_slice(length.as_bytes());
                bytes.extend_from_slice(CRLF);
                bytes.extend_from_slice(data);
                bytes.extend_from_slice(CRLF);
                bytes
            }
            Frame::Bulk(None) => b"$-1\r\n".to_vec(),
            Frame::Array(Some(frames)) => {
                let count = frames.len().to_string();
                let mut bytes = Vec::with_capacity(1 + count.len() + CRLF.len());
                bytes.push(b'*');
                bytes.extend_from_slice(count.as_bytes());
                bytes.extend_from_slice(CRLF);
                for frame in frames {
                    bytes.extend(frame.serialize());
                }
                bytes
            }
            Frame::Array(None) => b"*-1\r\n".to_vec(),
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "{}", s),
            Frame::Error(s) => write!(f, "(error) {}", s),
            Frame::Integer(i) => write!(f, "(integer) {}", i),
            Frame::Bulk(Some(data)) => write!(f, "\"{}\"", String::from_utf8_lossy(data)),
            Frame::Bulk(None) | Frame::Array(None) => write!(f, "(nil)"),
            Frame::Array(Some(frames)) => write!(f, "[{}]", frames.iter().join(", ")),
        }
    }
}

/// Scans for the next CRLF and returns the line before it, consuming the
/// terminator. [`Error::Incomplete`] if no CRLF is in the buffer yet.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let end = src.get_ref().len();

    let line_end = src.get_ref()[start..end]
        .windows(CRLF.len())
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((line_end + CRLF.len()) as u64);

    Ok(&src.get_ref()[start..line_end])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

fn parse_int(line: &[u8]) -> Result<i64, Error> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Error::InvalidInteger(String::from_utf8_lossy(line).into_owned()))
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        Error::InvalidUtf8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn parse_simple_string_frame() {
        let frame = Frame::decode(b"+OK\r\n");

        assert!(matches!(frame, Ok(Frame::Simple(ref s)) if s == "OK"));
    }

    #[test]
    fn parse_error_frame() {
        let frame = Frame::decode(b"-Error message\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Error(ref s)) if s == "Error message"
        ));
    }

    fn parse_integer_frame(data: &[u8], expected: i64) {
        let frame = Frame::decode(data);

        assert!(matches!(frame, Ok(Frame::Integer(i)) if i == expected));
    }

    #[test]
    fn parse_integer_frame_positive() {
        parse_integer_frame(b":1000\r\n", 1000);
    }

    #[test]
    fn parse_integer_frame_negative() {
        parse_integer_frame(b":-1000\r\n", -1000);
    }

    #[test]
    fn parse_integer_frame_zero() {
        parse_integer_frame(b":0\r\n", 0);
    }

    #[test]
    fn parse_bulk_string_frame() {
        let frame = Frame::decode(b"$6\r\nfoobar\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(Some(ref b))) if b == &Bytes::from("foobar")
        ));
    }

    #[test]
    fn parse_bulk_string_frame_empty() {
        let frame = Frame::decode(b"$0\r\n\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(Some(ref b))) if b.is_empty()
        ));
    }

    #[test]
    fn parse_bulk_string_frame_null() {
        let frame = Frame::decode(b"$-1\r\n");

        assert!(matches!(frame, Ok(Frame::Bulk(None))));
    }

    #[test]
    fn parse_bulk_string_frame_binary() {
        // Embedded CRLF must not confuse the length-prefixed read.
        let frame = Frame::decode(b"$7\r\na\r\nb\x00\xffc\r\n");

        assert!(matches!(
            frame,
            Ok(Frame::Bulk(Some(ref b))) if b == &Bytes::from_static(b"a\r\nb\x00\xffc")
        ));
    }

    #[test]
    fn parse_bulk_string_frame_bad_terminator() {
        // Payload followed by two bytes that are not CRLF.
        let frame = Frame::decode(b"$3\r\nfooXX");

        assert!(matches!(frame, Err(Error::BadTerminator)));
    }

    #[test]
    fn parse_array_frame_empty() {
        let frame = Frame::decode(b"*0\r\n");

        assert!(matches!(frame, Ok(Frame::Array(Some(ref a))) if a.is_empty()));
    }

    #[test]
    fn parse_array_frame() {
        let frame = Frame::decode(b"*2\r\n$5\r\nhello\r\n$5\r\nworld\r\n").unwrap();

        assert_eq!(
            frame,
            Frame::Array(Some(vec![
                Frame::Bulk(Some(Bytes::from("hello"))),
                Frame::Bulk(Some(Bytes::from("world"))),
            ]))
        );
    }

    #[test]
    fn parse_array_frame_nested() {
        let data = b"*2\r\n*3\r\n:1\r\n:2\r\n:3\r\n*2\r\n+Hello\r\n-World\r\n";
        let frame = Frame::decode(data).unwrap();

        assert_eq!(
            frame,
            Frame::Array(Some(vec![
                Frame::Array(Some(vec![
                    Frame::Integer(1),
                    Frame::Integer(2),
                    Frame::Integer(3),
                ])),
                Frame::Array(Some(vec![
                    Frame::Simple("Hello".to_string()),
                    Frame::Error("World".to_string()),
                ])),
            ]))
        );
    }

    #[test]
    fn parse_array_frame_deeply_nested() {
        let data = b"*1\r\n*1\r\n*2\r\n$3\r\nkey\r\n:42\r\n";
        let frame = Frame::decode(data).unwrap();

        assert_eq!(
            frame,
            Frame::Array(Some(vec![Frame::Array(Some(vec![Frame::Array(Some(
                vec![Frame::Bulk(Some(Bytes::from("key"))), Frame::Integer(42)]
            ))]))]))
        );
    }

    #[test]
    fn parse_array_frame_null() {
        let frame = Frame::decode(b"*-1\r\n");

        assert!(matches!(frame, Ok(Frame::Array(None))));
    }

    #[test]
    fn parse_array_frame_null_in_the_middle() {
        let data = b"*3\r\n$5\r\nhello\r\n$-1\r\n$5\r\nworld\r\n";
        let frame = Frame::decode(data).unwrap();

        assert_eq!(
            frame,
            Frame::Array(Some(vec![
                Frame::Bulk(Some(Bytes::from("hello"))),
                Frame::Bulk(None),
                Frame::Bulk(Some(Bytes::from("world"))),
            ]))
        );
    }

    #[test]
    fn parse_missing_terminator() {
        let frame = Frame::decode(b":1000");

        assert!(matches!(frame, Err(Error::BadTerminator)));
    }

    #[test]
    fn parse_unknown_data_type() {
        let frame = Frame::decode(b"%2\r\n");

        assert!(matches!(frame, Err(Error::InvalidDataType(b'%'))));
    }

    #[test]
    fn parse_invalid_integer() {
        let frame = Frame::decode(b":10x0\r\n");

        assert!(matches!(frame, Err(Error::InvalidInteger(_))));
    }

    #[test]
    fn parse_incomplete_frame() {
        let mut cursor = Cursor::new(&b"$5\r\nhel"[..]);
        let frame = Frame::parse(&mut cursor);

        assert!(matches!(frame, Err(Error::Incomplete)));
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let frames = vec![
            Frame::Simple("PONG".to_string()),
            Frame::Error("ERR wrong number of arguments".to_string()),
            Frame::Integer(-7),
            Frame::Bulk(Some(Bytes::from("with\r\nnewlines"))),
            Frame::Bulk(None),
            Frame::Array(None),
            Frame::Array(Some(vec![
                Frame::Integer(1),
                Frame::Array(Some(vec![Frame::Bulk(Some(Bytes::from("deep")))])),
            ])),
        ];

        for frame in frames {
            let bytes = frame.serialize();
            assert_eq!(Frame::decode(&bytes).unwrap(), frame);
        }
    }

    #[test]
    fn serialize_then_parse_random_binary_bulk() {
        let mut rng = rand::thread_rng();

        for len in [0usize, 1, 2, 64, 1024] {
            let mut payload = vec![0u8; len];
            rng.fill_bytes(&mut payload);

            let frame = Frame::Bulk(Some(Bytes::from(payload)));
            let bytes = frame.serialize();
            assert_eq!(Frame::decode(&bytes).unwrap(), frame);
        }
    }
}
