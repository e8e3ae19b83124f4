use std::fmt;

use bytes::{Bytes, BytesMut};

/// Scratch size for rendering one length prefix: prefix byte, up to 20
/// decimal digits and the CRLF tail.
pub(crate) const SCRATCH_LEN: usize = 32;

/// One command argument, restricted to the closed set of encodable variants.
///
/// Every variant is rendered as a binary-safe bulk string at encode time.
/// Caller types outside this set go through [`Arg::display`].
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Int(i64),
    /// Encoded as the shortest decimal text that round-trips the value.
    Float(f64),
    Str(String),
    Bytes(Bytes),
    /// Encoded as `1` or `0`.
    Bool(bool),
    /// The absence value, encoded as the empty string.
    Null,
}

impl Arg {
    /// Fallback conversion for any other caller-supplied type: the value's
    /// `Display` text becomes the argument.
    pub fn display(value: impl fmt::Display) -> Arg {
        Arg::Str(value.to_string())
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Arg {
        Arg::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Arg {
        Arg::Int(value as i64)
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Arg {
        Arg::Int(value as i64)
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Arg {
        Arg::Float(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Arg {
        Arg::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Arg {
        Arg::Str(value)
    }
}

impl From<Bytes> for Arg {
    fn from(value: Bytes) -> Arg {
        Arg::Bytes(value)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(value: Vec<u8>) -> Arg {
        Arg::Bytes(Bytes::from(value))
    }
}

impl From<&[u8]> for Arg {
    fn from(value: &[u8]) -> Arg {
        Arg::Bytes(Bytes::copy_from_slice(value))
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Arg {
        Arg::Bool(value)
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Arg {
        match value {
            Some(value) => value.into(),
            None => Arg::Null,
        }
    }
}

/// A command verb plus its ordered arguments.
///
/// ```
/// use redlink::Command;
///
/// let cmd = Command::new("SET").arg("key").arg(42);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    name: String,
    args: Vec<Arg>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serializes the request: an array frame of `1 + args` bulk strings,
    /// verb first. The element count is fixed once the header is written;
    /// nothing after it can change the frame length.
    pub(crate) fn write_to(&self, buf: &mut BytesMut, scratch: &mut [u8; SCRATCH_LEN]) {
        write_len(buf, scratch, b'*', 1 + self.args.len());
        write_bulk(buf, scratch, self.name.as_bytes());

        for arg in &self.args {
            match arg {
                Arg::Int(n) => write_bulk(buf, scratch, n.to_string().as_bytes()),
                Arg::Float(x) => write_bulk(buf, scratch, x.to_string().as_bytes()),
                Arg::Str(s) => write_bulk(buf, scratch, s.as_bytes()),
                Arg::Bytes(b) => write_bulk(buf, scratch, b),
                Arg::Bool(true) => write_bulk(buf, scratch, b"1"),
                Arg::Bool(false) => write_bulk(buf, scratch, b"0"),
                Arg::Null => write_bulk(buf, scratch, b""),
            }
        }
    }

    /// Encoded wire form, for callers that do not hold a connection.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        let mut scratch = [0u8; SCRATCH_LEN];
        self.write_to(&mut buf, &mut scratch);
        buf.to_vec()
    }
}

/// `$<len>\r\n<data>\r\n`
fn write_bulk(buf: &mut BytesMut, scratch: &mut [u8; SCRATCH_LEN], data: &[u8]) {
    write_len(buf, scratch, b'$', data.len());
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}

/// Renders `<prefix><len>\r\n` by writing digits right-to-left into the
/// scratch buffer, so length prefixes cost no allocation.
fn write_len(buf: &mut BytesMut, scratch: &mut [u8; SCRATCH_LEN], prefix: u8, len: usize) {
    let mut pos = SCRATCH_LEN - 1;
    scratch[pos] = b'\n';
    pos -= 1;
    scratch[pos] = b'\r';

    let mut n = len;
    loop {
        pos -= 1;
        scratch[pos] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }

    pos -= 1;
    scratch[pos] = prefix;
    buf.extend_from_slice(&scratch[pos..]);
}
