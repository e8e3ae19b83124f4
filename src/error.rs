use thiserror::Error as ThisError;

use crate::frame::{self, Frame};

/// Client-facing error type.
///
/// The variants split into two families, and the retry wrapper only ever
/// consults [`Error::is_transport`] to tell them apart:
///
/// * protocol-level — the exchange was well-formed but the server rejected it
///   or replied with something the caller did not expect. Retrying would
///   reproduce the same failure, so these are never retried.
/// * transport-level — the byte stream itself failed (dial, read/write,
///   deadline, desynced framing). The connection is discarded and the call
///   may be retried on a fresh one.
///
/// Absent data (a null bulk string or null array) is not an error at all; it
/// surfaces as `None` in the corresponding [`Frame`] payload.
#[derive(Debug, ThisError)]
pub enum Error {
    /// The server replied with an error frame (`-...`).
    #[error("server error: {0}")]
    Server(String),

    /// The reply decoded fine but was not the type or text expected, e.g. a
    /// `MULTI` acknowledgement that is not `+OK`.
    #[error("unexpected reply: {0}")]
    UnexpectedReply(Frame),

    /// Reply decoding failed.
    #[error("frame error: {0}")]
    Frame(#[from] frame::Error),

    /// A configured deadline fired before the operation finished.
    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The peer closed the connection mid-exchange.
    #[error("connection closed by peer")]
    ConnectionClosed,
}

impl Error {
    /// Whether the failure happened at the byte-stream level rather than the
    /// protocol level. Transport failures leave the connection unusable and
    /// are the only failures the retry wrapper acts on.
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Io(_) | Error::Timeout(_) | Error::ConnectionClosed => true,
            // A violated terminator means the stream is desynced; everything
            // else from the parser is a malformed-but-delimited reply.
            Error::Frame(err) => matches!(err, frame::Error::BadTerminator),
            Error::Server(_) | Error::UnexpectedReply(_) => false,
        }
    }
}
