use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use socket2::SockRef;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time;
use tokio_util::codec::Decoder;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::command::{Command, SCRATCH_LEN};
use crate::error::Error;
use crate::frame::Frame;
use crate::pool::Pool;
use crate::Result;

/// Connection configuration. A zero duration disables that bound.
#[derive(Clone, Debug)]
pub struct Config {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    /// Sets SO_KEEPALIVE on the dialed socket.
    pub keep_alive: bool,
    /// When present, `AUTH` is issued as part of the dial.
    pub password: Option<String>,
    /// Fixed pause between attempts in [`Connection::call_with_retry`].
    pub retry_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connect_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            keep_alive: false,
            password: None,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

/// One live connection to the server.
///
/// A connection is single-writer, single-reader: `&mut self` on every
/// operation is the concurrency policy. Callers that want parallelism open
/// more connections instead of sharing one.
pub struct Connection {
    id: Uuid,
    stream: TcpStream,
    codec: FrameCodec,
    // Data is read from the socket into the read buffer. When a frame is
    // parsed, the corresponding data is removed from the buffer.
    read_buffer: BytesMut,
    // Requests are encoded here and go out in one flush.
    pub(crate) write_buffer: BytesMut,
    // Reused for rendering length prefixes, never grows.
    pub(crate) scratch: [u8; SCRATCH_LEN],
    /// Requests buffered by `pipe_send` and not yet flushed.
    pub(crate) pipe_count: usize,
    pub(crate) last_active: Instant,
    pub(crate) config: Config,
    pub(crate) pool: Option<Arc<dyn Pool>>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("pipe_count", &self.pipe_count)
            .field("last_active", &self.last_active)
            .field("config", &self.config)
            .field("pool", &self.pool.as_ref().map(|_| "Pool"))
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Connects with the configured connect timeout, applies keep-alive, and
    /// authenticates when a password is configured. `pool` is the pool this
    /// connection belongs to, if any.
    pub async fn dial(
        addr: impl ToSocketAddrs,
        config: Config,
        pool: Option<Arc<dyn Pool>>,
    ) -> Result<Connection> {
        let stream =
            io_timeout("connect", config.connect_timeout, TcpStream::connect(addr)).await?;

        if config.keep_alive {
            SockRef::from(&stream).set_keepalive(true)?;
        }

        let mut conn = Connection {
            id: Uuid::new_v4(),
            stream,
            codec: FrameCodec,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
            scratch: [0; SCRATCH_LEN],
            pipe_count: 0,
            last_active: Instant::now(),
            config,
            pool,
        };

        debug!(conn = %conn.id, "connected");

        if let Some(password) = conn.config.password.clone() {
            conn.auth(&password).await?;
        }

        Ok(conn)
    }

    /// `AUTH <password>`; any reply but `+OK` fails the dial.
    async fn auth(&mut self, password: &str) -> Result<()> {
        match self.call(Command::new("AUTH").arg(password)).await? {
            Frame::Simple(ref s) if s == "OK" => Ok(()),
            other => Err(Error::UnexpectedReply(other)),
        }
    }

    /// One request/response exchange: encode, flush under the write deadline,
    /// then block until a full reply decodes under the read deadline.
    pub async fn call(&mut self, cmd: Command) -> Result<Frame> {
        self.last_active = Instant::now();
        if let Some(pool) = &self.pool {
            pool.record_call();
        }

        debug!(conn = %self.id, command = cmd.name(), "call");

        cmd.write_to(&mut self.write_buffer, &mut self.scratch);
        self.flush().await?;

        self.read_reply().await
    }

    /// [`Connection::call`] in a bounded retry loop.
    ///
    /// A protocol-level failure (the server said no) returns immediately;
    /// retrying would reproduce it. A transport failure closes this
    /// connection, waits the configured backoff, and replaces `self` with a
    /// fresh connection from the pool before the next attempt. Without a
    /// pool, or when the pool comes up empty, the last error is returned.
    /// Each attempt is an independent request; a partially written frame is
    /// never resumed.
    pub async fn call_with_retry(&mut self, max_attempts: u32, cmd: Command) -> Result<Frame> {
        let mut attempt = 0;

        loop {
            let err = match self.call(cmd.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(err) if !err.is_transport() => return Err(err),
                Err(err) => err,
            };

            self.close().await;
            attempt += 1;

            if attempt >= max_attempts {
                return Err(err);
            }

            warn!(
                conn = %self.id,
                attempt,
                error = %err,
                "transport failure, retrying on a fresh connection"
            );
            time::sleep(self.config.retry_backoff).await;

            let pool = match &self.pool {
                Some(pool) => pool.clone(),
                None => return Err(err),
            };
            match pool.acquire() {
                Some(replacement) => *self = replacement,
                None => return Err(err),
            }
        }
    }

    /// Shuts the socket down. The connection is never reused after this.
    pub async fn close(&mut self) {
        debug!(conn = %self.id, "closing connection");
        let _ = self.stream.shutdown().await;
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// When this connection last started a call or batch.
    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    /// Writes out everything buffered, bounded by the write deadline.
    pub(crate) async fn flush(&mut self) -> Result<()> {
        let timeout = self.config.write_timeout;
        let fut = self.stream.write_all_buf(&mut self.write_buffer);
        io_timeout("write", timeout, fut).await?;
        Ok(())
    }

    /// Decodes one reply, turning a top-level error frame into
    /// [`Error::Server`]. Error frames nested inside arrays stay values.
    pub(crate) async fn read_reply(&mut self) -> Result<Frame> {
        match self.read_frame().await? {
            Frame::Error(message) => Err(Error::Server(message)),
            frame => Ok(frame),
        }
    }

    /// Reads until the codec yields one full frame, each read bounded by the
    /// read deadline.
    async fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buffer)? {
                return Ok(frame);
            }

            let timeout = self.config.read_timeout;
            let fut = self.stream.read_buf(&mut self.read_buffer);
            let n = io_timeout("read", timeout, fut).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

/// Bounds an I/O future by `timeout`; zero disables the bound. Expiry is a
/// transport error and the connection must be discarded by the caller.
async fn io_timeout<T>(
    op: &'static str,
    timeout: Duration,
    fut: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    if timeout.is_zero() {
        return Ok(fut.await?);
    }

    match time::timeout(timeout, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout(op)),
    }
}
