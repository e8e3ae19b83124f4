//! Pipelining: send many requests before reading any reply, then read all
//! replies back in submission order.
//!
//! Pipelined batches bypass the retry wrapper on purpose. A failure halfway
//! through a batch leaves the stream in an indeterminate framing state, so
//! the batch cannot be replayed safely; the caller discards the connection
//! instead.

use std::time::Instant;

use tracing::debug;

use crate::command::Command;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::Result;

impl Connection {
    /// Encodes and buffers one request without flushing it. May be called
    /// any number of times before [`Connection::pipe_exec`].
    pub fn pipe_send(&mut self, cmd: Command) {
        cmd.write_to(&mut self.write_buffer, &mut self.scratch);
        self.pipe_count += 1;
    }

    /// Flushes every buffered request in one write, then decodes exactly as
    /// many replies, in the order the requests were sent.
    ///
    /// On the first failure the remaining replies are left undecoded and the
    /// pending count is already reset; treat the whole batch as failed and
    /// discard the connection.
    pub async fn pipe_exec(&mut self) -> Result<Vec<Frame>> {
        self.last_active = Instant::now();
        self.flush().await?;

        let pending = self.pipe_count;
        self.pipe_count = 0;

        debug!(conn = %self.id(), pending, "executing pipeline");

        let mut replies = Vec::with_capacity(pending);
        for _ in 0..pending {
            replies.push(self.read_reply().await?);
        }

        Ok(replies)
    }
}
