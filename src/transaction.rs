//! Optimistic transactions: `MULTI`, queued commands, then `EXEC` or
//! `DISCARD`, with `WATCH` for the optimistic lock.
//!
//! This is a thin sequencing layer over [`Connection::call`]; there is no
//! local state machine. Issuing these out of order is a caller error and
//! surfaces as whatever the server replies, not as a locally detected fault.
//! Like pipelining, transactions bypass the retry wrapper: replaying part of
//! a queued batch is not safe.

use crate::command::Command;
use crate::connection::Connection;
use crate::error::Error;
use crate::frame::Frame;
use crate::Result;

impl Connection {
    /// Opens a transaction block. The server acknowledges with `+OK`.
    pub async fn multi(&mut self) -> Result<()> {
        self.expect_ok(Command::new("MULTI")).await
    }

    /// Queues one command inside an open transaction. The server
    /// acknowledges each queued command with `+QUEUED`.
    pub async fn trans_send(&mut self, cmd: Command) -> Result<()> {
        match self.call(cmd).await? {
            Frame::Simple(ref s) if s == "QUEUED" => Ok(()),
            other => Err(Error::UnexpectedReply(other)),
        }
    }

    /// Executes the queued commands.
    ///
    /// `Ok(Some(results))` holds one result per queued command, in order.
    /// `Ok(None)` means the transaction was aborted — a watched key changed —
    /// which is a no-data condition, not an error.
    pub async fn trans_exec(&mut self) -> Result<Option<Vec<Frame>>> {
        match self.call(Command::new("EXEC")).await? {
            Frame::Array(results) => Ok(results),
            other => Err(Error::UnexpectedReply(other)),
        }
    }

    /// Drops the queued commands without executing them.
    pub async fn discard(&mut self) -> Result<()> {
        self.expect_ok(Command::new("DISCARD")).await
    }

    /// Marks `keys` for the optimistic lock: if any of them changes before
    /// `EXEC`, the transaction aborts.
    pub async fn watch(&mut self, keys: &[&str]) -> Result<()> {
        let mut cmd = Command::new("WATCH");
        for key in keys {
            cmd = cmd.arg(*key);
        }
        self.expect_ok(cmd).await
    }

    async fn expect_ok(&mut self, cmd: Command) -> Result<()> {
        match self.call(cmd).await? {
            Frame::Simple(ref s) if s == "OK" => Ok(()),
            other => Err(Error::UnexpectedReply(other)),
        }
    }
}
