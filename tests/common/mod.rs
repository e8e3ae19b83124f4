#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedReceiver};

/// Script for one accepted connection.
pub enum Session {
    /// Write these bytes, then hold the connection open until the client
    /// goes away. Whatever the client sent arrives on the capture channel
    /// once the connection closes.
    Reply(Vec<u8>),
    /// Write these bytes, then close without waiting for the client.
    ReplyThenHangup(Vec<u8>),
    /// Accept and immediately close.
    Hangup,
}

/// Stands up a scripted peer on an ephemeral port. Connections are served
/// in accept order, one session each.
pub async fn scripted_peer(sessions: Vec<Session>) -> (SocketAddr, UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for session in sessions {
            let socket = match listener.accept().await {
                Ok((socket, _)) => socket,
                Err(_) => return,
            };

            match session {
                Session::Hangup => drop(socket),
                Session::ReplyThenHangup(bytes) => {
                    tokio::spawn(async move {
                        let mut socket = socket;
                        let _ = socket.write_all(&bytes).await;
                        let _ = socket.flush().await;
                    });
                }
                Session::Reply(bytes) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let (mut reader, mut writer) = socket.into_split();

                        let write = async move {
                            let _ = writer.write_all(&bytes).await;
                            // Keep the write half open until the client side
                            // finishes, otherwise it sees an early EOF.
                            writer
                        };
                        let read = async move {
                            let mut received = Vec::new();
                            let _ = reader.read_to_end(&mut received).await;
                            received
                        };

                        let (_writer, received) = tokio::join!(write, read);
                        let _ = tx.send(received);
                    });
                }
            }
        }
    });

    (addr, rx)
}
