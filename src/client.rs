//! Minimal client transport for the multiplayer protocol.
//!
//! The presentation layer drives this; the only timeout in the system is
//! the connection-establishment one here. Reads block until a complete
//! record arrives.

use log::{debug, info};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use uuid::Uuid;

use crate::protocol::{ClientMessage, FrameDecoder, ServerMessage};

const READ_BUF: usize = 4096;

pub struct SudokuClient {
    stream: TcpStream,
    decoder: FrameDecoder,
    player_id: Uuid,
}

impl SudokuClient {
    /// Connects within `connect_timeout` and waits for the server's
    /// identity assignment.
    pub async fn connect(addr: &str, connect_timeout: Duration) -> io::Result<Self> {
        let stream = timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(io::ErrorKind::TimedOut, format!("connecting to {}", addr))
            })??;

        let mut client = Self {
            stream,
            decoder: FrameDecoder::new(),
            player_id: Uuid::nil(),
        };
        match client.recv().await? {
            ServerMessage::ConnectedAck { player_id } => {
                info!("connected to {} as {}", addr, player_id);
                client.player_id = player_id;
                Ok(client)
            }
            other => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected connected_ack, got {:?}", other),
            )),
        }
    }

    /// The identity the server assigned to this connection.
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> io::Result<()> {
        let bytes = serde_json::to_vec(msg)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        debug!("client {} -> {:?}", self.player_id, msg);
        self.stream.write_all(&bytes).await
    }

    /// Reads until one complete server message is available.
    pub async fn recv(&mut self) -> io::Result<ServerMessage> {
        let mut buf = [0u8; READ_BUF];
        loop {
            match self.decoder.next_record() {
                Ok(Some(record)) => {
                    return serde_json::from_value(record)
                        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err));
                }
                Ok(None) => {}
                Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
            }

            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "server closed the connection",
                ));
            }
            self.decoder.push(&buf[..n]);
        }
    }
}
