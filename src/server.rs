//! TCP front end: accept loop, one reader task and one writer task per
//! connection, ordered shutdown.

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::protocol::{self, ClientMessage, FrameDecoder, ServerMessage};
use crate::registry::GameRegistry;
use crate::room::Outbound;

const READ_BUF: usize = 4096;

/// Every live connection's outbound queue, for shutdown notices.
type Connections = Arc<Mutex<HashMap<Uuid, Outbound>>>;

enum Flow {
    Continue,
    Quit,
}

pub struct SudokuServer {
    listener: TcpListener,
    registry: Arc<GameRegistry>,
    connections: Connections,
}

impl SudokuServer {
    pub async fn bind(host: &str, port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;
        info!("server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            registry: Arc::new(GameRegistry::new()),
            connections: Connections::default(),
        })
    }

    /// The actually bound address; useful when the port was 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn registry(&self) -> Arc<GameRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accepts connections until `shutdown` resolves. Shutdown is
    /// cooperative: stop accepting, notify every room, then drop the
    /// listener; live connection tasks exit on their next read.
    pub async fn run<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => self.accept_connection(socket, peer).await,
                        Err(err) => {
                            error!("accept failed: {}", err);
                        }
                    }
                }
            }
        }

        info!("server shutting down, notifying clients and active games");
        {
            let connections = self.connections.lock().await;
            for tx in connections.values() {
                let _ = tx.send(ServerMessage::Message {
                    text: "Server shutting down...".to_string(),
                });
            }
        }
        self.registry.shutdown_notice().await;
        drop(self.listener);
        info!("server closed");
        Ok(())
    }

    async fn accept_connection(&self, socket: TcpStream, peer: SocketAddr) {
        let player_id = Uuid::new_v4();
        info!("new connection from {}, player {}", peer, player_id);

        let (read_half, write_half) = socket.into_split();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(write_outbound(write_half, rx));

        // The ack assigns the connection its identity before any command
        // is read.
        let _ = tx.send(ServerMessage::ConnectedAck { player_id });
        self.connections.lock().await.insert(player_id, tx.clone());

        let registry = Arc::clone(&self.registry);
        let connections = Arc::clone(&self.connections);
        tokio::spawn(async move {
            handle_client(registry, read_half, tx, player_id).await;
            connections.lock().await.remove(&player_id);
        });
    }
}

/// Drains the connection's outbound queue onto the socket. Ends when the
/// last sender is dropped or the peer stops accepting writes.
async fn write_outbound(mut write: OwnedWriteHalf, mut rx: UnboundedReceiver<ServerMessage>) {
    while let Some(msg) = rx.recv().await {
        let bytes = protocol::encode(&msg);
        if write.write_all(&bytes).await.is_err() {
            break;
        }
    }
    let _ = write.shutdown().await;
}

/// Per-connection read loop: frame, parse, dispatch. Any exit path runs the
/// same room-leave cleanup, so a peer reset and a polite `quit` look the
/// same to the room.
async fn handle_client(
    registry: Arc<GameRegistry>,
    mut read: OwnedReadHalf,
    tx: Outbound,
    player_id: Uuid,
) {
    let mut decoder = FrameDecoder::new();
    let mut current_game: Option<String> = None;
    let mut buf = [0u8; READ_BUF];

    'connection: loop {
        let n = match read.read(&mut buf).await {
            Ok(0) => {
                info!("player {} disconnected", player_id);
                break;
            }
            Ok(n) => n,
            Err(err) => {
                warn!("read error for player {}: {}", player_id, err);
                break;
            }
        };
        decoder.push(&buf[..n]);

        loop {
            match decoder.next_record() {
                Ok(Some(record)) => match protocol::parse_client_message(record) {
                    Ok(msg) => {
                        debug!("player {} -> {:?}", player_id, msg);
                        let flow =
                            dispatch(&registry, &tx, player_id, &mut current_game, msg).await;
                        if matches!(flow, Flow::Quit) {
                            info!("player {} quit", player_id);
                            break 'connection;
                        }
                    }
                    Err(err) => {
                        warn!("player {} sent an unknown command: {}", player_id, err);
                        let _ = tx.send(ServerMessage::Error {
                            message: "Unrecognized or malformed command.".to_string(),
                        });
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    // Framing is lost; nothing sensible can follow.
                    warn!("player {}: {}", player_id, err);
                    break 'connection;
                }
            }
        }
    }

    if let Some(game_id) = current_game {
        registry.drop_player(&game_id, player_id).await;
    }
    // Dropping `tx` lets the writer task drain and exit.
}

async fn dispatch(
    registry: &GameRegistry,
    tx: &Outbound,
    player_id: Uuid,
    current_game: &mut Option<String>,
    msg: ClientMessage,
) -> Flow {
    match msg {
        ClientMessage::CreateGame { difficulty, .. } => {
            // Creating while in a room implicitly leaves the old one.
            if let Some(old) = current_game.take() {
                registry.drop_player(&old, player_id).await;
            }
            let game_id = registry.create_game(difficulty, player_id, tx.clone()).await;
            let _ = tx.send(ServerMessage::Message {
                text: format!("Game {} created. Waiting for another player...", game_id),
            });
            *current_game = Some(game_id);
            Flow::Continue
        }
        ClientMessage::JoinGame { game_id, .. } => {
            match registry.join_game(&game_id, player_id, tx.clone()).await {
                Ok(()) => {
                    // Switching rooms leaves the old one, same as create. A
                    // join into the current room fails as a duplicate, so
                    // `old` is never the room just joined.
                    if let Some(old) = current_game.take() {
                        registry.drop_player(&old, player_id).await;
                    }
                    *current_game = Some(game_id);
                }
                Err(err) => {
                    let _ = tx.send(ServerMessage::Error {
                        message: err.to_string(),
                    });
                }
            }
            Flow::Continue
        }
        // The connection's own identity is authoritative; the identity and
        // room fields on the wire are informational.
        ClientMessage::MakeMove { row, col, number, .. } => {
            let Some(game_id) = current_game.clone() else {
                let _ = tx.send(ServerMessage::Error {
                    message: "You are not in a game.".to_string(),
                });
                return Flow::Continue;
            };
            let Some(room) = registry.room(&game_id).await else {
                // The recorded room is stale (already deleted).
                *current_game = None;
                let _ = tx.send(ServerMessage::Error {
                    message: "You are not in a game.".to_string(),
                });
                return Flow::Continue;
            };

            let result = {
                let mut room = room.lock().await;
                room.apply_move(player_id, row, col, number)
            };
            if let Err(err) = result {
                let _ = tx.send(ServerMessage::MoveRejected {
                    reason: err.to_string(),
                });
            }
            Flow::Continue
        }
        ClientMessage::Quit => Flow::Quit,
    }
}
