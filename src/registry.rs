//! Process-wide table of active rooms.
//!
//! The table has its own lock, independent of the per-room locks, so a
//! lookup never waits on a long-running move in some other room.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::Difficulty;
use crate::room::{GameRoom, JoinError, Outbound};

/// Why a room could not be entered through the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    NotFound,
    Room(JoinError),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotFound => f.write_str("Game ID does not exist."),
            RegistryError::Room(err) => err.fmt(f),
        }
    }
}

#[derive(Default)]
pub struct GameRegistry {
    games: Mutex<HashMap<String, Arc<Mutex<GameRoom>>>>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room with a fresh puzzle and the creator already joined.
    /// Returns the allocated room id.
    pub async fn create_game(
        &self,
        difficulty: Difficulty,
        player_id: Uuid,
        tx: Outbound,
    ) -> String {
        let mut games = self.games.lock().await;
        let game_id = loop {
            let candidate = short_game_id();
            if !games.contains_key(&candidate) {
                break candidate;
            }
            // 8 hex chars collide rarely; just draw again.
            warn!("room id collision, regenerating");
        };

        let mut room = GameRoom::new(game_id.clone(), difficulty);
        // The creator's join cannot fail in an empty room.
        let _ = room.join(player_id, tx);
        games.insert(game_id.clone(), Arc::new(Mutex::new(room)));
        info!(
            "registry: game {} created by {} ({} active)",
            game_id,
            player_id,
            games.len()
        );
        game_id
    }

    /// Joins an existing room, mapping the failure modes to reasons.
    pub async fn join_game(
        &self,
        game_id: &str,
        player_id: Uuid,
        tx: Outbound,
    ) -> Result<(), RegistryError> {
        let room = self.room(game_id).await.ok_or(RegistryError::NotFound)?;
        let mut room = room.lock().await;
        room.join(player_id, tx).map_err(RegistryError::Room)
    }

    /// Looks up a room for move routing.
    pub async fn room(&self, game_id: &str) -> Option<Arc<Mutex<GameRoom>>> {
        self.games.lock().await.get(game_id).cloned()
    }

    /// Forwards a leave and deletes the room once it reports empty.
    pub async fn drop_player(&self, game_id: &str, player_id: Uuid) {
        let Some(room) = self.room(game_id).await else {
            debug!("registry: drop_player on unknown game {}", game_id);
            return;
        };

        let empty = {
            let mut room = room.lock().await;
            room.leave(player_id)
        };
        if empty {
            let mut games = self.games.lock().await;
            games.remove(game_id);
            info!(
                "registry: game {} removed ({} active)",
                game_id,
                games.len()
            );
        }
    }

    /// Closes every room: best-effort cancellation notice to each
    /// participant, the match marked finished, the table emptied.
    pub async fn shutdown_notice(&self) {
        let rooms: Vec<_> = {
            let mut games = self.games.lock().await;
            games.drain().collect()
        };
        for (game_id, room) in rooms {
            let mut room = room.lock().await;
            room.notify(format!("Game {} cancelled: server shutting down.", game_id));
            room.close();
            info!("registry: game {} closed", game_id);
        }
    }

    pub async fn active_games(&self) -> usize {
        self.games.lock().await.len()
    }
}

/// Short room identifier: the first 8 hex characters of a v4 UUID.
fn short_game_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
