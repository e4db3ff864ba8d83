//! One multiplayer match: roster, turn pointer, authoritative board.
//!
//! All mutation of shared match state goes through this type. The server
//! wraps each room in its own `Mutex`, so `join`, `apply_move` and `leave`
//! are serialized per room; outbound traffic is queued on per-connection
//! channels and never blocks under that lock.

use log::{debug, info};
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::board::{self, Board, FixedMask, SIZE};
use crate::engine::{self, Difficulty};
use crate::protocol::ServerMessage;

/// Per-connection outbound queue. The writer task on the other end drains
/// it onto the socket.
pub type Outbound = mpsc::UnboundedSender<ServerMessage>;

pub const MAX_PLAYERS: usize = 2;

/// Why a join request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    Finished,
    AlreadyJoined,
    Full,
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            JoinError::Finished => "The game has already started or finished.",
            JoinError::AlreadyJoined => "You are already in this room.",
            JoinError::Full => "The room is full.",
        };
        f.write_str(reason)
    }
}

/// Why a move was rejected. The `Display` string is what the mover sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    GameOver,
    NotYourTurn,
    OutOfBounds,
    FixedCell,
    InvalidNumber,
    IncorrectNumber,
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            MoveError::GameOver => "The game is already over.",
            MoveError::NotYourTurn => "It's not your turn.",
            MoveError::OutOfBounds => "Invalid coordinates.",
            MoveError::FixedCell => "Fixed cells cannot be changed.",
            MoveError::InvalidNumber => "Invalid number.",
            MoveError::IncorrectNumber => "Incorrect move.",
        };
        f.write_str(reason)
    }
}

struct Participant {
    id: Uuid,
    tx: Outbound,
}

/// A two-player match. Turn order is the order of successful joins.
pub struct GameRoom {
    game_id: String,
    difficulty: Difficulty,
    solution: Board,
    board: Board,
    fixed_mask: FixedMask,
    players: Vec<Participant>,
    current_turn: Option<Uuid>,
    started: bool,
    game_over: bool,
    winner: Option<Uuid>,
}

impl GameRoom {
    pub fn new(game_id: String, difficulty: Difficulty) -> Self {
        let (board, solution) = engine::generate(difficulty);
        let fixed_mask = engine::fixed_mask(&board);
        info!("room {} created ({})", game_id, difficulty);
        Self {
            game_id,
            difficulty,
            solution,
            board,
            fixed_mask,
            players: Vec::new(),
            current_turn: None,
            started: false,
            game_over: false,
            winner: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_boards(
        game_id: &str,
        board: Board,
        solution: Board,
        fixed_mask: FixedMask,
    ) -> Self {
        Self {
            game_id: game_id.to_string(),
            difficulty: Difficulty::Medium,
            solution,
            board,
            fixed_mask,
            players: Vec::new(),
            current_turn: None,
            started: false,
            game_over: false,
            winner: None,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn is_over(&self) -> bool {
        self.game_over
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn winner(&self) -> Option<Uuid> {
        self.winner
    }

    pub fn current_turn(&self) -> Option<Uuid> {
        self.current_turn
    }

    /// True while the room can still take another participant.
    pub fn is_joinable(&self) -> bool {
        !self.started && !self.game_over && self.players.len() < MAX_PLAYERS
    }

    pub fn player_ids(&self) -> Vec<Uuid> {
        self.players.iter().map(|p| p.id).collect()
    }

    /// Adds a participant. The second successful join starts the game: the
    /// first joiner gets the turn and both get a full state snapshot.
    pub fn join(&mut self, player_id: Uuid, tx: Outbound) -> Result<(), JoinError> {
        if self.game_over || self.started {
            return Err(JoinError::Finished);
        }
        if self.players.iter().any(|p| p.id == player_id) {
            return Err(JoinError::AlreadyJoined);
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(JoinError::Full);
        }

        self.players.push(Participant { id: player_id, tx });
        info!(
            "room {}: player {} joined ({}/{})",
            self.game_id,
            player_id,
            self.players.len(),
            MAX_PLAYERS
        );

        if self.players.len() == MAX_PLAYERS {
            self.started = true;
            self.current_turn = Some(self.players[0].id);
            info!(
                "room {}: started, first turn {}",
                self.game_id, self.players[0].id
            );
            self.broadcast_state();
        }
        Ok(())
    }

    /// Validates and applies one move. Wrong non-zero values are rejected
    /// and never stored -- the server is the sole source of truth, so the
    /// shared board only ever holds erasures and solution values.
    pub fn apply_move(
        &mut self,
        player_id: Uuid,
        row: usize,
        col: usize,
        number: u8,
    ) -> Result<(), MoveError> {
        if self.game_over {
            return Err(MoveError::GameOver);
        }
        if self.current_turn != Some(player_id) {
            return Err(MoveError::NotYourTurn);
        }
        if row >= SIZE || col >= SIZE {
            return Err(MoveError::OutOfBounds);
        }
        if self.fixed_mask[row][col] {
            return Err(MoveError::FixedCell);
        }
        if number > 9 {
            return Err(MoveError::InvalidNumber);
        }
        // An erase is always acceptable; a placement must match the
        // solution (stricter than classic mode, which stores wrong values).
        if number != 0 && number != self.solution[row][col] {
            debug!(
                "room {}: rejecting wrong value {} at ({}, {}) from {}",
                self.game_id, number, row, col, player_id
            );
            return Err(MoveError::IncorrectNumber);
        }

        self.board[row][col] = number;
        debug!(
            "room {}: {} placed {} at ({}, {})",
            self.game_id, player_id, number, row, col
        );

        let (complete, correct) = board::check_state(&self.board, &self.solution);
        if complete && correct {
            self.game_over = true;
            self.winner = Some(player_id);
            info!("room {}: won by {}", self.game_id, player_id);
            self.broadcast_game_over(format!("Player {} completed the board!", player_id));
            return Ok(());
        }

        self.advance_turn(player_id);
        self.send_to(
            player_id,
            ServerMessage::MoveAccepted { row, col, number },
        );
        if let Some(next) = self.current_turn {
            for p in &self.players {
                if p.id == player_id {
                    continue;
                }
                let _ = p.tx.send(ServerMessage::OpponentMoved {
                    mover_id: player_id,
                    row,
                    col,
                    number,
                    next_turn: next,
                });
                if p.id == next {
                    let _ = p.tx.send(ServerMessage::Message {
                        text: "Your turn!".to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Removes a participant. Returns true when the room is now empty and
    /// should be deleted by the registry. A departure from a started,
    /// unfinished game hands the win to the remaining player.
    pub fn leave(&mut self, player_id: Uuid) -> bool {
        let before = self.players.len();
        self.players.retain(|p| p.id != player_id);
        if self.players.len() == before {
            return self.players.is_empty();
        }
        info!("room {}: player {} left", self.game_id, player_id);

        if self.players.is_empty() {
            self.game_over = true;
            return true;
        }

        if self.started && !self.game_over && self.players.len() == 1 {
            let remaining = self.players[0].id;
            self.winner = Some(remaining);
            self.game_over = true;
            self.current_turn = Some(remaining);
            info!("room {}: won by forfeit, {}", self.game_id, remaining);
            self.broadcast_game_over("Your opponent left the game.".to_string());
        }
        false
    }

    /// Best-effort notice to everyone still connected, used during server
    /// shutdown.
    pub fn notify(&self, text: String) {
        self.broadcast(ServerMessage::Message { text });
    }

    /// Ends the match without a winner. Any still-held handle to the room
    /// sees it as finished.
    pub fn close(&mut self) {
        self.game_over = true;
    }

    fn advance_turn(&mut self, mover: Uuid) {
        let next = self
            .players
            .iter()
            .position(|p| p.id == mover)
            .map(|idx| self.players[(idx + 1) % self.players.len()].id);
        self.current_turn = next;
        debug!("room {}: next turn {:?}", self.game_id, next);
    }

    fn broadcast_state(&self) {
        let current = match self.current_turn {
            Some(id) => id,
            None => return,
        };
        let players_in_game = self.player_ids();
        for p in &self.players {
            let _ = p.tx.send(ServerMessage::GameStateUpdate {
                game_id: self.game_id.clone(),
                board_data: self.board,
                fixed_mask: self.fixed_mask,
                current_turn: current,
                your_turn: p.id == current,
                players_in_game: players_in_game.clone(),
            });
        }
    }

    fn broadcast_game_over(&self, reason: String) {
        self.broadcast(ServerMessage::GameOver {
            game_id: self.game_id.clone(),
            winner_id: self.winner,
            reason,
        });
    }

    fn broadcast(&self, msg: ServerMessage) {
        for p in &self.players {
            // A closed receiver just means the peer is already gone.
            let _ = p.tx.send(msg.clone());
        }
    }

    fn send_to(&self, player_id: Uuid, msg: ServerMessage) {
        if let Some(p) = self.players.iter().find(|p| p.id == player_id) {
            let _ = p.tx.send(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::SOLVED;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn channel() -> (Outbound, UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    /// Relabels digits so the solution has a 7 at (0, 0), matching the
    /// hint/completion scenarios exactly.
    fn solution_with_seven_at_origin() -> Board {
        let mut solution = SOLVED;
        let old = solution[0][0];
        for row in solution.iter_mut() {
            for cell in row.iter_mut() {
                if *cell == old {
                    *cell = 7;
                } else if *cell == 7 {
                    *cell = old;
                }
            }
        }
        solution
    }

    /// A room one correct move away from completion: everything filled and
    /// fixed except (0, 0).
    fn near_complete_room() -> GameRoom {
        let solution = solution_with_seven_at_origin();
        let mut board = solution;
        board[0][0] = 0;
        let mut mask = [[true; 9]; 9];
        mask[0][0] = false;
        GameRoom::with_boards("room1", board, solution, mask)
    }

    fn fresh_room() -> GameRoom {
        let (board, solution) = engine::generate(Difficulty::Easy);
        let mask = engine::fixed_mask(&board);
        GameRoom::with_boards("room1", board, solution, mask)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn first_joiner_gets_the_turn() {
        let mut room = fresh_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();

        room.join(a, tx_a).unwrap();
        assert_eq!(room.current_turn(), None);

        room.join(b, tx_b).unwrap();
        assert_eq!(room.current_turn(), Some(a));

        let state_a = drain(&mut rx_a);
        let state_b = drain(&mut rx_b);
        match (&state_a[0], &state_b[0]) {
            (
                ServerMessage::GameStateUpdate {
                    your_turn: turn_a,
                    current_turn: cur_a,
                    players_in_game,
                    ..
                },
                ServerMessage::GameStateUpdate {
                    your_turn: turn_b,
                    current_turn: cur_b,
                    ..
                },
            ) => {
                assert!(turn_a);
                assert!(!turn_b);
                assert_eq!(*cur_a, a);
                assert_eq!(*cur_b, a);
                assert_eq!(players_in_game, &vec![a, b]);
            }
            other => panic!("expected state updates, got {:?}", other),
        }
    }

    #[test]
    fn join_rejections() {
        let mut room = fresh_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        room.join(a, channel().0).unwrap();
        assert_eq!(room.join(a, channel().0), Err(JoinError::AlreadyJoined));

        room.join(b, channel().0).unwrap();
        // Two joins start the game, so a third join sees it as started.
        assert_eq!(room.join(c, channel().0), Err(JoinError::Finished));
    }

    #[test]
    fn out_of_turn_move_is_rejected() {
        let mut room = fresh_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        room.join(a, channel().0).unwrap();
        room.join(b, channel().0).unwrap();

        // B joined second and must wait for A's first move.
        assert_eq!(room.apply_move(b, 0, 0, 0), Err(MoveError::NotYourTurn));
    }

    #[test]
    fn fixed_cell_is_never_a_valid_target() {
        let mut room = near_complete_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        room.join(a, channel().0).unwrap();
        room.join(b, channel().0).unwrap();

        assert_eq!(room.apply_move(a, 1, 1, 0), Err(MoveError::FixedCell));
    }

    #[test]
    fn bounds_and_range_checks() {
        let mut room = near_complete_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        room.join(a, channel().0).unwrap();
        room.join(b, channel().0).unwrap();

        assert_eq!(room.apply_move(a, 9, 0, 1), Err(MoveError::OutOfBounds));
        assert_eq!(room.apply_move(a, 0, 9, 1), Err(MoveError::OutOfBounds));
        assert_eq!(room.apply_move(a, 0, 0, 10), Err(MoveError::InvalidNumber));
    }

    #[test]
    fn wrong_value_is_rejected_and_board_unchanged() {
        let mut room = near_complete_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        room.join(a, channel().0).unwrap();
        room.join(b, channel().0).unwrap();

        let wrong = if room.solution[0][0] == 1 { 2 } else { 1 };
        assert_eq!(
            room.apply_move(a, 0, 0, wrong),
            Err(MoveError::IncorrectNumber)
        );
        assert_eq!(room.board[0][0], 0);
        // The failed attempt does not consume A's turn.
        assert_eq!(room.current_turn(), Some(a));
    }

    #[test]
    fn accepted_move_rotates_the_turn() {
        let mut room = fresh_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        room.join(a, tx_a).unwrap();
        room.join(b, tx_b).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        // An erase on a non-fixed cell is always a correct move and cannot
        // complete the puzzle.
        let (r, c) = first_open_cell(&room);
        room.apply_move(a, r, c, 0).unwrap();
        assert_eq!(room.current_turn(), Some(b));
        assert_eq!(room.apply_move(a, r, c, 0), Err(MoveError::NotYourTurn));

        assert!(matches!(
            drain(&mut rx_a).as_slice(),
            [ServerMessage::MoveAccepted { number: 0, .. }]
        ));
        let to_b = drain(&mut rx_b);
        assert!(matches!(
            to_b[0],
            ServerMessage::OpponentMoved {
                mover_id,
                next_turn,
                number: 0,
                ..
            } if mover_id == a && next_turn == b
        ));
        assert!(matches!(&to_b[1], ServerMessage::Message { .. }));
    }

    #[test]
    fn hint_and_winning_move_scenario() {
        // Board is complete except (0,0), and the solution holds 7 there.
        let room_template = near_complete_room();
        assert_eq!(
            engine::get_hint(&room_template.board, &room_template.solution),
            Some((0, 0, 7))
        );

        let mut room = near_complete_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        room.join(a, tx_a).unwrap();
        room.join(b, tx_b).unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        room.apply_move(a, 0, 0, 7).unwrap();
        assert!(room.is_over());
        assert_eq!(room.winner(), Some(a));

        // Terminal: nobody moves again, no turn rotation happened.
        assert_eq!(room.apply_move(b, 0, 0, 0), Err(MoveError::GameOver));
        assert_eq!(room.apply_move(a, 0, 0, 0), Err(MoveError::GameOver));

        for rx in [&mut rx_a, &mut rx_b] {
            let msgs = drain(rx);
            assert!(matches!(
                msgs.last(),
                Some(ServerMessage::GameOver { winner_id: Some(w), .. }) if *w == a
            ));
        }
    }

    #[test]
    fn leaving_mid_game_forfeits() {
        let mut room = fresh_room();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, mut rx_a) = channel();
        room.join(a, tx_a).unwrap();
        room.join(b, channel().0).unwrap();
        drain(&mut rx_a);

        let empty = room.leave(b);
        assert!(!empty);
        assert!(room.is_over());
        assert_eq!(room.winner(), Some(a));

        let msgs = drain(&mut rx_a);
        assert!(matches!(
            msgs.last(),
            Some(ServerMessage::GameOver { winner_id: Some(w), .. }) if *w == a
        ));
    }

    #[test]
    fn last_player_leaving_empties_the_room() {
        let mut room = fresh_room();
        let a = Uuid::new_v4();
        room.join(a, channel().0).unwrap();
        assert!(room.leave(a));
        assert!(room.is_empty());
    }

    fn first_open_cell(room: &GameRoom) -> (usize, usize) {
        for r in 0..SIZE {
            for c in 0..SIZE {
                if !room.fixed_mask[r][c] {
                    return (r, c);
                }
            }
        }
        unreachable!("carved boards always have open cells");
    }
}
