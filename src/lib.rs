//! Sudoku puzzle engine and two-player race server.
//!
//! The crate has two halves. The puzzle engine ([`board`], [`engine`])
//! generates solved grids by randomized backtracking, carves playable
//! puzzles by difficulty and derives hints. On top of it sit two
//! independent game lifecycles: the classic single-player mode
//! ([`solo`], [`save`]) and the multiplayer session server ([`room`],
//! [`registry`], [`server`]) where two participants race to complete a
//! shared board over a framed-JSON TCP protocol ([`protocol`],
//! [`client`]).
//!
//! Rendering and input are external collaborators; nothing in here draws.

pub mod board;
pub mod client;
pub mod engine;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod save;
pub mod server;
pub mod solo;

pub use board::{Board, FixedMask};
pub use client::SudokuClient;
pub use engine::Difficulty;
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::GameRegistry;
pub use room::GameRoom;
pub use save::{load_game, save_game, SavedGame};
pub use server::SudokuServer;
pub use solo::{ClassicGame, PlaceOutcome};
