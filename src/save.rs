//! Save-file boundary for the classic mode.
//!
//! One JSON file holds the whole game state; an absent or unreadable file
//! simply means "no saved game". The schema is a boundary concern, not part
//! of the core contract.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::board::{Board, FixedMask};
use crate::engine::Difficulty;
use crate::solo::{ClassicGame, PencilMarks};

pub const DEFAULT_SAVE_FILE: &str = "sudoku_save.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PencilEntry {
    pub row: usize,
    pub col: usize,
    pub digits: Vec<u8>,
}

/// Serde mirror of [`ClassicGame`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedGame {
    pub board_data: Board,
    pub solution_data: Board,
    pub fixed_mask: FixedMask,
    pub difficulty: Difficulty,
    pub mistakes: u32,
    pub max_mistakes: u32,
    pub time_played: u64,
    pub score: u32,
    pub pencil_marks: Vec<PencilEntry>,
    pub error_cells: Vec<(usize, usize)>,
}

impl From<&ClassicGame> for SavedGame {
    fn from(game: &ClassicGame) -> Self {
        let pencil_marks = game
            .pencil_marks()
            .iter()
            .map(|(&(row, col), digits)| PencilEntry {
                row,
                col,
                digits: digits.iter().copied().collect(),
            })
            .collect();
        Self {
            board_data: *game.board(),
            solution_data: *game.solution(),
            fixed_mask: *game.fixed_mask(),
            difficulty: game.difficulty(),
            mistakes: game.mistakes(),
            max_mistakes: game.max_mistakes(),
            time_played: game.time_played(),
            score: game.score(),
            pencil_marks,
            error_cells: game.error_cells(),
        }
    }
}

impl SavedGame {
    pub fn into_game(self) -> ClassicGame {
        let mut pencil_marks = PencilMarks::new();
        for entry in self.pencil_marks {
            let digits: BTreeSet<u8> = entry.digits.into_iter().collect();
            if !digits.is_empty() {
                pencil_marks.insert((entry.row, entry.col), digits);
            }
        }
        ClassicGame::resume(
            self.board_data,
            self.solution_data,
            self.fixed_mask,
            self.difficulty,
            self.mistakes,
            self.max_mistakes,
            self.time_played,
            self.score,
            pencil_marks,
        )
    }
}

/// Persists the current state; called after every accepted change.
pub fn save_game(game: &ClassicGame, path: &Path) -> io::Result<()> {
    let saved = SavedGame::from(game);
    let json = serde_json::to_vec_pretty(&saved)?;
    fs::write(path, json)?;
    info!("game saved to {}", path.display());
    Ok(())
}

/// Loads a prior game. `None` for a missing or unreadable file.
pub fn load_game(path: &Path) -> Option<ClassicGame> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!("could not read {}: {}", path.display(), err);
            return None;
        }
    };
    match serde_json::from_slice::<SavedGame>(&bytes) {
        Ok(saved) => {
            info!("game loaded from {}", path.display());
            Some(saved.into_game())
        }
        Err(err) => {
            warn!("corrupt save file {}: {}", path.display(), err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use uuid::Uuid;

    struct TempSave(PathBuf);

    impl TempSave {
        fn new() -> Self {
            Self(std::env::temp_dir().join(format!("sudoku_arena_{}.json", Uuid::new_v4())))
        }
    }

    impl Drop for TempSave {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.0);
        }
    }

    #[test]
    fn save_and_load_round_trip() {
        let mut game = ClassicGame::new(Difficulty::Medium);
        game.toggle_pencil(find_open(&game).0, find_open(&game).1, 3)
            .unwrap();
        for _ in 0..15 {
            game.tick_second();
        }

        let tmp = TempSave::new();
        save_game(&game, &tmp.0).unwrap();
        let loaded = load_game(&tmp.0).expect("saved game loads");

        assert_eq!(loaded.board(), game.board());
        assert_eq!(loaded.solution(), game.solution());
        assert_eq!(loaded.fixed_mask(), game.fixed_mask());
        assert_eq!(loaded.difficulty(), game.difficulty());
        assert_eq!(loaded.time_played(), game.time_played());
        assert_eq!(loaded.score(), game.score());
        assert_eq!(loaded.pencil_marks(), game.pencil_marks());
    }

    #[test]
    fn missing_file_means_no_saved_game() {
        let tmp = TempSave::new();
        assert!(load_game(&tmp.0).is_none());
    }

    #[test]
    fn corrupt_file_means_no_saved_game() {
        let tmp = TempSave::new();
        fs::write(&tmp.0, b"not json at all").unwrap();
        assert!(load_game(&tmp.0).is_none());
    }

    fn find_open(game: &ClassicGame) -> (usize, usize) {
        for r in 0..9 {
            for c in 0..9 {
                if !game.fixed_mask()[r][c] {
                    return (r, c);
                }
            }
        }
        unreachable!()
    }
}
