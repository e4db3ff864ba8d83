//! Classic single-player mode.
//!
//! Unlike the multiplayer room, this mode stores wrong entries on the board
//! and flags them for later correction; mistakes are counted against a
//! per-difficulty allowance. The two policies are intentionally different
//! and live in separate state machines.

use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::board::{self, Board, FixedMask, SIZE};
use crate::engine::{self, Difficulty};

pub const STARTING_SCORE: u32 = 1500;
const WRONG_ENTRY_PENALTY: u32 = 50;
const CORRECTION_BONUS: u32 = 20;
const FILL_BONUS: u32 = 10;
const HINT_COST: u32 = 100;
const WIN_BONUS: u32 = 1000;
const HISTORY_LIMIT: usize = 50;

/// Pencil marks per cell, keyed by coordinate.
pub type PencilMarks = BTreeMap<(usize, usize), BTreeSet<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassicError {
    OutOfBounds,
    FixedCell,
    InvalidNumber,
}

impl fmt::Display for ClassicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            ClassicError::OutOfBounds => "Invalid coordinates.",
            ClassicError::FixedCell => "Fixed cells cannot be changed.",
            ClassicError::InvalidNumber => "Invalid number.",
        };
        f.write_str(reason)
    }
}

/// What a stored entry did to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    Continue,
    Won,
    Lost,
}

/// One cell's contents before a mutation, for undo.
#[derive(Debug, Clone)]
struct CellSnapshot {
    row: usize,
    col: usize,
    value: u8,
    marks: BTreeSet<u8>,
}

pub struct ClassicGame {
    board: Board,
    solution: Board,
    fixed_mask: FixedMask,
    difficulty: Difficulty,
    mistakes: u32,
    max_mistakes: u32,
    time_played: u64,
    score: u32,
    pencil_marks: PencilMarks,
    history: VecDeque<CellSnapshot>,
}

impl ClassicGame {
    pub fn new(difficulty: Difficulty) -> Self {
        let (board, solution) = engine::generate(difficulty);
        let fixed_mask = engine::fixed_mask(&board);
        info!("classic game started ({})", difficulty);
        Self {
            board,
            solution,
            fixed_mask,
            difficulty,
            mistakes: 0,
            max_mistakes: difficulty.max_mistakes(),
            time_played: 0,
            score: STARTING_SCORE,
            pencil_marks: PencilMarks::new(),
            history: VecDeque::new(),
        }
    }

    /// Rebuilds a game from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn resume(
        board: Board,
        solution: Board,
        fixed_mask: FixedMask,
        difficulty: Difficulty,
        mistakes: u32,
        max_mistakes: u32,
        time_played: u64,
        score: u32,
        pencil_marks: PencilMarks,
    ) -> Self {
        Self {
            board,
            solution,
            fixed_mask,
            difficulty,
            mistakes,
            max_mistakes,
            time_played,
            score,
            pencil_marks,
            // Undo history does not survive a save/load cycle.
            history: VecDeque::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn solution(&self) -> &Board {
        &self.solution
    }

    pub fn fixed_mask(&self) -> &FixedMask {
        &self.fixed_mask
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn mistakes(&self) -> u32 {
        self.mistakes
    }

    pub fn max_mistakes(&self) -> u32 {
        self.max_mistakes
    }

    pub fn time_played(&self) -> u64 {
        self.time_played
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn pencil_marks(&self) -> &PencilMarks {
        &self.pencil_marks
    }

    /// Stores a value (0 erases), right or wrong. A wrong non-zero entry
    /// counts a mistake and stays on the board as an error cell.
    pub fn place_number(
        &mut self,
        row: usize,
        col: usize,
        number: u8,
    ) -> Result<PlaceOutcome, ClassicError> {
        if row >= SIZE || col >= SIZE {
            return Err(ClassicError::OutOfBounds);
        }
        if self.fixed_mask[row][col] {
            return Err(ClassicError::FixedCell);
        }
        if number > 9 {
            return Err(ClassicError::InvalidNumber);
        }

        let old = self.board[row][col];
        if old == number {
            return Ok(PlaceOutcome::Continue);
        }

        self.record(row, col);
        self.board[row][col] = number;
        self.pencil_marks.remove(&(row, col));

        let is_error = number != 0 && number != self.solution[row][col];
        if is_error {
            self.mistakes += 1;
            self.score = self.score.saturating_sub(WRONG_ENTRY_PENALTY);
            debug!(
                "classic: wrong entry {} at ({}, {}), mistakes {}/{}",
                number, row, col, self.mistakes, self.max_mistakes
            );
        } else if number != 0 {
            if old != 0 && old != self.solution[row][col] {
                self.score += CORRECTION_BONUS;
            } else if old == 0 {
                self.score += FILL_BONUS;
            }
        }

        let (complete, correct) = board::check_state(&self.board, &self.solution);
        if complete && correct {
            self.score += WIN_BONUS;
            info!(
                "classic: won with {} mistakes in {}s, score {}",
                self.mistakes, self.time_played, self.score
            );
            return Ok(PlaceOutcome::Won);
        }

        if self.mistakes >= self.max_mistakes {
            info!(
                "classic: lost, too many mistakes ({}/{})",
                self.mistakes, self.max_mistakes
            );
            return Ok(PlaceOutcome::Lost);
        }

        Ok(PlaceOutcome::Continue)
    }

    /// Clears a cell's value and pencil marks.
    pub fn erase(&mut self, row: usize, col: usize) -> Result<(), ClassicError> {
        if row >= SIZE || col >= SIZE {
            return Err(ClassicError::OutOfBounds);
        }
        if self.fixed_mask[row][col] {
            return Err(ClassicError::FixedCell);
        }
        if self.board[row][col] != 0 || self.pencil_marks.contains_key(&(row, col)) {
            self.record(row, col);
        }
        self.board[row][col] = 0;
        self.pencil_marks.remove(&(row, col));
        Ok(())
    }

    /// Toggles a pencil candidate. Writing a pencil mark clears any main
    /// number in the cell.
    pub fn toggle_pencil(&mut self, row: usize, col: usize, number: u8) -> Result<(), ClassicError> {
        if row >= SIZE || col >= SIZE {
            return Err(ClassicError::OutOfBounds);
        }
        if self.fixed_mask[row][col] {
            return Err(ClassicError::FixedCell);
        }
        if !(1..=9).contains(&number) {
            return Err(ClassicError::InvalidNumber);
        }

        self.record(row, col);
        let marks = self.pencil_marks.entry((row, col)).or_default();
        if !marks.remove(&number) {
            marks.insert(number);
        }
        if marks.is_empty() {
            self.pencil_marks.remove(&(row, col));
        }
        self.board[row][col] = 0;
        Ok(())
    }

    /// Reveals one cell at a score cost, applying it like a player entry.
    /// `None` means the board is already complete and correct.
    pub fn hint(&mut self) -> Option<((usize, usize, u8), PlaceOutcome)> {
        let (row, col, number) = engine::get_hint(&self.board, &self.solution)?;
        self.score = self.score.saturating_sub(HINT_COST);
        // The hint value always matches the solution, so this cannot fail
        // or count a mistake.
        let outcome = self
            .place_number(row, col, number)
            .expect("hint targets a writable cell");
        Some(((row, col, number), outcome))
    }

    /// Reverts the most recent cell mutation (value or pencil marks),
    /// returning the restored coordinate. Mistakes and score stand; only
    /// the cell contents roll back.
    pub fn undo(&mut self) -> Option<(usize, usize)> {
        let snapshot = self.history.pop_back()?;
        self.board[snapshot.row][snapshot.col] = snapshot.value;
        if snapshot.marks.is_empty() {
            self.pencil_marks.remove(&(snapshot.row, snapshot.col));
        } else {
            self.pencil_marks
                .insert((snapshot.row, snapshot.col), snapshot.marks);
        }
        debug!("classic: undo at ({}, {})", snapshot.row, snapshot.col);
        Some((snapshot.row, snapshot.col))
    }

    fn record(&mut self, row: usize, col: usize) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(CellSnapshot {
            row,
            col,
            value: self.board[row][col],
            marks: self
                .pencil_marks
                .get(&(row, col))
                .cloned()
                .unwrap_or_default(),
        });
    }

    /// One second of play time; every tenth second shaves a point.
    pub fn tick_second(&mut self) {
        self.time_played += 1;
        if self.time_played % 10 == 0 {
            self.score = self.score.saturating_sub(1);
        }
    }

    /// Non-fixed, non-zero cells that disagree with the solution.
    pub fn error_cells(&self) -> Vec<(usize, usize)> {
        let mut errors = Vec::new();
        for r in 0..SIZE {
            for c in 0..SIZE {
                if self.board[r][c] != 0
                    && !self.fixed_mask[r][c]
                    && self.board[r][c] != self.solution[r][c]
                {
                    errors.push((r, c));
                }
            }
        }
        errors
    }
}
