use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::board::{self, Board, FixedMask, SIZE};

/// Puzzle difficulty. Controls how many cells are carved out of the solved
/// grid and, in classic mode, how many mistakes are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    VeryEasy,
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::VeryEasy,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    /// Number of cells cleared during carving.
    pub fn cells_to_remove(self) -> usize {
        match self {
            Difficulty::VeryEasy => 20,
            Difficulty::Easy => 27,
            Difficulty::Medium => 40,
            Difficulty::Hard => 54,
            Difficulty::Expert => 60,
        }
    }

    /// Mistake allowance for the classic (single-player) mode.
    pub fn max_mistakes(self) -> u32 {
        match self {
            Difficulty::Hard | Difficulty::Expert => 3,
            _ => 10,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::VeryEasy => "very_easy",
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        };
        f.write_str(name)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "very_easy" => Ok(Difficulty::VeryEasy),
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty: {}", other)),
        }
    }
}

/// Generates a carved puzzle and its solution.
///
/// The solved grid comes from randomized backtracking; the puzzle is carved
/// by clearing cells in random order up to the difficulty's removal count.
/// No uniqueness-of-solution check is performed after carving -- a carved
/// puzzle may admit more than one completion. The room only ever compares
/// against the retained solution.
pub fn generate(difficulty: Difficulty) -> (Board, Board) {
    let mut rng = rand::thread_rng();
    generate_with_rng(difficulty, &mut rng)
}

pub fn generate_with_rng<R: Rng>(difficulty: Difficulty, rng: &mut R) -> (Board, Board) {
    let mut solution = [[0u8; 9]; 9];
    // Backtracking always succeeds on an empty 9x9 grid. The retry loop
    // guards the invariant that a partial grid is never handed out.
    while !fill_grid(&mut solution, rng) {
        warn!("grid fill failed, retrying from an empty grid");
        solution = [[0u8; 9]; 9];
    }

    let mut board = solution;
    let removed = carve(&mut board, difficulty.cells_to_remove(), rng);
    info!(
        "generated {} puzzle: {} cells removed",
        difficulty, removed
    );

    (board, solution)
}

/// Computes the mask of pre-filled cells for a freshly carved board.
pub fn fixed_mask(board: &Board) -> FixedMask {
    let mut mask = [[false; 9]; 9];
    for r in 0..SIZE {
        for c in 0..SIZE {
            mask[r][c] = board[r][c] != 0;
        }
    }
    mask
}

// Fills the first empty cell (row-major) with a shuffled candidate and
// recurses; resets the cell and reports failure when no candidate fits.
fn fill_grid<R: Rng>(grid: &mut Board, rng: &mut R) -> bool {
    for r in 0..SIZE {
        for c in 0..SIZE {
            if grid[r][c] != 0 {
                continue;
            }
            let mut candidates: [u8; 9] = [1, 2, 3, 4, 5, 6, 7, 8, 9];
            candidates.shuffle(rng);
            for &num in &candidates {
                if board::is_valid_placement(grid, r, c, num) {
                    grid[r][c] = num;
                    if fill_grid(grid, rng) {
                        return true;
                    }
                    grid[r][c] = 0;
                }
            }
            return false;
        }
    }
    true
}

// Clears up to `count` non-zero cells, visiting all 81 coordinates in a
// shuffled order. Returns the number actually cleared.
fn carve<R: Rng>(board: &mut Board, count: usize, rng: &mut R) -> usize {
    let mut coords: Vec<(usize, usize)> = Vec::with_capacity(SIZE * SIZE);
    for r in 0..SIZE {
        for c in 0..SIZE {
            coords.push((r, c));
        }
    }
    coords.shuffle(rng);

    let mut removed = 0;
    for (r, c) in coords {
        if removed >= count {
            break;
        }
        if board[r][c] != 0 {
            board[r][c] = 0;
            removed += 1;
        }
    }
    removed
}

/// Picks one cell to reveal: a uniformly random empty cell first, otherwise
/// a uniformly random filled cell that disagrees with the solution. Returns
/// `None` only when the board is complete and fully correct.
pub fn get_hint(board: &Board, solution: &Board) -> Option<(usize, usize, u8)> {
    let mut empty = Vec::new();
    let mut incorrect = Vec::new();

    for r in 0..SIZE {
        for c in 0..SIZE {
            if board[r][c] == 0 {
                empty.push((r, c));
            } else if board[r][c] != solution[r][c] {
                incorrect.push((r, c));
            }
        }
    }

    let mut rng = rand::thread_rng();
    let &(r, c) = empty
        .as_slice()
        .choose(&mut rng)
        .or_else(|| incorrect.as_slice().choose(&mut rng))?;

    debug!("hint: ({}, {}) -> {}", r, c, solution[r][c]);
    Some((r, c, solution[r][c]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::fixtures::SOLVED;
    use crate::board::{check_state, is_valid_solution};

    #[test]
    fn solutions_are_valid_for_every_difficulty() {
        for difficulty in Difficulty::ALL {
            let (_, solution) = generate(difficulty);
            assert!(
                is_valid_solution(&solution),
                "invalid solution for {}",
                difficulty
            );
        }
    }

    #[test]
    fn carved_board_agrees_with_solution_on_givens() {
        for difficulty in Difficulty::ALL {
            let (board, solution) = generate(difficulty);
            for r in 0..9 {
                for c in 0..9 {
                    if board[r][c] != 0 {
                        assert_eq!(board[r][c], solution[r][c]);
                    }
                }
            }
        }
    }

    #[test]
    fn removal_counts_match_the_difficulty_table() {
        for difficulty in Difficulty::ALL {
            let (board, _) = generate(difficulty);
            let zeros = board
                .iter()
                .flat_map(|row| row.iter())
                .filter(|&&cell| cell == 0)
                .count();
            assert_eq!(zeros, difficulty.cells_to_remove(), "{}", difficulty);
        }
    }

    #[test]
    fn refilling_carved_cells_reproduces_the_solution() {
        let (mut board, solution) = generate(Difficulty::Medium);
        for r in 0..9 {
            for c in 0..9 {
                if board[r][c] == 0 {
                    board[r][c] = solution[r][c];
                }
            }
        }
        assert_eq!(board, solution);
        assert_eq!(check_state(&board, &solution), (true, true));
    }

    #[test]
    fn hint_never_repeats_an_already_correct_cell() {
        let (board, solution) = generate(Difficulty::Easy);
        for _ in 0..50 {
            let (r, c, num) = get_hint(&board, &solution).expect("carved board has empty cells");
            assert_ne!(board[r][c], solution[r][c]);
            assert_eq!(num, solution[r][c]);
        }
    }

    #[test]
    fn hint_fills_the_single_empty_cell() {
        let mut board = SOLVED;
        board[0][0] = 0;
        let expected = SOLVED[0][0];
        assert_eq!(get_hint(&board, &SOLVED), Some((0, 0, expected)));
    }

    #[test]
    fn hint_corrects_a_wrong_cell_when_nothing_is_empty() {
        let mut board = SOLVED;
        let wrong = if SOLVED[3][3] == 1 { 2 } else { 1 };
        board[3][3] = wrong;
        assert_eq!(get_hint(&board, &SOLVED), Some((3, 3, SOLVED[3][3])));
    }

    #[test]
    fn no_hint_for_a_solved_board() {
        assert_eq!(get_hint(&SOLVED, &SOLVED), None);
    }

    #[test]
    fn difficulty_round_trips_through_strings() {
        for difficulty in Difficulty::ALL {
            assert_eq!(difficulty.to_string().parse(), Ok(difficulty));
        }
    }

    #[test]
    fn fixed_mask_marks_exactly_the_givens() {
        let (board, _) = generate(Difficulty::Hard);
        let mask = fixed_mask(&board);
        for r in 0..9 {
            for c in 0..9 {
                assert_eq!(mask[r][c], board[r][c] != 0);
            }
        }
    }
}
