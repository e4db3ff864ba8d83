use std::collections::HashSet;

/// A 9x9 Sudoku grid. 0 means empty.
pub type Board = [[u8; 9]; 9];

/// Marks the cells that were pre-filled at carve time and may never change.
pub type FixedMask = [[bool; 9]; 9];

pub const SIZE: usize = 9;
pub const BOX: usize = 3;

/// Returns true iff no cell is empty.
pub fn is_complete(board: &Board) -> bool {
    board.iter().all(|row| row.iter().all(|&cell| cell != 0))
}

/// Cell-for-cell equality against the retained solution. Only meaningful
/// together with `is_complete`.
pub fn matches_solution(board: &Board, solution: &Board) -> bool {
    board == solution
}

/// Returns `(complete, correct)`. An incomplete board is never reported
/// correct, even when every filled cell agrees with the solution.
pub fn check_state(board: &Board, solution: &Board) -> (bool, bool) {
    if !is_complete(board) {
        return (false, false);
    }
    (true, matches_solution(board, solution))
}

/// Checks that every row, column and 3x3 box is a permutation of 1-9.
pub fn is_valid_solution(board: &Board) -> bool {
    for row in board {
        let mut seen = HashSet::new();
        for &num in row {
            if !(1..=9).contains(&num) || !seen.insert(num) {
                return false;
            }
        }
    }

    for col in 0..SIZE {
        let mut seen = HashSet::new();
        for row in 0..SIZE {
            if !seen.insert(board[row][col]) {
                return false;
            }
        }
    }

    for box_row in 0..BOX {
        for box_col in 0..BOX {
            let mut seen = HashSet::new();
            for i in 0..BOX {
                for j in 0..BOX {
                    if !seen.insert(board[box_row * BOX + i][box_col * BOX + j]) {
                        return false;
                    }
                }
            }
        }
    }

    true
}

/// Checks whether `num` can be placed at `(row, col)` without duplicating a
/// value in the same row, column or 3x3 box.
pub fn is_valid_placement(board: &Board, row: usize, col: usize, num: u8) -> bool {
    for i in 0..SIZE {
        if board[row][i] == num {
            return false;
        }
    }

    for i in 0..SIZE {
        if board[i][col] == num {
            return false;
        }
    }

    let box_row = (row / BOX) * BOX;
    let box_col = (col / BOX) * BOX;
    for i in 0..BOX {
        for j in 0..BOX {
            if board[box_row + i][box_col + j] == num {
                return false;
            }
        }
    }

    true
}
