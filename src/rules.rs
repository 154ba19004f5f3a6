//! Move validation for American draughts.
//!
//! This module is the pure rules engine: it operates on an immutable board
//! snapshot and returns a new snapshot, with no I/O and no shared state.
//! It handles:
//!
//! - Diagonal step moves (men forward only, kings in all four directions)
//! - Single-jump captures and their enumeration
//! - The mandatory-capture rule (any available capture forces a capture)
//! - Multi-jump chains, signaled to the caller via `forced_from`
//! - Crowning on the opposing back rank, with coronation ending the turn
//! - Terminal detection (no step and no capture means the mover loses)
//!
//! There is no flying-king variant: kings step and jump a single diagonal.

use crate::types::*;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a submitted move was rejected. Each kind produces a distinct
/// user-visible message; the wire `detail` string is this `Display` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IllegalMove {
    #[error("Square out of bounds or not playable")]
    Geometry,
    #[error("No piece of yours on the from square")]
    Ownership,
    #[error("Destination not empty")]
    Occupancy,
    #[error("Must continue capture chain from {0}")]
    Chain(Coord),
    #[error("Capture is mandatory")]
    MandatoryCapture,
    #[error("Illegal direction for man")]
    Direction,
    #[error("No opponent piece to capture")]
    NoCapture,
}

// ---------------------------------------------------------------------------
// Move enumeration
// ---------------------------------------------------------------------------

/// A single-jump capture: the jumped opponent piece sits on `captured`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub from: Coord,
    pub to: Coord,
    pub captured: Coord,
}

/// A non-capture step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub from: Coord,
    pub to: Coord,
}

const KING_DIRS: [(i8, i8); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
const RED_MAN_DIRS: [(i8, i8); 2] = [(-1, -1), (-1, 1)];
const BLACK_MAN_DIRS: [(i8, i8); 2] = [(1, -1), (1, 1)];

/// Returns the diagonals the piece may move along: all four for a king,
/// the two forward ones for a man.
fn directions(piece: Piece) -> &'static [(i8, i8)] {
    if piece.king {
        &KING_DIRS
    } else {
        match piece.color {
            Color::Red => &RED_MAN_DIRS,
            Color::Black => &BLACK_MAN_DIRS,
        }
    }
}

/// Enumerates the single-jump captures available to the piece at `at`.
/// Returns an empty list when the cell is empty.
pub fn piece_captures(board: &Board, at: Coord) -> Vec<Capture> {
    let Some(piece) = board.get(at) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for &(dr, dc) in directions(piece) {
        let Some(mid) = at.offset(dr, dc) else {
            continue;
        };
        let Some(landing) = at.offset(2 * dr, 2 * dc) else {
            continue;
        };
        if !landing.is_playable() || board.get(landing).is_some() {
            continue;
        }
        match board.get(mid) {
            Some(p) if p.color != piece.color => out.push(Capture {
                from: at,
                to: landing,
                captured: mid,
            }),
            _ => {}
        }
    }
    out
}

/// Union of `piece_captures` over every piece of the given color.
pub fn all_captures(board: &Board, color: Color) -> Vec<Capture> {
    let mut out = Vec::new();
    for (at, piece) in board.pieces() {
        if piece.color == color {
            out.extend(piece_captures(board, at));
        }
    }
    out
}

/// Enumerates the non-capture step moves available to the piece at `at`.
pub fn piece_steps(board: &Board, at: Coord) -> Vec<Step> {
    let Some(piece) = board.get(at) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for &(dr, dc) in directions(piece) {
        if let Some(to) = at.offset(dr, dc) {
            if to.is_playable() && board.get(to).is_none() {
                out.push(Step { from: at, to });
            }
        }
    }
    out
}

/// Union of `piece_steps` over every piece of the given color.
pub fn all_steps(board: &Board, color: Color) -> Vec<Step> {
    let mut out = Vec::new();
    for (at, piece) in board.pieces() {
        if piece.color == color {
            out.extend(piece_steps(board, at));
        }
    }
    out
}

/// Returns `true` if the side has at least one legal move (capture or step).
/// A side with no legal move loses.
pub fn has_any_legal_move(board: &Board, color: Color) -> bool {
    if !all_captures(board, color).is_empty() {
        return true;
    }
    !all_steps(board, color).is_empty()
}

// ---------------------------------------------------------------------------
// Validate & apply
// ---------------------------------------------------------------------------

/// The outcome of an accepted move.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// The board after the move, with any captured piece removed and any
    /// crowning applied.
    pub board: Board,
    /// Whether the move was a capture.
    pub was_capture: bool,
    /// Where the moving piece ended up.
    pub new_pos: Coord,
    /// Whether the piece was crowned by this move. A capture that crowns
    /// ends the turn even if further jumps would be geometrically available.
    pub kinged_now: bool,
}

/// Validates a move for `color` against the current board and applies it.
///
/// `forced_from` is the mid-chain continuation square, if the previous move
/// was a capture with further jumps available. `must_capture` is the
/// per-turn mandatory-capture flag; callers pass
/// `must_capture || forced_from.is_some()`.
///
/// The input board is untouched; the returned [`Applied`] carries a fresh
/// snapshot.
pub fn validate_and_apply(
    board: &Board,
    color: Color,
    from: Coord,
    to: Coord,
    forced_from: Option<Coord>,
    must_capture: bool,
) -> Result<Applied, IllegalMove> {
    if !from.in_bounds() || !to.in_bounds() {
        return Err(IllegalMove::Geometry);
    }
    if !from.is_playable() || !to.is_playable() {
        return Err(IllegalMove::Geometry);
    }
    if let Some(required) = forced_from {
        if from != required {
            return Err(IllegalMove::Chain(required));
        }
    }

    let piece = match board.get(from) {
        Some(p) if p.color == color => p,
        _ => return Err(IllegalMove::Ownership),
    };
    if board.get(to).is_some() {
        return Err(IllegalMove::Occupancy);
    }

    let dr = to.row as i8 - from.row as i8;
    let dc = to.col as i8 - from.col as i8;

    // Step move
    if dr.abs() == 1 && dc.abs() == 1 {
        if must_capture {
            return Err(IllegalMove::MandatoryCapture);
        }
        if !piece.king && dr != color.forward_dir() {
            return Err(IllegalMove::Direction);
        }

        let mut new_board = board.clone();
        new_board.set(from, None);
        let mut moved = piece;
        let kinged_now = !moved.king && to.row == color.crown_row();
        if kinged_now {
            moved.king = true;
        }
        new_board.set(to, Some(moved));

        return Ok(Applied {
            board: new_board,
            was_capture: false,
            new_pos: to,
            kinged_now,
        });
    }

    // Capture move
    if dr.abs() == 2 && dc.abs() == 2 {
        if !piece.king && dr != 2 * color.forward_dir() {
            return Err(IllegalMove::Direction);
        }

        let mid = Coord::new(
            (from.row as i8 + dr / 2) as u8,
            (from.col as i8 + dc / 2) as u8,
        );
        match board.get(mid) {
            Some(p) if p.color != color => {}
            _ => return Err(IllegalMove::NoCapture),
        }

        let mut new_board = board.clone();
        new_board.set(from, None);
        new_board.set(mid, None);
        let mut moved = piece;
        let kinged_now = !moved.king && to.row == color.crown_row();
        if kinged_now {
            moved.king = true;
        }
        new_board.set(to, Some(moved));

        return Ok(Applied {
            board: new_board,
            was_capture: true,
            new_pos: to,
            kinged_now,
        });
    }

    Err(IllegalMove::Geometry)
}
