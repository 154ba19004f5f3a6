//! Core types for the checkrs match server.
//!
//! This module defines the fundamental data structures shared by the rules
//! engine, the history replayer, the persistence layer, and the wire
//! protocol: piece and board representation, board coordinates, the move
//! payload stored in the move log, and the match lifecycle enums.

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Color & Role
// ---------------------------------------------------------------------------

/// Piece color on the board.
///
/// RED pieces start on rows 5–7 and move toward row 0; BLACK pieces start
/// on rows 0–2 and move toward row 7. On the wire, colors are `"RED"` and
/// `"BLACK"` while player roles are `"white"` / `"black"`, with
/// `white ↔ RED` and `black ↔ BLACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Red,
    Black,
}

impl Color {
    /// Returns the opposite color.
    pub fn opponent(self) -> Color {
        match self {
            Color::Red => Color::Black,
            Color::Black => Color::Red,
        }
    }

    /// Returns the forward row direction for men of this color:
    /// −1 for RED (bottom side moving up), +1 for BLACK (top side moving down).
    pub fn forward_dir(self) -> i8 {
        match self {
            Color::Red => -1,
            Color::Black => 1,
        }
    }

    /// Returns the row on which a man of this color is crowned.
    pub fn crown_row(self) -> u8 {
        match self {
            Color::Red => 0,
            Color::Black => 7,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "RED"),
            Color::Black => write!(f, "BLACK"),
        }
    }
}

/// A player's side in a match: `white` moves first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    White,
    Black,
}

impl Role {
    /// Returns the opposite role.
    pub fn opponent(self) -> Role {
        match self {
            Role::White => Role::Black,
            Role::Black => Role::White,
        }
    }

    /// Maps the role to its piece color: white plays RED, black plays BLACK.
    pub fn color(self) -> Color {
        match self {
            Role::White => Color::Red,
            Role::Black => Color::Black,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::White => write!(f, "white"),
            Role::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// Coord
// ---------------------------------------------------------------------------

/// A board coordinate. Row 0 is the top, row 7 the bottom.
///
/// On the wire a coordinate is a two-element array `[row, col]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: u8,
    pub col: u8,
}

impl Coord {
    /// Creates a new coordinate. Off-board values are representable (the
    /// wire accepts them); `in_bounds` is checked by the rules engine.
    pub fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Returns `true` if the coordinate lies on the 8×8 board.
    pub fn in_bounds(self) -> bool {
        self.row < 8 && self.col < 8
    }

    /// Returns `true` if the cell is playable (a dark square):
    /// `(row + col)` is odd.
    pub fn is_playable(self) -> bool {
        (self.row + self.col) % 2 == 1
    }

    /// Returns the coordinate offset by `(dr, dc)`, or `None` if it would
    /// leave the board.
    pub fn offset(self, dr: i8, dc: i8) -> Option<Coord> {
        let r = self.row as i8 + dr;
        let c = self.col as i8 + dc;
        if (0..8).contains(&r) && (0..8).contains(&c) {
            Some(Coord::new(r as u8, c as u8))
        } else {
            None
        }
    }

    /// Returns a flat index (0..63) for the cell.
    pub fn index(self) -> usize {
        (self.row as usize) * 8 + self.col as usize
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.row, self.col)
    }
}

impl Serialize for Coord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.row, self.col].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Coord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Coord, D::Error> {
        let [row, col] = <[i16; 2]>::deserialize(deserializer)?;
        if !(0..64).contains(&row) || !(0..64).contains(&col) {
            return Err(D::Error::custom("coordinate out of range"));
        }
        Ok(Coord::new(row as u8, col as u8))
    }
}

// ---------------------------------------------------------------------------
// Piece & Board
// ---------------------------------------------------------------------------

/// A checkers piece: a color and a king flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub color: Color,
    pub king: bool,
}

impl Piece {
    /// Creates a man (non-king) of the given color.
    pub fn man(color: Color) -> Self {
        Self { color, king: false }
    }

    /// Creates a king of the given color.
    pub fn king(color: Color) -> Self {
        Self { color, king: true }
    }
}

/// The board as a flat 64-element array.
///
/// Each element is `Option<Piece>` — `None` means the cell is empty.
/// Index mapping: `row * 8 + col` (both 0-based, row 0 at the top).
/// Boards are cheap fixed-size copies; the rules engine never mutates its
/// input snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Option<Piece>; 64],
}

impl Default for Board {
    /// Returns an empty board.
    fn default() -> Self {
        Self { cells: [None; 64] }
    }
}

impl Board {
    /// Returns the piece at the given cell, if any.
    pub fn get(&self, at: Coord) -> Option<Piece> {
        self.cells[at.index()]
    }

    /// Sets (or clears) the piece at the given cell.
    pub fn set(&mut self, at: Coord, piece: Option<Piece>) {
        self.cells[at.index()] = piece;
    }

    /// Creates the standard starting position: BLACK men on the playable
    /// cells of rows 0–2, RED men on the playable cells of rows 5–7.
    pub fn initial() -> Self {
        let mut board = Board::default();
        for row in 0..8u8 {
            for col in 0..8u8 {
                let at = Coord::new(row, col);
                if !at.is_playable() {
                    continue;
                }
                if row < 3 {
                    board.set(at, Some(Piece::man(Color::Black)));
                } else if row > 4 {
                    board.set(at, Some(Piece::man(Color::Red)));
                }
            }
        }
        board
    }

    /// Iterates over all occupied cells.
    pub fn pieces(&self) -> impl Iterator<Item = (Coord, Piece)> + '_ {
        (0..8u8).flat_map(move |row| {
            (0..8u8).filter_map(move |col| {
                let at = Coord::new(row, col);
                self.get(at).map(|p| (at, p))
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Wire & stored move payloads
// ---------------------------------------------------------------------------

/// The move payload a client submits: just the endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoveIn {
    pub from: Coord,
    pub to: Coord,
}

/// The move payload persisted in the move log and echoed in broadcasts.
/// `was_capture` is derived server-side, never taken from the client.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StoredMove {
    pub from: Coord,
    pub to: Coord,
    pub was_capture: bool,
}

// ---------------------------------------------------------------------------
// Match lifecycle enums
// ---------------------------------------------------------------------------

/// Match status. Transitions are monotonic:
/// `waiting → ongoing → finished | aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MatchStatus {
    Waiting,
    Ongoing,
    Finished,
    Aborted,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchStatus::Waiting => "waiting",
            MatchStatus::Ongoing => "ongoing",
            MatchStatus::Finished => "finished",
            MatchStatus::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Match result. `None` until the match finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MatchResult {
    White,
    Black,
    Draw,
    None,
}

impl MatchResult {
    /// The winning result for the given role.
    pub fn win_for(role: Role) -> Self {
        match role {
            Role::White => MatchResult::White,
            Role::Black => MatchResult::Black,
        }
    }
}

/// Why a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MatchReason {
    Normal,
    Resign,
    Timeout,
    Agreement,
    Abandon,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playable_cells_are_dark_squares() {
        assert!(!Coord::new(0, 0).is_playable());
        assert!(Coord::new(0, 1).is_playable());
        assert!(Coord::new(5, 0).is_playable());
        assert!(Coord::new(7, 6).is_playable());
    }

    #[test]
    fn coord_wire_format_is_row_col_array() {
        let c = Coord::new(5, 2);
        assert_eq!(serde_json::to_string(&c).unwrap(), "[5,2]");
        let back: Coord = serde_json::from_str("[5,2]").unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn coord_rejects_negative_rows() {
        assert!(serde_json::from_str::<Coord>("[-1,2]").is_err());
    }

    #[test]
    fn initial_board_has_twelve_men_per_side() {
        let board = Board::initial();
        let red = board.pieces().filter(|(_, p)| p.color == Color::Red).count();
        let black = board
            .pieces()
            .filter(|(_, p)| p.color == Color::Black)
            .count();
        assert_eq!(red, 12);
        assert_eq!(black, 12);
        assert!(board.pieces().all(|(at, p)| at.is_playable() && !p.king));
    }

    #[test]
    fn roles_map_to_colors() {
        assert_eq!(Role::White.color(), Color::Red);
        assert_eq!(Role::Black.color(), Color::Black);
        assert_eq!(Role::White.opponent(), Role::Black);
    }

    #[test]
    fn enums_serialize_with_wire_casing() {
        assert_eq!(serde_json::to_string(&Color::Red).unwrap(), "\"RED\"");
        assert_eq!(serde_json::to_string(&Role::White).unwrap(), "\"white\"");
        assert_eq!(
            serde_json::to_string(&MatchStatus::Ongoing).unwrap(),
            "\"ongoing\""
        );
    }
}
