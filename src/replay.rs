//! State reconstruction from the move log.
//!
//! Board positions are never persisted; the append-only move log is the
//! single source of truth. `replay` walks the log from the initial position
//! and produces the authoritative board, the side to move, and the pending
//! capture-chain obligation. Every inbound move is validated against a
//! fresh replay, so a session can never act on stale in-memory state.

use crate::rules::{self, IllegalMove};
use crate::types::*;
use thiserror::Error;

/// A logged move as the replayer consumes it: the recorded mover plus the
/// move endpoints. The stored `was_capture` flag is not needed — replay
/// re-derives it.
#[derive(Debug, Clone, Copy)]
pub struct LoggedMove {
    pub player: Role,
    pub from: Coord,
    pub to: Coord,
}

/// The authoritative state derived from a move log.
#[derive(Debug, Clone)]
pub struct GameState {
    pub board: Board,
    /// Side to move. White when the log is empty.
    pub next_turn: Role,
    /// Mid-chain continuation square, if the last logged move was a capture
    /// with further jumps available to the same piece.
    pub forced_from: Option<Coord>,
    /// Whether the side to move has at least one capture available.
    pub must_capture: bool,
}

/// A logged move failed validation during replay. The log is append-only
/// and immutable, so this indicates corruption (or a writer that bypassed
/// the rules engine); the session handling it must not guess at state.
#[derive(Debug, Clone, Copy, Error)]
#[error("move {number} in the log is not legal: {source}")]
pub struct CorruptLog {
    /// 1-based position of the offending move.
    pub number: usize,
    #[source]
    pub source: IllegalMove,
}

/// Replays the full move log from the initial position.
///
/// The recorded `player` field is trusted over the engine's own turn
/// prediction: if they disagree, the replayer adopts the logged player and
/// clears any pending chain instead of failing. This keeps old logs
/// replayable; the moves themselves must still validate.
pub fn replay(moves: &[LoggedMove]) -> Result<GameState, CorruptLog> {
    let mut board = Board::initial();
    let mut next_turn = Role::White;
    let mut forced_from: Option<Coord> = None;

    for (i, m) in moves.iter().enumerate() {
        if m.player != next_turn {
            next_turn = m.player;
            forced_from = None;
        }

        let color = m.player.color();
        let must_capture = !rules::all_captures(&board, color).is_empty();

        let applied = rules::validate_and_apply(
            &board,
            color,
            m.from,
            m.to,
            forced_from,
            must_capture || forced_from.is_some(),
        )
        .map_err(|source| CorruptLog {
            number: i + 1,
            source,
        })?;

        board = applied.board;

        if applied.was_capture
            && !applied.kinged_now
            && !rules::piece_captures(&board, applied.new_pos).is_empty()
        {
            // Chain continues: same player moves again, from the landing square.
            forced_from = Some(applied.new_pos);
            continue;
        }

        forced_from = None;
        next_turn = m.player.opponent();
    }

    let must_capture = !rules::all_captures(&board, next_turn.color()).is_empty();
    Ok(GameState {
        board,
        next_turn,
        forced_from,
        must_capture,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(row: u8, col: u8) -> Coord {
        Coord::new(row, col)
    }

    fn mv(player: Role, from: (u8, u8), to: (u8, u8)) -> LoggedMove {
        LoggedMove {
            player,
            from: at(from.0, from.1),
            to: at(to.0, to.1),
        }
    }

    #[test]
    fn empty_log_yields_the_opening_position() {
        let state = replay(&[]).unwrap();
        assert_eq!(state.next_turn, Role::White);
        assert_eq!(state.forced_from, None);
        assert!(!state.must_capture);
        assert_eq!(state.board, Board::initial());
    }

    #[test]
    fn turns_alternate_after_plain_steps() {
        let state = replay(&[
            mv(Role::White, (5, 0), (4, 1)),
            mv(Role::Black, (2, 1), (3, 0)),
        ])
        .unwrap();
        assert_eq!(state.next_turn, Role::White);
        assert_eq!(state.forced_from, None);
        assert!(state.board.get(at(5, 0)).is_none());
        assert_eq!(state.board.get(at(3, 0)), Some(Piece::man(Color::Black)));
    }

    #[test]
    fn replay_matches_online_application() {
        // The board replay produces must equal the board the engine computed
        // when the moves were applied one at a time.
        let log = [
            mv(Role::White, (5, 2), (4, 3)),
            mv(Role::Black, (2, 5), (3, 4)),
        ];

        let mut board = Board::initial();
        let mut turn = Role::White;
        for m in &log {
            let must = !rules::all_captures(&board, turn.color()).is_empty();
            let applied =
                rules::validate_and_apply(&board, turn.color(), m.from, m.to, None, must)
                    .unwrap();
            board = applied.board;
            turn = turn.opponent();
        }

        let state = replay(&log).unwrap();
        assert_eq!(state.board, board);
        assert_eq!(state.next_turn, turn);
        // White's man on [4,3] faces black's on [3,4]: a capture is forced.
        assert!(state.must_capture);
    }

    /// A line from the opening that opens a double-jump lane for white:
    /// black vacates [0,7] and refills [1,6], then leaves a man en prise
    /// on [3,4]. After white's jump to [2,5] a further jump over [1,6] to
    /// the now-empty [0,7] is available.
    fn double_jump_preamble() -> Vec<LoggedMove> {
        vec![
            mv(Role::White, (5, 0), (4, 1)),
            mv(Role::Black, (2, 7), (3, 6)),
            mv(Role::White, (6, 1), (5, 0)),
            mv(Role::Black, (1, 6), (2, 7)),
            mv(Role::White, (7, 0), (6, 1)),
            mv(Role::Black, (0, 7), (1, 6)),
            mv(Role::White, (5, 2), (4, 3)),
            mv(Role::Black, (2, 5), (3, 4)),
            mv(Role::White, (4, 3), (2, 5)),
        ]
    }

    #[test]
    fn capture_with_continuation_keeps_the_same_player() {
        let state = replay(&double_jump_preamble()).unwrap();
        assert_eq!(state.next_turn, Role::White);
        assert_eq!(state.forced_from, Some(at(2, 5)));
        assert!(state.must_capture);
    }

    #[test]
    fn coronation_ends_the_chain() {
        let mut log = double_jump_preamble();
        log.push(mv(Role::White, (2, 5), (0, 7)));
        let state = replay(&log).unwrap();
        // The jumper landed on row 0 and was crowned; coronation ends the
        // turn, so black moves next with no pending chain.
        assert_eq!(state.next_turn, Role::Black);
        assert_eq!(state.forced_from, None);
        assert_eq!(state.board.get(at(0, 7)), Some(Piece::king(Color::Red)));
    }

    #[test]
    fn mismatched_player_is_trusted_not_fatal() {
        // The log says black opened, which the engine would never predict.
        // Replay adopts the logged player instead of failing.
        let state = replay(&[mv(Role::Black, (2, 1), (3, 0))]).unwrap();
        assert_eq!(state.next_turn, Role::White);
        assert_eq!(state.board.get(at(3, 0)), Some(Piece::man(Color::Black)));
    }

    #[test]
    fn illegal_logged_move_is_a_corrupt_log() {
        let err = replay(&[mv(Role::White, (5, 0), (3, 0))]).unwrap_err();
        assert_eq!(err.number, 1);
        assert_eq!(err.source, IllegalMove::Geometry);
    }

    #[test]
    fn corrupt_log_reports_the_offending_move_number() {
        let err = replay(&[
            mv(Role::White, (5, 0), (4, 1)),
            mv(Role::Black, (2, 1), (4, 1)),
        ])
        .unwrap_err();
        assert_eq!(err.number, 2);
    }
}
