//! # checkrs — real-time checkers match server
//!
//! A server-authoritative engine for two-player online checkers (American
//! draughts). Matchmaking pairs players over REST; play happens over a
//! per-match WebSocket. The server validates every move against the rules,
//! appends it to a per-match move log, and derives all board state by
//! replaying that log — positions are never stored.
//!
//! ## Features
//!
//! - **Rules engine**: mandatory captures, multi-jump chains, king
//!   promotion with the coronation-ends-turn rule, and stalemate-loss
//!   terminal detection, implemented as a pure function over immutable
//!   board snapshots.
//! - **Append-only move log**: gap-free 1-based move numbering guaranteed
//!   under concurrent writers by a write-locking transaction that couples
//!   the match-status check to the insert.
//! - **Match rooms**: one WebSocket room per match with authoritative
//!   `sync` on connect, broadcasts in commit order, and a policy of one
//!   session per player per match.
//! - **Matchmaking**: single waiting seat per player, stale-waiter
//!   eviction, at most one active match per player.
//!
//! ## Endpoints
//!
//! | Method | Path                                  | Description              |
//! |--------|---------------------------------------|--------------------------|
//! | POST   | `/api/v1/matchmaking/find`            | Find or create a match   |
//! | POST   | `/api/v1/matchmaking/{matchid}/resign`| Resign an ongoing match  |
//! | GET    | `/api/v1/ws/match/{matchid}`          | WebSocket for a match    |
//! | GET    | `/health`                             | Liveness probe           |
//! | GET    | `/swagger-ui/`                        | API documentation        |

pub mod api;
pub mod auth;
pub mod replay;
pub mod rules;
pub mod store;
pub mod types;
pub mod ws;
