//! Persistence for matches and the append-only move log.
//!
//! Backed by SQLite through sqlx. Board positions are never stored — only
//! the match record and its move log, from which state is replayed.
//!
//! ## Locking protocol
//!
//! Every write that must observe a consistent match (appending a move,
//! claiming a waiting slot, resigning) runs inside a `BEGIN IMMEDIATE`
//! transaction: the write lock is taken before the first read, so two
//! concurrent writers serialize and the second one sees the first one's
//! committed row. The status check, the `MAX(move_number)` read, and the
//! insert of a move therefore cannot interleave with another appender.
//! The `UNIQUE(matchid, move_number)` index is the backstop that turns a
//! lost race into [`StoreError::NumberingConflict`] instead of a gap or a
//! duplicate.

use crate::replay::LoggedMove;
use crate::types::*;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteConnection;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Creates the tables consumed by the engine. The users table is owned by
/// the account service; it is created here only so a fresh database is
/// usable in development and tests.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            userid     INTEGER PRIMARY KEY AUTOINCREMENT,
            email      TEXT NOT NULL UNIQUE,
            username   TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS matches (
            matchid     INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at  TEXT NOT NULL,
            finished_at TEXT,
            white_user  INTEGER REFERENCES users(userid),
            black_user  INTEGER REFERENCES users(userid),
            result      TEXT NOT NULL DEFAULT 'none',
            reason      TEXT NOT NULL DEFAULT 'none',
            status      TEXT NOT NULL DEFAULT 'waiting'
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS match_moves (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            matchid     INTEGER NOT NULL
                        REFERENCES matches(matchid) ON DELETE CASCADE,
            move_number INTEGER NOT NULL,
            player      TEXT NOT NULL,
            move        TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(matchid, move_number)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A row of the `matches` table.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct MatchRow {
    pub matchid: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub white_user: Option<i64>,
    pub black_user: Option<i64>,
    pub result: MatchResult,
    pub reason: MatchReason,
    pub status: MatchStatus,
}

impl MatchRow {
    /// Returns the role the user plays in this match, if they participate.
    pub fn role_of(&self, userid: i64) -> Option<Role> {
        if self.white_user == Some(userid) {
            Some(Role::White)
        } else if self.black_user == Some(userid) {
            Some(Role::Black)
        } else {
            None
        }
    }
}

/// A row of the `match_moves` table. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MoveRow {
    pub id: i64,
    pub matchid: i64,
    pub move_number: i64,
    pub player: Role,
    #[sqlx(rename = "move")]
    #[serde(rename = "move")]
    pub mv: Json<StoredMove>,
    pub created_at: DateTime<Utc>,
}

impl MoveRow {
    /// The view of this row the replayer consumes.
    pub fn logged(&self) -> LoggedMove {
        LoggedMove {
            player: self.player,
            from: self.mv.from,
            to: self.mv.to,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by the store. Variants carry no SQL detail; the
/// underlying error is preserved in `Db` for server-side logging only.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Match not found")]
    MatchNotFound,
    #[error("Match not ongoing")]
    MatchNotOngoing,
    #[error("Move numbering conflict. Please resend.")]
    NumberingConflict,
    #[error("database error")]
    Db(#[from] sqlx::Error),
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::NumberingConflict,
        _ => StoreError::Db(err),
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

const MATCH_COLUMNS: &str = "matchid, started_at, finished_at, white_user, black_user, \
                             result, reason, status";

/// Loads a match by id.
pub async fn get_match(pool: &SqlitePool, matchid: i64) -> Result<Option<MatchRow>, StoreError> {
    let row = sqlx::query_as::<_, MatchRow>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE matchid = ?"
    ))
    .bind(matchid)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Loads the full move log for a match, ascending by `move_number`.
pub async fn load_moves(pool: &SqlitePool, matchid: i64) -> Result<Vec<MoveRow>, StoreError> {
    let rows = sqlx::query_as::<_, MoveRow>(
        "SELECT id, matchid, move_number, player, move, created_at
         FROM match_moves WHERE matchid = ? ORDER BY move_number ASC",
    )
    .bind(matchid)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Move log append
// ---------------------------------------------------------------------------

/// Appends a move to a match's log with a gap-free `move_number`.
///
/// The whole operation — status re-check, `MAX(move_number)` read, insert —
/// runs in one immediate transaction, so concurrent appenders for the same
/// match serialize and numbering stays contiguous. Callers receive
/// [`StoreError::NumberingConflict`] when a race slips through anyway and
/// should tell the client to resend; nothing is committed in that case.
pub async fn append_move(
    pool: &SqlitePool,
    matchid: i64,
    player: Role,
    mv: &StoredMove,
) -> Result<MoveRow, StoreError> {
    let mut conn = pool.acquire().await.map_err(StoreError::Db)?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    let result = append_move_locked(&mut conn, matchid, player, mv).await;
    finish_tx(&mut conn, result).await
}

async fn append_move_locked(
    conn: &mut SqliteConnection,
    matchid: i64,
    player: Role,
    mv: &StoredMove,
) -> Result<MoveRow, StoreError> {
    let locked = sqlx::query_as::<_, MatchRow>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE matchid = ?"
    ))
    .bind(matchid)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StoreError::MatchNotFound)?;

    if locked.status != MatchStatus::Ongoing {
        return Err(StoreError::MatchNotOngoing);
    }

    let last: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(move_number), 0) FROM match_moves WHERE matchid = ?")
            .bind(matchid)
            .fetch_one(&mut *conn)
            .await?;
    let next_number = last + 1;

    sqlx::query_as::<_, MoveRow>(
        "INSERT INTO match_moves (matchid, move_number, player, move, created_at)
         VALUES (?, ?, ?, ?, ?)
         RETURNING id, matchid, move_number, player, move, created_at",
    )
    .bind(matchid)
    .bind(next_number)
    .bind(player)
    .bind(Json(*mv))
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await
    .map_err(map_unique_violation)
}

/// Commits on success, rolls back on failure, and passes the result through.
async fn finish_tx<T>(
    conn: &mut SqliteConnection,
    result: Result<T, StoreError>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(value)
        }
        Err(e) => {
            let _ = sqlx::query("ROLLBACK").execute(&mut *conn).await;
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Match lifecycle
// ---------------------------------------------------------------------------

/// Marks an ongoing match finished with the given result and reason,
/// stamping `finished_at`. Transitions are monotonic: a match that is not
/// `ongoing` is left untouched and the call fails.
pub async fn finish_match(
    pool: &SqlitePool,
    matchid: i64,
    result: MatchResult,
    reason: MatchReason,
) -> Result<MatchRow, StoreError> {
    let updated = sqlx::query(
        "UPDATE matches
         SET status = 'finished', result = ?, reason = ?, finished_at = ?
         WHERE matchid = ? AND status = 'ongoing'",
    )
    .bind(result)
    .bind(reason)
    .bind(Utc::now())
    .bind(matchid)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(StoreError::MatchNotOngoing);
    }
    get_match(pool, matchid).await?.ok_or(StoreError::MatchNotFound)
}

// ---------------------------------------------------------------------------
// Matchmaking
// ---------------------------------------------------------------------------

/// Returns the user's most recent ongoing match, if any. A player has at
/// most one, but the query tolerates legacy data by picking the newest.
pub async fn find_ongoing_for(
    pool: &SqlitePool,
    userid: i64,
) -> Result<Option<MatchRow>, StoreError> {
    let row = sqlx::query_as::<_, MatchRow>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches
         WHERE status = 'ongoing' AND (white_user = ? OR black_user = ?)
         ORDER BY started_at DESC LIMIT 1"
    ))
    .bind(userid)
    .bind(userid)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Deletes waiting matches older than `horizon`. Their move logs (always
/// empty in practice) go with them via the cascade.
pub async fn evict_stale_waiting(
    pool: &SqlitePool,
    horizon: Duration,
) -> Result<u64, StoreError> {
    let cutoff = Utc::now() - horizon;
    let deleted = sqlx::query("DELETE FROM matches WHERE status = 'waiting' AND started_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(deleted.rows_affected())
}

/// Claims the oldest waiting match that has a free slot and does not
/// already belong to the user: fills the empty slot and flips the match to
/// `ongoing`, all inside one immediate transaction so two racing claimants
/// cannot take the same slot.
pub async fn claim_oldest_waiting(
    pool: &SqlitePool,
    userid: i64,
) -> Result<Option<(MatchRow, Role)>, StoreError> {
    let mut conn = pool.acquire().await.map_err(StoreError::Db)?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    let result = claim_oldest_waiting_locked(&mut conn, userid).await;
    finish_tx(&mut conn, result).await
}

async fn claim_oldest_waiting_locked(
    conn: &mut SqliteConnection,
    userid: i64,
) -> Result<Option<(MatchRow, Role)>, StoreError> {
    let candidate = sqlx::query_as::<_, MatchRow>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches
         WHERE status = 'waiting'
           AND (white_user IS NULL OR white_user != ?)
           AND (black_user IS NULL OR black_user != ?)
         ORDER BY started_at ASC LIMIT 1"
    ))
    .bind(userid)
    .bind(userid)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(candidate) = candidate else {
        return Ok(None);
    };

    let role = if candidate.white_user.is_none() {
        Role::White
    } else {
        Role::Black
    };
    let column = match role {
        Role::White => "white_user",
        Role::Black => "black_user",
    };

    sqlx::query(&format!(
        "UPDATE matches SET {column} = ?, status = 'ongoing'
         WHERE matchid = ? AND status = 'waiting'"
    ))
    .bind(userid)
    .bind(candidate.matchid)
    .execute(&mut *conn)
    .await?;

    let claimed = sqlx::query_as::<_, MatchRow>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches WHERE matchid = ?"
    ))
    .bind(candidate.matchid)
    .fetch_one(&mut *conn)
    .await?;

    Ok(Some((claimed, role)))
}

/// Returns the user's own oldest waiting match, if any.
pub async fn own_waiting(
    pool: &SqlitePool,
    userid: i64,
) -> Result<Option<(MatchRow, Role)>, StoreError> {
    let row = sqlx::query_as::<_, MatchRow>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches
         WHERE status = 'waiting' AND (white_user = ? OR black_user = ?)
         ORDER BY started_at ASC LIMIT 1"
    ))
    .bind(userid)
    .bind(userid)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|m| {
        let role = if m.white_user == Some(userid) {
            Role::White
        } else {
            Role::Black
        };
        (m, role)
    }))
}

/// Creates a fresh waiting match with the user in the given slot.
pub async fn create_waiting(
    pool: &SqlitePool,
    userid: i64,
    role: Role,
) -> Result<MatchRow, StoreError> {
    let column = match role {
        Role::White => "white_user",
        Role::Black => "black_user",
    };
    let row = sqlx::query_as::<_, MatchRow>(&format!(
        "INSERT INTO matches (started_at, status, {column}) VALUES (?, 'waiting', ?)
         RETURNING {MATCH_COLUMNS}"
    ))
    .bind(Utc::now())
    .bind(userid)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Resigns an ongoing match on behalf of `userid`: the opponent wins with
/// reason `resign`. Fails with [`StoreError::MatchNotFound`] when the match
/// is missing, already over, or does not involve the user.
pub async fn resign(
    pool: &SqlitePool,
    matchid: i64,
    userid: i64,
) -> Result<MatchRow, StoreError> {
    let mut conn = pool.acquire().await.map_err(StoreError::Db)?;
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    let result = resign_locked(&mut conn, matchid, userid).await;
    finish_tx(&mut conn, result).await
}

async fn resign_locked(
    conn: &mut SqliteConnection,
    matchid: i64,
    userid: i64,
) -> Result<MatchRow, StoreError> {
    let m = sqlx::query_as::<_, MatchRow>(&format!(
        "SELECT {MATCH_COLUMNS} FROM matches
         WHERE matchid = ? AND status = 'ongoing'
           AND (white_user = ? OR black_user = ?)"
    ))
    .bind(matchid)
    .bind(userid)
    .bind(userid)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(StoreError::MatchNotFound)?;

    let winner = match m.role_of(userid) {
        Some(role) => MatchResult::win_for(role.opponent()),
        None => return Err(StoreError::MatchNotFound),
    };

    let row = sqlx::query_as::<_, MatchRow>(&format!(
        "UPDATE matches
         SET status = 'finished', result = ?, reason = 'resign', finished_at = ?
         WHERE matchid = ?
         RETURNING {MATCH_COLUMNS}"
    ))
    .bind(winner)
    .bind(Utc::now())
    .bind(matchid)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        // A single connection keeps the in-memory database alive and shared.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        init_schema(&pool).await.expect("schema");
        pool
    }

    async fn insert_user(pool: &SqlitePool, email: &str) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO users (email, username) VALUES (?, ?) RETURNING userid",
        )
        .bind(email)
        .bind(email.split('@').next().unwrap())
        .fetch_one(pool)
        .await
        .expect("insert user")
    }

    async fn ongoing_match(pool: &SqlitePool, white: i64, black: i64) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO matches (started_at, status, white_user, black_user)
             VALUES (?, 'ongoing', ?, ?) RETURNING matchid",
        )
        .bind(Utc::now())
        .bind(white)
        .bind(black)
        .fetch_one(pool)
        .await
        .expect("insert match")
    }

    fn stored(from: (u8, u8), to: (u8, u8), was_capture: bool) -> StoredMove {
        StoredMove {
            from: Coord::new(from.0, from.1),
            to: Coord::new(to.0, to.1),
            was_capture,
        }
    }

    #[actix_web::test]
    async fn append_numbers_moves_contiguously_from_one() {
        let pool = test_pool().await;
        let white = insert_user(&pool, "w@example.com").await;
        let black = insert_user(&pool, "b@example.com").await;
        let matchid = ongoing_match(&pool, white, black).await;

        let first = append_move(&pool, matchid, Role::White, &stored((5, 0), (4, 1), false))
            .await
            .unwrap();
        let second = append_move(&pool, matchid, Role::Black, &stored((2, 1), (3, 0), false))
            .await
            .unwrap();
        assert_eq!(first.move_number, 1);
        assert_eq!(second.move_number, 2);

        let log = load_moves(&pool, matchid).await.unwrap();
        assert_eq!(
            log.iter().map(|m| m.move_number).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(log[0].mv.from, Coord::new(5, 0));
        assert!(!log[0].mv.was_capture);
    }

    #[actix_web::test]
    async fn concurrent_appends_stay_contiguous() {
        let pool = test_pool().await;
        let white = insert_user(&pool, "w@example.com").await;
        let black = insert_user(&pool, "b@example.com").await;
        let matchid = ongoing_match(&pool, white, black).await;

        let white_move = stored((5, 0), (4, 1), false);
        let black_move = stored((2, 1), (3, 0), false);
        let (a, b) = tokio::join!(
            append_move(&pool, matchid, Role::White, &white_move),
            append_move(&pool, matchid, Role::Black, &black_move),
        );
        let mut numbers = vec![a.unwrap().move_number, b.unwrap().move_number];
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[actix_web::test]
    async fn append_rejects_non_ongoing_matches() {
        let pool = test_pool().await;
        let white = insert_user(&pool, "w@example.com").await;
        let black = insert_user(&pool, "b@example.com").await;
        let matchid = ongoing_match(&pool, white, black).await;

        finish_match(&pool, matchid, MatchResult::White, MatchReason::Normal)
            .await
            .unwrap();

        let err = append_move(&pool, matchid, Role::Black, &stored((2, 1), (3, 0), false))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MatchNotOngoing));
        assert!(load_moves(&pool, matchid).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn duplicate_move_number_is_a_numbering_conflict() {
        let pool = test_pool().await;
        let white = insert_user(&pool, "w@example.com").await;
        let black = insert_user(&pool, "b@example.com").await;
        let matchid = ongoing_match(&pool, white, black).await;

        // Simulate a writer that bypassed the lock and took number 1.
        sqlx::query(
            "INSERT INTO match_moves (matchid, move_number, player, move, created_at)
             VALUES (?, 1, 'white', '{}', ?)",
        )
        .bind(matchid)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let err = sqlx::query(
            "INSERT INTO match_moves (matchid, move_number, player, move, created_at)
             VALUES (?, 1, 'black', '{}', ?)",
        )
        .bind(matchid)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap_err();
        assert!(matches!(
            map_unique_violation(err),
            StoreError::NumberingConflict
        ));
    }

    #[actix_web::test]
    async fn finish_is_monotonic() {
        let pool = test_pool().await;
        let white = insert_user(&pool, "w@example.com").await;
        let black = insert_user(&pool, "b@example.com").await;
        let matchid = ongoing_match(&pool, white, black).await;

        let finished = finish_match(&pool, matchid, MatchResult::White, MatchReason::Normal)
            .await
            .unwrap();
        assert_eq!(finished.status, MatchStatus::Finished);
        assert_eq!(finished.result, MatchResult::White);
        assert!(finished.finished_at.is_some());

        // A second transition attempt fails and changes nothing.
        let err = finish_match(&pool, matchid, MatchResult::Black, MatchReason::Resign)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MatchNotOngoing));
        let after = get_match(&pool, matchid).await.unwrap().unwrap();
        assert_eq!(after.result, MatchResult::White);
    }

    #[actix_web::test]
    async fn claim_fills_the_empty_slot_and_goes_ongoing() {
        let pool = test_pool().await;
        let a = insert_user(&pool, "a@example.com").await;
        let b = insert_user(&pool, "b@example.com").await;

        let created = create_waiting(&pool, a, Role::Black).await.unwrap();
        assert_eq!(created.status, MatchStatus::Waiting);
        assert_eq!(created.black_user, Some(a));
        assert_eq!(created.white_user, None);

        // The owner cannot claim their own waiting match.
        assert!(claim_oldest_waiting(&pool, a).await.unwrap().is_none());

        let (claimed, role) = claim_oldest_waiting(&pool, b).await.unwrap().unwrap();
        assert_eq!(role, Role::White);
        assert_eq!(claimed.status, MatchStatus::Ongoing);
        assert_eq!(claimed.white_user, Some(b));
        assert_eq!(claimed.black_user, Some(a));

        // Nothing left to claim.
        assert!(claim_oldest_waiting(&pool, b).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn stale_waiters_are_evicted() {
        let pool = test_pool().await;
        let a = insert_user(&pool, "a@example.com").await;

        let stale_start = Utc::now() - Duration::minutes(5);
        sqlx::query(
            "INSERT INTO matches (started_at, status, white_user) VALUES (?, 'waiting', ?)",
        )
        .bind(stale_start)
        .bind(a)
        .execute(&pool)
        .await
        .unwrap();
        create_waiting(&pool, a, Role::White).await.unwrap();

        let evicted = evict_stale_waiting(&pool, Duration::minutes(1)).await.unwrap();
        assert_eq!(evicted, 1);
        // The fresh waiter survives.
        assert!(own_waiting(&pool, a).await.unwrap().is_some());
    }

    #[actix_web::test]
    async fn resign_finishes_for_the_opponent() {
        let pool = test_pool().await;
        let white = insert_user(&pool, "w@example.com").await;
        let black = insert_user(&pool, "b@example.com").await;
        let matchid = ongoing_match(&pool, white, black).await;

        let row = resign(&pool, matchid, black).await.unwrap();
        assert_eq!(row.status, MatchStatus::Finished);
        assert_eq!(row.result, MatchResult::White);
        assert_eq!(row.reason, MatchReason::Resign);
        assert!(row.finished_at.is_some());

        // Resigning a finished match, or someone else's match, is a 404.
        assert!(matches!(
            resign(&pool, matchid, black).await.unwrap_err(),
            StoreError::MatchNotFound
        ));
        let outsider = insert_user(&pool, "c@example.com").await;
        let other = ongoing_match(&pool, white, black).await;
        assert!(matches!(
            resign(&pool, other, outsider).await.unwrap_err(),
            StoreError::MatchNotFound
        ));
    }

    #[actix_web::test]
    async fn cascade_deletes_the_move_log() {
        let pool = test_pool().await;
        let white = insert_user(&pool, "w@example.com").await;
        let black = insert_user(&pool, "b@example.com").await;
        let matchid = ongoing_match(&pool, white, black).await;
        append_move(&pool, matchid, Role::White, &stored((5, 0), (4, 1), false))
            .await
            .unwrap();

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM matches WHERE matchid = ?")
            .bind(matchid)
            .execute(&pool)
            .await
            .unwrap();
        assert!(load_moves(&pool, matchid).await.unwrap().is_empty());
    }
}
