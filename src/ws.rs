//! WebSocket play: the per-match rooms and the per-connection game session.
//!
//! ## Architecture
//!
//! - **`RoomRegistry`** — A singleton actor owning the map of match rooms
//!   (`matchid → userid → session address`). It attaches and detaches
//!   sessions, fans broadcasts out to a room, and closes whole rooms when a
//!   match ends. Registration is the only shared mutable state; all socket
//!   I/O stays with the owning session actor.
//!
//! - **`MatchSession`** — An actor representing one authenticated player
//!   connection to one match. On start it sends the authoritative `sync`
//!   built by replaying the move log; afterwards it validates, persists,
//!   and broadcasts each inbound move. Frames are processed strictly in
//!   order per connection (`ctx.wait`), so two move pipelines never
//!   interleave on the same session.
//!
//! ## Protocol
//!
//! Frames are JSON objects `{ "type": string, "payload": object }`.
//!
//! | Direction | type             | payload |
//! |-----------|------------------|---------|
//! | S→C       | `sync`           | `matchid`, `status`, `your_role`, `next_turn`, `forced_from`, `must_capture`, `moves` |
//! | C→S       | `ping`           | `{}` |
//! | S→C       | `pong`           | `{}` |
//! | C→S       | `move`           | `{ "move": { "from": [r,c], "to": [r,c] } }` |
//! | S→C       | `move`           | the stored move row plus `next_turn`, `must_continue`, `forced_from` |
//! | S→C       | `error`          | `detail`, optionally the authoritative turn state |
//! | S→C       | `match_finished` | `matchid`, `status`, `result`, `reason`, `finished_at` |
//!
//! Close codes: `1000` normal, `1008` policy (not authenticated, match
//! missing, not a participant), `1011` internal fault (corrupt log).

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::api::AppState;
use crate::auth;
use crate::replay::{self, GameState};
use crate::rules;
use crate::store::{self, StoreError};
use crate::types::*;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// How often the server pings a session to detect stale clients.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum time without a pong before the connection is considered dead.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Registry messages (actor mailbox protocol)
// ---------------------------------------------------------------------------

/// Attach a session to a match room. Displaces any previous session of the
/// same player in the same match (single session per player per match).
#[derive(Message)]
#[rtype(result = "()")]
pub struct Attach {
    pub matchid: i64,
    pub userid: i64,
    pub addr: Addr<MatchSession>,
}

/// Detach a session from its room. Carries the address so a session that
/// was already displaced cannot evict its replacement.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Detach {
    pub matchid: i64,
    pub userid: i64,
    pub addr: Addr<MatchSession>,
}

/// Fan a pre-serialized frame out to every session in a room.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct Broadcast {
    pub matchid: i64,
    pub frame: String,
}

/// Close every session in a room and drop the room.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseMatch {
    pub matchid: i64,
    pub code: ws::CloseCode,
}

/// Deliver a text frame to a single session.
#[derive(Message)]
#[rtype(result = "()")]
struct SessionText(String);

/// Tell a session to close its socket and stop.
#[derive(Message)]
#[rtype(result = "()")]
struct SessionClose(ws::CloseCode);

// ---------------------------------------------------------------------------
// RoomRegistry — per-match connection rooms (actor)
// ---------------------------------------------------------------------------

/// Singleton actor owning all match rooms. Created at server start and
/// shared via `web::Data`; rooms die with their last session or when the
/// match ends.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: HashMap<i64, HashMap<i64, Addr<MatchSession>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actor for RoomRegistry {
    type Context = Context<Self>;
}

impl Handler<Attach> for RoomRegistry {
    type Result = ();

    fn handle(&mut self, msg: Attach, _ctx: &mut Context<Self>) {
        log::debug!("user {} attached to match {}", msg.userid, msg.matchid);
        let room = self.rooms.entry(msg.matchid).or_default();
        if let Some(previous) = room.insert(msg.userid, msg.addr) {
            // The player reconnected; the old socket is closed normally.
            previous.do_send(SessionClose(ws::CloseCode::Normal));
        }
    }
}

impl Handler<Detach> for RoomRegistry {
    type Result = ();

    fn handle(&mut self, msg: Detach, _ctx: &mut Context<Self>) {
        if let Some(room) = self.rooms.get_mut(&msg.matchid) {
            if room.get(&msg.userid) == Some(&msg.addr) {
                log::debug!("user {} detached from match {}", msg.userid, msg.matchid);
                room.remove(&msg.userid);
            }
            if room.is_empty() {
                self.rooms.remove(&msg.matchid);
            }
        }
    }
}

impl Handler<Broadcast> for RoomRegistry {
    type Result = ();

    fn handle(&mut self, msg: Broadcast, _ctx: &mut Context<Self>) {
        if let Some(room) = self.rooms.get(&msg.matchid) {
            // Snapshot of the addresses; sessions may attach or detach
            // while frames are in flight. A dead session simply drops the
            // message and detaches itself on stop.
            let peers: Vec<_> = room.values().cloned().collect();
            for peer in peers {
                peer.do_send(SessionText(msg.frame.clone()));
            }
        }
    }
}

impl Handler<CloseMatch> for RoomRegistry {
    type Result = ();

    fn handle(&mut self, msg: CloseMatch, _ctx: &mut Context<Self>) {
        if let Some(room) = self.rooms.remove(&msg.matchid) {
            log::info!("closing room of match {}", msg.matchid);
            for peer in room.into_values() {
                peer.do_send(SessionClose(msg.code));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Frame builders
// ---------------------------------------------------------------------------

fn frame(kind: &str, payload: serde_json::Value) -> String {
    json!({ "type": kind, "payload": payload }).to_string()
}

fn error_frame(detail: &str) -> String {
    frame("error", json!({ "detail": detail }))
}

/// An error frame carrying the authoritative turn state so the client can
/// reconcile its view.
fn state_error_frame(detail: &str, state: &GameState) -> String {
    frame(
        "error",
        json!({
            "detail": detail,
            "next_turn": state.next_turn,
            "forced_from": state.forced_from,
            "must_capture": state.must_capture,
        }),
    )
}

// ---------------------------------------------------------------------------
// Session pipelines (plain async, no actor state)
// ---------------------------------------------------------------------------

/// What the session actor should do after an async pipeline step.
enum Outcome {
    /// Send a frame to this session only.
    Reply(String),
    /// Send a frame, then close the socket with the given code.
    ReplyAndClose(String, ws::CloseCode),
    /// Close the socket with the given code; the detail is logged
    /// server-side only, never sent to the client.
    Fatal(String, ws::CloseCode),
    /// A move was committed: broadcast it, and if the match just finished,
    /// broadcast that too and close the room.
    Committed {
        move_frame: String,
        finished_frame: Option<String>,
    },
}

/// Builds the `sync` frame for a freshly attached session by replaying the
/// move log. Returns the match status alongside so the caller can close
/// non-ongoing sessions after the sync is delivered.
async fn run_sync(pool: &SqlitePool, matchid: i64, role: Role) -> (Outcome, Option<MatchStatus>) {
    let m = match store::get_match(pool, matchid).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            return (
                Outcome::Fatal(
                    format!("match {} vanished before sync", matchid),
                    ws::CloseCode::Policy,
                ),
                None,
            );
        }
        Err(e) => {
            return (
                Outcome::Fatal(
                    format!("loading match {} for sync: {}", matchid, e),
                    ws::CloseCode::Error,
                ),
                None,
            );
        }
    };

    let moves = match store::load_moves(pool, matchid).await {
        Ok(moves) => moves,
        Err(e) => {
            return (
                Outcome::Fatal(
                    format!("loading move log of match {}: {}", matchid, e),
                    ws::CloseCode::Error,
                ),
                None,
            );
        }
    };

    let logged: Vec<_> = moves.iter().map(|m| m.logged()).collect();
    let state = match replay::replay(&logged) {
        Ok(state) => state,
        Err(e) => {
            return (
                Outcome::Fatal(
                    format!("match {}: {}", matchid, e),
                    ws::CloseCode::Error,
                ),
                None,
            );
        }
    };

    let sync = frame(
        "sync",
        json!({
            "matchid": matchid,
            "status": m.status,
            "your_role": role,
            "next_turn": state.next_turn,
            "forced_from": state.forced_from,
            "must_capture": state.must_capture,
            "moves": moves,
        }),
    );

    if m.status == MatchStatus::Ongoing {
        (Outcome::Reply(sync), Some(m.status))
    } else {
        (
            Outcome::ReplyAndClose(sync, ws::CloseCode::Normal),
            Some(m.status),
        )
    }
}

/// The core move pipeline: re-derive authoritative state from the log,
/// validate the move, persist it under the locking append, detect terminal
/// positions, and produce the frames to fan out.
///
/// Nothing here touches the socket; the caller owns delivery. State is only
/// ever advanced by the committed append — every error path leaves the
/// match untouched.
async fn process_move(pool: &SqlitePool, matchid: i64, role: Role, mv: MoveIn) -> Outcome {
    // Re-read the match; a finished or aborted match rejects moves but
    // keeps the session open so the client can still see match_finished.
    let m = match store::get_match(pool, matchid).await {
        Ok(Some(m)) => m,
        Ok(None) => return Outcome::Reply(error_frame("Match not ongoing")),
        Err(e) => {
            return Outcome::Fatal(
                format!("re-reading match {}: {}", matchid, e),
                ws::CloseCode::Error,
            );
        }
    };
    if m.status != MatchStatus::Ongoing {
        return Outcome::Reply(error_frame("Match not ongoing"));
    }

    // The replayed log is authoritative on every message, including chain
    // continuations; nothing is cached across messages.
    let moves = match store::load_moves(pool, matchid).await {
        Ok(moves) => moves,
        Err(e) => {
            return Outcome::Fatal(
                format!("loading move log of match {}: {}", matchid, e),
                ws::CloseCode::Error,
            );
        }
    };
    let logged: Vec<_> = moves.iter().map(|m| m.logged()).collect();
    let state = match replay::replay(&logged) {
        Ok(state) => state,
        Err(e) => {
            return Outcome::Fatal(format!("match {}: {}", matchid, e), ws::CloseCode::Error);
        }
    };

    if role != state.next_turn {
        return Outcome::Reply(state_error_frame("Not your turn", &state));
    }

    let applied = match rules::validate_and_apply(
        &state.board,
        role.color(),
        mv.from,
        mv.to,
        state.forced_from,
        state.must_capture || state.forced_from.is_some(),
    ) {
        Ok(applied) => applied,
        Err(e) => return Outcome::Reply(state_error_frame(&e.to_string(), &state)),
    };

    // Chain continuation: same player again unless the capture crowned.
    let must_continue = applied.was_capture
        && !applied.kinged_now
        && !rules::piece_captures(&applied.board, applied.new_pos).is_empty();
    let new_forced = must_continue.then_some(applied.new_pos);

    let stored = StoredMove {
        from: mv.from,
        to: mv.to,
        was_capture: applied.was_capture,
    };
    let row = match store::append_move(pool, matchid, role, &stored).await {
        Ok(row) => row,
        Err(StoreError::NumberingConflict) => {
            return Outcome::Reply(error_frame("Move numbering conflict. Please resend."));
        }
        Err(StoreError::MatchNotOngoing | StoreError::MatchNotFound) => {
            return Outcome::Reply(error_frame("Match not ongoing"));
        }
        Err(StoreError::Db(e)) => {
            log::error!("saving move for match {}: {}", matchid, e);
            return Outcome::Reply(error_frame("Database error while saving move"));
        }
    };

    let next_turn = if must_continue { role } else { role.opponent() };

    // Terminal check only when the turn actually passes: if the next
    // player has no step and no capture, they lose.
    let mut finished_frame = None;
    if !must_continue && !rules::has_any_legal_move(&applied.board, next_turn.color()) {
        match store::finish_match(
            pool,
            matchid,
            MatchResult::win_for(role),
            MatchReason::Normal,
        )
        .await
        {
            Ok(finished) => {
                finished_frame = Some(frame(
                    "match_finished",
                    json!({
                        "matchid": finished.matchid,
                        "status": finished.status,
                        "result": finished.result,
                        "reason": finished.reason,
                        "finished_at": finished.finished_at,
                    }),
                ));
            }
            Err(StoreError::MatchNotOngoing) => {
                // A concurrent writer finished it first; their broadcast wins.
                log::warn!("match {} already finished", matchid);
            }
            Err(e) => {
                // The move itself is committed; losing the finish broadcast
                // never loses the record.
                log::error!("finishing match {}: {}", matchid, e);
            }
        }
    }

    let move_frame = frame(
        "move",
        json!({
            "id": row.id,
            "matchid": row.matchid,
            "move_number": row.move_number,
            "player": row.player,
            "move": row.mv,
            "created_at": row.created_at,
            "next_turn": next_turn,
            "must_continue": must_continue,
            "forced_from": new_forced,
        }),
    );

    Outcome::Committed {
        move_frame,
        finished_frame,
    }
}

// ---------------------------------------------------------------------------
// MatchSession — per-connection actor
// ---------------------------------------------------------------------------

/// A single authenticated player connection to a match.
pub struct MatchSession {
    matchid: i64,
    userid: i64,
    role: Role,
    last_heartbeat: Instant,
    state: web::Data<AppState>,
    registry: Addr<RoomRegistry>,
}

impl MatchSession {
    fn new(
        matchid: i64,
        userid: i64,
        role: Role,
        state: web::Data<AppState>,
        registry: Addr<RoomRegistry>,
    ) -> Self {
        Self {
            matchid,
            userid,
            role,
            last_heartbeat: Instant::now(),
            state,
            registry,
        }
    }

    /// Periodic ping; a client that stops answering is dropped.
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                log::warn!(
                    "match {} user {}: heartbeat timeout",
                    act.matchid,
                    act.userid
                );
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Applies a pipeline outcome on the actor's context.
    fn deliver(&mut self, outcome: Outcome, ctx: &mut ws::WebsocketContext<Self>) {
        match outcome {
            Outcome::Reply(text) => ctx.text(text),
            Outcome::ReplyAndClose(text, code) => {
                ctx.text(text);
                ctx.close(Some(code.into()));
                ctx.stop();
            }
            Outcome::Fatal(detail, code) => {
                log::error!(
                    "match {} user {}: {}",
                    self.matchid,
                    self.userid,
                    detail
                );
                ctx.close(Some(code.into()));
                ctx.stop();
            }
            Outcome::Committed {
                move_frame,
                finished_frame,
            } => {
                // Broadcasts go out only after the transaction committed;
                // the room sees moves in commit order.
                self.registry.do_send(Broadcast {
                    matchid: self.matchid,
                    frame: move_frame,
                });
                if let Some(finished) = finished_frame {
                    self.registry.do_send(Broadcast {
                        matchid: self.matchid,
                        frame: finished,
                    });
                    self.registry.do_send(CloseMatch {
                        matchid: self.matchid,
                        code: ws::CloseCode::Normal,
                    });
                }
            }
        }
    }

    /// Dispatches one inbound text frame.
    fn handle_frame(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let parsed: ClientFrame = match serde_json::from_str(text) {
            Ok(f) => f,
            Err(_) => {
                ctx.text(error_frame("Invalid message"));
                return;
            }
        };

        match parsed.kind.as_str() {
            "ping" => ctx.text(frame("pong", json!({}))),
            "move" => {
                let mv = match serde_json::from_value::<MovePayload>(parsed.payload) {
                    Ok(p) => p.mv,
                    Err(_) => {
                        ctx.text(error_frame("Invalid move payload"));
                        return;
                    }
                };

                let pool = self.state.pool.clone();
                let matchid = self.matchid;
                let role = self.role;
                let pipeline = async move { process_move(&pool, matchid, role, mv).await };
                // wait(): no further frames are processed until the move
                // pipeline resolves, so a session handles moves one at a time.
                ctx.wait(
                    pipeline
                        .into_actor(self)
                        .map(|outcome, act, ctx| act.deliver(outcome, ctx)),
                );
            }
            _ => ctx.text(error_frame("Unknown message type")),
        }
    }
}

/// An inbound client frame, before payload interpretation.
#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Payload of a client `move` frame.
#[derive(Debug, Deserialize)]
struct MovePayload {
    #[serde(rename = "move")]
    mv: MoveIn,
}

impl Actor for MatchSession {
    type Context = ws::WebsocketContext<Self>;

    /// Register with the room, then deliver the initial `sync`. Non-ongoing
    /// matches still get their sync (so the client can render the final
    /// position) before the socket closes normally.
    fn started(&mut self, ctx: &mut Self::Context) {
        log::info!(
            "match {} user {} connected as {}",
            self.matchid,
            self.userid,
            self.role
        );
        self.start_heartbeat(ctx);
        self.registry.do_send(Attach {
            matchid: self.matchid,
            userid: self.userid,
            addr: ctx.address(),
        });

        let pool = self.state.pool.clone();
        let matchid = self.matchid;
        let role = self.role;
        let sync = async move { run_sync(&pool, matchid, role).await };
        ctx.wait(
            sync.into_actor(self)
                .map(|(outcome, _status), act, ctx| act.deliver(outcome, ctx)),
        );
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        log::info!(
            "match {} user {} disconnected",
            self.matchid,
            self.userid
        );
        self.registry.do_send(Detach {
            matchid: self.matchid,
            userid: self.userid,
            addr: ctx.address(),
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for MatchSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => self.handle_frame(&text, ctx),
            Ok(ws::Message::Binary(_)) => {
                ctx.text(error_frame("Binary messages are not supported"));
            }
            Ok(ws::Message::Ping(data)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(e) => {
                log::error!(
                    "match {} user {}: protocol error: {}",
                    self.matchid,
                    self.userid,
                    e
                );
                ctx.close(Some(ws::CloseCode::Error.into()));
                ctx.stop();
            }
        }
    }
}

impl Handler<SessionText> for MatchSession {
    type Result = ();

    fn handle(&mut self, msg: SessionText, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl Handler<SessionClose> for MatchSession {
    type Result = ();

    fn handle(&mut self, msg: SessionClose, ctx: &mut Self::Context) {
        ctx.close(Some(msg.0.into()));
        ctx.stop();
    }
}

// ---------------------------------------------------------------------------
// Rejection session — completes the handshake, then closes with a code
// ---------------------------------------------------------------------------

/// A throwaway session used when the upgrade request fails auth or the
/// participant check: the WebSocket handshake completes so the client
/// receives a proper close code instead of an HTTP error.
struct RejectSession {
    code: ws::CloseCode,
}

impl Actor for RejectSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        ctx.close(Some(self.code.into()));
        ctx.stop();
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RejectSession {
    fn handle(&mut self, _msg: Result<ws::Message, ws::ProtocolError>, _ctx: &mut Self::Context) {}
}

// ---------------------------------------------------------------------------
// HTTP → WebSocket upgrade handler
// ---------------------------------------------------------------------------

/// Entry point for `GET /api/v1/ws/match/{matchid}`.
///
/// Authenticates the cookie, loads the match, and checks the caller is one
/// of its players before starting the session actor. Policy failures close
/// with `1008` after the handshake.
pub async fn match_socket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<i64>,
    state: web::Data<AppState>,
    registry: web::Data<Addr<RoomRegistry>>,
) -> Result<HttpResponse, actix_web::Error> {
    let matchid = path.into_inner();

    let user = match auth::current_user(&req, &state.pool, &state.jwt_secret).await {
        Ok(user) => user,
        Err(e) => {
            log::warn!("ws auth failed for match {}: {}", matchid, e);
            return ws::start(
                RejectSession {
                    code: ws::CloseCode::Policy,
                },
                &req,
                stream,
            );
        }
    };

    let m = match store::get_match(&state.pool, matchid).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            return ws::start(
                RejectSession {
                    code: ws::CloseCode::Policy,
                },
                &req,
                stream,
            );
        }
        Err(e) => {
            log::error!("loading match {} for ws connect: {}", matchid, e);
            return ws::start(
                RejectSession {
                    code: ws::CloseCode::Error,
                },
                &req,
                stream,
            );
        }
    };

    let Some(role) = m.role_of(user.userid) else {
        log::warn!(
            "user {} is not a participant of match {}",
            user.userid,
            matchid
        );
        return ws::start(
            RejectSession {
                code: ws::CloseCode::Policy,
            },
            &req,
            stream,
        );
    };

    ws::start(
        MatchSession::new(matchid, user.userid, role, state, registry.get_ref().clone()),
        &req,
        stream,
    )
}
