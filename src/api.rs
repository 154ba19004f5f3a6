//! REST surface of the checkrs match server.
//!
//! Real-time play happens over the WebSocket (`crate::ws`); the REST
//! surface is the matchmaking handoff that produces the match a session
//! then connects to:
//!
//! - `POST /api/v1/matchmaking/find` — pair the caller into a match
//! - `POST /api/v1/matchmaking/{matchid}/resign` — concede an ongoing match
//! - `GET /health` — liveness probe
//!
//! The API is documented with OpenAPI/Swagger via `utoipa`; Swagger UI is
//! served at `/swagger-ui/`. All endpoints authenticate via the
//! `access_token` session cookie.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Duration;
use rand::Rng;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::{OpenApi, ToSchema};

use crate::auth::{self, AuthError};
use crate::store::{self, MatchRow, StoreError};
use crate::types::*;
use crate::ws;

/// Waiting matches older than this are evicted before pairing.
pub const STALE_WAIT_MINUTES: i64 = 1;

/// Shared application state, wrapped in `web::Data` (an `Arc` internally)
/// and cloned into every HTTP and WebSocket handler.
pub struct AppState {
    /// SQLite connection pool. Each operation acquires its own connection;
    /// locking transactions never span transport I/O.
    pub pool: SqlitePool,
    /// Secret for validating access-token JWTs.
    pub jwt_secret: String,
}

// ---------------------------------------------------------------------------
// OpenAPI definition
// ---------------------------------------------------------------------------

/// OpenAPI documentation for the matchmaking API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "checkrs — checkers match server",
        version = "0.1.0",
        description = "Server-authoritative two-player checkers (American draughts). \
            Matchmaking over REST; real-time play over the WebSocket at \
            /api/v1/ws/match/{matchid}.",
        license(name = "MIT")
    ),
    paths(find_match, resign_match, health),
    components(schemas(
        FindMatchResponse,
        MatchRow,
        ErrorResponse,
        Role,
        MatchStatus,
        MatchResult,
        MatchReason,
    )),
    tags(
        (name = "matchmaking", description = "Pairing players into matches"),
        (name = "health", description = "Liveness"),
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Result of a matchmaking request: the match, the caller's role in it,
/// and whether they are still waiting for an opponent.
#[derive(Debug, Serialize, ToSchema)]
pub struct FindMatchResponse {
    #[serde(rename = "match")]
    pub match_record: MatchRow,
    pub role: Role,
    pub waiting: bool,
}

/// Error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable description of what went wrong.
    pub detail: String,
}

impl ErrorResponse {
    fn new(detail: &str) -> Self {
        Self {
            detail: detail.to_string(),
        }
    }
}

fn unauthorized(err: &AuthError) -> HttpResponse {
    let detail = match err {
        AuthError::MissingToken => "Not authenticated",
        AuthError::InvalidToken => "Invalid token",
        AuthError::UnknownUser => "User not found",
        AuthError::Db(_) => "Not authenticated",
    };
    HttpResponse::Unauthorized().json(ErrorResponse::new(detail))
}

fn internal_error(context: &str, err: &StoreError) -> HttpResponse {
    log::error!("{}: {}", context, err);
    HttpResponse::InternalServerError().json(ErrorResponse::new("Internal server error"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Find or create a match for the caller.
///
/// Pairing order: an ongoing match the caller already plays in wins; then
/// the oldest waiting match with a free slot is claimed (stale waiters are
/// evicted first); then the caller's own waiting match is returned; and
/// only then is a fresh waiting match created, with the caller placed on a
/// randomly chosen color.
#[utoipa::path(
    post,
    path = "/api/v1/matchmaking/find",
    tag = "matchmaking",
    responses(
        (status = 200, description = "Match found or created", body = FindMatchResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
    )
)]
pub async fn find_match(req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    let user = match auth::current_user(&req, &state.pool, &state.jwt_secret).await {
        Ok(user) => user,
        Err(e) => return unauthorized(&e),
    };

    // 1. Already playing: a player has at most one active match.
    match store::find_ongoing_for(&state.pool, user.userid).await {
        Ok(Some(m)) => {
            let role = m.role_of(user.userid).unwrap_or(Role::White);
            return HttpResponse::Ok().json(FindMatchResponse {
                match_record: m,
                role,
                waiting: false,
            });
        }
        Ok(None) => {}
        Err(e) => return internal_error("looking up ongoing match", &e),
    }

    // 2. Drop waiters whose owner most likely gave up.
    if let Err(e) =
        store::evict_stale_waiting(&state.pool, Duration::minutes(STALE_WAIT_MINUTES)).await
    {
        return internal_error("evicting stale waiting matches", &e);
    }

    // 3. Join the oldest open seat.
    match store::claim_oldest_waiting(&state.pool, user.userid).await {
        Ok(Some((m, role))) => {
            log::info!(
                "user {} joined match {} as {}",
                user.userid,
                m.matchid,
                role
            );
            return HttpResponse::Ok().json(FindMatchResponse {
                match_record: m,
                role,
                waiting: false,
            });
        }
        Ok(None) => {}
        Err(e) => return internal_error("claiming waiting match", &e),
    }

    // 4. Still queued from an earlier call.
    match store::own_waiting(&state.pool, user.userid).await {
        Ok(Some((m, role))) => {
            return HttpResponse::Ok().json(FindMatchResponse {
                match_record: m,
                role,
                waiting: true,
            });
        }
        Ok(None) => {}
        Err(e) => return internal_error("looking up own waiting match", &e),
    }

    // 5. Open a new seat on a random color.
    let role = if rand::thread_rng().gen_bool(0.5) {
        Role::White
    } else {
        Role::Black
    };
    match store::create_waiting(&state.pool, user.userid, role).await {
        Ok(m) => {
            log::info!(
                "user {} opened match {} waiting as {}",
                user.userid,
                m.matchid,
                role
            );
            HttpResponse::Ok().json(FindMatchResponse {
                match_record: m,
                role,
                waiting: true,
            })
        }
        Err(e) => internal_error("creating waiting match", &e),
    }
}

/// Resign an ongoing match.
///
/// The opponent wins with reason `resign`. Fails with 404 when the match
/// does not exist, is not ongoing, or does not involve the caller.
#[utoipa::path(
    post,
    path = "/api/v1/matchmaking/{matchid}/resign",
    tag = "matchmaking",
    params(
        ("matchid" = i64, Path, description = "Match identifier")
    ),
    responses(
        (status = 200, description = "Match resigned", body = MatchRow),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 404, description = "No such ongoing match for this user", body = ErrorResponse),
    )
)]
pub async fn resign_match(
    req: HttpRequest,
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> impl Responder {
    let matchid = path.into_inner();
    let user = match auth::current_user(&req, &state.pool, &state.jwt_secret).await {
        Ok(user) => user,
        Err(e) => return unauthorized(&e),
    };

    match store::resign(&state.pool, matchid, user.userid).await {
        Ok(m) => {
            log::info!("user {} resigned match {}", user.userid, matchid);
            HttpResponse::Ok().json(m)
        }
        Err(StoreError::MatchNotFound) => {
            HttpResponse::NotFound().json(ErrorResponse::new("Match not found"))
        }
        Err(e) => internal_error("resigning match", &e),
    }
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Server is up"))
)]
pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// Route registration
// ---------------------------------------------------------------------------

/// Registers all HTTP and WebSocket routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/matchmaking/find", web::post().to(find_match))
            .route("/matchmaking/{matchid}/resign", web::post().to(resign_match))
            .route("/ws/match/{matchid}", web::get().to(ws::match_socket)),
    )
    .route("/health", web::get().to(health));
}
