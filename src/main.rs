use actix::Actor;
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use checkrs::api::{self, ApiDoc, AppState};
use checkrs::store;
use checkrs::ws::RoomRegistry;

/// checkrs — a real-time checkers match server.
///
/// Serves the matchmaking REST API with Swagger documentation and the
/// per-match WebSocket for play.
#[derive(Parser, Debug)]
#[command(name = "checkrs")]
#[command(about = "Real-time checkers (American draughts) match server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the match server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,

        /// Host address to bind to.
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// SQLite database URL.
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite:checkrs.db")]
        database_url: String,

        /// Secret used to validate access-token JWTs.
        #[arg(long, env = "CHECKRS_JWT_SECRET", default_value = "change-me")]
        jwt_secret: String,
    },
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            host,
            database_url,
            jwt_secret,
        } => run_server(&host, port, &database_url, jwt_secret).await,
    }
}

/// Connects the database, initializes the schema, and starts the HTTP +
/// WebSocket server.
async fn run_server(
    host: &str,
    port: u16,
    database_url: &str,
    jwt_secret: String,
) -> std::io::Result<()> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(std::io::Error::other)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(std::io::Error::other)?;

    store::init_schema(&pool).await.map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState { pool, jwt_secret });

    // The singleton room registry actor; all match rooms live here.
    let registry = RoomRegistry::new().start();
    let registry_data = web::Data::new(registry);

    let openapi = ApiDoc::openapi();

    log::info!("Starting checkrs server on {}:{}", host, port);
    log::info!("Database: {}", database_url);
    log::info!("Swagger UI available at http://{}:{}/swagger-ui/", host, port);
    log::info!(
        "WebSocket endpoint: ws://{}:{}/api/v1/ws/match/{{matchid}}",
        host,
        port
    );

    HttpServer::new(move || {
        // Only the local frontend for now; credentials must flow because
        // auth rides on the access_token cookie.
        let cors = Cors::default()
            .allowed_origin("http://localhost:4200")
            .allowed_origin("http://127.0.0.1:4200")
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(registry_data.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host, port))?
    .run()
    .await
}
