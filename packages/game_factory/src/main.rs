use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::{Parser, Subcommand};
use room_hub::RoomHub;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod db;
mod handlers;
mod repository;
#[cfg(test)]
mod test_helpers;
mod ws;

use crate::config::{FileConfig, GameFactoryConfig};
use crate::db::Database;
use crate::repository::RoomRepository;

#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "game-factory")]
#[command(about = "Room coordination hub for multiplayer mini-games")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Data directory (default: ~/.game-factory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hub server (default)
    Serve(ServeArgs),

    /// Print the occupancy directory
    Rooms(RoomsArgs),

    /// Print the effective configuration as TOML
    Config(ConfigArgs),
}

#[derive(Parser, Default)]
struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides config)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Parser)]
struct RoomsArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct ConfigArgs {
    /// Also write config.toml if it does not exist yet
    #[arg(long)]
    write: bool,
}

pub(crate) type Hub = RoomHub<RoomRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub hub: Arc<Hub>,
    pub db: Arc<Database>,
}

/// All routes, without the tracing/CORS layers.
pub(crate) fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws/{room_id}", get(handlers::room_websocket_handler))
        .route("/lobby/rooms", get(handlers::list_rooms_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = GameFactoryConfig::new(cli.data_dir.clone())?;

    match cli.command {
        None => run_server(ServeArgs::default(), config).await,
        Some(Commands::Serve(args)) => run_server(args, config).await,
        Some(Commands::Rooms(args)) => rooms_command(&config, args.json).await,
        Some(Commands::Config(args)) => config_command(&config, args.write),
    }
}

async fn run_server(args: ServeArgs, config: GameFactoryConfig) -> Result<()> {
    let default_directive = if args.debug {
        "game_factory=debug,room_hub=debug,tower_http=debug,info"
    } else {
        "game_factory=info,room_hub=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    info!("Starting Game Factory room hub");

    let file_config: FileConfig = config::load_config(&config.data_dir)
        .extract()
        .context("Failed to load configuration")?;
    let addr = config::listen_addr(
        &file_config.server,
        args.host.as_deref(),
        args.port,
    )?;
    let hub_config = file_config.hub.to_hub_config();
    info!(
        "Hub config: send_queue={}, directory_retries={}x{}ms, max_room_id_len={}",
        hub_config.send_queue_capacity,
        hub_config.directory_retry.attempts,
        hub_config.directory_retry.backoff.as_millis(),
        hub_config.max_room_id_len
    );

    info!("Initializing database...");
    let db = Arc::new(Database::new(&config).await?);
    let repository = RoomRepository::new(db.pool.clone());
    let hub = Arc::new(RoomHub::new(repository, hub_config));

    let app_state = AppState { hub, db };

    let app = build_router(app_state)
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Game Factory listening on http://{}", actual_addr);
    info!("  Rooms:   ws://{}/ws/{{room_id}}", actual_addr);
    info!("  Lobby:   http://{}/lobby/rooms", actual_addr);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, closing connections...");
    };

    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    info!("Shutdown complete");
    server_result
}

async fn rooms_command(config: &GameFactoryConfig, json: bool) -> Result<()> {
    let db = Database::new(config).await?;
    let repository = RoomRepository::new(db.pool.clone());
    let rooms = repository
        .list_room_rows()
        .await
        .context("Failed to read room directory")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rooms)?);
    } else if rooms.is_empty() {
        println!("No rooms yet.");
    } else {
        println!(
            "{:<40} {:>7} {:>5}  {}",
            "ROOM", "PLAYERS", "MAX", "UPDATED"
        );
        println!("{}", "-".repeat(80));
        for room in &rooms {
            let max = room
                .max_players
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:<40} {:>7} {:>5}  {}",
                room.room_id,
                room.count,
                max,
                room.updated_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
        println!("\n{} room(s)", rooms.len());
    }

    Ok(())
}

fn config_command(config: &GameFactoryConfig, write: bool) -> Result<()> {
    let file_config: FileConfig = config::load_config(&config.data_dir)
        .extract()
        .context("Failed to load configuration")?;

    if write && !config.write_default_config(&file_config)? {
        eprintln!(
            "{} already exists, leaving it untouched",
            config.config_toml_path().display()
        );
    }

    print!(
        "{}",
        toml::to_string_pretty(&file_config).context("Failed to render config")?
    );
    Ok(())
}
