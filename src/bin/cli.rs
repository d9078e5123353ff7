use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::subscriber as tracing_subscriber_global;
use tracing::info;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use song_request_relay as lib;
use lib::api::spotify::{SpotifyProvider, SpotifySession};
use lib::config::Config;
use lib::dispatcher::{Dispatch, Dispatcher};
use lib::service::PlaylistService;

#[derive(Parser)]
#[command(name = "song-request-relay", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to chat and relay song commands (long-running)
    Run,
    /// Dispatch one command locally and print the reply, e.g. `exec "add Hey Jude"`
    Exec {
        /// Command text without the chat prefix
        text: String,
    },
    /// Remove every track from the configured playlist
    Clear,
    /// Auth helpers
    Auth {
        #[command(subcommand)]
        sub: AuthCommands,
    },
    /// Validate config file and exit
    ConfigValidate,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Authorize Spotify and write the token cache (interactive)
    Spotify,
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    // Explicit --config wins; otherwise ./relay.toml when present; otherwise
    // defaults. Environment (and .env) is layered on top either way.
    let mut cfg = match explicit {
        Some(p) => Config::from_path(p)
            .with_context(|| format!("loading config from {}", p.display()))?,
        None => {
            let local = Path::new("relay.toml");
            if local.exists() {
                Config::from_path(local).context("loading config from relay.toml")?
            } else {
                Config::default()
            }
        }
    };
    cfg.apply_env();
    Ok(cfg)
}

async fn build_dispatcher(cfg: &Config) -> Result<Dispatcher> {
    let session = SpotifySession::load(cfg)
        .await
        .context("opening Spotify session")?;
    let provider = Arc::new(SpotifyProvider::new(Arc::new(session)));
    let service = PlaylistService::new(provider, cfg.playlist_id.clone()).with_skip_mode(cfg.skip_mode);
    info!(
        "relaying to playlist {} (skip mode: {:?})",
        service.playlist_id(),
        service.skip_mode()
    );
    Ok(Dispatcher::new(service, cfg.command_prefix.clone()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to stdout and, when log_dir is set, to a daily-rotated file.
    let _ = LogTracer::init();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);
    let (file_layer, _guard) = match &cfg.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "song-relay.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(non_blocking)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer);
    tracing_subscriber_global::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;

    match cli.command {
        Commands::Run => {
            cfg.validate().context("invalid configuration")?;
            let dispatcher = Arc::new(build_dispatcher(&cfg).await?);
            tokio::select! {
                r = lib::chat::run_bot(&cfg, dispatcher) => r.context("chat session ended")?,
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        }
        Commands::Exec { text } => {
            cfg.validate_spotify().context("invalid configuration")?;
            let dispatcher = build_dispatcher(&cfg).await?;
            match dispatcher.dispatch(&text).await {
                Dispatch::Reply(reply) => println!("{}", reply),
                Dispatch::Ignored { name } => {
                    eprintln!("Unrecognized command '{}'. {}", name, dispatcher.help_text());
                    std::process::exit(2);
                }
            }
        }
        Commands::Clear => {
            cfg.validate_spotify().context("invalid configuration")?;
            let dispatcher = build_dispatcher(&cfg).await?;
            let removed = dispatcher
                .service()
                .clear()
                .await
                .context("clearing playlist")?;
            println!("Removed {} track(s) from the playlist.", removed);
        }
        Commands::Auth { sub } => match sub {
            AuthCommands::Spotify => {
                lib::api::spotify_auth::run_spotify_auth(&cfg).await?;
            }
        },
        Commands::ConfigValidate => match cfg.validate() {
            Ok(()) => println!("OK"),
            Err(e) => {
                eprintln!("Config validation failed: {}", e);
                std::process::exit(2);
            }
        },
    }

    Ok(())
}
