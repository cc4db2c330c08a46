//! Boots the state store, recovers crashed rows, loads layered config,
//! wires the Identity Resolver, spawns the pipeline supervisor, and serves
//! the Control API. CLI shape follows ferrex's `main.rs`: `clap` derive
//! args with `env` fallbacks, `dotenvy` for the `.env` layer, a
//! `tracing-subscriber` `EnvFilter` sink.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};

use nitrate_core::config;
use nitrate_core::db::{self, Repository};
use nitrate_core::pipeline::{self, Supervisor};

use nitrate_server::app_state::{AppState, ProviderBootstrap};
use nitrate_server::routes::build_router;

#[derive(Parser, Debug)]
#[command(name = "nitrate-server", about = "Scan/resolve/link media pipeline")]
struct Args {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://nitrate.db")]
    database_url: String,

    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    #[arg(long, env = "SOURCE_DIR")]
    source_dir: Option<String>,

    #[arg(long, env = "TARGET_DIR")]
    target_dir: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", default_value = "")]
    openai_api_key: String,

    #[arg(long, env = "OPENAI_API_BASE", default_value = "https://api.openai.com/v1")]
    openai_api_base: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    openai_model: String,

    #[arg(long, env = "TMDB_API_KEY", default_value = "")]
    tmdb_api_key: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let pool = db::connect(&args.database_url).await?;
    let repo = Repository::new(pool.clone());

    let reset = pipeline::recover(&repo).await?;
    if reset > 0 {
        tracing::info!(reset, "recovered stale rows from a previous run");
    }

    let mut overrides = HashMap::new();
    if let Some(source_dir) = &args.source_dir {
        overrides.insert("SOURCE_DIR".to_string(), source_dir.clone());
    }
    if let Some(target_dir) = &args.target_dir {
        overrides.insert("TARGET_DIR".to_string(), target_dir.clone());
    }

    let runtime_config = config::load(&pool, &overrides).await?;
    if runtime_config.source_dir.is_empty() || runtime_config.target_dir.is_empty() {
        anyhow::bail!("SOURCE_DIR and TARGET_DIR must both be set (via env, .env, or --source-dir/--target-dir)");
    }

    let provider = ProviderBootstrap {
        llm_base_url: args.openai_api_base,
        llm_api_key: args.openai_api_key,
        llm_model: args.openai_model,
        llm_temperature: 0.2,
        llm_timeout: Duration::from_secs(30),
        tmdb_api_key: args.tmdb_api_key,
        tmdb_base_url: nitrate_core::resolver::TmdbConfig::default().base_url,
        tmdb_timeout: Duration::from_secs(10),
    };
    let resolver = provider.build(&runtime_config)?;

    let (config_tx, config_rx) = watch::channel(Arc::new(runtime_config));
    let (resolver_tx, resolver_rx) = watch::channel(resolver);
    let supervisor = Supervisor::spawn(repo.clone(), resolver_rx, config_rx);

    let state = AppState {
        repo,
        pool,
        config: config_tx,
        resolver: resolver_tx,
        provider,
    };

    let cors = cors_layer(&state.config_snapshot().cors_origins);
    let app = build_router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(addr = %args.bind, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    supervisor.shutdown().await;
    Ok(())
}

fn cors_layer(origins: &str) -> CorsLayer {
    if origins.trim() == "*" {
        return CorsLayer::new().allow_origin(AllowOrigin::any());
    }

    let parsed: Vec<axum::http::HeaderValue> = origins
        .split(',')
        .filter_map(|o| o.trim().parse().ok())
        .collect();
    CorsLayer::new().allow_origin(parsed)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
