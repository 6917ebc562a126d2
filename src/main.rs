use crate::{
    app::App,
    db::{LinksDB, MemoryDb, PostgresDb},
    db_pool::DbPool,
    migrations::run_migrations,
};
use anyhow::anyhow;
use clap::Parser;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod codegen;
mod db;
mod db_pool;
mod handler;
mod migrations;
mod models;
mod registry;
mod router;
mod schema;
mod signals;

#[cfg(not(debug_assertions))]
#[must_use]
pub const fn is_debug() -> bool {
    false
}

#[cfg(debug_assertions)]
#[must_use]
pub const fn is_debug() -> bool {
    true
}

#[derive(Default, Parser, Debug)]
struct Arguments {
    #[arg(long, default_value_t = true, help = "Relax CORS", env = "RELAX_CORS")]
    cors_relaxed: bool,

    #[arg(long, default_value_t = 4000, help = "Port to listen on", env = "PORT")]
    port: u16,

    #[arg(long, help = "Logging level of the Rust log", env = "RUST_LOG")]
    #[clap(default_value_t = String::from("info,tower_http=debug"))]
    rust_log_level: String,

    #[arg(
        long,
        help = "Postgres connection string, links are kept in memory if unset",
        env = "DATABASE_URL"
    )]
    db_url: Option<String>,

    #[arg(
        long,
        default_value_t = 10,
        help = "DB pool size",
        env = "DB_POOL_SIZE"
    )]
    db_pool_size: usize,

    #[arg(long, default_value_t = String::from("http://localhost:4000"), env = "BASE_URL")]
    base_url: String,

    #[arg(
        long,
        default_value_t = codegen::DEFAULT_MAX_ATTEMPTS,
        help = "Attempts to find a free generated code",
        env = "CODE_MAX_ATTEMPTS"
    )]
    code_max_attempts: u32,

    #[arg(long, help = "Built frontend to serve", env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

async fn build_storage(args: &Arguments) -> anyhow::Result<Arc<dyn LinksDB>> {
    let Some(db_url) = args.db_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set, links are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryDb::new()));
    };

    run_migrations(db_url)?;

    let dbpool = DbPool::build(db_url, args.db_pool_size).await?;

    Ok(Arc::new(PostgresDb::new(dbpool)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Arguments::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&args.rust_log_level))
        .with(tracing_subscriber::fmt::layer().with_ansi(is_debug()))
        .init();

    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Could not install rustls default crypto provider."))?;

    let db = build_storage(&args).await?;

    let app = App::new(args.base_url.clone(), db, args.code_max_attempts);

    let router = router::router(Arc::clone(&app), args.cors_relaxed, args.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    tracing::info!(base_url = app.base_url(), "listening on http://{}", addr);

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    signals::create_term_signal_handler(tx);

    let listener = TcpListener::bind(addr).await?;

    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let graceful = server.with_graceful_shutdown(async {
        rx.await.ok();
    });

    if let Err(e) = graceful.await {
        tracing::error!("server error: {}", e);
    }

    tracing::info!("shut down");

    Ok(())
}
