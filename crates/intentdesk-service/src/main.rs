use clap::Parser;
use intentdesk_core::Address;
use intentdesk_service::{
    build_router, is_loopback_only, resolve_journal_storage, DeskConfig, JournalStorageMode,
    ServiceConfig, ServiceState,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "intentdeskd", version, about = "Intent desk REST service")]
struct Cli {
    /// REST socket address to bind, e.g. 127.0.0.1:8092
    #[arg(long, default_value = "127.0.0.1:8092")]
    listen: SocketAddr,
    /// TOML file with `admin` and a `[protocol]` table.
    #[arg(long, env = "INTENTDESK_CONFIG")]
    config: Option<PathBuf>,
    /// Address granted the default admin role on a fresh journal.
    #[arg(long, env = "INTENTDESK_ADMIN")]
    admin: Option<Address>,
    /// Journal persistence backend. `auto` picks postgres when a database url is configured.
    #[arg(long, value_enum, default_value_t = JournalStorageMode::Auto, env = "INTENTDESK_JOURNAL_STORAGE")]
    journal_storage: JournalStorageMode,
    /// PostgreSQL url for the command journal.
    #[arg(long, env = "INTENTDESK_JOURNAL_DATABASE_URL")]
    journal_database_url: Option<String>,
    #[arg(long, default_value_t = 5, env = "INTENTDESK_JOURNAL_PG_MAX_CONNECTIONS")]
    journal_pg_max_connections: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "intentdesk_service=info,intentdesk_core=info".to_string()
        }))
        .init();

    let cli = Cli::parse();
    let database_url = cli
        .journal_database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());
    let journal_storage = resolve_journal_storage(
        cli.journal_storage,
        database_url,
        cli.journal_pg_max_connections,
    )?;
    let file = match cli.config.as_deref() {
        Some(path) => DeskConfig::load(path)?,
        None => DeskConfig::default(),
    };
    let config = ServiceConfig::from_parts(file, cli.admin.clone(), journal_storage);
    info!(
        admin = %config.engine.admin,
        journal = config.engine.journal_storage.label(),
        "bootstrapping intent desk"
    );

    if !is_loopback_only(&cli.listen) {
        warn!(
            listen = %cli.listen,
            "commands are not authenticated; expose only to trusted clients"
        );
    }

    let state = ServiceState::bootstrap(config).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("intentdesk-service REST listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
