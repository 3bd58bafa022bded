use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

use botdesk::admin::{self, AdminState};
use botdesk::broadcast::{self, Dispatcher};
use botdesk::cli::{Cli, Commands};
use botdesk::core::{config, init_logger};
use botdesk::storage::{self, create_pool, get_connection, DbPool, MediaStore};
use botdesk::telegram::{webhook, ApiClient};

/// Main entry point for the admin service
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, listener).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    init_logger()?;

    // Load environment variables from .env if present
    let _ = dotenv();

    match cli.command {
        Some(Commands::Serve { port }) => run_server(port).await,
        Some(Commands::SetWebhook { url }) => run_set_webhook(&url).await,
        Some(Commands::DeleteWebhook) => run_delete_webhook().await,
        Some(Commands::Status) => run_status().await,
        None => {
            log::info!("No command specified, running server in default mode");
            run_server(None).await
        }
    }
}

/// Builds the shared API client, preferring the stored credential over the
/// BOT_TOKEN environment fallback.
fn build_api_client(db: &Arc<DbPool>) -> Result<ApiClient> {
    let conn = get_connection(db)?;
    let token = storage::settings::bot_token(&conn)?;
    if token.is_none() {
        log::warn!("No bot token configured; outbound calls will fail closed until one is set");
    }
    Ok(ApiClient::new(token))
}

fn open_database() -> Result<Arc<DbPool>> {
    let pool = create_pool(&config::DATABASE_PATH)?;
    Ok(Arc::new(pool))
}

async fn run_server(port: Option<u16>) -> Result<()> {
    let db = open_database()?;
    let api = Arc::new(build_api_client(&db)?);
    let media = Arc::new(MediaStore::new(config::MEDIA_ROOT.as_str()));

    let dispatcher = Dispatcher::new(Arc::clone(&db), Arc::clone(&api), Arc::clone(&media));
    // Jobs left processing by a crash are reported, not resumed
    dispatcher.report_stuck_jobs()?;
    broadcast::start(dispatcher.clone());

    let app = webhook::router(webhook::WebhookState {
        db: Arc::clone(&db),
        api: Arc::clone(&api),
        media: Arc::clone(&media),
    })
    .merge(admin::router(AdminState {
        db,
        api,
        media,
        dispatcher,
    }));

    let port = port.unwrap_or(*config::HTTP_PORT);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    log::info!("Starting server on http://{}", addr);
    log::info!("  POST /telegram/webhook - provider updates");
    log::info!("  /api/*                 - admin surface");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutdown signal received, stopping server");
}

async fn run_set_webhook(url: &str) -> Result<()> {
    let db = open_database()?;
    let api = build_api_client(&db)?;

    let response = api.set_webhook(url).await;
    if !response.ok {
        return Err(anyhow::anyhow!("setWebhook failed: {}", response.description()));
    }

    let conn = get_connection(&db)?;
    storage::settings::set_setting(&conn, storage::settings::WEBHOOK_URL_KEY, url)?;
    log::info!("Webhook set to {}", url);
    Ok(())
}

async fn run_delete_webhook() -> Result<()> {
    let db = open_database()?;
    let api = build_api_client(&db)?;

    let response = api.delete_webhook().await;
    if !response.ok {
        return Err(anyhow::anyhow!("deleteWebhook failed: {}", response.description()));
    }

    let conn = get_connection(&db)?;
    storage::settings::delete_setting(&conn, storage::settings::WEBHOOK_URL_KEY)?;
    log::info!("Webhook deleted");
    Ok(())
}

async fn run_status() -> Result<()> {
    let db = open_database()?;
    let api = build_api_client(&db)?;

    let response = api.get_me().await;
    if !response.ok {
        return Err(anyhow::anyhow!("getMe failed: {}", response.description()));
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&response.result.unwrap_or_default())?
    );
    Ok(())
}
