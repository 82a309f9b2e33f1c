mod actions;
mod assignment;
mod config;
mod graph;
mod handlers;
mod interaction;
mod interfaces;
mod inventory;
mod models;
mod router;
mod serializer;
mod utils;
mod workspace;
mod ws;

use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use actions::{ActionGate, CommandRunner, HttpCommandRunner};
use config::Config;
use inventory::{HttpInventory, InventorySource};
use workspace::Workspace;
use ws::Hub;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub workspace: RwLock<Workspace>,
    pub inventory: Arc<dyn InventorySource>,
    pub commands: Arc<dyn CommandRunner>,
    pub actions: ActionGate,
    pub ws_hub: Arc<Hub>,
}

impl AppState {
    /// Wire the workspace and action gate to the WebSocket hub
    pub fn new(
        config: Config,
        inventory: Arc<dyn InventorySource>,
        commands: Arc<dyn CommandRunner>,
    ) -> Arc<Self> {
        let ws_hub = Arc::new(Hub::new(config.ws_channel_capacity));

        let mut workspace = Workspace::new(config.default_region.clone());
        workspace.subscribe(ws_hub.callback());

        Arc::new(Self {
            workspace: RwLock::new(workspace),
            inventory,
            commands,
            actions: ActionGate::with_callback(ws_hub.callback()),
            ws_hub,
            config,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topology_composer=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load();
    tracing::info!("Starting Topology Composer");
    tracing::info!("Inventory: {}", cfg.inventory_url);
    tracing::info!("Commands: {}", cfg.command_url);
    tracing::info!("Listen: {}", cfg.listen_addr);
    if cfg.remote_timeout_secs == 0 {
        tracing::info!("Remote calls have no timeout");
    }

    // Initialize collaborator clients
    let inventory_source: Arc<dyn InventorySource> =
        Arc::new(HttpInventory::new(&cfg.inventory_url, cfg.remote_timeout_secs)?);
    let commands: Arc<dyn CommandRunner> =
        Arc::new(HttpCommandRunner::new(&cfg.command_url, cfg.remote_timeout_secs)?);

    // Create app state
    let state = AppState::new(cfg.clone(), inventory_source.clone(), commands);

    // Adopt the first known region when none is configured
    if cfg.default_region.is_empty() {
        match inventory::first_region(inventory_source.as_ref()).await {
            Some(region) => {
                tracing::info!("Using region '{}' from inventory", region);
                state.workspace.write().await.set_region(&region);
            }
            None => tracing::warn!("No region configured and none reported by the inventory"),
        }
    } else {
        tracing::info!("Region: {}", cfg.default_region);
    }

    // Build router
    let app = router::build(state, &cfg.frontend_dir);

    // Start server
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    tracing::info!("Topology Composer listening on {}", cfg.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Topology Composer shutting down");
    Ok(())
}

/// WebSocket upgrade handler
pub async fn ws_upgrade_handler(
    ws: axum::extract::ws::WebSocketUpgrade,
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> axum::response::Response {
    ws::ws_handler(ws, axum::extract::State(state.ws_hub.clone())).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => { sig.recv().await; }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
