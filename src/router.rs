use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router with all routes
pub fn build(state: Arc<AppState>, frontend_dir: &str) -> Router {
    api_routes()
        // Static files (frontend)
        .nest_service("/assets", ServeDir::new(format!("{}/assets", frontend_dir)))
        .fallback_service(ServeDir::new(frontend_dir).fallback(
            tower_http::services::ServeFile::new(format!("{}/index.html", frontend_dir)),
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        // Topology editing
        .route("/api/topology", get(handlers::topology::get_topology))
        .route("/api/topology/nodes", post(handlers::topology::add_node))
        .route(
            "/api/topology/nodes/:id",
            put(handlers::topology::update_node).delete(handlers::topology::delete_node),
        )
        .route("/api/topology/links", post(handlers::topology::create_link))
        .route(
            "/api/topology/links/:id",
            put(handlers::topology::update_link).delete(handlers::topology::delete_link),
        )
        .route("/api/topology/clear", post(handlers::topology::clear_topology))
        .route("/api/topology/region", put(handlers::topology::set_region))
        .route("/api/topology/events", post(handlers::topology::handle_event))
        .route("/api/topology/plan", get(handlers::topology::get_plan))
        .route("/api/topology/confirm", post(handlers::topology::confirm))
        .route("/api/topology/candidates", post(handlers::topology::reload_candidates))
        // VM and IP bindings
        .route("/api/topology/assignments", get(handlers::assignments::list_assignments))
        .route(
            "/api/topology/nodes/:id/vm",
            get(handlers::assignments::get_node_vm).put(handlers::assignments::assign_vm),
        )
        .route("/api/topology/nodes/:id/ip", put(handlers::assignments::set_host_ip))
        // Documents
        .route("/api/topology/export", get(handlers::documents::export_topology))
        .route("/api/topology/import", post(handlers::documents::import_topology))
        .route("/api/topology/mapping", get(handlers::documents::export_mapping))
        // Remote actions
        .route("/api/topology/actions", get(handlers::actions::list_actions))
        .route("/api/topology/actions/:kind", post(handlers::actions::run_action))
        // Inventory passthrough
        .route("/api/servers", get(handlers::inventory::list_servers))
        .route("/api/regions", get(handlers::inventory::list_regions))
        .route("/api/inventory/:region", get(handlers::inventory::get_inventory))
        // WebSocket route
        .route("/api/ws", get(crate::ws_upgrade_handler))
}
