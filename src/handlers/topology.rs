use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::interaction::InputEvent;
use crate::interfaces::AdapterPlan;
use crate::inventory::fetch_candidates;
use crate::models::*;
use crate::workspace::WorkspaceView;
use crate::AppState;

use super::{created, ApiError};

/// Outcome of one canvas event
#[derive(Serialize)]
pub struct EventResponse {
    pub effect: &'static str,
    pub structural: bool,
    pub topology: WorkspaceView,
}

/// Candidate list after a confirm or reload
#[derive(Serialize)]
pub struct CandidatesResponse {
    pub confirmed: bool,
    pub region: String,
    pub candidates: Vec<Candidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

/// Get the full editor state
pub async fn get_topology(State(state): State<Arc<AppState>>) -> Json<WorkspaceView> {
    Json(state.workspace.read().await.view())
}

/// Add a node; it becomes the selection
pub async fn add_node(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddNodeRequest>,
) -> (StatusCode, Json<Node>) {
    // A missing coordinate comes from the default spot
    let position = match (req.x, req.y) {
        (None, None) => None,
        (x, y) => {
            let default = Position::default_added();
            Some(Position::new(x.unwrap_or(default.x), y.unwrap_or(default.y)))
        }
    };
    let node = state.workspace.write().await.add_node(req.node_type, position);
    created(node)
}

/// Rename a node and/or edit its display name and position
pub async fn update_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateNodeRequest>,
) -> Result<Json<Node>, ApiError> {
    let mut ws = state.workspace.write().await;
    if ws.graph().node(&id).is_none() {
        return Err(ApiError::not_found(format!("node not found: {}", id)));
    }

    // Rename first so a rejected id leaves everything untouched
    let id = match req.id {
        Some(new_id) => {
            ws.rename_node(&id, &new_id)?;
            new_id
        }
        None => id,
    };
    if let Some(name) = &req.name {
        ws.set_node_name(&id, name)?;
    }
    if req.x.is_some() || req.y.is_some() {
        let current = ws
            .graph()
            .node(&id)
            .map(|n| n.position)
            .ok_or_else(|| ApiError::not_found(format!("node not found: {}", id)))?;
        let position = Position::new(req.x.unwrap_or(current.x), req.y.unwrap_or(current.y));
        ws.set_node_position(&id, position)?;
    }

    ws.graph()
        .node(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("node not found: {}", id)))
}

/// Delete a node and every link touching it
pub async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.workspace.write().await.remove_node(&id) {
        return Err(ApiError::not_found(format!("node not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Connect two nodes
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConnectRequest>,
) -> Result<(StatusCode, Json<Link>), ApiError> {
    let link = state.workspace.write().await.connect(&req.a, &req.b)?;
    Ok(created(link))
}

/// Edit a link label
pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateLinkRequest>,
) -> Result<Json<Link>, ApiError> {
    let mut ws = state.workspace.write().await;
    ws.set_link_label(&id, &req.label)?;
    ws.graph()
        .link(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("link not found: {}", id)))
}

/// Delete a link
pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.workspace.write().await.remove_link(&id) {
        return Err(ApiError::not_found(format!("link not found: {}", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Remove every node and link
pub async fn clear_topology(State(state): State<Arc<AppState>>) -> Json<WorkspaceView> {
    let mut ws = state.workspace.write().await;
    ws.clear();
    Json(ws.view())
}

/// Change the inventory region
pub async fn set_region(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetRegionRequest>,
) -> Json<WorkspaceView> {
    let mut ws = state.workspace.write().await;
    ws.set_region(req.region.trim());
    Json(ws.view())
}

/// Apply one pointer/keyboard event from the canvas
pub async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InputEvent>,
) -> Result<Json<EventResponse>, ApiError> {
    let mut ws = state.workspace.write().await;
    let effect = ws.handle_event(event)?;
    Ok(Json(EventResponse {
        effect: effect.kind(),
        structural: effect.is_structural(),
        topology: ws.view(),
    }))
}

/// Interface plan derived from the current links
pub async fn get_plan(State(state): State<Arc<AppState>>) -> Json<AdapterPlan> {
    Json(state.workspace.read().await.plan())
}

/// Confirm the topology and load the region's candidate VMs
pub async fn confirm(State(state): State<Arc<AppState>>) -> Json<CandidatesResponse> {
    let region = {
        let mut ws = state.workspace.write().await;
        ws.confirm();
        ws.region().to_string()
    };
    Json(load_candidates(&state, region).await)
}

/// Reload candidates of a confirmed topology
pub async fn reload_candidates(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CandidatesResponse>, ApiError> {
    let region = {
        let ws = state.workspace.read().await;
        if !ws.is_confirmed() {
            return Err(ApiError::conflict("confirm the topology first"));
        }
        ws.region().to_string()
    };
    Ok(Json(load_candidates(&state, region).await))
}

async fn load_candidates(state: &AppState, region: String) -> CandidatesResponse {
    let fetch = fetch_candidates(state.inventory.as_ref(), &region).await;

    let mut ws = state.workspace.write().await;
    // The region may have changed while the lookup was in flight
    if ws.region() == region {
        ws.load_candidates(fetch.candidates);
    } else {
        tracing::debug!("Discarding candidates of region '{}', now '{}'", region, ws.region());
    }
    CandidatesResponse {
        confirmed: ws.is_confirmed(),
        region: ws.region().to_string(),
        candidates: ws.resolver().candidates().to_vec(),
        advisory: fetch.advisory,
    }
}
