use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::assignment::{AssignOutcome, NodeAssignment, VmDisplay};
use crate::models::*;
use crate::AppState;

use super::ApiError;

#[derive(Serialize)]
pub struct AssignResponse {
    #[serde(flatten)]
    pub outcome: AssignOutcome,
    pub assignments: Vec<NodeAssignment>,
}

#[derive(Serialize)]
pub struct NodeVmResponse {
    pub node: String,
    pub vm: Option<VmDisplay>,
    /// Choices for this node's selector
    pub options: Vec<String>,
}

/// List node bindings, hosts first
pub async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<NodeAssignment>> {
    Json(state.workspace.read().await.assignments())
}

/// Get a node's VM with its IP and the VMs it may switch to
pub async fn get_node_vm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<NodeVmResponse>, ApiError> {
    let ws = state.workspace.read().await;
    Ok(Json(NodeVmResponse {
        vm: ws.display_for(&id)?,
        options: ws.options_for(&id)?,
        node: id,
    }))
}

/// Bind a VM to a node, swapping with its current holder
pub async fn assign_vm(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AssignVmRequest>,
) -> Result<Json<AssignResponse>, ApiError> {
    let mut ws = state.workspace.write().await;
    let outcome = ws.assign(&id, req.vm.trim())?;
    Ok(Json(AssignResponse {
        outcome,
        assignments: ws.assignments(),
    }))
}

/// Set the IP entered for a host node
pub async fn set_host_ip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetIpRequest>,
) -> Result<Json<Vec<NodeAssignment>>, ApiError> {
    let mut ws = state.workspace.write().await;
    ws.set_host_ip(&id, req.ip.trim())?;
    Ok(Json(ws.assignments()))
}
