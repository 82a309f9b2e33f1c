use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::models::{InventoryView, ServerRecord};
use crate::AppState;

use super::ApiError;

/// List inventory servers
pub async fn list_servers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ServerRecord>>, ApiError> {
    let servers = state
        .inventory
        .servers()
        .await
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;
    Ok(Json(servers))
}

/// List regions known to the inventory
pub async fn list_regions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<String>>, ApiError> {
    let regions = state
        .inventory
        .regions()
        .await
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;
    Ok(Json(regions))
}

/// VMs of a region, NIC-bearing first, with primary and extra IPs split out
pub async fn get_inventory(
    State(state): State<Arc<AppState>>,
    Path(region): Path<String>,
) -> Result<Json<InventoryView>, ApiError> {
    let inventory = state
        .inventory
        .inventory(&region)
        .await
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;
    Ok(Json(InventoryView::from(inventory)))
}
