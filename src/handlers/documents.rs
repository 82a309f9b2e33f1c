use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::inventory::fetch_candidates;
use crate::models::ImportReport;
use crate::serializer;
use crate::AppState;

use super::ApiError;

#[derive(Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub report: ImportReport,
    pub region: String,
    /// Set when the candidate lookup for the imported region failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<String>,
}

fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{}\"", filename)
}

/// Download the topology document
pub async fn export_topology(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let ws = state.workspace.read().await;
    let filename = serializer::export_filename(ws.region(), "topology.json");
    let body = ws.export_json()?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        body,
    ))
}

/// Replace the topology with an uploaded document
pub async fn import_topology(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<ImportResponse>, ApiError> {
    let current_region = state.workspace.read().await.region().to_string();
    let prepared = serializer::prepare_text(&body, &current_region)?;

    let fetch = fetch_candidates(state.inventory.as_ref(), prepared.graph.region()).await;

    let mut ws = state.workspace.write().await;
    let report = ws.apply_import(prepared, fetch.candidates);
    Ok(Json(ImportResponse {
        report,
        region: ws.region().to_string(),
        advisory: fetch.advisory,
    }))
}

/// Download the node to VM mapping as plain text
pub async fn export_mapping(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ws = state.workspace.read().await;
    let filename = serializer::export_filename(ws.region(), "node_vm_mapping.txt");
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment(&filename)),
        ],
        ws.mapping_report(),
    )
}
