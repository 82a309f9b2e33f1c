use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::actions::build_payload;
use crate::models::{ActionKind, ActionRecord, ActionStatus};
use crate::AppState;

use super::ApiError;

/// In-progress flags and last results of every action kind
pub async fn list_actions(State(state): State<Arc<AppState>>) -> Json<Vec<ActionStatus>> {
    Json(state.actions.status())
}

/// Build the payload of `kind` from the topology and run it remotely
pub async fn run_action(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<ActionKind>,
) -> Result<Json<ActionRecord>, ApiError> {
    let payload = {
        let ws = state.workspace.read().await;
        build_payload(&ws, kind)?
    };
    let record = state
        .actions
        .execute(state.commands.as_ref(), kind, payload)
        .await?;
    Ok(Json(record))
}
