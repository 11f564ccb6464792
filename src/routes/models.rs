//! Model listing endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ModelsResponse {
    pub models: Vec<String>,
}

/// List the models the active backend can serve
pub async fn list_models(State(state): State<AppState>) -> Result<Json<ModelsResponse>> {
    let models = state.service().list_models().await?;
    Ok(Json(ModelsResponse { models }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/models", get(list_models))
}
