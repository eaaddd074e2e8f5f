use std::sync::Arc;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    response::Json,
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::AdvisoryError;
use crate::advisory::AdvisoryService;

const BODY_SHAPE: &str = "Request body must be a JSON object with a 'location' string field";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AdvisoryService>,
}

impl AppState {
    pub fn new(service: AdvisoryService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdvisoryRequest {
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdvisoryResponse {
    pub advisories: String,
}

/// Routes mounted under `/api`
pub fn router() -> Router<AppState> {
    Router::new().route("/advisories", post(get_advisories))
}

pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Advisory API is running!" }))
}

async fn get_advisories(
    State(state): State<AppState>,
    payload: Result<Json<AdvisoryRequest>, JsonRejection>,
) -> Result<Json<AdvisoryResponse>, AdvisoryError> {
    state.service.ensure_configured()?;

    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected advisory request body: {}", rejection.body_text());
        match rejection {
            JsonRejection::JsonSyntaxError(_) | JsonRejection::JsonDataError(_) => {
                AdvisoryError::validation(BODY_SHAPE)
            }
            other => AdvisoryError::rejected(other.status(), other.body_text()),
        }
    })?;

    let outcome = state.service.fetch(request.location.as_deref()).await?;
    Ok(Json(AdvisoryResponse {
        advisories: outcome.into_text(),
    }))
}
