//! HTTP surface over [`TranslationService`].

use crate::error::TranslationError;
use crate::i18n::{static_default, TranslationDefinition};
use crate::security::api_key_matches;
use crate::service::TranslationService;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::warn;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    pub service: TranslationService,
    pub api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: TranslationService, api_key: Option<String>) -> Self {
        Self {
            service,
            api_key: api_key.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/translations", get(get_bundle))
        .route("/api/translations/keys", get(get_keys))
        .route("/api/translations/metrics", get(get_metrics))
        .route("/api/translations/invalidate", post(invalidate))
        .route("/api/translations/publish", post(publish))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error response for the admin routes.
pub enum ApiError {
    Unauthorized,
    Translation(TranslationError),
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        ApiError::Translation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "invalid or missing API key".to_string()),
            ApiError::Translation(err) => {
                let status = match &err {
                    TranslationError::Rejected(_) => StatusCode::BAD_REQUEST,
                    TranslationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    TranslationError::DataStore(_) => StatusCode::BAD_GATEWAY,
                    TranslationError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                    TranslationError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
        };
        (status, Json(json!({ "ok": false, "error": message }))).into_response()
    }
}

fn require_api_key(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let provided = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if api_key_matches(state.api_key.as_deref(), provided) {
        Ok(())
    } else {
        warn!("Rejected admin request with invalid API key");
        Err(ApiError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
pub struct BundleQuery {
    lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KeysQuery {
    lang: Option<String>,
    #[serde(default)]
    keys: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InvalidateRequest {
    codes: Option<Vec<String>>,
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_bundle(
    State(state): State<AppState>,
    Query(query): Query<BundleQuery>,
) -> impl IntoResponse {
    let bundle = state.service.get_translation_bundle(query.lang.as_deref()).await;
    Json(bundle.as_ref().clone())
}

/// Point lookup; unknown keys fall back to their own name.
async fn get_keys(
    State(state): State<AppState>,
    Query(query): Query<KeysQuery>,
) -> impl IntoResponse {
    let definitions: Vec<TranslationDefinition> = query
        .keys
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| TranslationDefinition::new(key, static_default(key).unwrap_or(key)))
        .collect();

    let resolved = state
        .service
        .get_translations_for_keys(query.lang.as_deref(), &definitions)
        .await;
    Json(resolved)
}

async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.service.metrics())
}

async fn invalidate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<InvalidateRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&state, &headers)?;
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let invalidated = state
        .service
        .invalidate_translation_bundle_cache(request.codes.as_deref())
        .await;
    Ok(Json(json!({ "ok": true, "invalidated": invalidated })))
}

async fn publish(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_api_key(&state, &headers)?;
    let report = state.service.publish_all_translations().await?;
    Ok(Json(report))
}
