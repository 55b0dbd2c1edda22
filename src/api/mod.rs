//! HTTP surface: provider push endpoint, webhook administration and
//! match lookup.

pub mod error;

use crate::matching::MatchingEngine;
use crate::models::{
    LeadMatch, PropertyData, Source, SubscriptionUpdate, WebhookEventKind, WebhookSubscription,
};
use crate::sources::{ListingSources, SearchCriteria};
use crate::webhooks::{InboundOutcome, InboundWebhookHandler, WebhookRegistry, SIGNATURE_HEADER};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub registry: WebhookRegistry,
    pub engine: MatchingEngine,
    pub inbound: InboundWebhookHandler,
    pub sources: ListingSources,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/inbound/:provider", post(inbound_webhook))
        .route(
            "/tenants/:tenant_id/webhooks",
            get(list_subscriptions).post(create_subscription),
        )
        .route(
            "/tenants/:tenant_id/webhooks/:id",
            patch(update_subscription).delete(delete_subscription),
        )
        .route("/leads/:lead_id/matches", get(lead_matches))
        .route("/properties/search", post(search_properties))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn inbound_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InboundOutcome>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = state.inbound.handle(&provider, &body, signature).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub url: String,
    pub events: Vec<WebhookEventKind>,
    #[serde(default)]
    pub secret: Option<String>,
}

async fn list_subscriptions(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<WebhookSubscription>>, ApiError> {
    Ok(Json(state.registry.list(&tenant_id).await?))
}

async fn create_subscription(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<WebhookSubscription>), ApiError> {
    let subscription = state
        .registry
        .subscribe(&tenant_id, &request.url, request.events, request.secret)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

async fn update_subscription(
    State(state): State<AppState>,
    Path((tenant_id, id)): Path<(String, Uuid)>,
    Json(update): Json<SubscriptionUpdate>,
) -> Result<Json<WebhookSubscription>, ApiError> {
    state
        .registry
        .update(&tenant_id, id, update)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("webhook {id} not found")))
}

async fn delete_subscription(
    State(state): State<AppState>,
    Path((tenant_id, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
    if state.registry.unsubscribe(&tenant_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("webhook {id} not found")))
    }
}

async fn lead_matches(
    State(state): State<AppState>,
    Path(lead_id): Path<String>,
) -> Result<Json<Vec<LeadMatch>>, ApiError> {
    Ok(Json(state.engine.get_property_matches(&lead_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub criteria: SearchCriteria,
    /// Defaults to every configured source
    #[serde(default)]
    pub sources: Vec<Source>,
}

async fn search_properties(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Vec<PropertyData>>, ApiError> {
    if request.criteria.city.trim().is_empty() {
        return Err(ApiError::BadRequest("criteria.city is required".to_string()));
    }
    let sources = if request.sources.is_empty() {
        state.sources.sources()
    } else {
        request.sources
    };
    Ok(Json(
        state
            .sources
            .search_properties(&request.criteria, &sources)
            .await,
    ))
}
