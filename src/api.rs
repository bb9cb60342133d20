//! HTTP read API
//!
//! - GET /logs         — filtered, paginated entries
//! - GET /logs/types   — registered action types with resolved labels
//! - GET /logs/owners  — registered owner slugs
//! - GET /logs/stats   — totals by owner, behaviour, and level
//!
//! Every route requires `Authorization: Bearer <admin_token>`. With no token
//! configured, all reads are refused.

use crate::error::{ActivityError, Result};
use crate::logger::Logger;
use crate::query::{self, ActivityStats, FilterArgs, QueryPage};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tower_http::trace::TraceLayer;

/// Shared state for read handlers
#[derive(Clone)]
pub struct ApiState {
    pub logger: Arc<Logger>,
    pub admin_token: Option<Arc<str>>,
}

impl ApiState {
    pub fn new(logger: Arc<Logger>, admin_token: Option<String>) -> Self {
        Self {
            logger,
            admin_token: admin_token
                .filter(|t| !t.is_empty())
                .map(Arc::from),
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<()> {
        let Some(expected) = self.admin_token.as_deref() else {
            return Err(ActivityError::Unauthorized(
                "No admin token configured".to_string(),
            ));
        };

        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token) if bool::from(token.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
            Some(_) => Err(ActivityError::Unauthorized("Invalid admin token".to_string())),
            None => Err(ActivityError::Unauthorized(
                "Missing bearer token".to_string(),
            )),
        }
    }
}

/// Build the read API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/types", get(list_types))
        .route("/logs/owners", get(list_owners))
        .route("/logs/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Action type as exposed by `/logs/types`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTypeView {
    pub owner: String,
    pub type_key: String,
    pub label: String,
    pub description: String,
}

/// Run storage reads on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ActivityError::storage("api", format!("Read task failed: {}", e)))?
}

/// GET /logs
async fn list_logs(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Query(args): Query<FilterArgs>,
) -> Result<Json<QueryPage>> {
    state.authorize(&headers)?;
    let logger = state.logger.clone();
    let page = blocking(move || query::execute(logger.storage().as_ref(), &args)).await?;
    Ok(Json(page))
}

/// GET /logs/types
async fn list_types(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ActionTypeView>>> {
    state.authorize(&headers)?;
    let registry = state.logger.registry();
    let types = registry
        .types()
        .into_iter()
        .map(|t| ActionTypeView {
            label: registry.label(&t.owner, &t.type_key),
            owner: t.owner,
            type_key: t.type_key,
            description: t.description,
        })
        .collect();
    Ok(Json(types))
}

/// GET /logs/owners
async fn list_owners(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>> {
    state.authorize(&headers)?;
    let logger = state.logger.clone();
    let owners =
        blocking(move || query::owners(logger.storage().as_ref(), logger.registry())).await?;
    Ok(Json(owners))
}

/// GET /logs/stats
async fn get_stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ActivityStats>> {
    state.authorize(&headers)?;
    let logger = state.logger.clone();
    let stats =
        blocking(move || query::stats(logger.storage().as_ref(), logger.registry())).await?;
    Ok(Json(stats))
}
