//! HTTP route handlers and router configuration

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use ferropath_core::routing::RouteQuery;
use ferropath_core::{EdgeId, NodeId, RouteOutcome};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::{AppState, with_session};

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_concurrent_requests = state.max_concurrent_requests.max(1);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/suggest", get(suggest))
        .route("/location", get(location))
        .route("/findnode", get(find_node))
        .route("/findpath", get(find_path))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
pub struct TextParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct Suggestion {
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct Location {
    pub display_name: String,
    pub lat: f64,
    pub lon: f64,
}

async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TextParams>,
) -> Result<Json<Vec<Suggestion>>, ApiError> {
    let query = params.q.to_lowercase();
    if !state.context.address_index().accepts(&query) {
        return Ok(Json(Vec::new()));
    }

    let labels = with_session(&state, move |context, session| {
        context.address_index().suggest(session, &query)
    })
    .await?;

    Ok(Json(
        labels
            .into_iter()
            .map(|label| Suggestion { label })
            .collect(),
    ))
}

async fn location(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TextParams>,
) -> Result<Json<Vec<Location>>, ApiError> {
    if !state.context.address_index().accepts(&params.q) {
        return Ok(Json(Vec::new()));
    }

    let addresses = with_session(&state, move |context, session| {
        context.address_index().search(session, &params.q)
    })
    .await?;

    Ok(Json(
        addresses
            .into_iter()
            .map(|address| Location {
                lat: address.lat(),
                lon: address.lon(),
                display_name: address.display_name,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct NodeParams {
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lon: String,
}

#[derive(Debug, Serialize)]
pub struct NodeLocation {
    pub node_id: NodeId,
    pub longitude: f64,
    pub latitude: f64,
    pub x: f64,
    pub y: f64,
}

fn parse_coordinate(name: &str, value: &str) -> Result<f64, ApiError> {
    value
        .trim()
        .parse()
        .map_err(|_| ApiError::InvalidCoordinate(format!("{name} '{value}' is not a number")))
}

async fn find_node(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NodeParams>,
) -> Result<Json<Vec<NodeLocation>>, ApiError> {
    if params.lat.is_empty() || params.lon.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let lat = parse_coordinate("lat", &params.lat)?;
    let lon = parse_coordinate("lon", &params.lon)?;

    let node = with_session(&state, move |context, session| {
        context.resolver().resolve(session, lat, lon)
    })
    .await?;

    Ok(Json(
        node.into_iter()
            .map(|node| NodeLocation {
                node_id: node.node_id,
                longitude: node.lon,
                latitude: node.lat,
                x: node.x,
                y: node.y,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct PathParams {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Serialize)]
pub struct PathBody {
    pub objectids: Vec<EdgeId>,
    pub geojson: FeatureCollection,
    #[serde(rename = "totalCost")]
    pub total_cost: f64,
    #[serde(rename = "nodeNames")]
    pub node_names: Vec<NodeId>,
    pub status: &'static str,
}

impl PathBody {
    fn from_outcome(outcome: RouteOutcome) -> Result<Self, ApiError> {
        let status = outcome.status();
        let path = outcome.into_path();
        Ok(Self {
            objectids: path.edge_ids(),
            geojson: path.to_geojson()?,
            total_cost: path.total_cost,
            node_names: path.node_ids(),
            status,
        })
    }
}

async fn find_path(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PathParams>,
) -> Result<Response, ApiError> {
    if params.start.is_empty() || params.end.is_empty() {
        return Ok(Json(json!([])).into_response());
    }

    let outcome = with_session(&state, move |context, session| {
        context.orchestrator().route(
            session,
            &RouteQuery::Text(params.start),
            &RouteQuery::Text(params.end),
        )
    })
    .await?;

    tracing::debug!(status = outcome.status(), "Path request answered");
    Ok(Json(PathBody::from_outcome(outcome)?).into_response())
}
