//! Override Intake API
//!
//! Lets an operator stage a corrected observation for a fund, or replace its
//! last-known state, without going through the fund's adapter.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use flow_core::Observation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::registry::SourceRegistry;
use crate::state::{PendingChange, SourceSnapshot, SourceStateStore, StoreError};

#[derive(Clone)]
pub struct IntakeState {
    pub store: Arc<SourceStateStore>,
    pub registry: Arc<SourceRegistry>,
}

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Malformed request: {0}")]
    Malformed(String),
    #[error("Unknown source: {0}")]
    UnknownSource(String),
    #[error("Invalid total asset value: {0}")]
    InvalidTotal(f64),
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = match self {
            IntakeError::Malformed(_) => StatusCode::BAD_REQUEST,
            IntakeError::UnknownSource(_) => StatusCode::NOT_FOUND,
            IntakeError::InvalidTotal(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        tracing::warn!("Rejected intake request: {}", self);
        (status, Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

impl From<JsonRejection> for IntakeError {
    fn from(rejection: JsonRejection) -> Self {
        IntakeError::Malformed(rejection.body_text())
    }
}

impl From<StoreError> for IntakeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UnknownSource(ticker) => IntakeError::UnknownSource(ticker),
        }
    }
}

/// Accepted request bodies.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IntakeRequest {
    Flat {
        #[serde(alias = "sourceId")]
        ticker: String,
        #[serde(alias = "totalAsset")]
        total_asset: f64,
        #[serde(default)]
        date: Option<NaiveDate>,
    },
    Legacy {
        #[serde(rename = "Ticker")]
        ticker: String,
        #[serde(rename = "Result")]
        result: LegacyResult,
    },
}

#[derive(Debug, Deserialize)]
pub struct LegacyResult {
    #[serde(rename = "TotalAsset")]
    total_asset: f64,
    #[serde(rename = "Date", default)]
    date: Option<DateTime<Utc>>,
}

impl IntakeRequest {
    fn into_parts(self) -> (String, Observation) {
        match self {
            IntakeRequest::Flat {
                ticker,
                total_asset,
                date,
            } => (ticker, Observation::new(total_asset, date)),
            IntakeRequest::Legacy { ticker, result } => {
                // The zero timestamp (year 1) means "not dated".
                let date = result
                    .date
                    .filter(|d| d.year() > 1)
                    .map(|d| d.date_naive());
                (ticker, Observation::new(result.total_asset, date))
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IntakeAck {
    pub ticker: String,
    pub kind: &'static str,
    pub observation: Observation,
    /// A previously staged change was discarded.
    pub superseded: bool,
    pub message: String,
}

pub fn intake_routes(state: IntakeState) -> Router {
    Router::new()
        .route("/override", post(stage_override))
        .route("/update", post(stage_update))
        .route("/status", get(get_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn stage_override(
    State(state): State<IntakeState>,
    payload: Result<Json<IntakeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<IntakeAck>>, IntakeError> {
    stage(&state, payload?.0, "override", PendingChange::Override)
}

async fn stage_update(
    State(state): State<IntakeState>,
    payload: Result<Json<IntakeRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<IntakeAck>>, IntakeError> {
    stage(&state, payload?.0, "update", PendingChange::Replace)
}

fn stage(
    state: &IntakeState,
    request: IntakeRequest,
    kind: &'static str,
    make: fn(Observation) -> PendingChange,
) -> Result<Json<ApiResponse<IntakeAck>>, IntakeError> {
    let (ticker, observation) = request.into_parts();
    let ticker = ticker.trim().to_ascii_uppercase();

    if state.registry.get(&ticker).is_none() {
        return Err(IntakeError::UnknownSource(ticker));
    }
    if !observation.total_asset.is_finite() || observation.total_asset <= 0.0 {
        return Err(IntakeError::InvalidTotal(observation.total_asset));
    }

    let previous = state.store.stage(&ticker, make(observation))?;
    tracing::info!("Data {} {}: {:?}", kind, ticker, observation);

    Ok(Json(ApiResponse::success(IntakeAck {
        ticker,
        kind,
        observation,
        superseded: previous.is_some(),
        message: format!("Data {} successful", kind),
    })))
}

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    pub display_name: String,
    pub delayed: bool,
    #[serde(flatten)]
    pub state: SourceSnapshot,
}

async fn get_status(State(state): State<IntakeState>) -> Json<ApiResponse<Vec<SourceStatus>>> {
    let statuses = state
        .store
        .snapshot()
        .into_iter()
        .filter_map(|snapshot| {
            let metadata = state.registry.get(&snapshot.ticker)?;
            Some(SourceStatus {
                display_name: metadata.display_name.clone(),
                delayed: metadata.delayed,
                state: snapshot,
            })
        })
        .collect();

    Json(ApiResponse::success(statuses))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn setup() -> (Router, Arc<SourceStateStore>) {
        let registry = Arc::new(SourceRegistry::standard());
        let store = Arc::new(SourceStateStore::new(&registry));
        let app = intake_routes(IntakeState {
            store: store.clone(),
            registry,
        });
        (app, store)
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_override_is_staged() {
        let (app, store) = setup();

        let (status, body) = post_json(
            app,
            "/override",
            r#"{"ticker": "gbtc", "total_asset": 425000.5, "date": "2024-02-16"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["message"], "Data override successful");
        assert_eq!(
            store.take_pending("GBTC"),
            Some(PendingChange::Override(Observation::new(
                425000.5,
                NaiveDate::from_ymd_opt(2024, 2, 16)
            )))
        );
    }

    #[tokio::test]
    async fn test_update_stages_replacement() {
        let (app, store) = setup();

        let (status, _) = post_json(
            app,
            "/update",
            r#"{"sourceId": "IBIT", "totalAsset": 195000}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            store.take_pending("IBIT"),
            Some(PendingChange::Replace(Observation::undated(195000.0)))
        );
    }

    #[tokio::test]
    async fn test_legacy_body_is_accepted() {
        let (app, store) = setup();

        let (status, _) = post_json(
            app,
            "/override",
            r#"{"Ticker": "ARKB", "Result": {"TotalAsset": 40000, "Date": "0001-01-01T00:00:00Z"}}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            store.take_pending("ARKB"),
            Some(PendingChange::Override(Observation::undated(40000.0)))
        );
    }

    #[tokio::test]
    async fn test_unknown_source_is_rejected() {
        let (app, store) = setup();

        let (status, body) = post_json(
            app,
            "/override",
            r#"{"ticker": "FBTC", "total_asset": 1.0}"#,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert!(store.snapshot().iter().all(|s| s.pending.is_none()));
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (app, store) = setup();

        let (status, body) = post_json(app, "/override", r#"{"ticker": "GBTC"}"#).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(store.take_pending("GBTC").is_none());
    }

    #[tokio::test]
    async fn test_non_positive_total_is_rejected() {
        let (app, store) = setup();

        let (status, _) = post_json(
            app,
            "/override",
            r#"{"ticker": "GBTC", "total_asset": 0}"#,
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(store.take_pending("GBTC").is_none());
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup();

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_status_lists_sources() {
        let (app, store) = setup();
        store.set_last("GBTC", Observation::undated(425000.0));

        let response = app
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let sources = body["data"].as_array().unwrap();

        assert_eq!(sources.len(), 5);
        let gbtc = sources.iter().find(|s| s["ticker"] == "GBTC").unwrap();
        assert_eq!(gbtc["delayed"], true);
        assert_eq!(gbtc["last"]["total_asset"], 425000.0);
        assert_eq!(gbtc["phase"], "polling");
    }
}
