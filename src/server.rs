//! HTTP query surface
//!
//! Serves `GET /stays/search` over the query engine and `GET /health`.

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::query::{QueryEngine, SearchParams};
use crate::store::StayStore;
use crate::types::SearchResult;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Error returned by a handler
///
/// Caller mistakes map to 400, everything else to 500. The body is always
/// `{"error": message}`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(Error::invalid_query("query", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(error = %self.0, "Request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Build the router over a query engine
pub fn router<S>(engine: QueryEngine<S>, cors_origin: Option<&str>) -> Router
where
    S: StayStore + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/stays/search", get(search_stays::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origin))
        .with_state(Arc::new(engine))
}

/// Bind and serve until `shutdown` is cancelled
pub async fn serve<S>(
    config: &ServerConfig,
    engine: QueryEngine<S>,
    shutdown: CancellationToken,
) -> Result<()>
where
    S: StayStore + 'static,
{
    let app = router(engine, config.cors_origin.as_deref());
    let addr = config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to {addr}: {e}")))?;
    info!("Starting HTTP server on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    info!("HTTP server stopped");
    Ok(())
}

/// Absent or `*` allows any origin; otherwise a comma-separated list
fn cors_layer(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    match origins.map(str::trim) {
        None | Some("" | "*") => cors.allow_origin(Any),
        Some(list) => {
            let allowed: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            cors.allow_origin(allowed)
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn search_stays<S: StayStore>(
    State(engine): State<Arc<QueryEngine<S>>>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> std::result::Result<Json<SearchResult>, ApiError> {
    let Query(params) = params?;
    let spec = params.validate()?;
    let result = engine.search(&spec).await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DuckDbStore;
    use crate::types::{StayBase, StayProfile, StayRecord};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = DuckDbStore::in_memory().unwrap();
        let records = (1..=3)
            .map(|i| {
                StayRecord::Profile(StayProfile {
                    base: StayBase {
                        external_id: i.to_string(),
                        city: if i == 3 { "Lyon" } else { "Paris" }.to_string(),
                        is_available: true,
                        price_per_night: 100.0 * i as f64,
                    },
                    name: Some(format!("Stay {i}")),
                    country: Some("France".to_string()),
                })
            })
            .collect();
        store.bulk_upsert(records).await.unwrap();
        router(QueryEngine::new(store), None)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(app().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_search() {
        let (status, body) = get(
            app().await,
            "/stays/search?city=%20Paris%20&sortDirection=DESC",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["data"][0]["externalId"], "2");
        assert_eq!(body["data"][0]["kind"], "Profile");
        assert_eq!(body["data"][0]["pricePerNight"], 200.0);
        assert!(body["data"][0]["createdAt"].is_string());
        assert_eq!(body["data"][1]["externalId"], "1");
    }

    #[tokio::test]
    async fn test_search_defaults_return_everything() {
        let (status, body) = get(app().await, "/stays/search").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_params_are_bad_request() {
        let (status, body) = get(app().await, "/stays/search?limit=500").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("limit"));

        let (status, _) = get(app().await, "/stays/search?sortBy=externalId").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_store_errors_are_internal() {
        let response = ApiError::from(Error::store_unavailable("lock poisoned")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError::from(Error::CorruptRecord {
            external_id: "1".to_string(),
            message: "unknown kind 'Listing'".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError::from(Error::invalid_query("skip", "negative")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cors_restricted_origin() {
        let store = DuckDbStore::in_memory().unwrap();
        let app = router(
            QueryEngine::new(store),
            Some("https://a.example, https://b.example"),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://b.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("https://b.example"))
        );
    }
}
