//! HTTP surface over the request coordinator.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use tracing::warn;

use crate::application::coordinator::{RequestCoordinator, ServeError, Served, ServedFrom};
use crate::domain::key::RouteKey;

const HEADER_X_CACHE: &str = "x-cache";

#[derive(Clone)]
pub struct HttpState {
    pub coordinator: Arc<RequestCoordinator>,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/-/evict/{*key}", post(evict))
        .fallback(serve_page)
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn serve_page(State(state): State<HttpState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let key = RouteKey::new(uri.path());
    match state.coordinator.handle(&key).await {
        Ok(served) => {
            counter!("rigenera_serve_total", "outcome" => served.served_from.as_str())
                .increment(1);
            page_response(served)
        }
        Err(err) => error_response(&key, err),
    }
}

async fn evict(State(state): State<HttpState>, Path(key): Path<String>) -> Response {
    let key = RouteKey::new(format!("/{key}"));
    match state.coordinator.evict(&key).await {
        Ok(existed) => {
            let status = if existed {
                StatusCode::NO_CONTENT
            } else {
                StatusCode::NOT_FOUND
            };
            status.into_response()
        }
        Err(err) => {
            warn!(key = %key, error = %err, "evict failed");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

fn page_response(served: Served) -> Response {
    let mut response = Response::new(Body::from(served.payload));

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(
        HEADER_X_CACHE,
        HeaderValue::from_static(served.served_from.as_str()),
    );
    if let Ok(age) = HeaderValue::from_str(&served.age_seconds.to_string()) {
        headers.insert(header::AGE, age);
    }
    if served.served_from == ServedFrom::Placeholder {
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    }

    response
}

fn error_response(key: &RouteKey, err: ServeError) -> Response {
    match err {
        ServeError::NotFound { .. } => {
            counter!("rigenera_serve_total", "outcome" => "not_found").increment(1);
            (StatusCode::NOT_FOUND, "page not found").into_response()
        }
        ServeError::Store(store_err) => {
            counter!("rigenera_serve_total", "outcome" => "error").increment(1);
            warn!(key = %key, error = %store_err, "artifact store unavailable");
            (StatusCode::SERVICE_UNAVAILABLE, "cache unavailable").into_response()
        }
        ServeError::Regen(regen_err) => {
            counter!("rigenera_serve_total", "outcome" => "error").increment(1);
            warn!(key = %key, error = %regen_err, "blocking generation failed");
            (StatusCode::BAD_GATEWAY, "page generation failed").into_response()
        }
    }
}
