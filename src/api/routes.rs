use crate::api::api_error::APIError;
use crate::api::model::NegotiateResponse;
use crate::api::server::AppState;
use crate::apply::Changes;
use crate::config::WEBHOOK_MEDIA_TYPE;
use crate::error::Error;
use crate::record::Record;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body. external-dns sends a whole sync as one change-set.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub(super) fn provider(state: AppState) -> Router {
    // Applying changes waits for every change-set queued ahead of it, so it has no timeout.
    let timeout = state.config.api_timeout;
    Router::new()
        .route("/", get(negotiate).layer(TimeoutLayer::new(timeout)))
        .route(
            "/records",
            get(records)
                .layer(TimeoutLayer::new(timeout))
                .merge(post(apply_changes)),
        )
        .route(
            "/adjustendpoints",
            post(adjust_endpoints).layer(TimeoutLayer::new(timeout)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), authorize))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(super) fn health() -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .layer(TraceLayer::new_for_http())
}

#[allow(clippy::unused_async)]
async fn health_check() -> &'static str {
    "ok"
}

async fn authorize<B>(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<B>,
    next: Next<B>,
) -> Result<Response, APIError> {
    let client_addr = client_addr.ip();
    if !state.config.request_permitted(client_addr) {
        tracing::warn!(
            "rejected request from {client_addr} for {}",
            request.uri().path()
        );
        return Err(Error::AuthForbidden(client_addr).into());
    }
    Ok(next.run(request).await)
}

#[allow(clippy::unused_async)]
async fn negotiate(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, APIError> {
    require_webhook_accept(&headers)?;
    let response = NegotiateResponse {
        domain_filter: state.config.domain_filter.clone(),
    };
    tracing::info!(
        domain_filter_count = response.domain_filter.len(),
        "negotiate response sent"
    );
    webhook_json(&response)
}

async fn records(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, APIError> {
    require_webhook_accept(&headers)?;
    let records = state.store.list_records().await?;
    tracing::info!(count = records.len(), "records response sent");
    webhook_json(&records)
}

async fn apply_changes(
    State(state): State<AppState>,
    WithRejection(Json(changes), _): WithRejection<Json<Changes>, APIError>,
) -> Result<StatusCode, APIError> {
    tracing::debug!(
        create = changes.create.len(),
        update = changes.update_new.len(),
        delete = changes.delete.len(),
        pending = state.serializer.pending(),
        "apply changes request received"
    );
    state.serializer.apply(changes).await?;
    tracing::info!("apply changes completed");
    Ok(StatusCode::NO_CONTENT)
}

#[allow(clippy::unused_async)]
async fn adjust_endpoints(
    headers: HeaderMap,
    WithRejection(Json(body), _): WithRejection<Json<Value>, APIError>,
) -> Result<Response, APIError> {
    require_webhook_accept(&headers)?;
    let Value::Array(endpoints) = body else {
        tracing::warn!("adjust endpoints request body is not an array");
        return Err(
            Error::InvalidRequest("request body must be an array of endpoints".to_string()).into(),
        );
    };

    let original_count = endpoints.len();
    let adjusted: Vec<Value> = endpoints.into_iter().filter(supported_endpoint).collect();
    tracing::info!(
        original_count,
        adjusted_count = adjusted.len(),
        filtered_count = original_count - adjusted.len(),
        "adjusted endpoints"
    );
    webhook_json(&adjusted)
}

/// Keep endpoints of a supported record type that pass validation. Kept endpoints are echoed
/// back unchanged, including fields this webhook doesn't interpret.
fn supported_endpoint(endpoint: &Value) -> bool {
    if !endpoint.is_object() {
        tracing::warn!("skipping endpoint that is not an object");
        return false;
    }
    let record = match Record::deserialize(endpoint) {
        Ok(record) => record,
        Err(err) => {
            tracing::debug!(
                dns_name = ?endpoint.get("dnsName"),
                record_type = ?endpoint.get("recordType"),
                "filtering out unsupported endpoint: {err}"
            );
            return false;
        }
    };
    if let Err(err) = record.validate() {
        tracing::warn!(
            dns_name = %record.dns_name,
            record_type = %record.record_type,
            "skipping invalid endpoint: {err}"
        );
        return false;
    }
    true
}

fn require_webhook_accept(headers: &HeaderMap) -> Result<(), Error> {
    match headers.get(ACCEPT) {
        None => Ok(()),
        Some(accept) => {
            if accept
                .to_str()
                .map_or(false, |accept| accept.contains(WEBHOOK_MEDIA_TYPE))
            {
                Ok(())
            } else {
                tracing::warn!(?accept, "unsupported Accept header");
                Err(Error::NotAcceptable)
            }
        }
    }
}

/// Serialize `body` with the webhook media type as the exact `Content-Type`, without the
/// `charset` parameter `Json` would add.
fn webhook_json<T: Serialize>(body: &T) -> Result<Response, APIError> {
    let body = serde_json::to_string(body).map_err(Error::from)?;
    Ok((
        [(CONTENT_TYPE, HeaderValue::from_static(WEBHOOK_MEDIA_TYPE))],
        body,
    )
        .into_response())
}
