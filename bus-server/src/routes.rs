//! The RZLBus HTTP routes
//!
//! - `/_/state/<prefix>`: `GET` dumps the (filtered) state, `POST` writes a batch
//! - `/_/reboot`: authenticated `POST` that runs the reboot hook
//!
//! Every route extracts a ready-made [`Response`], so routes of different
//! shapes can be chained with `or(..).unify()` and boxed.

use std::borrow::Cow;
use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use state_store::{Batch, StateStore};
use tracing::{debug, info, warn};
use warp::filters::BoxedFilter;
use warp::http::{Method, StatusCode};
use warp::path::Tail;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::auth::{basic_credentials, Credentials};
use crate::error::ApiError;
use crate::reboot::RebootHook;

/// Both built-in routes, combined
pub fn api(
    store: StateStore,
    credentials: Credentials,
    reboot_hook: Arc<dyn RebootHook>,
) -> BoxedFilter<(Response,)> {
    state_route(store)
        .or(reboot_route(credentials, reboot_hook))
        .unify()
        .boxed()
}

/// `/_/state/<prefix>`
pub fn state_route(store: StateStore) -> BoxedFilter<(Response,)> {
    warp::path("_")
        .and(warp::path("state"))
        .and(warp::path::tail())
        .and(warp::method())
        .and(warp::body::bytes())
        .and_then(move |tail: Tail, method: Method, body: Bytes| {
            let store = store.clone();
            async move {
                let response = match method {
                    Method::GET => read_state(&store, tail.as_str()),
                    Method::POST => write_state(store, body).await,
                    _ => Err(ApiError::UnsupportedMethod("GET or POST")),
                };
                Ok::<_, Rejection>(response.unwrap_or_else(ApiError::into_response))
            }
        })
        .boxed()
}

/// `/_/reboot`
pub fn reboot_route(
    credentials: Credentials,
    reboot_hook: Arc<dyn RebootHook>,
) -> BoxedFilter<(Response,)> {
    warp::path("_")
        .and(warp::path("reboot"))
        .and(warp::path::end())
        .and(warp::method())
        .and(warp::header::optional::<String>("authorization"))
        .and_then(move |method: Method, authorization: Option<String>| {
            let credentials = credentials.clone();
            let reboot_hook = Arc::clone(&reboot_hook);
            async move {
                let response = reboot(method, authorization, &credentials, reboot_hook.as_ref()).await;
                Ok::<_, Rejection>(response.unwrap_or_else(ApiError::into_response))
            }
        })
        .boxed()
}

/// The key prefix addressed by a raw (still percent-encoded) path tail
pub fn decode_prefix(raw: &str) -> Result<Cow<'_, str>, ApiError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ApiError::InvalidPrefix(raw.to_string()))
}

fn read_state(store: &StateStore, raw_prefix: &str) -> Result<Response, ApiError> {
    let prefix = decode_prefix(raw_prefix)?;
    let body = store
        .render_snapshot(&prefix)
        .map_err(|e| ApiError::Serialization(e.to_string()))?;
    debug!(prefix = %prefix, bytes = body.len(), "serving state");

    Ok(warp::reply::with_header(body, "content-type", "application/json").into_response())
}

async fn write_state(store: StateStore, body: Bytes) -> Result<Response, ApiError> {
    let batch: Batch =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    let keys = batch.len();

    // Hooks are plain host code and may block
    let outcome = tokio::task::spawn_blocking(move || store.apply_batch(batch))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    debug!(keys, applied = outcome.len(), "batch applied");
    Ok(text(StatusCode::OK, "State modified successfully."))
}

async fn reboot(
    method: Method,
    authorization: Option<String>,
    expected: &Credentials,
    hook: &dyn RebootHook,
) -> Result<Response, ApiError> {
    if method != Method::POST {
        return Err(ApiError::UnsupportedMethod("POST"));
    }

    let presented = basic_credentials(authorization.as_deref());
    if !expected.accepts(&presented) {
        warn!(user = %presented.username, "reboot refused: bad credentials");
        return Err(ApiError::Unauthorized);
    }

    info!(user = %presented.username, hook = hook.name(), "reboot requested");
    hook.reboot()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(text(StatusCode::OK, "Reboot initiated."))
}

fn text(status: StatusCode, body: &'static str) -> Response {
    warp::reply::with_status(body, status).into_response()
}

/// Turn rejections into plain-text responses
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let response = if let Some(api) = err.find::<ApiError>() {
        api.clone().into_response()
    } else if err.is_not_found() {
        text(StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        text(StatusCode::NOT_IMPLEMENTED, "HTTP Method not implemented")
    } else {
        warn!(?err, "unhandled rejection");
        text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    };

    Ok(response)
}
