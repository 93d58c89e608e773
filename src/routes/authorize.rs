// ABOUTME: Axum handlers for the authorize endpoint's GET and POST legs
// ABOUTME: Translates orchestrator outcomes into redirects, JSON bodies, and headers
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::AppState;
use crate::oauth2_server::{AuthorizeOutcome, DecisionOutcome, OAuth2Error, RequestContext};
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Build the request context from caller headers
///
/// Behind the reverse proxy the first `x-forwarded-for` entry is the caller;
/// direct connections fall back to a fixed marker so the rate limiter still
/// has a key.
fn request_context(headers: &HeaderMap) -> RequestContext {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map_or_else(|| "unknown".to_owned(), |ip| ip.trim().to_owned());

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    RequestContext {
        ip_address,
        user_agent,
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_owned)
}

/// 302 Found; the user agent re-issues a GET at the target
fn found(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, location.to_owned())],
    )
        .into_response()
}

fn denied(status: StatusCode, error: &OAuth2Error, retry_after: Option<u64>) -> Response {
    let mut response = (status, Json(error.clone())).into_response();
    if let Some(secs) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}

/// GET leg: validate the request and redirect to the consent page
///
/// The query string travels to the orchestrator unparsed so that nothing,
/// not even a query the deserializer rejects, can terminate a request before
/// the rate limiter and audit log have seen it.
pub async fn authorize_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    let ctx = request_context(&headers);
    match state.server.authorize(query.as_deref(), &ctx).await {
        AuthorizeOutcome::ConsentRedirect { location }
        | AuthorizeOutcome::ErrorRedirect { location } => found(&location),
        AuthorizeOutcome::Denied {
            status,
            error,
            retry_after,
        } => denied(status, &error, retry_after),
    }
}

/// POST leg: apply the authenticated resource owner's consent decision
///
/// The body travels unparsed for the same reason as the GET query string.
pub async fn decide_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = request_context(&headers);
    let token = bearer_token(&headers);
    match state.server.decide(token.as_deref(), &body, &ctx).await {
        DecisionOutcome::Redirect(response) => (StatusCode::OK, Json(response)).into_response(),
        DecisionOutcome::Denied {
            status,
            error,
            retry_after,
        } => denied(status, &error, retry_after),
    }
}
