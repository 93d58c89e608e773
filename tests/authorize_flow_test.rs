// ABOUTME: End-to-end tests for the authorize endpoint over the axum router
// ABOUTME: Covers the trust boundary, PKCE enforcement, consent decisions, and rate limiting
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use common::{
    authorize_query, build_app, seeded_store, test_config, user_token, CONFIDENTIAL_CLIENT,
    PUBLIC_CLIENT, REDIRECT, VERIFIER,
};
use serde_json::{json, Value};
use strive_auth_server::oauth2_server::pkce;
use tower::ServiceExt;
use uuid::Uuid;

async fn get(app: &Router, ip: &str, query: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(format!("/oauth2/authorize?{query}"))
                .header("x-forwarded-for", ip)
                .header(header::USER_AGENT, "strive-tests/1.0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn post(app: &Router, ip: &str, token: Option<&str>, body: &Value) -> Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/oauth2/authorize")
        .header("x-forwarded-for", ip)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    app.clone()
        .oneshot(builder.body(Body::from(serde_json::to_vec(body).unwrap())).unwrap())
        .await
        .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_owned()
}

fn valid_query(challenge: &str) -> String {
    authorize_query(&[
        ("client_id", PUBLIC_CLIENT),
        ("redirect_uri", REDIRECT),
        ("response_type", "code"),
        ("scope", "habits:read"),
        ("state", "xyz-123"),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
    ])
}

#[tokio::test]
async fn test_valid_request_redirects_to_consent() {
    let app = build_app(seeded_store(), &test_config());
    let challenge = pkce::compute_challenge(VERIFIER);

    let response = get(&app, "10.1.0.1", &valid_query(&challenge)).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with("/oauth2/consent?"));
    assert!(location.contains("client_id=habit-tracker-mobile"));
    assert!(location.contains("state=xyz-123"));
    assert!(location.contains("code_challenge_method=S256"));
}

#[tokio::test]
async fn test_unregistered_redirect_uri_never_redirects() {
    let app = build_app(seeded_store(), &test_config());
    let challenge = pkce::compute_challenge(VERIFIER);

    // Trailing slash is a different URI
    let query = authorize_query(&[
        ("client_id", PUBLIC_CLIENT),
        ("redirect_uri", &format!("{REDIRECT}/")),
        ("response_type", "code"),
        ("state", "xyz"),
        ("code_challenge", &challenge),
        ("code_challenge_method", "S256"),
    ]);

    let response = get(&app, "10.1.0.2", &query).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());

    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn test_unknown_client_rejected_directly() {
    let app = build_app(seeded_store(), &test_config());

    let query = authorize_query(&[
        ("client_id", "no-such-client"),
        ("redirect_uri", REDIRECT),
        ("response_type", "code"),
    ]);
    let response = get(&app, "10.1.0.3", &query).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_client");
}

#[tokio::test]
async fn test_missing_client_id_rejected_directly() {
    let app = build_app(seeded_store(), &test_config());

    let query = authorize_query(&[("redirect_uri", REDIRECT), ("response_type", "code")]);
    let response = get(&app, "10.1.0.4", &query).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
    assert!(body["error_description"]
        .as_str()
        .unwrap()
        .contains("client_id"));
}

#[tokio::test]
async fn test_unsupported_response_type_rejected_directly() {
    let app = build_app(seeded_store(), &test_config());

    // response_type is a required parameter; its failures must not reach
    // the client's redirect URI even when the URI would validate
    let query = authorize_query(&[
        ("client_id", PUBLIC_CLIENT),
        ("redirect_uri", REDIRECT),
        ("response_type", "token"),
        ("state", "keep-me"),
    ]);
    let response = get(&app, "10.1.0.5", &query).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(json_body(response).await["error"], "unsupported_response_type");
}

#[tokio::test]
async fn test_missing_response_type_rejected_directly() {
    let app = build_app(seeded_store(), &test_config());

    let query = authorize_query(&[
        ("client_id", PUBLIC_CLIENT),
        ("redirect_uri", REDIRECT),
        ("state", "keep-me"),
    ]);
    let response = get(&app, "10.1.0.10", &query).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());

    let body = json_body(response).await;
    assert_eq!(body["error"], "invalid_request");
    assert!(body["error_description"]
        .as_str()
        .unwrap()
        .contains("response_type"));
}

#[tokio::test]
async fn test_public_client_without_pkce_redirects_error() {
    let app = build_app(seeded_store(), &test_config());

    let query = authorize_query(&[
        ("client_id", PUBLIC_CLIENT),
        ("redirect_uri", REDIRECT),
        ("response_type", "code"),
        ("state", "xyz"),
    ]);
    let response = get(&app, "10.1.0.6", &query).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with(REDIRECT));
    assert!(location.contains("error=invalid_request"));
    assert!(location.contains("state=xyz"));
}

#[tokio::test]
async fn test_confidential_client_may_omit_pkce() {
    let app = build_app(seeded_store(), &test_config());

    let query = authorize_query(&[
        ("client_id", CONFIDENTIAL_CLIENT),
        ("redirect_uri", REDIRECT),
        ("response_type", "code"),
    ]);
    let response = get(&app, "10.1.0.7", &query).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with("/oauth2/consent?"));
}

#[tokio::test]
async fn test_duplicate_query_key_is_handled_not_extractor_rejected() {
    let app = build_app(seeded_store(), &test_config());

    // A repeated key fails deserialization; the response must still be the
    // endpoint's own JSON error, not a framework rejection
    let response = get(&app, "10.1.0.11", "client_id=a&client_id=b").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(header::LOCATION).is_none());
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_malformed_decision_body_is_handled_not_extractor_rejected() {
    let app = build_app(seeded_store(), &test_config());
    let token = user_token(Uuid::new_v4());

    let request = Request::builder()
        .method("POST")
        .uri("/oauth2/authorize")
        .header("x-forwarded-for", "10.1.0.12")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_rate_limit_applies_before_validation() {
    let app = build_app(seeded_store(), &test_config());

    // Unparseable requests still count against the window budget of 5
    for _ in 0..5 {
        let response = get(&app, "10.1.0.8", "client_id=a&client_id=b").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let response = get(&app, "10.1.0.8", "client_id=a&client_id=b").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let retry_after: u64 = response
        .headers()
        .get(header::RETRY_AFTER)
        .unwrap()
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(json_body(response).await["error"], "too_many_requests");

    // A different caller is unaffected
    let challenge = pkce::compute_challenge(VERIFIER);
    let response = get(&app, "10.1.0.9", &valid_query(&challenge)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn test_approved_decision_returns_code_redirect() {
    let app = build_app(seeded_store(), &test_config());
    let token = user_token(Uuid::new_v4());
    let challenge = pkce::compute_challenge(VERIFIER);

    let body = json!({
        "client_id": PUBLIC_CLIENT,
        "redirect_uri": REDIRECT,
        "scope": "habits:read",
        "state": "xyz-123",
        "code_challenge": challenge,
        "code_challenge_method": "S256",
        "approved": true,
    });
    let response = post(&app, "10.2.0.1", Some(&token), &body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let redirect_url = body["redirect_url"].as_str().unwrap();
    assert!(redirect_url.starts_with(REDIRECT));
    assert!(redirect_url.contains("code="));
    assert!(redirect_url.contains("state=xyz-123"));
    assert!(!redirect_url.contains("error="));
}

#[tokio::test]
async fn test_denied_decision_returns_access_denied_redirect() {
    let app = build_app(seeded_store(), &test_config());
    let token = user_token(Uuid::new_v4());
    let challenge = pkce::compute_challenge(VERIFIER);

    let body = json!({
        "client_id": PUBLIC_CLIENT,
        "redirect_uri": REDIRECT,
        "state": "xyz",
        "code_challenge": challenge,
        "code_challenge_method": "S256",
        "approved": false,
    });
    let response = post(&app, "10.2.0.2", Some(&token), &body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let redirect_url = body["redirect_url"].as_str().unwrap();
    assert!(redirect_url.contains("error=access_denied"));
    assert!(redirect_url.contains("state=xyz"));
    assert!(!redirect_url.contains("code="));
}

#[tokio::test]
async fn test_decision_without_session_is_unauthorized() {
    let app = build_app(seeded_store(), &test_config());

    let body = json!({
        "client_id": PUBLIC_CLIENT,
        "redirect_uri": REDIRECT,
        "approved": true,
    });
    let response = post(&app, "10.2.0.3", None, &body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post(&app, "10.2.0.3", Some("forged-token"), &body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_decision_with_unregistered_redirect_is_direct_error() {
    let app = build_app(seeded_store(), &test_config());
    let token = user_token(Uuid::new_v4());

    let body = json!({
        "client_id": PUBLIC_CLIENT,
        "redirect_uri": "https://evil.example.com/callback",
        "approved": true,
    });
    let response = post(&app, "10.2.0.4", Some(&token), &body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_discovery_metadata() {
    let app = build_app(seeded_store(), &test_config());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/.well-known/oauth-authorization-server")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["response_types_supported"], json!(["code"]));
    assert_eq!(body["code_challenge_methods_supported"], json!(["S256"]));
    assert!(body["authorization_endpoint"]
        .as_str()
        .unwrap()
        .ends_with("/oauth2/authorize"));
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = build_app(seeded_store(), &test_config());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
