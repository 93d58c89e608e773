// ABOUTME: Authorize orchestrator sequencing rate limiting, validation, consent, and audit
// ABOUTME: Owns the error-delivery trust boundary between direct responses and error redirects
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The orchestrator runs the authorize state machine for both legs:
//!
//! GET: rate limit, query parsing, required params (including
//! `response_type=code`), client lookup, redirect URI match, PKCE, then
//! redirect to the consent page.
//!
//! POST: rate limit, resource-owner session, body parsing, then the same
//! request validation, ending in either a code redirect or an error redirect.
//!
//! The raw query string and body are handed in unparsed so the rate limiter
//! counts every request, including ones the deserializer rejects.
//!
//! Until the redirect URI has been validated, every error goes back to the
//! caller directly and nothing is ever redirected. After validation, protocol
//! errors travel to the client via its own redirect URI. Each terminal
//! outcome produces exactly one audit record.

use crate::audit::{hash_user_agent, AuditAction, AuditEvent, AuditLog};
use crate::auth::UserTokenVerifier;
use crate::config::ServerConfig;
use crate::database::AuthStore;
use crate::oauth2_server::codes::{AuthorizationCodeManager, CodeIssuance, Grant};
use crate::oauth2_server::models::{
    AuthorizeParams, ConsentDecision, DecisionResponse, OAuth2Error,
};
use crate::oauth2_server::rate_limiting::RateLimitManager;
use crate::oauth2_server::redirect_uri;
use crate::oauth2_server::registry::{ClientRegistry, ClientSnapshot};
use crate::oauth2_server::pkce;
use chrono::{Duration as ChronoDuration, Utc};
use http::StatusCode;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// Caller metadata extracted at the HTTP boundary
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Caller IP, the rate limit key
    pub ip_address: String,
    /// Raw user agent; only its hash is ever persisted
    pub user_agent: Option<String>,
}

/// Terminal outcome of the GET authorize leg
#[derive(Debug)]
pub enum AuthorizeOutcome {
    /// Redirect the user agent to the internal consent page
    ConsentRedirect {
        /// Consent page path with the validated request parameters
        location: String,
    },
    /// Redirect a protocol error to the validated client redirect URI
    ErrorRedirect {
        /// Client redirect URI with error parameters and echoed state
        location: String,
    },
    /// Respond directly; the redirect URI never earned trust
    Denied {
        /// HTTP status
        status: StatusCode,
        /// OAuth 2.0 error body
        error: OAuth2Error,
        /// Seconds for the `Retry-After` header (rate limiting only)
        retry_after: Option<u64>,
    },
}

/// Terminal outcome of the POST consent-decision leg
#[derive(Debug)]
pub enum DecisionOutcome {
    /// The user agent should follow this URL (code on approval, error on denial)
    Redirect(DecisionResponse),
    /// Respond directly; the redirect URI never earned trust
    Denied {
        /// HTTP status
        status: StatusCode,
        /// OAuth 2.0 error body
        error: OAuth2Error,
        /// Seconds for the `Retry-After` header (rate limiting only)
        retry_after: Option<u64>,
    },
}

type Rejection = (StatusCode, OAuth2Error);

/// OAuth 2.0 authorization endpoint orchestrator
pub struct AuthorizationServer {
    registry: ClientRegistry,
    rate_limiter: RateLimitManager,
    codes: AuthorizationCodeManager,
    audit: AuditLog,
    token_verifier: Arc<dyn UserTokenVerifier>,
    consent_page_path: String,
    collaborator_timeout: Duration,
}

impl AuthorizationServer {
    /// Wire the orchestrator and its collaborators over one store
    #[must_use]
    pub fn new(
        store: Arc<dyn AuthStore>,
        token_verifier: Arc<dyn UserTokenVerifier>,
        config: &ServerConfig,
    ) -> Self {
        let oauth2 = &config.oauth2_server;
        Self {
            registry: ClientRegistry::new(store.clone()),
            rate_limiter: RateLimitManager::new(store.clone(), config.rate_limit.clone()),
            codes: AuthorizationCodeManager::new(
                store.clone(),
                ChronoDuration::minutes(oauth2.code_ttl_minutes),
                oauth2.collaborator_timeout(),
            ),
            audit: AuditLog::new(
                store,
                oauth2.audit_append_retries,
                oauth2.collaborator_timeout(),
            ),
            token_verifier,
            consent_page_path: oauth2.consent_page_path.clone(),
            collaborator_timeout: oauth2.collaborator_timeout(),
        }
    }

    /// Authorization code manager, shared with the token endpoint
    #[must_use]
    pub const fn code_manager(&self) -> &AuthorizationCodeManager {
        &self.codes
    }

    /// Audit log handle for operational tooling
    #[must_use]
    pub const fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    /// Wrap a collaborator call in the configured timeout
    ///
    /// A hung or failed collaborator becomes `server_error`; the request
    /// fails rather than waiting forever.
    async fn with_timeout<T, F>(&self, what: &str, fut: F) -> Result<T, Rejection>
    where
        F: Future<Output = anyhow::Result<T>> + Send,
    {
        match tokio::time::timeout(self.collaborator_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!("{what} failed: {e:#}");
                Err((StatusCode::INTERNAL_SERVER_ERROR, OAuth2Error::server_error()))
            }
            Err(_) => {
                tracing::error!("{what} timed out");
                Err((StatusCode::INTERNAL_SERVER_ERROR, OAuth2Error::server_error()))
            }
        }
    }

    /// Count the request and reject when over budget
    async fn enforce_rate_limit(
        &self,
        ctx: &RequestContext,
        action: &str,
    ) -> Result<(), (Rejection, Option<u64>)> {
        let now = Utc::now();
        let status = self
            .with_timeout(
                "rate limit check",
                self.rate_limiter.check_rate_limit_at(&ctx.ip_address, action, now),
            )
            .await
            .map_err(|rejection| (rejection, None))?;

        if status.is_rate_limited {
            tracing::warn!(ip = %ctx.ip_address, action, "rate limit exceeded");
            return Err((
                (StatusCode::TOO_MANY_REQUESTS, OAuth2Error::too_many_requests()),
                Some(status.retry_after_secs(now)),
            ));
        }
        Ok(())
    }

    /// Shared request validation up to the trust boundary
    ///
    /// On success the returned redirect URI is validated and may receive
    /// error redirects. Every failure here responds directly.
    async fn resolve_client(
        &self,
        client_id: Option<&str>,
        redirect_uri: Option<&str>,
    ) -> Result<(ClientSnapshot, String), Rejection> {
        let Some(client_id) = client_id.filter(|v| !v.is_empty()) else {
            return Err((
                StatusCode::BAD_REQUEST,
                OAuth2Error::invalid_request("Missing required parameter: client_id"),
            ));
        };
        let Some(redirect_uri) = redirect_uri.filter(|v| !v.is_empty()) else {
            return Err((
                StatusCode::BAD_REQUEST,
                OAuth2Error::invalid_request("Missing required parameter: redirect_uri"),
            ));
        };

        let snapshot = self
            .with_timeout("client lookup", self.registry.snapshot(client_id))
            .await?
            .ok_or_else(|| (StatusCode::BAD_REQUEST, OAuth2Error::invalid_client()))?;

        if !redirect_uri::is_registered(redirect_uri, &snapshot.redirect_uris) {
            return Err((
                StatusCode::BAD_REQUEST,
                OAuth2Error::invalid_request("redirect_uri is not registered for this client"),
            ));
        }

        Ok((snapshot, redirect_uri.to_owned()))
    }

    /// GET leg: validate the authorization request and route to consent
    ///
    /// Takes the raw query string; parsing happens after the rate-limit
    /// step so a malformed query is still counted and audited.
    pub async fn authorize(
        &self,
        raw_query: Option<&str>,
        ctx: &RequestContext,
    ) -> AuthorizeOutcome {
        let (outcome, client_id, error_message) = self.authorize_inner(raw_query, ctx).await;

        let success = error_message.is_none();
        self.audit
            .record(AuditEvent {
                client_id,
                user_id: None,
                action: AuditAction::Authorize,
                ip_address: ctx.ip_address.clone(),
                user_agent_hash: hash_user_agent(ctx.user_agent.as_deref().unwrap_or("")),
                success,
                error_message,
            })
            .await;

        outcome
    }

    async fn authorize_inner(
        &self,
        raw_query: Option<&str>,
        ctx: &RequestContext,
    ) -> (AuthorizeOutcome, Option<String>, Option<String>) {
        if let Err(((status, error), retry_after)) =
            self.enforce_rate_limit(ctx, "authorize").await
        {
            let message = error.audit_message();
            return (
                AuthorizeOutcome::Denied {
                    status,
                    error,
                    retry_after,
                },
                None,
                Some(message),
            );
        }

        let params: AuthorizeParams = match serde_urlencoded::from_str(raw_query.unwrap_or("")) {
            Ok(params) => params,
            Err(e) => {
                tracing::debug!("rejected unparseable authorize query: {e}");
                let error = OAuth2Error::invalid_request("Malformed query string");
                let message = error.audit_message();
                return (
                    AuthorizeOutcome::Denied {
                        status: StatusCode::BAD_REQUEST,
                        error,
                        retry_after: None,
                    },
                    None,
                    Some(message),
                );
            }
        };
        let client_id = params.client_id.clone();

        // response_type is a required parameter: its failures respond
        // directly and never redirect, same as a missing client_id.
        match params.response_type.as_deref() {
            Some("code") => {}
            Some(_) => {
                let error = OAuth2Error::unsupported_response_type();
                let message = error.audit_message();
                return (
                    AuthorizeOutcome::Denied {
                        status: StatusCode::BAD_REQUEST,
                        error,
                        retry_after: None,
                    },
                    client_id,
                    Some(message),
                );
            }
            None => {
                let error =
                    OAuth2Error::invalid_request("Missing required parameter: response_type");
                let message = error.audit_message();
                return (
                    AuthorizeOutcome::Denied {
                        status: StatusCode::BAD_REQUEST,
                        error,
                        retry_after: None,
                    },
                    client_id,
                    Some(message),
                );
            }
        }

        let (snapshot, redirect_uri) = match self
            .resolve_client(params.client_id.as_deref(), params.redirect_uri.as_deref())
            .await
        {
            Ok(resolved) => resolved,
            Err((status, error)) => {
                let message = error.audit_message();
                return (
                    AuthorizeOutcome::Denied {
                        status,
                        error,
                        retry_after: None,
                    },
                    client_id,
                    Some(message),
                );
            }
        };

        // Trust boundary crossed: protocol errors now travel by redirect.
        if let Err(error) = pkce::validate_challenge(
            snapshot.client_type(),
            params.code_challenge.as_deref(),
            params.code_challenge_method.as_deref(),
        ) {
            let message = error.audit_message();
            return (
                error_redirect(&redirect_uri, &error, params.state.as_deref()),
                client_id,
                Some(message),
            );
        }

        (
            AuthorizeOutcome::ConsentRedirect {
                location: self.consent_location(&params),
            },
            client_id,
            None,
        )
    }

    /// POST leg: apply the resource owner's consent decision
    ///
    /// Takes the raw request body; parsing happens after the rate-limit and
    /// session steps so a malformed body is still counted and audited.
    pub async fn decide(
        &self,
        bearer_token: Option<&str>,
        raw_body: &[u8],
        ctx: &RequestContext,
    ) -> DecisionOutcome {
        let (outcome, client_id, user_id, error_message) =
            self.decide_inner(bearer_token, raw_body, ctx).await;

        let success = error_message.is_none();
        self.audit
            .record(AuditEvent {
                client_id,
                user_id,
                action: AuditAction::AuthorizeDecision,
                ip_address: ctx.ip_address.clone(),
                user_agent_hash: hash_user_agent(ctx.user_agent.as_deref().unwrap_or("")),
                success,
                error_message,
            })
            .await;

        outcome
    }

    async fn decide_inner(
        &self,
        bearer_token: Option<&str>,
        raw_body: &[u8],
        ctx: &RequestContext,
    ) -> (DecisionOutcome, Option<String>, Option<Uuid>, Option<String>) {
        if let Err(((status, error), retry_after)) =
            self.enforce_rate_limit(ctx, "authorize_decision").await
        {
            let message = error.audit_message();
            return (
                DecisionOutcome::Denied {
                    status,
                    error,
                    retry_after,
                },
                None,
                None,
                Some(message),
            );
        }

        let user_id = match self.verify_session(bearer_token).await {
            Ok(user_id) => user_id,
            Err((status, error)) => {
                let message = error.audit_message();
                return (
                    DecisionOutcome::Denied {
                        status,
                        error,
                        retry_after: None,
                    },
                    None,
                    None,
                    Some(message),
                );
            }
        };

        let decision: ConsentDecision = match serde_json::from_slice(raw_body) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::debug!("rejected unparseable consent decision: {e}");
                let error = OAuth2Error::invalid_request("Malformed request body");
                let message = error.audit_message();
                return (
                    DecisionOutcome::Denied {
                        status: StatusCode::BAD_REQUEST,
                        error,
                        retry_after: None,
                    },
                    None,
                    Some(user_id),
                    Some(message),
                );
            }
        };
        let client_id = decision.client_id.clone();

        let (snapshot, redirect_uri) = match self
            .resolve_client(decision.client_id.as_deref(), decision.redirect_uri.as_deref())
            .await
        {
            Ok(resolved) => resolved,
            Err((status, error)) => {
                let message = error.audit_message();
                return (
                    DecisionOutcome::Denied {
                        status,
                        error,
                        retry_after: None,
                    },
                    client_id,
                    Some(user_id),
                    Some(message),
                );
            }
        };

        let state = decision.state.as_deref();

        if let Err(error) = pkce::validate_challenge(
            snapshot.client_type(),
            decision.code_challenge.as_deref(),
            decision.code_challenge_method.as_deref(),
        ) {
            let message = error.audit_message();
            return (
                decision_error(&redirect_uri, &error, state),
                client_id,
                Some(user_id),
                Some(message),
            );
        }

        if decision.approved != Some(true) {
            let error = OAuth2Error::access_denied("The resource owner denied the request");
            let message = error.audit_message();
            return (
                decision_error(&redirect_uri, &error, state),
                client_id,
                Some(user_id),
                Some(message),
            );
        }

        let code = match self
            .with_timeout(
                "authorization code issuance",
                self.codes.create_code(CodeIssuance {
                    client_id: &snapshot.client.client_id,
                    user_id,
                    redirect_uri: &redirect_uri,
                    scope: decision.scope.as_deref(),
                    code_challenge: decision.code_challenge.as_deref(),
                    code_challenge_method: decision.code_challenge_method.as_deref(),
                }),
            )
            .await
        {
            Ok(code) => code,
            Err((status, error)) => {
                let message = error.audit_message();
                return (
                    DecisionOutcome::Denied {
                        status,
                        error,
                        retry_after: None,
                    },
                    client_id,
                    Some(user_id),
                    Some(message),
                );
            }
        };

        match append_query(&redirect_uri, &[("code", Some(&code)), ("state", state)]) {
            Ok(redirect_url) => (
                DecisionOutcome::Redirect(DecisionResponse { redirect_url }),
                client_id,
                Some(user_id),
                None,
            ),
            Err((status, error)) => {
                let message = error.audit_message();
                (
                    DecisionOutcome::Denied {
                        status,
                        error,
                        retry_after: None,
                    },
                    client_id,
                    Some(user_id),
                    Some(message),
                )
            }
        }
    }

    /// Exchange a consumed authorization code for its grant
    ///
    /// Exposed for the token endpoint; all failures are the uniform
    /// `invalid_grant`.
    ///
    /// # Errors
    /// `invalid_grant` on any validation failure, `server_error` on store
    /// failure.
    pub async fn exchange_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<Grant, OAuth2Error> {
        let result = self
            .codes
            .validate_and_consume_code(code, client_id, redirect_uri, code_verifier)
            .await;

        self.audit
            .record(AuditEvent {
                client_id: Some(client_id.to_owned()),
                user_id: result.as_ref().ok().map(|grant| grant.user_id),
                action: AuditAction::CodeExchange,
                ip_address: ctx.ip_address.clone(),
                user_agent_hash: hash_user_agent(ctx.user_agent.as_deref().unwrap_or("")),
                success: result.is_ok(),
                error_message: result.as_ref().err().map(OAuth2Error::audit_message),
            })
            .await;

        result
    }

    async fn verify_session(&self, bearer_token: Option<&str>) -> Result<Uuid, Rejection> {
        let Some(token) = bearer_token else {
            return Err((
                StatusCode::UNAUTHORIZED,
                OAuth2Error::access_denied("Resource owner authentication required"),
            ));
        };

        match tokio::time::timeout(
            self.collaborator_timeout,
            self.token_verifier.verify_user_token(token),
        )
        .await
        {
            Ok(Ok(user_id)) => Ok(user_id),
            Ok(Err(_)) => Err((
                StatusCode::UNAUTHORIZED,
                OAuth2Error::access_denied("Resource owner authentication required"),
            )),
            Err(_) => {
                tracing::error!("token verification timed out");
                Err((StatusCode::INTERNAL_SERVER_ERROR, OAuth2Error::server_error()))
            }
        }
    }

    /// Consent page location carrying the validated request parameters
    fn consent_location(&self, params: &AuthorizeParams) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        let pairs = [
            ("client_id", params.client_id.as_deref()),
            ("redirect_uri", params.redirect_uri.as_deref()),
            ("response_type", params.response_type.as_deref()),
            ("scope", params.scope.as_deref()),
            ("state", params.state.as_deref()),
            ("code_challenge", params.code_challenge.as_deref()),
            ("code_challenge_method", params.code_challenge_method.as_deref()),
        ];
        for (name, value) in pairs {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
        format!("{}?{}", self.consent_page_path, query.finish())
    }
}

fn error_redirect(
    redirect_uri: &str,
    error: &OAuth2Error,
    state: Option<&str>,
) -> AuthorizeOutcome {
    match error_redirect_url(redirect_uri, error, state) {
        Ok(location) => AuthorizeOutcome::ErrorRedirect { location },
        Err((status, error)) => AuthorizeOutcome::Denied {
            status,
            error,
            retry_after: None,
        },
    }
}

fn decision_error(
    redirect_uri: &str,
    error: &OAuth2Error,
    state: Option<&str>,
) -> DecisionOutcome {
    match error_redirect_url(redirect_uri, error, state) {
        Ok(redirect_url) => DecisionOutcome::Redirect(DecisionResponse { redirect_url }),
        Err((status, error)) => DecisionOutcome::Denied {
            status,
            error,
            retry_after: None,
        },
    }
}

/// Append query parameters to a validated redirect URI
fn append_query(
    redirect_uri: &str,
    pairs: &[(&str, Option<&str>)],
) -> Result<String, Rejection> {
    let mut url = Url::parse(redirect_uri).map_err(|e| {
        tracing::error!("registered redirect URI failed to parse: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, OAuth2Error::server_error())
    })?;

    {
        let mut query = url.query_pairs_mut();
        for (name, value) in pairs {
            if let Some(value) = value {
                query.append_pair(name, value);
            }
        }
    }
    Ok(url.into())
}

fn error_redirect_url(
    redirect_uri: &str,
    error: &OAuth2Error,
    state: Option<&str>,
) -> Result<String, Rejection> {
    append_query(
        redirect_uri,
        &[
            ("error", Some(error.error.as_str())),
            ("error_description", error.error_description.as_deref()),
            ("state", state),
        ],
    )
}
