//! Authentication and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{FromRequestParts, MatchedPath, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use marquee_core::{AuthError, AuthRequest, Identity};
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::metrics::{
    AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Metrics middleware that tracks HTTP request duration and counts.
///
/// This middleware records:
/// - Request duration (histogram)
/// - Request count (counter)
/// - Requests in flight (gauge)
///
/// Paths are labelled by their route template; anything that matched no
/// route is folded into `unmatched`. For streamed responses the duration
/// covers the time to the response head, not the whole body.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Builds the authenticator's view of a request.
///
/// Header names are lowercased; values that are not valid UTF-8 are dropped.
/// Without connection info the source address is reported as loopback.
fn auth_request(request: &Request<Body>) -> AuthRequest {
    let headers: HashMap<String, String> = request
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect();

    let source_ip = request
        .extensions()
        .get::<SocketAddr>()
        .map(SocketAddr::ip)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    AuthRequest { headers, source_ip }
}

/// Metric label and status code for a rejected request.
fn rejection(error: &AuthError) -> (&'static str, StatusCode) {
    match error {
        AuthError::NotAuthenticated => ("not_authenticated", StatusCode::UNAUTHORIZED),
        AuthError::InvalidCredentials(_) => ("invalid_credentials", StatusCode::UNAUTHORIZED),
        AuthError::ConfigurationError(_) => ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Authentication middleware guarding the operator endpoints.
///
/// On success the resolved [`Identity`] is stored in the request extensions
/// for [`AuthUser`]. Missing or wrong credentials yield 401 before any
/// handler runs, so a rejected fetch never reaches the tool.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let authenticator = state.authenticator();

    let identity = if authenticator.method_name() == "none" {
        Identity::anonymous()
    } else {
        match authenticator.authenticate(&auth_request(&request)).await {
            Ok(identity) => identity,
            Err(e) => {
                let (reason, status) = rejection(&e);
                AUTH_FAILURES_TOTAL.with_label_values(&[reason]).inc();
                warn!(path = %request.uri().path(), reason, "Request rejected: {}", e);
                return Err(status);
            }
        }
    };

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extractor for authenticated user ID.
///
/// Reads the user_id of the [`Identity`] left by [`auth_middleware`],
/// or "anonymous" on routes the middleware does not cover.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(user_id)))
    }
}
