use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::application::staff::{StaffPrincipal, StaffService};

use super::error::ApiError;

/// Cookie carrying a staff token for browser sessions on the public site.
pub const STAFF_COOKIE: &str = "broadsheet_staff";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Who is asking. Anonymous unless a valid staff token was presented.
#[derive(Debug, Clone, Default)]
pub struct StaffIdentity(pub Option<StaffPrincipal>);

impl StaffIdentity {
    pub fn is_staff(&self) -> bool {
        self.0.is_some()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.as_ref().map(|principal| principal.name.as_str())
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Attach a [`StaffIdentity`] to every request. Bad tokens degrade to anonymous.
pub async fn resolve_staff(
    State(staff): State<StaffService>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let identity = match extract_token(request.headers()) {
        Some(token) => match staff.authenticate(&token).await {
            Ok(principal) => StaffIdentity(Some(principal)),
            Err(err) => {
                debug!(
                    target = "broadsheet::http::staff",
                    error = %err,
                    "ignoring staff token"
                );
                StaffIdentity::default()
            }
        },
        None => StaffIdentity::default(),
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// Reject requests that `resolve_staff` left anonymous.
pub async fn require_staff(request: Request<Body>, next: Next) -> Response {
    let is_staff = request
        .extensions()
        .get::<StaffIdentity>()
        .is_some_and(StaffIdentity::is_staff);
    if !is_staff {
        return ApiError::unauthorized().into_response();
    }
    next.run(request).await
}

fn extract_token(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == STAFF_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let staff = request
        .extensions()
        .get::<StaffIdentity>()
        .and_then(|identity| identity.name().map(str::to_string));

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "broadsheet::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                staff = staff.as_deref().unwrap_or(""),
                "request failed",
            );
        } else {
            warn!(
                target = "broadsheet::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                staff = staff.as_deref().unwrap_or(""),
                "client request error",
            );
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer st_abc_header"),
        );
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; broadsheet_staff=st_abc_cookie"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("st_abc_header"));
    }

    #[test]
    fn cookie_is_read_when_no_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; broadsheet_staff=st_abc_cookie"),
        );
        assert_eq!(extract_token(&headers).as_deref(), Some("st_abc_cookie"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9v"));
        assert_eq!(extract_token(&headers), None);
    }
}
