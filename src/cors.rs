//! Cross-origin admission.
//!
//! Two pieces cooperate here. [`origin_admission`] rejects requests whose
//! `Origin` header is not allow-listed before any route runs, and
//! [`cors_layer`] decorates admitted responses with credentialed CORS
//! headers and answers preflight requests.

use crate::error::AppError;
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Ordered, immutable set of allowed browser origins.
#[derive(Debug, Clone)]
pub struct AllowList(Arc<[String]>);

impl AllowList {
    pub fn new(origins: Vec<String>) -> Self {
        Self(origins.into())
    }

    /// Exact string match; no wildcard or subdomain expansion.
    pub fn contains(&self, origin: &str) -> bool {
        self.0.iter().any(|o| o == origin)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Decide whether a request carrying `origin` may proceed.
///
/// Requests without an origin (same-origin navigation, curl, server to
/// server) are always admitted.
pub fn is_origin_allowed(origin: Option<&str>, allow_list: &AllowList) -> bool {
    match origin {
        None | Some("") => true,
        Some(origin) => allow_list.contains(origin),
    }
}

/// Build the CORS header layer for admitted requests.
pub fn cors_layer(allow_list: AllowList) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|o| allow_list.contains(o))
                    .unwrap_or(false)
            },
        ))
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::PUT,
            Method::PATCH,
            Method::POST,
            Method::DELETE,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Origin admission middleware - rejects disallowed origins before dispatch
pub async fn origin_admission(
    State(allow_list): State<AllowList>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let origin = match req.headers().get(header::ORIGIN) {
        Some(value) => Some(value.to_str().map_err(|_| AppError::CorsNotAllowed {
            origin: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })?),
        None => None,
    };

    if !is_origin_allowed(origin, &allow_list) {
        let origin = origin.unwrap_or_default().to_string();
        tracing::warn!(
            origin = %origin,
            method = %req.method(),
            path = %req.uri().path(),
            "Rejected request from disallowed origin"
        );
        return Err(AppError::CorsNotAllowed { origin });
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(origins: &[&str]) -> AllowList {
        AllowList::new(origins.iter().map(|o| o.to_string()).collect())
    }

    #[test]
    fn test_missing_origin_is_allowed() {
        assert!(is_origin_allowed(None, &list(&[])));
        assert!(is_origin_allowed(None, &list(&["https://a.com"])));
    }

    #[test]
    fn test_empty_origin_is_treated_as_missing() {
        assert!(is_origin_allowed(Some(""), &list(&["https://a.com"])));
    }

    #[test]
    fn test_exact_match_is_allowed() {
        let allow = list(&["https://a.com", "https://b.com"]);
        assert!(is_origin_allowed(Some("https://b.com"), &allow));
    }

    #[test]
    fn test_no_partial_matching() {
        let allow = list(&["https://a.com"]);
        assert!(!is_origin_allowed(Some("https://sub.a.com"), &allow));
        assert!(!is_origin_allowed(Some("https://a.com/"), &allow));
        assert!(!is_origin_allowed(Some("http://a.com"), &allow));
        assert!(!is_origin_allowed(Some("HTTPS://A.COM"), &allow));
    }

    #[test]
    fn test_wildcard_entry_is_literal() {
        let allow = list(&["*"]);
        assert!(!is_origin_allowed(Some("https://a.com"), &allow));
    }
}
