use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{uri::PathAndQuery, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::sync::Arc;
use tower::ServiceExt;

use super::collaborators::{Collaborators, Domain};

/// Prefix a request was matched against, inserted before delegation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountedAt(pub &'static str);

struct Mount {
    domain: Domain,
    service: Router,
}

/// Fixed prefix → collaborator table.
pub struct RouteTable {
    mounts: Vec<Mount>,
}

impl RouteTable {
    /// Mount every domain, using registered collaborators where present
    pub fn build(state: &AppState, collaborators: &Collaborators) -> Self {
        let mounts = Domain::ALL
            .into_iter()
            .map(|domain| Mount {
                domain,
                service: collaborators.router_for(domain, state),
            })
            .collect();

        Self { mounts }
    }

    pub fn domains(&self) -> impl Iterator<Item = Domain> + '_ {
        self.mounts.iter().map(|m| m.domain)
    }

    /// Longest mounted prefix matching `path`, with the remaining path.
    pub fn resolve<'p>(&self, path: &'p str) -> Option<(Domain, &'p str)> {
        resolve_prefix(self.domains(), path)
    }

    fn service(&self, domain: Domain) -> Option<Router> {
        self.mounts
            .iter()
            .find(|m| m.domain == domain)
            .map(|m| m.service.clone())
    }
}

fn resolve_prefix<'p>(
    domains: impl Iterator<Item = Domain>,
    path: &'p str,
) -> Option<(Domain, &'p str)> {
    domains
        .filter_map(|domain| strip_mount(path, domain.prefix()).map(|rest| (domain, rest)))
        .max_by_key(|(domain, _)| domain.prefix().len())
}

/// Match `prefix` at a path-segment boundary, ignoring ASCII case.
///
/// Returns the path relative to the prefix, always starting with `/`.
pub fn strip_mount<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    let head = path.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }

    let rest = &path[prefix.len()..];
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Fallback handler - delegates to the collaborator owning the longest matching prefix
pub async fn dispatch(State(table): State<Arc<RouteTable>>, req: Request) -> Response {
    let path = req.uri().path().to_string();

    let Some((domain, rest)) = table.resolve(&path) else {
        return AppError::RouteNotFound {
            method: req.method().to_string(),
            path: path.clone(),
        }
        .into_response();
    };

    let Some(service) = table.service(domain) else {
        return AppError::Internal(format!("no mount for {}", domain)).into_response();
    };

    let req = match rebase(req, rest, domain) {
        Ok(req) => req,
        Err(e) => return e.into_response(),
    };

    match service.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

/// Rewrite the request URI to be relative to the mount prefix.
fn rebase(mut req: Request, rest: &str, domain: Domain) -> AppResult<Request> {
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{}?{}", rest, query),
        None => rest.to_string(),
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| AppError::Internal(format!("invalid rebased path: {}", e)))?,
    );
    *req.uri_mut() = Uri::from_parts(parts)
        .map_err(|e| AppError::Internal(format!("invalid rebased uri: {}", e)))?;
    req.extensions_mut().insert(MountedAt(domain.prefix()));

    Ok(req)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(path: &str) -> Option<(Domain, &str)> {
        resolve_prefix(Domain::ALL.into_iter(), path)
    }

    #[test]
    fn test_exact_prefix_maps_to_root() {
        assert_eq!(resolve("/api/cart"), Some((Domain::Cart, "/")));
    }

    #[test]
    fn test_nested_path_is_stripped() {
        assert_eq!(
            resolve("/api/orders/42/cancel"),
            Some((Domain::Orders, "/42/cancel"))
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(
            resolve("/api/products/admin/7"),
            Some((Domain::ProductAdmin, "/7"))
        );
        assert_eq!(
            resolve("/api/products/administer"),
            Some((Domain::Products, "/administer"))
        );
        assert_eq!(resolve("/api/products/7"), Some((Domain::Products, "/7")));
    }

    #[test]
    fn test_segment_boundary() {
        assert_eq!(resolve("/api/cartography"), None);
        assert_eq!(resolve("/api/user"), Some((Domain::User, "/")));
        assert_eq!(resolve("/api/users"), None);
    }

    #[test]
    fn test_case_insensitive_prefix() {
        assert_eq!(resolve("/API/Cart/items"), Some((Domain::Cart, "/items")));
    }

    #[test]
    fn test_trailing_slash() {
        assert_eq!(resolve("/api/coupons/"), Some((Domain::Coupons, "/")));
    }

    #[test]
    fn test_unmatched() {
        assert_eq!(resolve("/"), None);
        assert_eq!(resolve("/api"), None);
        assert_eq!(resolve("/health"), None);
    }
}
