use crate::body::{self, JSON_LIMIT};
use crate::cors;
use crate::middleware::request_id_middleware;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use std::sync::Arc;
use tower_http::decompression::RequestDecompressionLayer;

use super::collaborators::Collaborators;
use super::dispatch::{dispatch, RouteTable};
use super::health;
use super::AppState;

/// Create application router
///
/// Layers run outermost first: request logging, origin admission, CORS
/// headers, gzip/deflate inflation, body/cookie decoding, then routing.
/// Methods other than GET/HEAD on `/` fall through to the same not-found
/// handling as every other unmatched path.
pub fn create_router(state: &AppState, collaborators: &Collaborators) -> axum::Router {
    let allow_list = state.config.cors.allow_list();
    let table = Arc::new(RouteTable::build(state, collaborators));

    tracing::info!(
        origins = ?allow_list.iter().collect::<Vec<_>>(),
        mounts = table.domains().count(),
        "Router configured"
    );

    axum::Router::new()
        .route("/", get(health::liveness).fallback(dispatch))
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(JSON_LIMIT))
        .layer(middleware::from_fn(body::decode_body))
        .layer(RequestDecompressionLayer::new())
        .layer(cors::cors_layer(allow_list.clone()))
        .layer(middleware::from_fn_with_state(
            allow_list,
            cors::origin_admission,
        ))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(table)
}
