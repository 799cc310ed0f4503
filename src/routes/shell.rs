use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Shell Router Module
///
/// `/` plus a fallback that sends every other path to `navigate`. The route
/// table itself lives in the resolver, built from the resource registry, so
/// adding a resource needs no change here.
pub fn shell_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::navigate))
        .fallback(handlers::navigate)
}
