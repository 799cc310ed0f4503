use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. The GET side of each auth screen
/// still goes through `navigate`, so a visitor who is already logged in is
/// sent on to the default resource instead of seeing the form.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET|POST /login?to=...
        // Screen, then credential check. `to` is the page to return to.
        .route("/login", get(handlers::navigate).post(handlers::login))
        // GET|POST /register
        .route("/register", get(handlers::navigate).post(handlers::register))
        // GET|POST /forgot-password
        // The POST answers identically for known and unknown addresses.
        .route(
            "/forgot-password",
            get(handlers::navigate).post(handlers::forgot_password),
        )
        // POST /logout
        // Closes the caller's session, if any; always succeeds.
        .route("/logout", post(handlers::logout))
}
