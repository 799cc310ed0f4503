use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// The generic data API, nested under `/api`. Handlers take the `AuthUser`
/// extractor and the router is additionally wrapped in the auth middleware.
/// Resource names are checked against the registry in each handler; an
/// unregistered name is a 404, never a request to the upstream.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        // Identity of the session holder.
        .route("/me", get(handlers::get_me))
        // GET /api/resources
        // Navigation menu: one entry per registered resource with a list screen.
        .route("/resources", get(handlers::list_resources))
        // GET|POST /api/{resource}
        // List (filters, sort, pagination from the query string) and create.
        .route(
            "/{resource}",
            get(handlers::list_records).post(handlers::create_record),
        )
        // GET|PATCH|DELETE /api/{resource}/{id}
        // Delete is refused with 403 unless the resource allows it.
        .route(
            "/{resource}/{id}",
            get(handlers::get_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
}
