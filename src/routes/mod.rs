/// Router Module Index
///
/// Routing is split by the session the routes need, and the layers that
/// enforce it are applied per module in `create_router`.

/// Health check and the auth screens with their form actions.
/// Reachable without a session.
pub mod public;

/// The `/api` data surface. Every route requires an authenticated session
/// and answers 401 otherwise.
pub mod authenticated;

/// UI navigation: every other GET path goes through the resolver and the
/// auth gate, which redirect instead of failing.
pub mod shell;
