use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use thiserror::Error;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Shell core: what exists, where it lives, who may see it.
pub mod registry;
pub mod resolver;
pub mod gate;

// Sessions and the data path.
pub mod accounts;
pub mod auth;
pub mod coordinator;
pub mod provider;

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;

// Routing segregation (Public, Authenticated API, Shell navigation).
pub mod routes;
use auth::AuthUser;
use routes::{authenticated, public, shell};

// --- Public Re-exports ---

pub use accounts::{AccountStore, AccountsState};
pub use config::AppConfig;
pub use coordinator::MutationCoordinator;
pub use gate::AuthGate;
pub use provider::{MemoryProvider, ProviderState, SimpleRestProvider};
pub use registry::{RegistryState, ResourceRegistry};
pub use resolver::RouteTable;

/// ApiDoc
///
/// OpenAPI document for every annotated handler, served at
/// `/api-docs/openapi.json` and browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::navigate, handlers::login, handlers::register, handlers::forgot_password,
        handlers::logout, handlers::get_me, handlers::list_resources, handlers::list_records,
        handlers::get_record, handlers::create_record, handlers::update_record,
        handlers::delete_record
    ),
    components(
        schemas(
            models::ViewModel, models::ViewKind, models::MenuItem, models::ListResult,
            models::MutationResponse, models::Notification, models::NotificationKind,
            models::LoginRequest, models::RegisterRequest, models::ForgotPasswordRequest,
            models::AuthResponse, models::RedirectResponse, models::UserIdentity,
        )
    ),
    tags(
        (name = "admin-shell", description = "Admin panel shell over REST resources")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a handler may need, cloned per request. All members are cheap
/// handles; nothing here is mutated after startup except through the
/// account store and the data provider.
#[derive(Clone)]
pub struct AppState {
    pub registry: RegistryState,
    pub routes: Arc<RouteTable>,
    pub gate: Arc<AuthGate>,
    pub provider: ProviderState,
    pub accounts: AccountsState,
    pub coordinator: MutationCoordinator,
    pub config: AppConfig,
}

impl AppState {
    /// Derives the route table, the gate and the per-resource locks from the
    /// registry, so all three agree on the set of resources.
    ///
    /// # Errors
    /// `RegistryError::UnregisteredRoute` if the derived route table names a
    /// resource the registry does not hold.
    pub fn new(
        config: AppConfig,
        registry: ResourceRegistry,
        provider: ProviderState,
        accounts: AccountsState,
    ) -> Result<Self, registry::RegistryError> {
        let routes = RouteTable::from_registry(&registry);
        routes.verify(&registry)?;
        let gate = AuthGate::new(registry.default_path());
        let coordinator = MutationCoordinator::new(&registry);

        Ok(Self {
            registry: Arc::new(registry),
            routes: Arc::new(routes),
            gate: Arc::new(gate),
            provider,
            accounts,
            coordinator,
            config,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AccountsState {
    fn from_ref(app_state: &AppState) -> AccountsState {
        app_state.accounts.clone()
    }
}

impl FromRef<AppState> for ProviderState {
    fn from_ref(app_state: &AppState) -> ProviderState {
        app_state.provider.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid resource registry: {0}")]
    Registry(#[from] registry::RegistryError),

    #[error("could not build the HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("could not seed the demo account: {0}")]
    DemoAccount(#[from] accounts::AccountError),
}

/// build_state
///
/// Assembles the application state from configuration: the built-in
/// registry, the configured data provider and the account store. In
/// `Env::Local` the demo account is registered so the login screen works
/// immediately.
///
/// # Errors
/// Registry validation, HTTP client construction or demo seeding failures.
pub async fn build_state(config: AppConfig) -> Result<AppState, StartupError> {
    let registry = ResourceRegistry::builtin()?;

    let provider: ProviderState = match config.data_provider {
        config::ProviderKind::Rest => {
            let provider = SimpleRestProvider::new(&config.api_url, config.http_timeout)?;
            tracing::info!(api_url = provider.base_url(), "using REST data provider");
            Arc::new(provider)
        }
        config::ProviderKind::Memory => {
            tracing::info!("using in-memory data provider");
            Arc::new(MemoryProvider::new())
        }
    };

    let accounts = Arc::new(AccountStore::new(
        config.jwt_secret.clone(),
        config.session_ttl_secs,
    ));

    if config.env == config::Env::Local {
        accounts
            .register(&config.demo_email, &config.demo_password)
            .await?;
        tracing::info!(email = %config.demo_email, "demo account seeded");
    }

    let state = AppState::new(config, registry, provider, accounts)?;
    Ok(state)
}

/// auth_middleware
///
/// Guards the data API. The `AuthUser` extractor rejects with 401 before the
/// handler runs when the request carries no valid session.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies the scoped and global layers and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .nest(
            "/api",
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Last: carries the fallback that hands unknown paths to the resolver.
        .merge(shell::shell_routes())
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with the `x-request-id` so every log line of
/// the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
