use std::future::Future;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    AppState,
    auth::{AuthUser, Session},
    error::AppError,
    gate::{GateDecision, LOGIN_PATH, sanitize_return_to},
    models::{
        AuthResponse, ForgotPasswordRequest, ListParams, ListResult, LoginRequest, MenuItem,
        MutationResponse, Notification, RedirectResponse, RegisterRequest, UserIdentity, ViewKind,
        ViewModel,
    },
    provider::ProviderResult,
    registry::ResourceDescriptor,
    resolver::RouteMatch,
};

/// Query of the login and register forms: where to go back to afterwards.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReturnTo {
    pub to: Option<String>,
}

// --- Navigation ---

/// navigate
///
/// Entry point for every UI path. Resolves the path, asks the auth gate,
/// then either redirects (303) or answers with the view model, fetching the
/// records the view displays.
#[utoipa::path(
    get,
    path = "/{path}",
    params(("path" = String, Path, description = "Any UI path")),
    responses(
        (status = 200, description = "View to render", body = ViewModel),
        (status = 303, description = "Redirect (login, default resource)"),
        (status = 404, description = "Not-found view", body = ViewModel),
        (status = 502, description = "Data request failed")
    )
)]
pub async fn navigate(
    State(state): State<AppState>,
    session: Session,
    method: Method,
    uri: Uri,
) -> Result<Response, AppError> {
    if method != Method::GET && method != Method::HEAD {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }

    let route = state.routes.resolve(uri.path());
    let decision = state.gate.decide(&route, &session);
    if let Some(location) = decision.location() {
        tracing::debug!(path = %route.path, %location, "navigation redirected");
        return Ok(Redirect::to(&location).into_response());
    }
    debug_assert_eq!(decision, GateDecision::Render);

    if route.view == ViewKind::Index {
        return Ok(Redirect::to(state.gate.default_path()).into_response());
    }

    let descriptor = route
        .resource
        .as_deref()
        .and_then(|name| state.registry.get(name));

    let mut view = ViewModel {
        view: route.view,
        resource: route.resource.clone(),
        id: route.id.clone(),
        title: document_title(&route, descriptor, &state.config.app_title),
        can_delete: descriptor.is_some_and(|d| d.can_delete),
        menu: if session.is_authenticated {
            state.registry.menu()
        } else {
            Vec::new()
        },
        records: None,
        record: None,
    };

    match (route.view, descriptor, route.id.as_deref()) {
        (ViewKind::List, Some(resource), _) => {
            let params = ListParams::from_query(&query_pairs(&uri));
            let _guard = state.coordinator.read(&resource.name).await;
            view.records = Some(state.provider.list(&resource.name, &params).await?);
        }
        (ViewKind::Edit | ViewKind::Show, Some(resource), Some(id)) => {
            view.record = Some(state.provider.get(&resource.name, id).await?);
        }
        (ViewKind::NotFound, _, _) => {
            tracing::debug!(path = %route.path, "no route matched");
            return Ok((StatusCode::NOT_FOUND, Json(view)).into_response());
        }
        _ => {}
    }

    Ok(Json(view).into_response())
}

/// Browser tab title for a resolved route, e.g. `#42 Edit Blog Posts | Refine`.
pub fn document_title(
    route: &RouteMatch,
    descriptor: Option<&ResourceDescriptor>,
    app_title: &str,
) -> String {
    let label = descriptor.map_or("", |d| d.label.as_str());
    let id = route.id.as_deref().unwrap_or_default();

    let page = match route.view {
        ViewKind::Index => return app_title.to_string(),
        ViewKind::List => label.to_string(),
        ViewKind::Create => format!("Create {label}"),
        ViewKind::Edit => format!("#{id} Edit {label}"),
        ViewKind::Show => format!("#{id} Show {label}"),
        ViewKind::Login => "Login".to_string(),
        ViewKind::Register => "Register".to_string(),
        ViewKind::ForgotPassword => "Forgot Password".to_string(),
        ViewKind::NotFound => "Page Not Found".to_string(),
    };
    format!("{page} | {app_title}")
}

// --- Auth actions ---

/// login
///
/// Opens a session. `redirect_to` is the page that bounced the visitor to the
/// login screen, or the default resource.
#[utoipa::path(
    post,
    path = "/login",
    params(ReturnTo),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Query(ReturnTo { to }): Query<ReturnTo>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let issued = state.accounts.login(&payload.email, &payload.password).await?;

    Ok(Json(AuthResponse {
        token: issued.token,
        redirect_to: sanitize_return_to(to.as_deref())
            .unwrap_or_else(|| state.gate.default_path().to_string()),
        notification: Notification::success(format!("Welcome back, {}", issued.user.email)),
    }))
}

/// register
///
/// Creates the account and logs it in.
#[utoipa::path(
    post,
    path = "/register",
    params(ReturnTo),
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Invalid email or password too short")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Query(ReturnTo { to }): Query<ReturnTo>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let issued = state
        .accounts
        .register(&payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token: issued.token,
            redirect_to: sanitize_return_to(to.as_deref())
                .unwrap_or_else(|| state.gate.default_path().to_string()),
            notification: Notification::success("Account created"),
        }),
    ))
}

/// forgot_password
///
/// Always answers the same way, whether or not the address is registered.
#[utoipa::path(
    post,
    path = "/forgot-password",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset requested", body = RedirectResponse))
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Json<RedirectResponse> {
    state.accounts.request_password_reset(&payload.email).await;

    Json(RedirectResponse {
        redirect_to: LOGIN_PATH.to_string(),
        notification: Notification::success(
            "If an account exists for this email, a reset link has been sent",
        ),
    })
}

/// logout
///
/// Closes the caller's session, if any. The token stops working immediately.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Logged out", body = RedirectResponse))
)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Json<RedirectResponse> {
    if let Some(session_id) = session.session_id {
        state.accounts.logout(session_id).await;
    }

    Json(RedirectResponse {
        redirect_to: LOGIN_PATH.to_string(),
        notification: Notification::success("Logged out"),
    })
}

// --- Data API ---

#[utoipa::path(
    get,
    path = "/api/me",
    responses((status = 200, description = "Current identity", body = UserIdentity))
)]
pub async fn get_me(AuthUser { user, .. }: AuthUser) -> Json<UserIdentity> {
    Json(user)
}

#[utoipa::path(
    get,
    path = "/api/resources",
    responses((status = 200, description = "Navigation menu", body = [MenuItem]))
)]
pub async fn list_resources(_auth: AuthUser, State(state): State<AppState>) -> Json<Vec<MenuItem>> {
    Json(state.registry.menu())
}

#[utoipa::path(
    get,
    path = "/api/{resource}",
    params(("resource" = String, Path, description = "Registered resource name")),
    responses(
        (status = 200, description = "One page of records", body = ListResult),
        (status = 404, description = "Unknown resource"),
        (status = 502, description = "Upstream request failed")
    )
)]
pub async fn list_records(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path(resource): Path<String>,
    uri: Uri,
) -> Result<Json<ListResult>, AppError> {
    let descriptor = registered(&state, &resource)?;
    let params = ListParams::from_query(&query_pairs(&uri));

    let _guard = state.coordinator.read(&descriptor.name).await;
    let result = state.provider.list(&descriptor.name, &params).await?;
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Registered resource name"),
        ("id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "The record"),
        (status = 404, description = "Unknown resource"),
        (status = 502, description = "Upstream request failed")
    )
)]
pub async fn get_record(
    _auth: AuthUser,
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let descriptor = registered(&state, &resource)?;
    Ok(Json(state.provider.get(&descriptor.name, &id).await?))
}

#[utoipa::path(
    post,
    path = "/api/{resource}",
    params(("resource" = String, Path, description = "Registered resource name")),
    responses(
        (status = 201, description = "Created", body = MutationResponse),
        (status = 404, description = "Unknown resource"),
        (status = 502, description = "Upstream request failed")
    )
)]
pub async fn create_record(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path(resource): Path<String>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<MutationResponse>), AppError> {
    let descriptor = registered(&state, &resource)?;
    let name = descriptor.name.as_str();

    let response = mutate(&state, name, "Successfully created", || {
        state.provider.create(name, payload)
    })
    .await?;

    tracing::info!(resource = name, actor = %user.id, "record created");
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    patch,
    path = "/api/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Registered resource name"),
        ("id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Updated", body = MutationResponse),
        (status = 404, description = "Unknown resource"),
        (status = 502, description = "Upstream request failed")
    )
)]
pub async fn update_record(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<MutationResponse>, AppError> {
    let descriptor = registered(&state, &resource)?;
    let name = descriptor.name.as_str();

    let response = mutate(&state, name, "Successfully edited", || {
        state.provider.update(name, &id, payload)
    })
    .await?;

    tracing::info!(resource = name, %id, actor = %user.id, "record updated");
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/{resource}/{id}",
    params(
        ("resource" = String, Path, description = "Registered resource name"),
        ("id" = String, Path, description = "Record id")
    ),
    responses(
        (status = 200, description = "Deleted", body = MutationResponse),
        (status = 403, description = "Resource does not allow deletion"),
        (status = 404, description = "Unknown resource"),
        (status = 502, description = "Upstream request failed")
    )
)]
pub async fn delete_record(
    AuthUser { user, .. }: AuthUser,
    State(state): State<AppState>,
    Path((resource, id)): Path<(String, String)>,
) -> Result<Json<MutationResponse>, AppError> {
    let descriptor = registered(&state, &resource)?;
    if !descriptor.can_delete {
        return Err(AppError::DeleteNotAllowed(descriptor.name.clone()));
    }
    let name = descriptor.name.as_str();

    let response = mutate(&state, name, "Successfully deleted", || {
        state.provider.delete(name, &id)
    })
    .await?;

    tracing::info!(resource = name, %id, actor = %user.id, "record deleted");
    Ok(Json(response))
}

/// Query string as ordered pairs; a malformed query counts as empty.
fn query_pairs(uri: &Uri) -> Vec<(String, String)> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(query)| query)
        .unwrap_or_default()
}

fn registered<'a>(state: &'a AppState, resource: &str) -> Result<&'a ResourceDescriptor, AppError> {
    state
        .registry
        .get(resource)
        .ok_or_else(|| AppError::UnknownResource(resource.to_string()))
}

/// Runs `operation` and the first-page refresh under the resource's write
/// lock. A failed operation aborts before anything is refreshed.
async fn mutate<F, Fut>(
    state: &AppState,
    resource: &str,
    message: &str,
    operation: F,
) -> Result<MutationResponse, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ProviderResult<Value>>,
{
    let _guard = state
        .coordinator
        .write(resource)
        .await
        .ok_or_else(|| AppError::UnknownResource(resource.to_string()))?;

    let data = operation().await?;

    // The mutation already happened; a failed refresh only costs the page.
    let list = match state.provider.list(resource, &ListParams::default()).await {
        Ok(list) => Some(list),
        Err(error) => {
            tracing::warn!(resource, %error, "list refresh after mutation failed");
            None
        }
    };

    Ok(MutationResponse {
        data,
        notification: Notification::success(message),
        list,
    })
}
