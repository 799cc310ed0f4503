use std::sync::Arc;

use admin_shell::{
    AccountStore, AppState, MemoryProvider, ResourceRegistry,
    accounts::AccountError,
    auth::{AuthUser, DEV_BYPASS_HEADER, Session},
    config::{AppConfig, Env},
    error::AppError,
};
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, Uri, header, request::Parts},
};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";
const TEST_EMAIL: &str = "admin@example.com";
const TEST_PASSWORD: &str = "correct horse";

fn create_app_state(env: Env, accounts: Arc<AccountStore>) -> AppState {
    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    AppState::new(
        config,
        ResourceRegistry::builtin().unwrap(),
        Arc::new(MemoryProvider::new()),
        accounts,
    )
    .unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
}

async fn session_for(parts: &mut Parts, state: &AppState) -> Session {
    match Session::from_request_parts(parts, state).await {
        Ok(session) => session,
        Err(never) => match never {},
    }
}

// --- Account store ---

#[tokio::test]
async fn test_register_then_login() {
    let store = AccountStore::new(TEST_JWT_SECRET, 3600);

    let registered = store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    assert_eq!(registered.user.email, TEST_EMAIL);

    // Emails are case-insensitive.
    let logged_in = store
        .login("Admin@Example.com", TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(logged_in.user.id, registered.user.id);
    assert_ne!(logged_in.session_id, registered.session_id);
    assert_eq!(store.active_sessions().await, 2);
}

#[tokio::test]
async fn test_register_rejects_bad_input() {
    let store = AccountStore::new(TEST_JWT_SECRET, 3600);

    assert_eq!(
        store.register("not-an-email", TEST_PASSWORD).await.unwrap_err(),
        AccountError::InvalidEmail
    );
    assert_eq!(
        store.register(TEST_EMAIL, "short").await.unwrap_err(),
        AccountError::WeakPassword
    );

    store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    assert_eq!(
        store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap_err(),
        AccountError::AlreadyExists
    );
}

#[tokio::test]
async fn test_login_rejects_wrong_credentials() {
    let store = AccountStore::new(TEST_JWT_SECRET, 3600);
    store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    assert_eq!(
        store.login(TEST_EMAIL, "wrong password").await.unwrap_err(),
        AccountError::InvalidCredentials
    );
    assert_eq!(
        store.login("nobody@example.com", TEST_PASSWORD).await.unwrap_err(),
        AccountError::InvalidCredentials
    );
    assert_eq!(
        store.login("garbage", TEST_PASSWORD).await.unwrap_err(),
        AccountError::InvalidCredentials
    );
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let store = AccountStore::new(TEST_JWT_SECRET, 3600);
    let issued = store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    assert!(store.authenticate(&issued.token).await.is_some());
    assert!(store.logout(issued.session_id).await);
    assert!(store.authenticate(&issued.token).await.is_none());
    assert!(!store.logout(issued.session_id).await);
}

#[tokio::test]
async fn test_expired_session_is_rejected() {
    let store = AccountStore::new(TEST_JWT_SECRET, 0);
    let issued = store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    assert!(store.authenticate(&issued.token).await.is_none());
    assert_eq!(store.active_sessions().await, 0);
}

#[tokio::test]
async fn test_expired_sessions_are_swept_on_login() {
    let store = AccountStore::new(TEST_JWT_SECRET, 0);
    store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    for _ in 0..5 {
        store.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    }

    // Only the session opened last is still held; its tokens are never presented.
    assert_eq!(store.stored_sessions().await, 1);
}

#[tokio::test]
async fn test_live_sessions_survive_the_sweep() {
    let store = AccountStore::new(TEST_JWT_SECRET, 3600);
    let first = store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    for _ in 0..3 {
        store.login(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    }

    assert_eq!(store.stored_sessions().await, 4);
    assert!(store.authenticate(&first.token).await.is_some());
}

#[tokio::test]
async fn test_token_from_other_secret_is_rejected() {
    let issuer = AccountStore::new("some-other-secret", 3600);
    let issued = issuer.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    let store = AccountStore::new(TEST_JWT_SECRET, 3600);
    store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    assert!(store.authenticate(&issued.token).await.is_none());
    assert!(store.authenticate("not.a.jwt").await.is_none());
}

#[tokio::test]
async fn test_password_reset_does_not_fail_for_unknown_address() {
    let store = AccountStore::new(TEST_JWT_SECRET, 3600);
    store.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();

    assert!(store.request_password_reset(TEST_EMAIL).await);
    assert!(!store.request_password_reset("nobody@example.com").await);
    assert!(!store.request_password_reset("garbage").await);
}

// --- Extractors ---

#[tokio::test]
async fn test_session_resolved_from_valid_jwt() {
    let accounts = Arc::new(AccountStore::new(TEST_JWT_SECRET, 3600));
    let issued = accounts.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    let app_state = create_app_state(Env::Production, accounts);

    let mut parts = get_request_parts(Method::GET, "/blog-posts".parse().unwrap());
    with_bearer(&mut parts, &issued.token);

    let session = session_for(&mut parts, &app_state).await;
    assert!(session.is_authenticated);
    assert_eq!(session.identity.as_deref(), Some(issued.token.as_str()));
    assert_eq!(session.session_id, Some(issued.session_id));

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(auth_user.user.email, TEST_EMAIL);
}

#[tokio::test]
async fn test_missing_header_is_anonymous_not_an_error() {
    let accounts = Arc::new(AccountStore::new(TEST_JWT_SECRET, 3600));
    let app_state = create_app_state(Env::Production, accounts);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let session = session_for(&mut parts, &app_state).await;
    assert!(!session.is_authenticated);
    assert!(session.user.is_none());

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(AppError::Unauthorized)));
}

#[tokio::test]
async fn test_garbage_bearer_is_anonymous() {
    let accounts = Arc::new(AccountStore::new(TEST_JWT_SECRET, 3600));
    let app_state = create_app_state(Env::Production, accounts);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, "garbage");

    assert!(!session_for(&mut parts, &app_state).await.is_authenticated);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let accounts = Arc::new(AccountStore::new(TEST_JWT_SECRET, 3600));
    let issued = accounts.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    let app_state = create_app_state(Env::Local, accounts);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_BYPASS_HEADER),
        header::HeaderValue::from_static(TEST_EMAIL),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state)
        .await
        .unwrap();
    assert_eq!(auth_user.user.id, issued.user.id);
    assert!(auth_user.session_id.is_none());
}

#[tokio::test]
async fn test_local_bypass_ignores_unknown_email() {
    let accounts = Arc::new(AccountStore::new(TEST_JWT_SECRET, 3600));
    let app_state = create_app_state(Env::Local, accounts);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_BYPASS_HEADER),
        header::HeaderValue::from_static("ghost@example.com"),
    );

    assert!(!session_for(&mut parts, &app_state).await.is_authenticated);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let accounts = Arc::new(AccountStore::new(TEST_JWT_SECRET, 3600));
    accounts.register(TEST_EMAIL, TEST_PASSWORD).await.unwrap();
    let app_state = create_app_state(Env::Production, accounts);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    // Provide ONLY the local bypass header
    parts.headers.insert(
        header::HeaderName::from_static(DEV_BYPASS_HEADER),
        header::HeaderValue::from_static(TEST_EMAIL),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;
    assert!(matches!(auth_user, Err(AppError::Unauthorized)));
}
