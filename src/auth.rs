use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    accounts::AccountsState,
    config::{AppConfig, Env},
    error::AppError,
    models::UserIdentity,
};

/// Development-only header naming the account to act as.
pub const DEV_BYPASS_HEADER: &str = "x-user-email";

/// Claims
///
/// Payload of a session token. `jti` names the server-side session; a token
/// whose session was revoked or expired is rejected even if the signature
/// still verifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: Uuid,
    /// Session id.
    pub jti: Uuid,
    pub exp: usize,
    pub iat: usize,
}

/// Session
///
/// The visitor's authentication state, resolved for every request. An
/// unauthenticated session is a normal value, not a failure.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub is_authenticated: bool,
    /// Opaque bearer token the session was resolved from.
    pub identity: Option<String>,
    pub session_id: Option<Uuid>,
    pub user: Option<UserIdentity>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(token: String, session_id: Option<Uuid>, user: UserIdentity) -> Self {
        Self {
            is_authenticated: true,
            identity: Some(token),
            session_id,
            user: Some(user),
        }
    }
}

/// Session Extractor
///
/// Never rejects. Resolution order:
/// 1. `Env::Local` only: the `x-user-email` header, if it names a registered account.
/// 2. `Authorization: Bearer <jwt>`, validated and checked against the session store.
/// 3. Otherwise anonymous.
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    AccountsState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let accounts = AccountsState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            if let Some(email) = parts
                .headers
                .get(DEV_BYPASS_HEADER)
                .and_then(|value| value.to_str().ok())
            {
                if let Some(user) = accounts.find(email).await {
                    tracing::debug!(email = %user.email, "session resolved through dev bypass");
                    return Ok(Session::authenticated(format!("dev:{}", user.email), None, user));
                }
            }
        }

        let Some(token) = bearer_token(parts) else {
            return Ok(Session::anonymous());
        };

        match accounts.authenticate(token).await {
            Some((claims, user)) => Ok(Session::authenticated(
                token.to_string(),
                Some(claims.jti),
                user,
            )),
            None => {
                tracing::debug!("bearer token rejected, treating request as anonymous");
                Ok(Session::anonymous())
            }
        }
    }
}

/// AuthUser
///
/// An authenticated session. Used by the data API, where a missing session
/// is answered with 401 rather than a redirect.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub session_id: Option<Uuid>,
    pub user: UserIdentity,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AccountsState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = match Session::from_request_parts(parts, state).await {
            Ok(session) => session,
            Err(never) => match never {},
        };

        match (session.is_authenticated, session.user) {
            (true, Some(user)) => Ok(AuthUser {
                session_id: session.session_id,
                user,
            }),
            _ => Err(AppError::Unauthorized),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
