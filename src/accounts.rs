use std::collections::HashMap;
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{auth::Claims, models::UserIdentity};

pub const MIN_PASSWORD_LEN: usize = 8;

const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("invalid email address")]
    InvalidEmail,

    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,

    #[error("an account with this email already exists")]
    AlreadyExists,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Token(String),
}

struct Account {
    identity: UserIdentity,
    password_hash: String,
}

struct SessionRecord {
    account_id: Uuid,
    expires_at: DateTime<Utc>,
}

/// IssuedSession
///
/// What login and register hand back: the signed token and the session it names.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session_id: Uuid,
    pub user: UserIdentity,
}

/// AccountStore
///
/// In-process accounts and server-side sessions. Passwords are stored as
/// Argon2 PHC strings; tokens are HS256 JWTs whose `jti` must still be
/// present in `sessions` to be accepted.
pub struct AccountStore {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
    jwt_secret: String,
    session_ttl: Duration,
}

pub type AccountsState = Arc<AccountStore>;

impl AccountStore {
    pub fn new(jwt_secret: impl Into<String>, session_ttl_secs: u64) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::seconds(
                i64::try_from(session_ttl_secs).map_or(MAX_TTL_SECS, |secs| secs.min(MAX_TTL_SECS)),
            ),
        }
    }

    /// register
    ///
    /// Creates the account and opens its first session.
    ///
    /// # Errors
    /// `InvalidEmail`, `WeakPassword`, `AlreadyExists`, or a hashing/signing failure.
    pub async fn register(&self, email: &str, password: &str) -> Result<IssuedSession, AccountError> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::WeakPassword);
        }

        if self.accounts.read().await.contains_key(&email) {
            return Err(AccountError::AlreadyExists);
        }

        let password_hash = hash_password(password.to_string()).await?;
        let identity = UserIdentity {
            id: Uuid::new_v4(),
            email: email.clone(),
            created_at: Utc::now(),
        };

        {
            let mut accounts = self.accounts.write().await;
            // Checked again: another registration may have won while hashing.
            if accounts.contains_key(&email) {
                return Err(AccountError::AlreadyExists);
            }
            accounts.insert(
                email.clone(),
                Account {
                    identity: identity.clone(),
                    password_hash,
                },
            );
        }

        tracing::info!(account_id = %identity.id, "account registered");
        self.open_session(identity).await
    }

    /// login
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown email or a wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession, AccountError> {
        let email = normalize_email(email).map_err(|_| AccountError::InvalidCredentials)?;

        let (identity, password_hash) = {
            let accounts = self.accounts.read().await;
            let account = accounts.get(&email).ok_or(AccountError::InvalidCredentials)?;
            (account.identity.clone(), account.password_hash.clone())
        };

        if !verify_password(password.to_string(), password_hash).await? {
            tracing::warn!(account_id = %identity.id, "login rejected: wrong password");
            return Err(AccountError::InvalidCredentials);
        }

        self.open_session(identity).await
    }

    /// Ends the session. Returns false if it was already gone.
    pub async fn logout(&self, session_id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&session_id).is_some();
        if removed {
            tracing::info!(%session_id, "session closed");
        }
        removed
    }

    /// request_password_reset
    ///
    /// Returns whether an account exists. Callers must not reveal the answer
    /// to the visitor.
    pub async fn request_password_reset(&self, email: &str) -> bool {
        let Ok(email) = normalize_email(email) else {
            return false;
        };
        let known = self.accounts.read().await.contains_key(&email);
        if known {
            tracing::info!("password reset requested for a registered account");
        } else {
            tracing::info!("password reset requested for an unknown address");
        }
        known
    }

    /// authenticate
    ///
    /// Validates signature and expiry of `token`, then checks that its session
    /// is still open and its account still exists. Expired sessions found on
    /// the way are dropped.
    pub async fn authenticate(&self, token: &str) -> Option<(Claims, UserIdentity)> {
        let key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = decode::<Claims>(token, &key, &validation).ok()?.claims;

        let account_id = {
            let sessions = self.sessions.read().await;
            let record = sessions.get(&claims.jti)?;
            (record.expires_at > Utc::now()).then_some(record.account_id)
        };

        let Some(account_id) = account_id else {
            self.sessions.write().await.remove(&claims.jti);
            return None;
        };

        if account_id != claims.sub {
            return None;
        }

        let user = self
            .accounts
            .read()
            .await
            .values()
            .find(|account| account.identity.id == account_id)
            .map(|account| account.identity.clone())?;

        Some((claims, user))
    }

    pub async fn find(&self, email: &str) -> Option<UserIdentity> {
        let email = normalize_email(email).ok()?;
        self.accounts
            .read()
            .await
            .get(&email)
            .map(|account| account.identity.clone())
    }

    pub async fn active_sessions(&self) -> usize {
        let now = Utc::now();
        self.sessions
            .read()
            .await
            .values()
            .filter(|record| record.expires_at > now)
            .count()
    }

    /// Session records held, expired ones included until the next sweep.
    pub async fn stored_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn open_session(&self, user: UserIdentity) -> Result<IssuedSession, AccountError> {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(self.session_ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let claims = Claims {
            sub: user.id,
            jti: session_id,
            iat: timestamp(now),
            exp: timestamp(expires_at),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AccountError::Token(e.to_string()))?;

        {
            let mut sessions = self.sessions.write().await;
            let before = sessions.len();
            sessions.retain(|_, record| record.expires_at > now);
            let swept = before - sessions.len();
            if swept > 0 {
                tracing::debug!(swept, "expired sessions removed");
            }
            sessions.insert(
                session_id,
                SessionRecord {
                    account_id: user.id,
                    expires_at,
                },
            );
        }

        tracing::info!(account_id = %user.id, %session_id, "session opened");
        Ok(IssuedSession {
            token,
            session_id,
            user,
        })
    }
}

fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AccountError::InvalidEmail),
    }
}

fn timestamp(at: DateTime<Utc>) -> usize {
    usize::try_from(at.timestamp()).unwrap_or(0)
}

// Argon2 is CPU-bound; it runs on the blocking pool.
async fn hash_password(password: String) -> Result<String, AccountError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AccountError::Hashing(e.to_string()))
    })
    .await
    .map_err(|e| AccountError::Hashing(e.to_string()))?
}

async fn verify_password(password: String, password_hash: String) -> Result<bool, AccountError> {
    tokio::task::spawn_blocking(move || {
        let parsed =
            PasswordHash::new(&password_hash).map_err(|e| AccountError::Hashing(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AccountError::Hashing(e.to_string()))?
}
