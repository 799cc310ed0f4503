use std::env;
use std::time::Duration;

use thiserror::Error;

/// Base URL of the fake REST backend the generated panel talks to.
pub const DEFAULT_API_URL: &str = "https://api.fake-rest.refine.dev";

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the shell's entire configuration state. Loaded once at startup and
/// immutable afterwards; handlers and extractors pull it out of `AppState`
/// through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the dev bypass header and demo seeding.
    pub env: Env,
    // Origin every resource operation is sent to.
    pub api_url: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // HS256 secret for signing and validating session tokens.
    pub jwt_secret: String,
    // Lifetime of an issued session token, in seconds.
    pub session_ttl_secs: u64,
    // Suffix appended to every document title ("Blog Posts | Refine").
    pub app_title: String,
    // Which data provider backs the facade.
    pub data_provider: ProviderKind,
    // Client-side timeout for upstream requests.
    pub http_timeout: Duration,
    // Account seeded in `Env::Local` so the login screen is usable out of the box.
    pub demo_email: String,
    pub demo_password: String,
}

/// Env
///
/// Runtime context. `Local` enables developer conveniences (demo account,
/// `x-user-email` bypass); `Production` requires every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// ProviderKind
///
/// `Rest` forwards to `api_url`; `Memory` keeps records in-process.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ProviderKind {
    Rest,
    Memory,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Default for AppConfig {
    /// Safe, non-panicking values for tests and scaffolding.
    fn default() -> Self {
        Self {
            env: Env::Local,
            api_url: DEFAULT_API_URL.to_string(),
            bind_addr: "0.0.0.0:3000".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_ttl_secs: 86_400,
            app_title: "Refine".to_string(),
            data_provider: ProviderKind::Rest,
            http_timeout: Duration::from_secs(30),
            demo_email: "demo@refine.dev".to_string(),
            demo_password: "demodemo".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables. Missing optional
    /// values fall back to `AppConfig::default()`.
    ///
    /// # Errors
    /// `ConfigError::Missing` when `JWT_SECRET` is absent in production,
    /// `ConfigError::Invalid` when a numeric or enum variable cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            Ok("local") | Err(_) => Env::Local,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "APP_ENV",
                    value: other.to_string(),
                });
            }
        };

        let jwt_secret = match (env::var("JWT_SECRET"), &env) {
            (Ok(secret), _) if !secret.is_empty() => secret,
            (_, Env::Production) => return Err(ConfigError::Missing("JWT_SECRET")),
            (_, Env::Local) => defaults.jwt_secret.clone(),
        };

        let data_provider = match env::var("DATA_PROVIDER").as_deref() {
            Ok("memory") => ProviderKind::Memory,
            Ok("rest") | Err(_) => ProviderKind::Rest,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "DATA_PROVIDER",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            env,
            api_url: env::var("API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_url),
            bind_addr: env::var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            jwt_secret,
            session_ttl_secs: parse_number("SESSION_TTL_SECS")?
                .unwrap_or(defaults.session_ttl_secs),
            app_title: env::var("APP_TITLE").unwrap_or(defaults.app_title),
            data_provider,
            http_timeout: parse_number("HTTP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            demo_email: env::var("DEMO_EMAIL").unwrap_or(defaults.demo_email),
            demo_password: env::var("DEMO_PASSWORD").unwrap_or(defaults.demo_password),
        })
    }
}

fn parse_number(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(None),
    }
}
