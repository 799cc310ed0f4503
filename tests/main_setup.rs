use std::time::Duration;
use std::{env, panic};

use admin_shell::{
    AppConfig, build_state,
    config::{ConfigError, DEFAULT_API_URL, Env, ProviderKind},
};
use serial_test::serial;

const CONFIG_VARS: [&str; 10] = [
    "APP_ENV",
    "JWT_SECRET",
    "DATA_PROVIDER",
    "API_URL",
    "BIND_ADDR",
    "SESSION_TTL_SECS",
    "APP_TITLE",
    "HTTP_TIMEOUT_SECS",
    "DEMO_EMAIL",
    "DEMO_PASSWORD",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with exactly `vars` set (every other config variable cleared)
/// and restores the previous environment afterward.
fn run_with_env<T, R>(vars: &[(&'static str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    // Save current environment variables
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    // Run the test
    let result = panic::catch_unwind(test);

    // Restore original environment variables
    for (key, original_value) in originals {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    // Re-panic if the test failed
    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_app_config_production_fail_fast() {
    let result = run_with_env(&[("APP_ENV", "production")], AppConfig::load);
    assert_eq!(result.unwrap_err(), ConfigError::Missing("JWT_SECRET"));

    let result = run_with_env(
        &[("APP_ENV", "production"), ("JWT_SECRET", "")],
        AppConfig::load,
    );
    assert_eq!(result.unwrap_err(), ConfigError::Missing("JWT_SECRET"));
}

#[test]
#[serial]
fn test_app_config_production_with_secret() {
    let config = run_with_env(
        &[("APP_ENV", "production"), ("JWT_SECRET", "prod-secret")],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    let config = run_with_env(&[], AppConfig::load).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.api_url, DEFAULT_API_URL);
    assert_eq!(config.data_provider, ProviderKind::Rest);
    assert_eq!(config.app_title, "Refine");
    assert_eq!(config.session_ttl_secs, 86_400);
    assert_eq!(config.http_timeout, Duration::from_secs(30));
    // Check local JWT secret fallback
    assert_eq!(config.jwt_secret, "super-secure-test-secret-value-local");
}

#[test]
#[serial]
fn test_app_config_overrides() {
    let config = run_with_env(
        &[
            ("DATA_PROVIDER", "memory"),
            ("API_URL", "http://localhost:4000/"),
            ("SESSION_TTL_SECS", "60"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("APP_TITLE", "Backoffice"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.data_provider, ProviderKind::Memory);
    assert_eq!(config.api_url, "http://localhost:4000");
    assert_eq!(config.session_ttl_secs, 60);
    assert_eq!(config.http_timeout, Duration::from_secs(5));
    assert_eq!(config.app_title, "Backoffice");
}

#[test]
#[serial]
fn test_app_config_invalid_values() {
    let result = run_with_env(&[("APP_ENV", "staging")], AppConfig::load);
    assert_eq!(
        result.unwrap_err(),
        ConfigError::Invalid {
            name: "APP_ENV",
            value: "staging".to_string()
        }
    );

    let result = run_with_env(&[("DATA_PROVIDER", "graphql")], AppConfig::load);
    assert!(matches!(
        result,
        Err(ConfigError::Invalid {
            name: "DATA_PROVIDER",
            ..
        })
    ));

    let result = run_with_env(&[("SESSION_TTL_SECS", "one day")], AppConfig::load);
    assert!(matches!(
        result,
        Err(ConfigError::Invalid {
            name: "SESSION_TTL_SECS",
            ..
        })
    ));
}

#[tokio::test]
async fn test_build_state_seeds_demo_account_locally() {
    let config = AppConfig {
        data_provider: ProviderKind::Memory,
        ..AppConfig::default()
    };
    let demo_email = config.demo_email.clone();

    let state = build_state(config).await.unwrap();

    assert!(state.accounts.find(&demo_email).await.is_some());
    assert_eq!(state.gate.default_path(), "/blog-posts");
    assert_eq!(state.registry.names().count(), 2);
}

#[tokio::test]
async fn test_build_state_skips_demo_account_in_production() {
    let config = AppConfig {
        env: Env::Production,
        data_provider: ProviderKind::Memory,
        ..AppConfig::default()
    };
    let demo_email = config.demo_email.clone();

    let state = build_state(config).await.unwrap();

    assert!(state.accounts.find(&demo_email).await.is_none());
}
