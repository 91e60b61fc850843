use std::{env, panic};

use serial_test::serial;
use talent_portal::{AppConfig, config::Env};

// --- Setup/Teardown Utilities ---

/// Utility to run a test function and restore environment variables afterward
fn run_with_env<T, R>(test: T, cleanup_vars: Vec<&'static str>) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    // Save current environment variables
    let originals: Vec<(String, Option<String>)> = cleanup_vars
        .iter()
        .map(|&var| (var.to_string(), env::var(var).ok()))
        .collect();

    // Run the test
    let result = panic::catch_unwind(test);

    // Restore original environment variables
    for (key, original_value) in originals.into_iter().rev() {
        unsafe {
            if let Some(val) = original_value {
                env::set_var(&key, val);
            } else {
                env::remove_var(&key);
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
    // We expect this to panic because the production secrets are not set
    let result = panic::catch_unwind(|| {
        unsafe {
            env::set_var("APP_ENV", "production");
            env::remove_var("PORTAL_JWT_SECRET");
            env::remove_var("PORTAL_BACKEND_URL");
            env::remove_var("PORTAL_ANON_KEY");
        }
        AppConfig::load()
    });

    // Cleanup
    let cleanup_vars = vec![
        "APP_ENV",
        "PORTAL_JWT_SECRET",
        "PORTAL_BACKEND_URL",
        "PORTAL_ANON_KEY",
    ];

    unsafe {
        for var in cleanup_vars {
            env::remove_var(var);
        }
    }

    // Assert that the config loading failed (panicked)
    assert!(
        result.is_err(),
        "Production config loading should panic on missing secrets"
    );
}

#[test]
#[serial]
fn test_app_config_local_env_defaults() {
    // Local mode should not panic, and should use hardcoded defaults
    let config = run_with_env(
        || {
            unsafe {
                env::set_var("APP_ENV", "local");
                // Clear other variables to test fallbacks
                env::remove_var("PORTAL_JWT_SECRET");
                env::remove_var("PORTAL_BACKEND_URL");
                env::remove_var("PORTAL_ANON_KEY");
                env::remove_var("PORTAL_SESSION_FILE");
            }
            AppConfig::load()
        },
        vec![
            "APP_ENV",
            "PORTAL_JWT_SECRET",
            "PORTAL_BACKEND_URL",
            "PORTAL_ANON_KEY",
            "PORTAL_SESSION_FILE",
        ],
    );

    assert_eq!(config.env, Env::Local);
    // Check the local backend stack default
    assert_eq!(config.backend_url, "http://localhost:54321");
    assert_eq!(config.anon_key, "local-anon-key");
    // Check local JWT secret fallback
    assert_eq!(config.jwt_secret, "super-secure-test-secret-value-local");
}

#[test]
#[serial]
fn test_app_config_honors_explicit_overrides() {
    let config = run_with_env(
        || {
            unsafe {
                env::set_var("APP_ENV", "local");
                env::set_var("PORTAL_BACKEND_URL", "http://127.0.0.1:9999");
                env::set_var("PORTAL_ANON_KEY", "override-key");
                env::set_var("PORTAL_JWT_SECRET", "override-secret");
                env::set_var("PORTAL_SESSION_FILE", "/tmp/override-session.json");
            }
            AppConfig::load()
        },
        vec![
            "APP_ENV",
            "PORTAL_BACKEND_URL",
            "PORTAL_ANON_KEY",
            "PORTAL_JWT_SECRET",
            "PORTAL_SESSION_FILE",
        ],
    );

    assert_eq!(config.backend_url, "http://127.0.0.1:9999");
    assert_eq!(config.anon_key, "override-key");
    assert_eq!(config.jwt_secret, "override-secret");
    assert_eq!(
        config.session_file,
        std::path::PathBuf::from("/tmp/override-session.json")
    );
}

#[test]
#[serial]
fn test_app_config_production_loads_when_fully_specified() {
    let config = run_with_env(
        || {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("PORTAL_BACKEND_URL", "https://portal.example.com");
                env::set_var("PORTAL_ANON_KEY", "publishable-key");
                env::set_var("PORTAL_JWT_SECRET", "prod-secret");
            }
            AppConfig::load()
        },
        vec![
            "APP_ENV",
            "PORTAL_BACKEND_URL",
            "PORTAL_ANON_KEY",
            "PORTAL_JWT_SECRET",
        ],
    );

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.backend_url, "https://portal.example.com");
    assert_eq!(config.jwt_secret, "prod-secret");
}
