use std::env;
use std::path::PathBuf;

/// AppConfig
///
/// Holds the client layer's entire configuration state. This struct is designed to be
/// immutable once loaded, ensuring consistency across everything assembled from it
/// (backend channel, auth session, object storage). It is built exactly once at startup
/// and shared by value into the `Portal` context.
#[derive(Clone)]
pub struct AppConfig {
    // Base URL of the hosted backend (REST, auth and storage all hang off this).
    pub backend_url: String,
    // Publishable API key sent as the `apikey` header on every request.
    pub anon_key: String,
    // Secret used to validate persisted access tokens before restoring a session.
    pub jwt_secret: String,
    // Where the signed-in session is persisted across process restarts.
    pub session_file: PathBuf,
    // Runtime environment marker. Controls fail-fast behavior on missing variables.
    pub env: Env,
}

/// Env
///
/// Defines the runtime context, used to switch between development defaults (a local
/// backend stack on port 54321) and the hardened production configuration where every
/// secret must be explicitly provided.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    /// This allows us to instantiate the configuration without needing to set environment
    /// variables for lightweight unit or integration testing state scaffolding.
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:54321".to_string(),
            anon_key: "local-anon-key".to_string(),
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            session_file: env::temp_dir().join("talent-portal-session.json"),
            env: Env::Local,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// The canonical function for initializing the configuration at startup. It reads
    /// all parameters from environment variables (a `.env` file is honored if present)
    /// and implements the **fail-fast** principle.
    ///
    /// # Panics
    /// Panics if a critical environment variable required for the current runtime
    /// environment (especially Production) is not found. This prevents the client from
    /// starting against an incomplete or insecure configuration.
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        // JWT Secret Resolution
        // The production secret is mandatory and must be explicitly set.
        let jwt_secret = match env {
            Env::Production => env::var("PORTAL_JWT_SECRET")
                .expect("FATAL: PORTAL_JWT_SECRET must be set in production."),
            // In local, we provide a fallback, though the developer should ideally use the actual secret.
            _ => env::var("PORTAL_JWT_SECRET")
                .unwrap_or_else(|_| "super-secure-test-secret-value-local".to_string()),
        };

        let session_file = env::var("PORTAL_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("talent-portal-session.json"));

        match env {
            Env::Local => Self {
                env: Env::Local,
                // The local backend stack serves REST/auth/storage on one port.
                backend_url: env::var("PORTAL_BACKEND_URL")
                    .unwrap_or_else(|_| "http://localhost:54321".to_string()),
                anon_key: env::var("PORTAL_ANON_KEY")
                    .unwrap_or_else(|_| "local-anon-key".to_string()),
                jwt_secret,
                session_file,
            },
            Env::Production => {
                // Production demands explicit setting of the project URL and key.
                Self {
                    env: Env::Production,
                    backend_url: env::var("PORTAL_BACKEND_URL")
                        .expect("FATAL: PORTAL_BACKEND_URL required in prod"),
                    anon_key: env::var("PORTAL_ANON_KEY")
                        .expect("FATAL: PORTAL_ANON_KEY required in prod"),
                    jwt_secret,
                    session_file,
                }
            }
        }
    }
}
