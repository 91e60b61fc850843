use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::backend::{BackendState, SessionGrant};
use crate::config::AppConfig;
use crate::error::{PortalError, Result};

/// Claims
///
/// Represents the standard payload structure expected inside a JSON Web Token (JWT).
/// These claims are signed by the auth service's secret and validated before a stored
/// session is trusted.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): The UUID of the user. This is the primary key used to fetch
    /// the user's details and role from the public.profiles table.
    pub sub: Uuid,
    /// Expiration Time (exp): Timestamp after which the JWT must not be accepted.
    /// This is crucial for preventing replay attacks and maintaining session freshness.
    pub exp: usize,
    /// Issued At (iat): Timestamp when the JWT was issued.
    pub iat: usize,
    /// Email claim carried by the hosted auth service's tokens. Absent in minimal
    /// tokens, so it stays optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// AuthUser
///
/// The resolved identity of the current caller. Repositories use this struct to
/// retrieve the user's ID and verify ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// The unique identifier of the user, mapped to auth.users.id and public.profiles.id.
    pub id: Uuid,
    pub email: String,
}

/// AuthEvent
///
/// Emitted to subscribers on every transition between unauthenticated and
/// authenticated (or to a distinct identity).
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(AuthUser),
    SignedOut,
}

type AuthListener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

/// AuthSession
///
/// Process-wide session context: tracks who the current caller is, exposes the
/// sign-up/sign-in/sign-out operations, persists the session across restarts, and
/// notifies subscribers on every identity change.
///
/// Sign-in is fail-closed (no session is installed unless the auth service granted
/// one); sign-out is fail-open (the local session is always cleared, even when the
/// remote revocation call fails).
pub struct AuthSession {
    backend: BackendState,
    jwt_secret: String,
    session_file: PathBuf,
    current: RwLock<Option<SessionGrant>>,
    listeners: Mutex<Vec<(u64, AuthListener)>>,
    next_listener: AtomicU64,
}

impl AuthSession {
    pub fn new(config: &AppConfig, backend: BackendState) -> Self {
        Self {
            backend,
            jwt_secret: config.jwt_secret.clone(),
            session_file: config.session_file.clone(),
            current: RwLock::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Restores a persisted session from disk, if one exists and its token still
    /// validates against the configured secret. Expired or unreadable sessions are
    /// discarded and the file removed. Returns whether a session was installed.
    pub fn restore(&self) -> bool {
        let Ok(raw) = std::fs::read_to_string(&self.session_file) else {
            return false;
        };
        let grant: SessionGrant = match serde_json::from_str(&raw) {
            Ok(grant) => grant,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session file");
                let _ = std::fs::remove_file(&self.session_file);
                return false;
            }
        };
        if self.validate_token(&grant.access_token).is_err() {
            tracing::warn!("Discarding stored session: token expired or invalid");
            let _ = std::fs::remove_file(&self.session_file);
            return false;
        }
        let user = grant.user.clone();
        {
            let mut current = self.write_lock();
            *current = Some(grant);
        }
        self.notify(&AuthEvent::SignedIn(user));
        true
    }

    /// sign_up
    ///
    /// Registers a new account and installs the granted session. Credential shape is
    /// checked before any network call; the auth service remains authoritative and
    /// answers with `EmailTaken` or `WeakPassword` where it rejects the registration.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(PortalError::validation("email", "must be a valid address"));
        }
        if password.is_empty() {
            return Err(PortalError::validation("password", "must not be empty"));
        }
        let grant = self.backend.sign_up(email, password).await?;
        Ok(self.install(grant))
    }

    /// sign_in
    ///
    /// Exchanges credentials for a session. Fails with `InvalidCredentials` when the
    /// auth service rejects the pair; nothing is installed in that case.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PortalError::validation("email", "must not be empty"));
        }
        if password.is_empty() {
            return Err(PortalError::validation("password", "must not be empty"));
        }
        let grant = self.backend.sign_in(email, password).await?;
        Ok(self.install(grant))
    }

    /// sign_out
    ///
    /// Clears the session. The local state and the persisted file are dropped
    /// unconditionally before the remote revocation is attempted; a revocation
    /// failure is logged and otherwise ignored.
    pub async fn sign_out(&self) {
        let previous = {
            let mut current = self.write_lock();
            current.take()
        };
        let Some(grant) = previous else {
            return;
        };
        if let Err(e) = std::fs::remove_file(&self.session_file) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, "Failed to remove persisted session file");
            }
        }
        self.notify(&AuthEvent::SignedOut);
        if let Err(e) = self.backend.sign_out(&grant.access_token).await {
            tracing::warn!(error = %e, "Remote sign-out failed; local session already cleared");
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.read_lock().as_ref().map(|grant| grant.user.clone())
    }

    /// The signed-in identity, or `Unauthorized` when no session exists. Repositories
    /// call this at the top of every mutation.
    pub fn require_user(&self) -> Result<AuthUser> {
        self.current_user().ok_or(PortalError::Unauthorized)
    }

    /// The bearer token attached to backend calls made on the caller's behalf.
    pub fn access_token(&self) -> Option<String> {
        self.read_lock()
            .as_ref()
            .map(|grant| grant.access_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_lock().is_some()
    }

    /// Registers a callback for session transitions; returns an id for `unsubscribe`.
    pub fn subscribe<F>(&self, callback: F) -> u64
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let id = self.next_listener.fetch_add(1, Ordering::SeqCst);
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.retain(|(listener_id, _)| *listener_id != id);
    }

    /// Installs a fresh grant: persist, publish, notify. Returns the identity.
    fn install(&self, grant: SessionGrant) -> AuthUser {
        let user = grant.user.clone();
        self.persist(&grant);
        {
            let mut current = self.write_lock();
            *current = Some(grant);
        }
        self.notify(&AuthEvent::SignedIn(user.clone()));
        user
    }

    /// Validates a stored token the same way the server side would.
    fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());

        let mut validation = Validation::default();

        // Ensure expiration time validation is always active.
        validation.validate_exp = true;

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                // Token expired: the most common failure for a valid-but-old token.
                ErrorKind::ExpiredSignature => Err(PortalError::Unauthorized),
                // Catch all other failure types (bad signature, malformed token, etc.).
                _ => Err(PortalError::Unauthorized),
            },
        }
    }

    /// Best-effort persistence; a write failure costs only the reload convenience.
    fn persist(&self, grant: &SessionGrant) {
        match serde_json::to_string(grant) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.session_file, json) {
                    tracing::warn!(error = %e, "Failed to persist session file");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize session"),
        }
    }

    /// Callbacks run outside the listener lock so a callback may subscribe or
    /// unsubscribe without deadlocking.
    fn notify(&self, event: &AuthEvent) {
        let snapshot: Vec<AuthListener> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in snapshot {
            listener(event);
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Option<SessionGrant>> {
        self.current.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Option<SessionGrant>> {
        self.current.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// AuthState
///
/// The shared handle dependents hold on the process-wide session.
pub type AuthState = Arc<AuthSession>;
