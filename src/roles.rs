use std::sync::{Arc, RwLock};

use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::AuthState;
use crate::backend::BackendState;
use crate::models::Role;

/// RoleResolver
///
/// Maps a user id to an authorization role via the `get_user_role` procedure,
/// carrying the caller's token from the session. Resolution is infallible: any
/// backend failure or missing grant degrades to `Role::User` with a logged warning,
/// never to a crash and never to an elevated role. The resolved role gates UI
/// affordances and pre-checks only; the backend re-checks every privileged mutation.
pub struct RoleResolver {
    backend: BackendState,
    session: AuthState,
    cache: RwLock<Option<(Uuid, Role)>>,
}

impl RoleResolver {
    pub fn new(backend: BackendState, session: AuthState) -> Self {
        Self {
            backend,
            session,
            cache: RwLock::new(None),
        }
    }

    /// resolve
    ///
    /// Returns the role for `user_id`, consulting the cached last resolution first.
    /// A defaulted `Role::User` is cached like any other result so one backend
    /// outage does not turn every page render into a fresh lookup.
    pub async fn resolve(&self, user_id: Uuid) -> Role {
        if let Some(role) = self.cached(user_id) {
            return role;
        }
        let role = self.lookup(user_id).await;
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = Some((user_id, role));
        role
    }

    /// Role of the signed-in caller; `Role::User` when anonymous.
    pub async fn current_role(&self) -> Role {
        match self.session.current_user() {
            Some(user) => self.resolve(user.id).await,
            None => Role::User,
        }
    }

    /// Uncached lookup. Used directly for admin member listings, which enrich many
    /// users in one pass and must not churn the caller's cache slot.
    pub async fn lookup(&self, user_id: Uuid) -> Role {
        let token = self.session.access_token();
        let args = json!({ "_user_id": user_id });
        match self
            .backend
            .rpc(token.as_deref(), "get_user_role", &args)
            .await
        {
            Ok(Value::Null) => Role::default(),
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, %user_id, "Unrecognized role payload, defaulting to user");
                Role::default()
            }),
            Err(e) => {
                tracing::warn!(error = %e, %user_id, "Role lookup failed, defaulting to user");
                Role::default()
            }
        }
    }

    /// Clears the cached resolution. Wired to session change events at assembly, so
    /// a sign-in or sign-out always forces a fresh lookup.
    pub fn invalidate(&self) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    fn cached(&self, user_id: Uuid) -> Option<Role> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        cache
            .as_ref()
            .filter(|(cached_id, _)| *cached_id == user_id)
            .map(|(_, role)| *role)
    }
}

/// RoleState
///
/// The shared handle repositories hold on the resolver.
pub type RoleState = Arc<RoleResolver>;

/// Action
///
/// Every privileged operation a page can attempt. Gating them through one function
/// keeps the rules from drifting between call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    EditPost,
    DeletePost,
    PinPost,
    EditReply,
    DeleteReply,
    EditTalent,
    ModerateTalent,
    ViewAdminArea,
}

/// allows
///
/// The single capability check: may `caller`, holding `role`, perform `action` on a
/// resource owned by `owner`? For actions without a meaningful owner (pinning,
/// moderation, the admin area) the owner argument is ignored.
pub fn allows(action: Action, role: Role, caller: Uuid, owner: Uuid) -> bool {
    let own = caller == owner;
    match action {
        Action::EditPost => own,
        Action::DeletePost => own || role == Role::Admin,
        Action::PinPost => role == Role::Admin,
        Action::EditReply | Action::DeleteReply => {
            own || matches!(role, Role::Admin | Role::Moderator)
        }
        Action::EditTalent => own,
        Action::ModerateTalent => role == Role::Admin,
        Action::ViewAdminArea => role == Role::Admin,
    }
}
