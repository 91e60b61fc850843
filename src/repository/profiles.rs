use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::{AuthState, AuthUser};
use crate::backend::{BackendState, ListQuery, SortDir};
use crate::error::{PortalError, Result};
use crate::models::{AdminStats, DashboardData, Member, Profile, ProfilePatch, UserStats};
use crate::roles::{Action, RoleState, allows};

use super::{is_empty_patch, parse_row, parse_rows};

/// ProfileRepository
///
/// The caller's identity record, the public view of other users, and the admin's
/// member table. Profile rows are materialized by the backend on sign-up; this
/// repository only reads and patches them.
#[derive(Clone)]
pub struct ProfileRepository {
    backend: BackendState,
    session: AuthState,
    roles: RoleState,
}

impl ProfileRepository {
    pub fn new(backend: BackendState, session: AuthState, roles: RoleState) -> Self {
        Self {
            backend,
            session,
            roles,
        }
    }

    // --- Self & Public Reads ---

    /// me
    ///
    /// The caller's own profile row.
    pub async fn me(&self) -> Result<Profile> {
        let user = self.session.require_user()?;
        self.get(user.id).await
    }

    /// get
    ///
    /// One profile by user id, or `NotFound`.
    pub async fn get(&self, user_id: Uuid) -> Result<Profile> {
        let row = self
            .backend
            .get(self.token().as_deref(), "profiles", user_id)
            .await?
            .ok_or(PortalError::NotFound("profile"))?;
        parse_row(row)
    }

    /// stats
    ///
    /// Activity counters for the profile page: exact post and reply counts, plus
    /// likes received summed over the user's posts from one list read.
    pub async fn stats(&self, user_id: Uuid) -> Result<UserStats> {
        let token = self.token();
        let by_owner = ListQuery::new().eq("user_id", user_id);
        let posts_count = self
            .backend
            .count(token.as_deref(), "posts", &by_owner)
            .await?;
        let replies_count = self
            .backend
            .count(token.as_deref(), "post_replies", &by_owner)
            .await?;
        let rows = self
            .backend
            .select(token.as_deref(), "posts", &by_owner)
            .await?;
        let likes_received = rows
            .iter()
            .filter_map(|row| row.get("likes_count").and_then(Value::as_i64))
            .sum();
        Ok(UserStats {
            posts_count,
            replies_count,
            likes_received,
        })
    }

    /// dashboard
    ///
    /// One aggregated read for the my-page view. The procedure answers with an array
    /// of one element; an empty array means the caller has no talent profile yet.
    pub async fn dashboard(&self) -> Result<DashboardData> {
        let user = self.session.require_user()?;
        let args = json!({ "user_id": user.id });
        let value = self
            .backend
            .rpc(self.token().as_deref(), "get_user_dashboard_data", &args)
            .await?;
        let mut rows: Vec<DashboardData> = serde_json::from_value(value)?;
        Ok(rows.pop().unwrap_or_default())
    }

    // --- Mutations ---

    /// update
    ///
    /// Patches the caller's own row; there is no path to another user's profile.
    pub async fn update(&self, patch: &ProfilePatch) -> Result<()> {
        patch.validate()?;
        let user = self.session.require_user()?;
        let patch_value = serde_json::to_value(patch)?;
        if is_empty_patch(&patch_value) {
            return Ok(());
        }
        let query = ListQuery::new().eq("id", user.id);
        let touched = self
            .backend
            .update(self.token().as_deref(), "profiles", &query, &patch_value)
            .await?;
        if touched == 0 {
            return Err(PortalError::NotFound("profile"));
        }
        Ok(())
    }

    // --- Admin Views ---

    /// list_all
    ///
    /// **Admin** listing of every registered profile, newest first.
    pub async fn list_all(&self) -> Result<Vec<Profile>> {
        self.require_admin().await?;
        let query = ListQuery::new().order_by("created_at", SortDir::Desc);
        let rows = self
            .backend
            .select(self.token().as_deref(), "profiles", &query)
            .await?;
        parse_rows(rows)
    }

    /// list_with_roles
    ///
    /// **Admin** member table: every profile enriched with its resolved role. Uses
    /// the uncached lookup so an enrichment pass over many users does not churn the
    /// caller's own cache slot.
    pub async fn list_with_roles(&self) -> Result<Vec<Member>> {
        let profiles = self.list_all().await?;
        let mut members = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let role = self.roles.lookup(profile.id).await;
            members.push(Member { profile, role });
        }
        Ok(members)
    }

    /// admin_overview
    ///
    /// **Admin** dashboard counters, compiled from three exact counts.
    pub async fn admin_overview(&self) -> Result<AdminStats> {
        self.require_admin().await?;
        let token = self.token();
        let total_users = self
            .backend
            .count(token.as_deref(), "profiles", &ListQuery::new())
            .await?;
        let total_posts = self
            .backend
            .count(token.as_deref(), "posts", &ListQuery::new())
            .await?;
        let total_admins = self
            .backend
            .count(
                token.as_deref(),
                "user_roles",
                &ListQuery::new().eq("role", "admin"),
            )
            .await?;
        Ok(AdminStats {
            total_users,
            total_posts,
            total_admins,
        })
    }

    async fn require_admin(&self) -> Result<AuthUser> {
        let user = self.session.require_user()?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::ViewAdminArea, role, user.id, user.id) {
            return Err(PortalError::Forbidden);
        }
        Ok(user)
    }

    fn token(&self) -> Option<String> {
        self.session.access_token()
    }
}
