use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::AuthState;
use crate::backend::{BackendState, ListQuery, SortDir};
use crate::error::{PortalError, Result};
use crate::models::{NewPost, Post, PostPatch, PostQuery};
use crate::roles::{Action, RoleState, allows};

use super::{is_empty_patch, parse_row, parse_rows, row_id};

/// PostRepository
///
/// CRUD for community posts. Reads are public. Every mutation requires a session,
/// re-reads the current row to pre-check ownership through the capability rules, and
/// still sends the owner filter with the mutation so a race cannot touch someone
/// else's row. The backend re-checks all of it authoritatively.
#[derive(Clone)]
pub struct PostRepository {
    backend: BackendState,
    session: AuthState,
    roles: RoleState,
}

impl PostRepository {
    pub fn new(backend: BackendState, session: AuthState, roles: RoleState) -> Self {
        Self {
            backend,
            session,
            roles,
        }
    }

    // --- Reads ---

    /// list
    ///
    /// The community feed: pinned posts first, newest first within each group.
    pub async fn list(&self) -> Result<Vec<Post>> {
        let query = ListQuery::new()
            .order_by("is_pinned", SortDir::Desc)
            .order_by("created_at", SortDir::Desc);
        let rows = self
            .backend
            .select(self.token().as_deref(), "posts", &query)
            .await?;
        parse_rows(rows)
    }

    /// list_matching
    ///
    /// The feed filtered by the page's local category/term query. The filtering is a
    /// pure client-side matcher over the listed rows.
    pub async fn list_matching(&self, filter: &PostQuery) -> Result<Vec<Post>> {
        let posts = self.list().await?;
        Ok(posts.into_iter().filter(|post| filter.matches(post)).collect())
    }

    /// get
    ///
    /// One post by id, or `NotFound`.
    pub async fn get(&self, id: Uuid) -> Result<Post> {
        let row = self
            .backend
            .get(self.token().as_deref(), "posts", id)
            .await?
            .ok_or(PortalError::NotFound("post"))?;
        parse_row(row)
    }

    /// list_by_author
    ///
    /// All posts owned by one user, newest first. Feeds the my-page view.
    pub async fn list_by_author(&self, user_id: Uuid) -> Result<Vec<Post>> {
        let query = ListQuery::new()
            .eq("user_id", user_id)
            .order_by("created_at", SortDir::Desc);
        let rows = self
            .backend
            .select(self.token().as_deref(), "posts", &query)
            .await?;
        parse_rows(rows)
    }

    /// recent
    ///
    /// The newest posts regardless of pinning. Feeds the admin dashboard.
    pub async fn recent(&self, limit: u32) -> Result<Vec<Post>> {
        let query = ListQuery::new()
            .order_by("created_at", SortDir::Desc)
            .limit(limit);
        let rows = self
            .backend
            .select(self.token().as_deref(), "posts", &query)
            .await?;
        parse_rows(rows)
    }

    // --- Mutations ---

    /// create
    ///
    /// Validates the draft before any network call, then inserts it under the
    /// caller's identity. Returns the new id only; pages re-fetch the stored row
    /// instead of trusting a local echo.
    pub async fn create(&self, draft: &NewPost) -> Result<Uuid> {
        draft.validate()?;
        let user = self.session.require_user()?;
        let mut row = serde_json::to_value(draft)?;
        if let Value::Object(fields) = &mut row {
            fields.insert("user_id".to_string(), json!(user.id));
        }
        let stored = self
            .backend
            .insert(self.token().as_deref(), "posts", &row)
            .await?;
        row_id(&stored)
    }

    /// update
    ///
    /// **Owner-Only** edit. The mutation is filtered by owner as well as id, so the
    /// only reachable row is the caller's own.
    pub async fn update(&self, id: Uuid, patch: &PostPatch) -> Result<()> {
        patch.validate()?;
        let user = self.session.require_user()?;
        let current = self.get(id).await?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::EditPost, role, user.id, current.user_id) {
            return Err(PortalError::Forbidden);
        }
        let patch_value = serde_json::to_value(patch)?;
        if is_empty_patch(&patch_value) {
            return Ok(());
        }
        let query = ListQuery::new().eq("id", id).eq("user_id", user.id);
        let touched = self
            .backend
            .update(self.token().as_deref(), "posts", &query, &patch_value)
            .await?;
        if touched == 0 {
            return Err(PortalError::NotFound("post"));
        }
        Ok(())
    }

    /// delete
    ///
    /// Owner delete with an **Admin Override**. The admin path deletes by id alone;
    /// the owner path stays filtered by owner.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let user = self.session.require_user()?;
        let current = self.get(id).await?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::DeletePost, role, user.id, current.user_id) {
            return Err(PortalError::Forbidden);
        }
        let query = if current.user_id == user.id {
            ListQuery::new().eq("id", id).eq("user_id", user.id)
        } else {
            // Non-owner reaching this point holds the admin role.
            ListQuery::new().eq("id", id)
        };
        let removed = self
            .backend
            .delete(self.token().as_deref(), "posts", &query)
            .await?;
        if removed == 0 {
            return Err(PortalError::NotFound("post"));
        }
        Ok(())
    }

    /// set_pinned
    ///
    /// **Admin** moderation toggle for the pinned flag.
    pub async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<()> {
        let user = self.session.require_user()?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::PinPost, role, user.id, user.id) {
            return Err(PortalError::Forbidden);
        }
        let query = ListQuery::new().eq("id", id);
        let touched = self
            .backend
            .update(
                self.token().as_deref(),
                "posts",
                &query,
                &json!({ "is_pinned": pinned }),
            )
            .await?;
        if touched == 0 {
            return Err(PortalError::NotFound("post"));
        }
        Ok(())
    }

    fn token(&self) -> Option<String> {
        self.session.access_token()
    }
}
