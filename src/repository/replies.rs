use serde_json::json;
use uuid::Uuid;

use crate::aggregates::AggregateState;
use crate::auth::AuthState;
use crate::backend::{BackendState, ListQuery, SortDir};
use crate::error::{PortalError, Result};
use crate::models::Reply;
use crate::roles::{Action, RoleState, allows};

use super::{parse_row, parse_rows, row_id};

/// ReplyRepository
///
/// The reply thread under a post. Creating or deleting a reply changes the parent's
/// `replies_count` server-side, so both paths re-fetch the parent's counters through
/// the recalculator instead of adjusting any local number.
#[derive(Clone)]
pub struct ReplyRepository {
    backend: BackendState,
    session: AuthState,
    roles: RoleState,
    aggregates: AggregateState,
}

impl ReplyRepository {
    pub fn new(
        backend: BackendState,
        session: AuthState,
        roles: RoleState,
        aggregates: AggregateState,
    ) -> Self {
        Self {
            backend,
            session,
            roles,
            aggregates,
        }
    }

    /// list_for_post
    ///
    /// The thread in chronological order. Public read.
    pub async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<Reply>> {
        let query = ListQuery::new()
            .eq("post_id", post_id)
            .order_by("created_at", SortDir::Asc);
        let rows = self
            .backend
            .select(self.token().as_deref(), "post_replies", &query)
            .await?;
        parse_rows(rows)
    }

    /// create
    ///
    /// Inserts a reply under the caller's identity and re-reads the parent's counts.
    /// A missing parent surfaces as the backend's `NotFound`.
    pub async fn create(&self, post_id: Uuid, content: &str) -> Result<Uuid> {
        let content = content.trim();
        if content.is_empty() {
            return Err(PortalError::validation("content", "must not be empty"));
        }
        let user = self.session.require_user()?;
        let row = json!({
            "post_id": post_id,
            "user_id": user.id,
            "content": content,
        });
        let stored = self
            .backend
            .insert(self.token().as_deref(), "post_replies", &row)
            .await?;
        let id = row_id(&stored)?;
        // The reply is stored either way; a failed recount only delays the fresh
        // number until the next read.
        if let Err(e) = self.aggregates.refresh_post(post_id).await {
            tracing::warn!(error = %e, %post_id, "Reply stored but count refresh failed");
        }
        Ok(id)
    }

    /// update
    ///
    /// **Owner** edit with a moderator/admin override.
    pub async fn update(&self, id: Uuid, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            return Err(PortalError::validation("content", "must not be empty"));
        }
        let user = self.session.require_user()?;
        let reply = self.fetch(id).await?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::EditReply, role, user.id, reply.user_id) {
            return Err(PortalError::Forbidden);
        }
        let query = if reply.user_id == user.id {
            ListQuery::new().eq("id", id).eq("user_id", user.id)
        } else {
            ListQuery::new().eq("id", id)
        };
        let touched = self
            .backend
            .update(
                self.token().as_deref(),
                "post_replies",
                &query,
                &json!({ "content": content }),
            )
            .await?;
        if touched == 0 {
            return Err(PortalError::NotFound("reply"));
        }
        Ok(())
    }

    /// delete
    ///
    /// **Owner** delete with a moderator/admin override, followed by a recount of the
    /// parent post.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let user = self.session.require_user()?;
        let reply = self.fetch(id).await?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::DeleteReply, role, user.id, reply.user_id) {
            return Err(PortalError::Forbidden);
        }
        let query = if reply.user_id == user.id {
            ListQuery::new().eq("id", id).eq("user_id", user.id)
        } else {
            ListQuery::new().eq("id", id)
        };
        let removed = self
            .backend
            .delete(self.token().as_deref(), "post_replies", &query)
            .await?;
        if removed == 0 {
            return Err(PortalError::NotFound("reply"));
        }
        if let Err(e) = self.aggregates.refresh_post(reply.post_id).await {
            tracing::warn!(error = %e, post_id = %reply.post_id, "Reply removed but count refresh failed");
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Reply> {
        let row = self
            .backend
            .get(self.token().as_deref(), "post_replies", id)
            .await?
            .ok_or(PortalError::NotFound("reply"))?;
        parse_row(row)
    }

    fn token(&self) -> Option<String> {
        self.session.access_token()
    }
}
