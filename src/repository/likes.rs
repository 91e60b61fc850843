use serde_json::json;
use uuid::Uuid;

use crate::aggregates::AggregateState;
use crate::auth::AuthState;
use crate::backend::{BackendState, ListQuery};
use crate::error::Result;
use crate::models::LikeChange;

/// LikeRepository
///
/// The like join. A (post, user) row's presence is the like; `toggle` flips it and
/// then re-reads the post's counters, because concurrent likers make any locally
/// incremented number wrong.
#[derive(Clone)]
pub struct LikeRepository {
    backend: BackendState,
    session: AuthState,
    aggregates: AggregateState,
}

impl LikeRepository {
    pub fn new(backend: BackendState, session: AuthState, aggregates: AggregateState) -> Self {
        Self {
            backend,
            session,
            aggregates,
        }
    }

    /// toggle
    ///
    /// Likes the post if the caller has not, unlikes it if they have, then returns
    /// the caller's new state together with the freshly fetched counters. Anonymous
    /// callers fail with `Unauthorized` before any request is made.
    pub async fn toggle(&self, post_id: Uuid) -> Result<LikeChange> {
        let user = self.session.require_user()?;
        let token = self.token();
        let query = ListQuery::new().eq("post_id", post_id).eq("user_id", user.id);
        let existing = self
            .backend
            .select(token.as_deref(), "post_likes", &query.clone().limit(1))
            .await?;
        let liked = if existing.is_empty() {
            let row = json!({ "post_id": post_id, "user_id": user.id });
            self.backend
                .insert(token.as_deref(), "post_likes", &row)
                .await?;
            true
        } else {
            self.backend
                .delete(token.as_deref(), "post_likes", &query)
                .await?;
            false
        };
        let counts = self.aggregates.refresh_post(post_id).await?;
        Ok(LikeChange { liked, counts })
    }

    /// has_liked
    ///
    /// Whether `user_id` currently likes the post. Public read; pages use it to
    /// render the heart state.
    pub async fn has_liked(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let query = ListQuery::new()
            .eq("post_id", post_id)
            .eq("user_id", user_id)
            .limit(1);
        let rows = self
            .backend
            .select(self.token().as_deref(), "post_likes", &query)
            .await?;
        Ok(!rows.is_empty())
    }

    fn token(&self) -> Option<String> {
        self.session.access_token()
    }
}
