use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use crate::backend::BackendState;
use crate::error::{PortalError, Result};
use crate::models::PostCounts;

type CountsListener = Arc<dyn Fn(&PostCounts) + Send + Sync>;

/// AggregateRecalculator
///
/// Re-reads derived counters after mutations instead of trusting local arithmetic.
/// A like toggle or a reply insert changes `likes_count`/`replies_count` server-side
/// (possibly interleaved with other users' writes), so the repositories call
/// `refresh_post` afterwards and propagate what the backend actually stored.
/// Subscribed views receive every fresh read, which gives all pages the same
/// "mutate, then re-fetch truth" discipline.
pub struct AggregateRecalculator {
    backend: BackendState,
    listeners: Mutex<Vec<(u64, CountsListener)>>,
    next_listener: AtomicU64,
}

impl AggregateRecalculator {
    pub fn new(backend: BackendState) -> Self {
        Self {
            backend,
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// refresh_post
    ///
    /// Fetches the authoritative counters of one post and pushes them to all
    /// subscribers. Fails with `NotFound` when the post no longer exists; callers
    /// re-list in that case rather than recounting.
    pub async fn refresh_post(&self, post_id: Uuid) -> Result<PostCounts> {
        let row = self
            .backend
            .get(None, "posts", post_id)
            .await?
            .ok_or(PortalError::NotFound("post"))?;
        let counts = PostCounts {
            post_id,
            likes_count: row.get("likes_count").and_then(Value::as_i64).unwrap_or(0),
            replies_count: row
                .get("replies_count")
                .and_then(Value::as_i64)
                .unwrap_or(0),
        };
        self.notify(&counts);
        Ok(counts)
    }

    /// Registers a callback for fresh counter reads; returns an id for `unsubscribe`.
    pub fn subscribe<F>(&self, callback: F) -> u64
    where
        F: Fn(&PostCounts) + Send + Sync + 'static,
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

    /// Callbacks run outside the listener lock so a callback may subscribe or
    /// unsubscribe without deadlocking.
    fn notify(&self, counts: &PostCounts) {
        let snapshot: Vec<CountsListener> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in snapshot {
            listener(counts);
        }
    }
}

/// AggregateState
///
/// The shared handle repositories hold on the recalculator.
pub type AggregateState = Arc<AggregateRecalculator>;
