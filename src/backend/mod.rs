use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::Result;

pub mod http;
pub mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// SortDir
///
/// Direction of one ordering key in a list read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// ListQuery
///
/// The wire parameters of one filtered read or targeted mutation: equality filters,
/// ordering keys and paging. This deliberately mirrors only what the hosted REST
/// dialect expresses in a query string; it is a parameter carrier, not a query
/// language.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub filters: Vec<(&'static str, String)>,
    pub order: Vec<(&'static str, SortDir)>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `column = value` constraint. All constraints AND together.
    pub fn eq(mut self, column: &'static str, value: impl ToString) -> Self {
        self.filters.push((column, value.to_string()));
        self
    }

    /// Appends an ordering key; earlier keys take precedence.
    pub fn order_by(mut self, column: &'static str, dir: SortDir) -> Self {
        self.order.push((column, dir));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// SessionGrant
///
/// What the auth service hands back on a successful sign-up or password grant: the
/// access token plus the resolved identity. The token is opaque to callers; only the
/// session layer inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
    pub access_token: String,
    pub user: AuthUser,
}

/// BackendChannel
///
/// Defines the abstract contract for every remote call this layer makes. The backend
/// is an opaque external service; this trait is the only place its dialect is spoken.
/// Swapping the concrete implementation, from the real HTTP client (HttpBackend) to
/// the in-memory fake (MemoryBackend) used in tests, never affects the repositories
/// built on top.
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn BackendChannel>`) safely shareable across task boundaries.
///
/// `token` is the caller's access token where one exists; implementations fall back to
/// the publishable key for anonymous reads.
#[async_trait]
pub trait BackendChannel: Send + Sync {
    // --- Entity collections ---

    /// Filtered, ordered, paged read of one collection.
    async fn select(&self, token: Option<&str>, table: &str, query: &ListQuery)
    -> Result<Vec<Value>>;

    /// Inserts one row and returns the stored representation (the backend fills in
    /// id, timestamps and column defaults).
    async fn insert(&self, token: Option<&str>, table: &str, row: &Value) -> Result<Value>;

    /// Patches every row matching the query; returns how many rows were touched.
    async fn update(
        &self,
        token: Option<&str>,
        table: &str,
        query: &ListQuery,
        patch: &Value,
    ) -> Result<u64>;

    /// Deletes every row matching the query; returns how many rows were removed.
    async fn delete(&self, token: Option<&str>, table: &str, query: &ListQuery) -> Result<u64>;

    /// Exact row count of the matching set, without transferring the rows.
    async fn count(&self, token: Option<&str>, table: &str, query: &ListQuery) -> Result<i64>;

    /// Get-by-id convenience over `select`.
    async fn get(&self, token: Option<&str>, table: &str, id: Uuid) -> Result<Option<Value>> {
        let rows = self
            .select(token, table, &ListQuery::new().eq("id", id).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    // --- Remote procedures ---

    /// Invokes a named procedure with JSON arguments and returns its raw result.
    async fn rpc(&self, token: Option<&str>, function: &str, args: &Value) -> Result<Value>;

    // --- Auth service ---

    async fn sign_up(&self, email: &str, password: &str) -> Result<SessionGrant>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionGrant>;
    async fn sign_out(&self, access_token: &str) -> Result<()>;
}

/// BackendState
///
/// The concrete type used to share the backend channel across the portal context.
pub type BackendState = Arc<dyn BackendChannel>;
