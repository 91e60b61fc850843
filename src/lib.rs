use std::sync::Arc;

// --- Module Structure ---

// Core portal services and components.
pub mod aggregates;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod roles;
pub mod storage;

// --- Public Re-exports ---

// Makes the context types easily accessible to embedding applications.
pub use aggregates::{AggregateRecalculator, AggregateState};
pub use auth::{AuthEvent, AuthSession, AuthState, AuthUser};
pub use backend::{
    BackendChannel, BackendState, HttpBackend, ListQuery, MemoryBackend, SessionGrant, SortDir,
};
pub use config::AppConfig;
pub use error::{PortalError, Result};
pub use repository::{
    JobRepository, LikeRepository, PostRepository, ProfileRepository, ReplyRepository,
    TalentRepository,
};
pub use roles::{Action, RoleResolver, RoleState, allows};
pub use storage::{HttpObjectStore, MockObjectStore, ObjectStore, StorageState, UploadKind, Uploader};

/// Portal
///
/// Implements the **Unified Context Pattern**: the single, thread-safe container
/// holding the session, the role resolver, the recalculator and every repository.
/// It is assembled once at startup and shared by every page; nothing in this crate
/// reaches for ambient globals.
pub struct Portal {
    /// Configuration: The loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Session Layer: Who the current caller is, with change notifications.
    pub auth: AuthState,
    /// Authorization Layer: Role resolution plus the capability rules.
    pub roles: RoleState,
    /// Aggregation Layer: Re-fetches derived counters after mutations.
    pub aggregates: AggregateState,
    /// Upload Layer: Validating front of the object store.
    pub uploads: Uploader,
    pub posts: PostRepository,
    pub replies: ReplyRepository,
    pub likes: LikeRepository,
    pub talents: TalentRepository,
    pub profiles: ProfileRepository,
    pub jobs: JobRepository,
}

impl Portal {
    /// connect
    ///
    /// Production assembly: the HTTP backend and the hosted object store, followed
    /// by an attempt to restore a persisted session from disk.
    pub fn connect(config: AppConfig) -> Self {
        let backend: BackendState = Arc::new(HttpBackend::new(&config));
        let store: StorageState = Arc::new(HttpObjectStore::new(&config));
        let portal = Self::assemble(config, backend, store);
        portal.auth.restore();
        portal
    }

    /// assemble
    ///
    /// Wires the full context over any backend/store pair. Tests inject the
    /// in-memory implementations here; no restore happens at this level.
    pub fn assemble(config: AppConfig, backend: BackendState, store: StorageState) -> Self {
        let auth: AuthState = Arc::new(AuthSession::new(&config, Arc::clone(&backend)));
        let roles: RoleState = Arc::new(RoleResolver::new(
            Arc::clone(&backend),
            Arc::clone(&auth),
        ));
        let aggregates: AggregateState =
            Arc::new(AggregateRecalculator::new(Arc::clone(&backend)));
        let uploads = Uploader::new(Arc::clone(&store), Arc::clone(&auth));

        // Any identity change invalidates the cached role resolution, so the next
        // page render resolves fresh.
        let roles_on_change = Arc::clone(&roles);
        auth.subscribe(move |_event| roles_on_change.invalidate());

        let posts = PostRepository::new(
            Arc::clone(&backend),
            Arc::clone(&auth),
            Arc::clone(&roles),
        );
        let replies = ReplyRepository::new(
            Arc::clone(&backend),
            Arc::clone(&auth),
            Arc::clone(&roles),
            Arc::clone(&aggregates),
        );
        let likes = LikeRepository::new(
            Arc::clone(&backend),
            Arc::clone(&auth),
            Arc::clone(&aggregates),
        );
        let talents = TalentRepository::new(
            Arc::clone(&backend),
            Arc::clone(&auth),
            Arc::clone(&roles),
            uploads.clone(),
        );
        let profiles = ProfileRepository::new(
            Arc::clone(&backend),
            Arc::clone(&auth),
            Arc::clone(&roles),
        );
        let jobs = JobRepository::new();

        Self {
            config,
            auth,
            roles,
            aggregates,
            uploads,
            posts,
            replies,
            likes,
            talents,
            profiles,
            jobs,
        }
    }
}
