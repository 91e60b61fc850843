use std::env;
use std::sync::{Arc, Mutex};

use talent_portal::models::{
    ApplicationStatus, NewPost, NewTalentProfile, PostCategory, PostCounts, PostPatch, PostQuery,
    ProfilePatch, RemotePreference, Role, WorkType,
};
use talent_portal::{
    AppConfig, AuthUser, BackendState, MemoryBackend, MockObjectStore, Portal, PortalError,
    StorageState,
};
use uuid::Uuid;

// --- Test Context and Setup ---

/// Opt-in log output while debugging a test: TEST_LOG=debug cargo test
fn init_tracing() {
    if let Ok(filter) = env::var("TEST_LOG") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
            .with_test_writer()
            .try_init();
    }
}

/// Assembles a portal over a shared backend. Each portal carries its own session,
/// so multi-user scenarios run one portal per user against the same data.
fn portal_over(backend: &Arc<MemoryBackend>) -> Portal {
    init_tracing();
    let config = AppConfig {
        session_file: env::temp_dir().join(format!("talent-portal-test-{}.json", Uuid::new_v4())),
        ..AppConfig::default()
    };
    let channel: BackendState = backend.clone();
    let store: StorageState = Arc::new(MockObjectStore::new());
    Portal::assemble(config, channel, store)
}

async fn signed_up(backend: &Arc<MemoryBackend>, email: &str) -> (Portal, AuthUser) {
    let portal = portal_over(backend);
    let user = portal
        .auth
        .sign_up(email, "password123")
        .await
        .expect("sign-up should succeed");
    (portal, user)
}

async fn admin_portal(backend: &Arc<MemoryBackend>) -> (Portal, AuthUser) {
    let (portal, user) = signed_up(backend, "admin@example.com").await;
    backend.seed_role(user.id, Role::Admin);
    (portal, user)
}

// --- Test Data Helpers ---

fn draft_post(title: &str) -> NewPost {
    NewPost {
        title: title.to_string(),
        content: "Looking for feedback from people who have done this before.".to_string(),
        category: PostCategory::Qa,
        tags: vec!["advice".to_string()],
        images: Vec::new(),
    }
}

fn draft_talent(title: &str) -> NewTalentProfile {
    NewTalentProfile {
        title: title.to_string(),
        summary: "Five years of production backend work.".to_string(),
        skills: vec!["rust".to_string(), "postgres".to_string()],
        experience_years: 5,
        work_type: WorkType::Fulltime,
        remote_preference: RemotePreference::Remote,
        ..NewTalentProfile::default()
    }
}

// --- Forum Post Tests ---

#[tokio::test]
async fn test_post_create_then_get_round_trip() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, user) = signed_up(&backend, "author@example.com").await;

    let draft = NewPost {
        title: "From bootcamp to first offer".to_string(),
        content: "It took eleven months. Here is the full timeline.".to_string(),
        category: PostCategory::SuccessStory,
        tags: vec!["career".to_string(), "offers".to_string()],
        images: Vec::new(),
    };
    let id = portal.posts.create(&draft).await.unwrap();

    let post = portal.posts.get(id).await.unwrap();
    assert_eq!(post.id, id);
    assert_eq!(post.user_id, user.id);
    assert_eq!(post.title, draft.title);
    assert_eq!(post.content, draft.content);
    assert_eq!(post.category, PostCategory::SuccessStory);
    assert_eq!(post.tags, draft.tags);
    // Fresh posts start with authoritative zero counters, unpinned
    assert_eq!(post.likes_count, 0);
    assert_eq!(post.replies_count, 0);
    assert!(!post.is_pinned);
}

#[tokio::test]
async fn test_post_listing_orders_pinned_then_newest() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _user) = signed_up(&backend, "author@example.com").await;

    let first = portal.posts.create(&draft_post("first")).await.unwrap();
    let second = portal.posts.create(&draft_post("second")).await.unwrap();
    let third = portal.posts.create(&draft_post("third")).await.unwrap();

    let (staff, _admin) = admin_portal(&backend).await;
    staff.posts.set_pinned(second, true).await.unwrap();

    let listed: Vec<Uuid> = portal
        .posts
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(listed, vec![second, third, first]);
}

#[tokio::test]
async fn test_anonymous_visitors_read_but_cannot_write() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _user) = signed_up(&backend, "author@example.com").await;
    let post_id = portal.posts.create(&draft_post("public thread")).await.unwrap();
    portal.replies.create(post_id, "first reply").await.unwrap();

    // A visitor who never signed in sees the forum in full
    let visitor = portal_over(&backend);
    assert!(!visitor.auth.is_authenticated());
    assert_eq!(visitor.posts.list().await.unwrap().len(), 1);
    assert_eq!(visitor.posts.get(post_id).await.unwrap().title, "public thread");
    assert_eq!(visitor.replies.list_for_post(post_id).await.unwrap().len(), 1);

    // Every write path requires a session
    let err = visitor.posts.create(&draft_post("drive-by")).await.unwrap_err();
    assert!(matches!(err, PortalError::Unauthorized));
    let err = visitor.replies.create(post_id, "me too").await.unwrap_err();
    assert!(matches!(err, PortalError::Unauthorized));
    let err = visitor.likes.toggle(post_id).await.unwrap_err();
    assert!(matches!(err, PortalError::Unauthorized));

    // Nothing slipped through
    assert_eq!(visitor.posts.list().await.unwrap().len(), 1);
    assert_eq!(visitor.replies.list_for_post(post_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_owner_edits_own_post() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _user) = signed_up(&backend, "author@example.com").await;
    let id = portal.posts.create(&draft_post("draft title")).await.unwrap();

    let patch = PostPatch {
        title: Some("final title".to_string()),
        tags: Some(vec!["edited".to_string()]),
        ..PostPatch::default()
    };
    portal.posts.update(id, &patch).await.unwrap();

    let post = portal.posts.get(id).await.unwrap();
    assert_eq!(post.title, "final title");
    assert_eq!(post.tags, vec!["edited".to_string()]);
    // Untouched fields survive a partial update
    assert_eq!(post.category, PostCategory::Qa);

    // A patch with nothing in it is a no-op, not an error
    portal.posts.update(id, &PostPatch::default()).await.unwrap();
}

#[tokio::test]
async fn test_editing_someone_elses_post_is_forbidden() {
    let backend = Arc::new(MemoryBackend::new());
    let (owner, _) = signed_up(&backend, "owner@example.com").await;
    let id = owner.posts.create(&draft_post("mine")).await.unwrap();

    let (intruder, _) = signed_up(&backend, "other@example.com").await;
    let patch = PostPatch {
        title: Some("hijacked".to_string()),
        ..PostPatch::default()
    };
    let err = intruder.posts.update(id, &patch).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));

    assert_eq!(owner.posts.get(id).await.unwrap().title, "mine");
}

#[tokio::test]
async fn test_forbidden_delete_leaves_post_in_place() {
    let backend = Arc::new(MemoryBackend::new());
    let (owner, _) = signed_up(&backend, "owner@example.com").await;
    let id = owner.posts.create(&draft_post("still here")).await.unwrap();

    // A plain member cannot delete someone else's post
    let (member, _) = signed_up(&backend, "member@example.com").await;
    let err = member.posts.delete(id).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));
    assert!(owner.posts.get(id).await.is_ok());

    // Moderators moderate replies, not posts
    let (moderator, mod_user) = signed_up(&backend, "mod@example.com").await;
    backend.seed_role(mod_user.id, Role::Moderator);
    let err = moderator.posts.delete(id).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));
    assert!(owner.posts.get(id).await.is_ok());
}

#[tokio::test]
async fn test_admin_removes_foreign_post_with_its_thread() {
    let backend = Arc::new(MemoryBackend::new());
    let (owner, _) = signed_up(&backend, "owner@example.com").await;
    let id = owner.posts.create(&draft_post("spam")).await.unwrap();
    owner.replies.create(id, "bump").await.unwrap();

    let (staff, _) = admin_portal(&backend).await;
    staff.posts.delete(id).await.unwrap();

    let err = owner.posts.get(id).await.unwrap_err();
    assert!(matches!(err, PortalError::NotFound(_)));
    // The thread went with it
    assert!(owner.replies.list_for_post(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_updating_vanished_post_reports_not_found() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;
    let id = portal.posts.create(&draft_post("short-lived")).await.unwrap();
    portal.posts.delete(id).await.unwrap();

    let patch = PostPatch {
        title: Some("too late".to_string()),
        ..PostPatch::default()
    };
    let err = portal.posts.update(id, &patch).await.unwrap_err();
    assert!(matches!(err, PortalError::NotFound(_)));
}

#[tokio::test]
async fn test_pinning_requires_the_admin_role() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;
    let id = portal.posts.create(&draft_post("notice")).await.unwrap();

    let err = portal.posts.set_pinned(id, true).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));
    assert!(!portal.posts.get(id).await.unwrap().is_pinned);
}

#[tokio::test]
async fn test_board_filter_narrows_locally() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;

    portal.posts.create(&draft_post("question one")).await.unwrap();
    let mut story = draft_post("made it");
    story.category = PostCategory::SuccessStory;
    portal.posts.create(&story).await.unwrap();

    let filter = PostQuery {
        category: Some(PostCategory::SuccessStory),
        term: None,
    };
    let hits = portal.posts.list_matching(&filter).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "made it");

    let filter = PostQuery {
        category: Some(PostCategory::Qa),
        term: Some("question".to_string()),
    };
    assert_eq!(portal.posts.list_matching(&filter).await.unwrap().len(), 1);

    let filter = PostQuery {
        category: Some(PostCategory::Qa),
        term: Some("made it".to_string()),
    };
    assert!(portal.posts.list_matching(&filter).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_author_listing_and_recent_window() {
    let backend = Arc::new(MemoryBackend::new());
    let (alice, alice_user) = signed_up(&backend, "alice@example.com").await;
    let (bob, _) = signed_up(&backend, "bob@example.com").await;

    let a1 = alice.posts.create(&draft_post("alice one")).await.unwrap();
    let a2 = alice.posts.create(&draft_post("alice two")).await.unwrap();
    let b1 = bob.posts.create(&draft_post("bob one")).await.unwrap();

    // The my-page view shows only the author's posts, newest first
    let mine: Vec<Uuid> = alice
        .posts
        .list_by_author(alice_user.id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(mine, vec![a2, a1]);

    // The dashboard window is newest-across-authors, capped at the limit
    let latest: Vec<Uuid> = alice
        .posts
        .recent(2)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(latest, vec![b1, a2]);
}

// --- Reply Tests ---

#[tokio::test]
async fn test_reply_cycle_keeps_parent_counter_authoritative() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;
    let post_id = portal.posts.create(&draft_post("counting")).await.unwrap();

    let first = portal.replies.create(post_id, "first").await.unwrap();
    portal.replies.create(post_id, "second").await.unwrap();

    // The counter is whatever the backend says after re-fetching, never a local bump
    assert_eq!(portal.posts.get(post_id).await.unwrap().replies_count, 2);

    portal.replies.delete(first).await.unwrap();
    assert_eq!(portal.posts.get(post_id).await.unwrap().replies_count, 1);

    let thread = portal.replies.list_for_post(post_id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].content, "second");
}

#[tokio::test]
async fn test_reply_thread_reads_oldest_first() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;
    let post_id = portal.posts.create(&draft_post("thread")).await.unwrap();

    for content in ["one", "two", "three"] {
        portal.replies.create(post_id, content).await.unwrap();
    }

    let thread = portal.replies.list_for_post(post_id).await.unwrap();
    let contents: Vec<&str> = thread.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_blank_reply_rejected_before_submission() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;
    let post_id = portal.posts.create(&draft_post("thread")).await.unwrap();

    let err = portal.replies.create(post_id, "   ").await.unwrap_err();
    assert!(matches!(
        err,
        PortalError::Validation { field: "content", .. }
    ));
    assert_eq!(portal.posts.get(post_id).await.unwrap().replies_count, 0);
}

#[tokio::test]
async fn test_reply_to_vanished_post_reports_not_found() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;
    let post_id = portal.posts.create(&draft_post("gone soon")).await.unwrap();
    portal.posts.delete(post_id).await.unwrap();

    let err = portal.replies.create(post_id, "anyone?").await.unwrap_err();
    assert!(matches!(err, PortalError::NotFound("post")));
}

#[tokio::test]
async fn test_moderator_curates_replies_but_not_posts() {
    let backend = Arc::new(MemoryBackend::new());
    let (owner, _) = signed_up(&backend, "owner@example.com").await;
    let post_id = owner.posts.create(&draft_post("discussion")).await.unwrap();
    let reply_id = owner.replies.create(post_id, "off topic").await.unwrap();

    let (moderator, mod_user) = signed_up(&backend, "mod@example.com").await;
    backend.seed_role(mod_user.id, Role::Moderator);

    moderator.replies.delete(reply_id).await.unwrap();
    assert!(owner.replies.list_for_post(post_id).await.unwrap().is_empty());

    let err = moderator.posts.delete(post_id).await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));
}

#[tokio::test]
async fn test_reply_edits_follow_reply_rules() {
    let backend = Arc::new(MemoryBackend::new());
    let (owner, _) = signed_up(&backend, "owner@example.com").await;
    let post_id = owner.posts.create(&draft_post("editable")).await.unwrap();
    let reply_id = owner.replies.create(post_id, "draft wording").await.unwrap();

    owner.replies.update(reply_id, "final wording").await.unwrap();

    let (stranger, _) = signed_up(&backend, "stranger@example.com").await;
    let err = stranger.replies.update(reply_id, "vandalism").await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));

    // Moderators may clean up anyone's reply
    let (moderator, mod_user) = signed_up(&backend, "mod@example.com").await;
    backend.seed_role(mod_user.id, Role::Moderator);
    moderator.replies.update(reply_id, "[removed by staff]").await.unwrap();

    let thread = owner.replies.list_for_post(post_id).await.unwrap();
    assert_eq!(thread[0].content, "[removed by staff]");

    let err = owner.replies.update(reply_id, "   ").await.unwrap_err();
    assert!(matches!(
        err,
        PortalError::Validation { field: "content", .. }
    ));
}

#[tokio::test]
async fn test_counter_updates_reach_subscribers() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "author@example.com").await;
    let post_id = portal.posts.create(&draft_post("watched")).await.unwrap();

    let seen: Arc<Mutex<Vec<PostCounts>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    portal.aggregates.subscribe(move |counts| {
        sink.lock().unwrap().push(*counts);
    });

    portal.replies.create(post_id, "hello").await.unwrap();
    portal.likes.toggle(post_id).await.unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].post_id, post_id);
    assert_eq!(seen[0].replies_count, 1);
    assert_eq!(seen[1].likes_count, 1);
}

// --- Like Tests ---

#[tokio::test]
async fn test_like_toggle_flips_and_recounts() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, user) = signed_up(&backend, "author@example.com").await;
    let post_id = portal.posts.create(&draft_post("likeable")).await.unwrap();

    let change = portal.likes.toggle(post_id).await.unwrap();
    assert!(change.liked);
    assert_eq!(change.counts.likes_count, 1);
    assert!(portal.likes.has_liked(post_id, user.id).await.unwrap());

    // A second member's like stacks on top
    let (other, other_user) = signed_up(&backend, "other@example.com").await;
    let change = other.likes.toggle(post_id).await.unwrap();
    assert!(change.liked);
    assert_eq!(change.counts.likes_count, 2);

    // Toggling again withdraws only the caller's own like
    let change = other.likes.toggle(post_id).await.unwrap();
    assert!(!change.liked);
    assert_eq!(change.counts.likes_count, 1);
    assert!(!other.likes.has_liked(post_id, other_user.id).await.unwrap());
    assert_eq!(portal.posts.get(post_id).await.unwrap().likes_count, 1);
}

// --- Profile & Dashboard Tests ---

#[tokio::test]
async fn test_profile_update_and_activity_stats() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, user) = signed_up(&backend, "stats@example.com").await;

    portal
        .profiles
        .update(&ProfilePatch {
            display_name: Some("Sam R.".to_string()),
            avatar_url: None,
        })
        .await
        .unwrap();
    assert_eq!(
        portal.profiles.me().await.unwrap().display_name.as_deref(),
        Some("Sam R.")
    );

    let first = portal.posts.create(&draft_post("stats one")).await.unwrap();
    portal.posts.create(&draft_post("stats two")).await.unwrap();
    portal.replies.create(first, "following up").await.unwrap();

    let (fan, _) = signed_up(&backend, "fan@example.com").await;
    fan.likes.toggle(first).await.unwrap();

    let stats = portal.profiles.stats(user.id).await.unwrap();
    assert_eq!(stats.posts_count, 2);
    assert_eq!(stats.replies_count, 1);
    assert_eq!(stats.likes_received, 1);
}

#[tokio::test]
async fn test_profile_patch_validation_and_no_op() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "tidy@example.com").await;

    let err = portal
        .profiles
        .update(&ProfilePatch {
            display_name: Some("  ".to_string()),
            avatar_url: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PortalError::Validation { field: "display_name", .. }
    ));

    // All-None patches never reach the backend
    portal.profiles.update(&ProfilePatch::default()).await.unwrap();
}

#[tokio::test]
async fn test_dashboard_bundles_profile_and_applications() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "talent@example.com").await;

    let profile_id = portal.talents.register(&draft_talent("Backend Engineer")).await.unwrap();
    backend.seed_application(
        profile_id,
        "Northwind Analytics",
        "Senior Backend Engineer",
        ApplicationStatus::Reviewing,
    );

    let dashboard = portal.profiles.dashboard().await.unwrap();
    let talent = dashboard.talent_profile.expect("profile should be present");
    assert_eq!(talent.id, profile_id);
    assert_eq!(dashboard.applications.len(), 1);
    assert_eq!(dashboard.applications[0].company_name, "Northwind Analytics");
    assert_eq!(dashboard.applications[0].status, ApplicationStatus::Reviewing);
}

#[tokio::test]
async fn test_dashboard_requires_session_and_defaults_empty() {
    let backend = Arc::new(MemoryBackend::new());

    let visitor = portal_over(&backend);
    let err = visitor.profiles.dashboard().await.unwrap_err();
    assert!(matches!(err, PortalError::Unauthorized));

    // A signed-in user without a talent profile gets an empty dashboard
    let (portal, _) = signed_up(&backend, "new@example.com").await;
    let dashboard = portal.profiles.dashboard().await.unwrap();
    assert!(dashboard.talent_profile.is_none());
    assert!(dashboard.applications.is_empty());
}

// --- Admin Surface Tests ---

#[tokio::test]
async fn test_admin_views_gated_by_role() {
    let backend = Arc::new(MemoryBackend::new());
    let (portal, _) = signed_up(&backend, "member@example.com").await;

    let err = portal.profiles.admin_overview().await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));
    let err = portal.profiles.list_all().await.unwrap_err();
    assert!(matches!(err, PortalError::Forbidden));
}

#[tokio::test]
async fn test_admin_overview_counts_portal_activity() {
    let backend = Arc::new(MemoryBackend::new());
    let (member, member_user) = signed_up(&backend, "member@example.com").await;
    member.posts.create(&draft_post("hello")).await.unwrap();

    let (staff, admin_user) = admin_portal(&backend).await;
    let overview = staff.profiles.admin_overview().await.unwrap();
    assert_eq!(overview.total_users, 2);
    assert_eq!(overview.total_posts, 1);
    assert_eq!(overview.total_admins, 1);

    let members = staff.profiles.list_with_roles().await.unwrap();
    assert_eq!(members.len(), 2);
    let role_of = |id: Uuid| {
        members
            .iter()
            .find(|m| m.profile.id == id)
            .map(|m| m.role)
            .unwrap()
    };
    assert_eq!(role_of(admin_user.id), Role::Admin);
    assert_eq!(role_of(member_user.id), Role::User);
}

// --- Job Board Tests ---

#[tokio::test]
async fn test_job_board_ships_with_catalog() {
    let backend = Arc::new(MemoryBackend::new());
    let portal = portal_over(&backend);

    let jobs = portal.jobs.list();
    assert!(!jobs.is_empty());
    // Newest postings first
    for pair in jobs.windows(2) {
        assert!(pair[0].posted_at >= pair[1].posted_at);
    }

    let first = &jobs[0];
    assert_eq!(portal.jobs.get(first.id).unwrap().id, first.id);
    let err = portal.jobs.get(Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, PortalError::NotFound("job")));

    // Search scans titles, companies and tags; a blank term means no constraint
    let hits = portal.jobs.search(&first.company);
    assert!(hits.iter().any(|job| job.id == first.id));
    assert_eq!(portal.jobs.search("  ").len(), jobs.len());
    assert!(portal.jobs.search("zzz-no-such-term").is_empty());
}
