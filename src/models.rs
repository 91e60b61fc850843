use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{PortalError, Result};

// Client-side submission limits. The backend is authoritative, but these are checked
// before any network call so violations surface as inline `Validation` errors.
pub const MAX_TITLE_LEN: usize = 100;
pub const MAX_CONTENT_LEN: usize = 5000;
pub const MAX_TAGS: usize = 5;
pub const MAX_TAG_LEN: usize = 20;

// --- Core Application Schemas (Mapped to Backend Collections) ---

/// Role
///
/// The authorization tier associated 1:1 with a user, resolved on demand through the
/// `get_user_role` procedure. Advisory on the client: it gates what the UI offers, while
/// the backend re-checks every privileged mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

/// Profile
///
/// The user's canonical identity record in the backend's `profiles` collection. A row is
/// materialized by the backend for every new auth user; it is edited from the profile
/// page and never hard-deleted in this scope.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct Profile {
    // Primary key, shared with the external auth service's user id.
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// PostCategory
///
/// Forum board taxonomy. `general` is the write-form default; the others are the
/// filterable boards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PostCategory {
    #[default]
    General,
    Notice,
    Qa,
    SuccessStory,
    Networking,
}

/// Post
///
/// A forum post from the `posts` collection. `likes_count` and `replies_count` are
/// derived server-side from the join collections and must never be incremented locally;
/// after any mutation that can move them they are re-read through the recalculator.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    // FK to profiles.id (owner).
    pub user_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub tags: Vec<String>,
    // Public URLs of images uploaded before the post was submitted.
    #[serde(default)]
    pub images: Vec<String>,
    // Admin moderation flag; pinned posts sort above everything else.
    pub is_pinned: bool,
    pub likes_count: i64,
    pub replies_count: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Reply
///
/// A threaded reply from the `post_replies` collection. Threads render chronologically
/// (created-asc). The parent post must exist; the backend cascades deletes.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct Reply {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Like
///
/// A single vote record in the `post_likes` collection. Presence toggles: the pair
/// (user_id, post_id) either exists or it does not, and `Post.likes_count` is derived
/// from these rows server-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct Like {
    pub user_id: Uuid,
    pub post_id: Uuid,
}

/// WorkType
///
/// Employment arrangement on talent profiles and job postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum WorkType {
    #[default]
    Fulltime,
    Parttime,
    Contract,
    Freelance,
}

/// RemotePreference
///
/// Where the talent is willing to work from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RemotePreference {
    #[default]
    Onsite,
    Hybrid,
    Remote,
}

/// ApprovalStatus
///
/// Moderation state of a talent profile. Only `approved` rows are visible in the public
/// pool; owners always see their own row on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

/// TalentProfile
///
/// A marketplace profile from the `talent_profiles` collection. Search results come back
/// enriched with the owner's display name and avatar (a join performed by the search
/// procedure), hence the defaulted trailing fields.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct TalentProfile {
    pub id: Uuid,
    // FK to profiles.id (owner).
    pub user_id: Uuid,
    pub title: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub experience_years: i32,
    pub education: Option<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    pub portfolio_url: Option<String>,
    pub location: Option<String>,
    pub salary_expectation_min: Option<i64>,
    pub salary_expectation_max: Option<i64>,
    pub work_type: WorkType,
    pub remote_preference: RemotePreference,
    #[serde(default)]
    pub status: ApprovalStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Loaded via the search procedure's join against profiles.
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// ApplicationStatus
///
/// Pipeline stage of an application attached to a talent profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ApplicationStatus {
    #[default]
    Applied,
    Reviewing,
    Interviewed,
    Offered,
    Rejected,
}

/// TalentApplication
///
/// Read-only in this layer: rows arrive through the dashboard aggregation procedure and
/// are rendered on the my-page view.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct TalentApplication {
    pub id: Uuid,
    pub company_name: String,
    pub position: String,
    pub status: ApplicationStatus,
    #[ts(type = "string")]
    pub applied_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// JobPosting
///
/// A job-board entry. Read-mostly: the board ships as a bundled catalog with no backend
/// endpoint, so these rows never round-trip.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct JobPosting {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    // Short monogram rendered where a real logo would go.
    pub company_logo: String,
    pub location: String,
    pub work_type: WorkType,
    pub remote: bool,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    #[ts(type = "string")]
    pub posted_at: DateTime<Utc>,
    pub description: String,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    pub tags: Vec<String>,
}

// --- Request Payloads (Input Schemas) ---

/// NewPost
///
/// Input payload for submitting a forum post. Image URLs are provided here after the
/// client completes the storage uploads; a failed upload simply leaves the list short.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    pub tags: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewPost {
    /// Checks the documented submission limits before anything leaves the process.
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)?;
        validate_content(&self.content)?;
        validate_tags(&self.tags)
    }
}

/// PostPatch
///
/// Partial update payload for editing an existing post. Uses `Option<T>` with
/// `skip_serializing_if` so only the provided fields are included in the outgoing JSON.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct PostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<PostCategory>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl PostPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        if let Some(tags) = &self.tags {
            validate_tags(tags)?;
        }
        Ok(())
    }
}

/// NewTalentProfile
///
/// Input payload for the `create_talent_profile` procedure. The new row always starts in
/// `pending` status regardless of what the caller might claim.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct NewTalentProfile {
    pub title: String,
    pub summary: String,
    pub skills: Vec<String>,
    pub experience_years: i32,
    pub education: Option<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    pub portfolio_url: Option<String>,
    pub location: Option<String>,
    pub salary_expectation_min: Option<i64>,
    pub salary_expectation_max: Option<i64>,
    pub work_type: WorkType,
    pub remote_preference: RemotePreference,
}

impl NewTalentProfile {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(PortalError::validation("title", "must not be empty"));
        }
        if self.summary.trim().is_empty() {
            return Err(PortalError::validation("summary", "must not be empty"));
        }
        if self.skills.iter().all(|s| s.trim().is_empty()) {
            return Err(PortalError::validation(
                "skills",
                "at least one skill is required",
            ));
        }
        if self.experience_years < 0 {
            return Err(PortalError::validation(
                "experience_years",
                "must not be negative",
            ));
        }
        if let (Some(min), Some(max)) = (self.salary_expectation_min, self.salary_expectation_max)
        {
            if min > max {
                return Err(PortalError::validation(
                    "salary_expectation_min",
                    "must not exceed the maximum",
                ));
            }
        }
        Ok(())
    }
}

/// TalentPatch
///
/// Partial update payload for an existing talent profile (owner-only).
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct TalentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub certifications: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub portfolio_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_expectation_min: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_expectation_max: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_type: Option<WorkType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_preference: Option<RemotePreference>,
}

impl TalentPatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(PortalError::validation("title", "must not be empty"));
            }
        }
        if let Some(skills) = &self.skills {
            if skills.iter().all(|s| s.trim().is_empty()) {
                return Err(PortalError::validation(
                    "skills",
                    "at least one skill is required",
                ));
            }
        }
        if let Some(years) = self.experience_years {
            if years < 0 {
                return Err(PortalError::validation(
                    "experience_years",
                    "must not be negative",
                ));
            }
        }
        Ok(())
    }
}

/// ProfilePatch
///
/// Partial update payload for the caller's own profile row.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.display_name {
            if name.trim().is_empty() {
                return Err(PortalError::validation("display_name", "must not be empty"));
            }
        }
        Ok(())
    }
}

// --- Search & Filter Schemas ---

/// TalentFilter
///
/// The composed talent-pool search. Absent fields impose no constraint; supplied fields
/// all AND together server-side. Skills are match-any. Experience bounds are inclusive.
/// The whole filter travels in a single `search_talents` call, never resolved by pulling
/// all rows client-side.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TalentFilter {
    pub term: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience_min: Option<i32>,
    pub experience_max: Option<i32>,
    pub work_type: Option<WorkType>,
    pub remote_preference: Option<RemotePreference>,
    pub location: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for TalentFilter {
    fn default() -> Self {
        Self {
            term: None,
            skills: None,
            experience_min: None,
            experience_max: None,
            work_type: None,
            remote_preference: None,
            location: None,
            limit: 50,
            offset: 0,
        }
    }
}

/// PostQuery
///
/// The forum page's local filter state. Post lists are fetched whole (ordering is fixed
/// server-side) and narrowed client-side, so this is a pure matcher rather than a wire
/// filter.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct PostQuery {
    pub category: Option<PostCategory>,
    pub term: Option<String>,
}

impl PostQuery {
    /// Case-insensitive free-text match over title, content and tags, combined with an
    /// exact category match when one is selected.
    pub fn matches(&self, post: &Post) -> bool {
        if let Some(category) = self.category {
            if post.category != category {
                return false;
            }
        }
        match self.term.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let needle = term.to_lowercase();
                post.title.to_lowercase().contains(&needle)
                    || post.content.to_lowercase().contains(&needle)
                    || post
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle))
            }
        }
    }
}

// --- Aggregate & Dashboard Schemas (Output) ---

/// PostCounts
///
/// The authoritative counters of one post, as re-read from the backend after a mutation.
/// This is the only shape count updates travel in; no view receives a locally
/// incremented number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct PostCounts {
    pub post_id: Uuid,
    pub likes_count: i64,
    pub replies_count: i64,
}

/// LikeChange
///
/// Outcome of a like toggle: whether the caller now likes the post, plus the fresh
/// counters fetched after the flip.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct LikeChange {
    pub liked: bool,
    pub counts: PostCounts,
}

/// UserStats
///
/// Activity counters shown on the profile page, each an exact server-side count.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct UserStats {
    pub posts_count: i64,
    pub replies_count: i64,
    pub likes_received: i64,
}

/// AdminStats
///
/// Output schema for the administrative dashboard header.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_posts: i64,
    pub total_admins: i64,
}

/// Member
///
/// One row of the admin dashboard's user table: the profile enriched with its resolved
/// role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct Member {
    pub profile: Profile,
    pub role: Role,
}

/// DashboardData
///
/// Result of the `get_user_dashboard_data` procedure: the caller's talent profile (if
/// any) and the applications attached to it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub struct DashboardData {
    pub talent_profile: Option<TalentProfile>,
    #[serde(default)]
    pub applications: Vec<TalentApplication>,
}

/// FileOutcome
///
/// What happened to one optional file during talent registration. Registration is a
/// sequence of independently-failable calls; a failed upload never rolls back the
/// profile row, it is reported here instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(export)]
pub enum FileOutcome {
    #[default]
    Skipped,
    Stored(String),
    Failed(String),
}

/// FileUpload
///
/// One file handed over by a form: the original name, the raw bytes and the claimed
/// MIME type. Validation happens in the upload layer, not here.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// TalentRegistration
///
/// Outcome of `register_with_files`: the created profile id plus the per-file results.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TalentRegistration {
    pub profile_id: Uuid,
    pub resume: FileOutcome,
    pub portfolio: FileOutcome,
}

// --- Validation Helpers ---

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(PortalError::validation("title", "must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(PortalError::validation(
            "title",
            format!("must be at most {MAX_TITLE_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(PortalError::validation("content", "must not be empty"));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(PortalError::validation(
            "content",
            format!("must be at most {MAX_CONTENT_LEN} characters"),
        ));
    }
    Ok(())
}

fn validate_tags(tags: &[String]) -> Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(PortalError::validation(
            "tags",
            format!("at most {MAX_TAGS} tags are allowed"),
        ));
    }
    for tag in tags {
        if tag.trim().is_empty() {
            return Err(PortalError::validation("tags", "tags must not be empty"));
        }
        if tag.chars().count() > MAX_TAG_LEN {
            return Err(PortalError::validation(
                "tags",
                format!("each tag must be at most {MAX_TAG_LEN} characters"),
            ));
        }
    }
    Ok(())
}
