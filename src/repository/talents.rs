use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthState;
use crate::backend::{BackendState, ListQuery, SortDir};
use crate::error::{PortalError, Result};
use crate::models::{
    ApprovalStatus, FileOutcome, FileUpload, NewTalentProfile, TalentFilter, TalentPatch,
    TalentProfile, TalentRegistration,
};
use crate::roles::{Action, RoleState, allows};
use crate::storage::{UploadKind, Uploader};

use super::{is_empty_patch, parse_row, parse_rows};

/// TalentRepository
///
/// The talent pool. Search goes through the `search_talents` procedure so the whole
/// filter composition travels as one request; registration goes through
/// `create_talent_profile`, which derives the owner from the caller's token and
/// stores the row as `pending` until an admin approves it.
#[derive(Clone)]
pub struct TalentRepository {
    backend: BackendState,
    session: AuthState,
    roles: RoleState,
    uploader: Uploader,
}

impl TalentRepository {
    pub fn new(
        backend: BackendState,
        session: AuthState,
        roles: RoleState,
        uploader: Uploader,
    ) -> Self {
        Self {
            backend,
            session,
            roles,
            uploader,
        }
    }

    // --- Search & Reads ---

    /// search
    ///
    /// Filtered pool search. Every supplied constraint ANDs with the others; an
    /// absent field is no constraint at all. Skills match any-of, experience bounds
    /// are inclusive, location is a substring match. Only approved profiles are
    /// returned. Public read.
    pub async fn search(&self, filter: &TalentFilter) -> Result<Vec<TalentProfile>> {
        let args = json!({
            "_search_term": filter.term,
            "_skills": filter.skills,
            "_experience_min": filter.experience_min,
            "_experience_max": filter.experience_max,
            "_work_type": filter.work_type,
            "_remote_preference": filter.remote_preference,
            "_location": filter.location,
            "_limit": filter.limit,
            "_offset": filter.offset,
        });
        let value = self
            .backend
            .rpc(self.token().as_deref(), "search_talents", &args)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// get
    ///
    /// One profile by id, or `NotFound`. Visibility of unapproved rows is the
    /// backend's call.
    pub async fn get(&self, id: Uuid) -> Result<TalentProfile> {
        let row = self
            .backend
            .get(self.token().as_deref(), "talent_profiles", id)
            .await?
            .ok_or(PortalError::NotFound("talent profile"))?;
        parse_row(row)
    }

    /// mine
    ///
    /// The caller's own latest profile regardless of approval status, or `None` when
    /// the caller has not registered.
    pub async fn mine(&self) -> Result<Option<TalentProfile>> {
        let user = self.session.require_user()?;
        let query = ListQuery::new()
            .eq("user_id", user.id)
            .order_by("created_at", SortDir::Desc)
            .limit(1);
        let rows = self
            .backend
            .select(self.token().as_deref(), "talent_profiles", &query)
            .await?;
        parse_rows::<TalentProfile>(rows).map(|mut profiles| profiles.pop())
    }

    // --- Registration ---

    /// register
    ///
    /// Creates the caller's profile through the backend procedure and returns the
    /// new id. The draft is validated before any network call.
    pub async fn register(&self, draft: &NewTalentProfile) -> Result<Uuid> {
        draft.validate()?;
        self.session.require_user()?;
        let args = serde_json::to_value(draft)?;
        let value = self
            .backend
            .rpc(self.token().as_deref(), "create_talent_profile", &args)
            .await?;
        value
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or(PortalError::Backend {
                status: 500,
                message: "registration returned no id".to_string(),
            })
    }

    /// register_with_files
    ///
    /// The full registration flow: create the profile, then the optional resume
    /// (uploaded and recorded in `talent_resumes`), then the optional portfolio
    /// (uploaded and patched onto the profile). The three steps are sequential and
    /// independently failable; a later failure leaves the earlier results in place
    /// and is reported per file, never rolled back.
    pub async fn register_with_files(
        &self,
        draft: &NewTalentProfile,
        resume: Option<FileUpload>,
        portfolio: Option<FileUpload>,
    ) -> Result<TalentRegistration> {
        let profile_id = self.register(draft).await?;
        let resume = match resume {
            None => FileOutcome::Skipped,
            Some(file) => match self.store_resume(profile_id, file).await {
                Ok(url) => FileOutcome::Stored(url),
                Err(e) => {
                    tracing::warn!(error = %e, %profile_id, "Resume step failed after profile creation");
                    FileOutcome::Failed(e.to_string())
                }
            },
        };
        let portfolio = match portfolio {
            None => FileOutcome::Skipped,
            Some(file) => match self.store_portfolio(profile_id, file).await {
                Ok(url) => FileOutcome::Stored(url),
                Err(e) => {
                    tracing::warn!(error = %e, %profile_id, "Portfolio step failed after profile creation");
                    FileOutcome::Failed(e.to_string())
                }
            },
        };
        Ok(TalentRegistration {
            profile_id,
            resume,
            portfolio,
        })
    }

    /// attach_resume
    ///
    /// Records an already-uploaded resume against a profile.
    pub async fn attach_resume(
        &self,
        profile_id: Uuid,
        url: &str,
        text: Option<&str>,
    ) -> Result<()> {
        self.session.require_user()?;
        let row = json!({
            "talent_profile_id": profile_id,
            "resume_file_url": url,
            "resume_text": text,
        });
        self.backend
            .insert(self.token().as_deref(), "talent_resumes", &row)
            .await?;
        Ok(())
    }

    // --- Mutations ---

    /// update
    ///
    /// **Owner-Only** edit of a profile; edits put no status change through, so an
    /// approved profile stays approved.
    pub async fn update(&self, id: Uuid, patch: &TalentPatch) -> Result<()> {
        patch.validate()?;
        let user = self.session.require_user()?;
        let current = self.get(id).await?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::EditTalent, role, user.id, current.user_id) {
            return Err(PortalError::Forbidden);
        }
        let patch_value = serde_json::to_value(patch)?;
        if is_empty_patch(&patch_value) {
            return Ok(());
        }
        let query = ListQuery::new().eq("id", id).eq("user_id", user.id);
        let touched = self
            .backend
            .update(
                self.token().as_deref(),
                "talent_profiles",
                &query,
                &patch_value,
            )
            .await?;
        if touched == 0 {
            return Err(PortalError::NotFound("talent profile"));
        }
        Ok(())
    }

    /// set_status
    ///
    /// **Admin** moderation of the approval pipeline.
    pub async fn set_status(&self, id: Uuid, status: ApprovalStatus) -> Result<()> {
        let user = self.session.require_user()?;
        let role = self.roles.resolve(user.id).await;
        if !allows(Action::ModerateTalent, role, user.id, user.id) {
            return Err(PortalError::Forbidden);
        }
        let query = ListQuery::new().eq("id", id);
        let touched = self
            .backend
            .update(
                self.token().as_deref(),
                "talent_profiles",
                &query,
                &json!({ "status": status }),
            )
            .await?;
        if touched == 0 {
            return Err(PortalError::NotFound("talent profile"));
        }
        Ok(())
    }

    async fn store_resume(&self, profile_id: Uuid, file: FileUpload) -> Result<String> {
        let url = self
            .uploader
            .upload(
                UploadKind::Resume,
                &file.filename,
                file.bytes,
                &file.content_type,
            )
            .await?;
        self.attach_resume(profile_id, &url, None).await?;
        Ok(url)
    }

    async fn store_portfolio(&self, profile_id: Uuid, file: FileUpload) -> Result<String> {
        let user = self.session.require_user()?;
        let url = self
            .uploader
            .upload(
                UploadKind::Portfolio,
                &file.filename,
                file.bytes,
                &file.content_type,
            )
            .await?;
        let query = ListQuery::new().eq("id", profile_id).eq("user_id", user.id);
        let touched = self
            .backend
            .update(
                self.token().as_deref(),
                "talent_profiles",
                &query,
                &json!({ "portfolio_url": url }),
            )
            .await?;
        if touched == 0 {
            return Err(PortalError::NotFound("talent profile"));
        }
        Ok(url)
    }

    fn token(&self) -> Option<String> {
        self.session.access_token()
    }
}
