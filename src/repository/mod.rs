//! Typed CRUD and search over the backend, one repository per entity kind.
//!
//! Every repository parses backend payloads into the `models` schemas at this
//! boundary, so nothing above it ever handles untyped JSON. Reads are public where
//! the page is public; mutations require a session, pre-check ownership through the
//! capability rules, and leave the backend to enforce the same rules authoritatively.

mod jobs;
mod likes;
mod posts;
mod profiles;
mod replies;
mod talents;

pub use jobs::JobRepository;
pub use likes::LikeRepository;
pub use posts::PostRepository;
pub use profiles::ProfileRepository;
pub use replies::ReplyRepository;
pub use talents::TalentRepository;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{PortalError, Result};

/// Extracts the generated id from a stored representation.
pub(crate) fn row_id(row: &Value) -> Result<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
        .ok_or(PortalError::Backend {
            status: 500,
            message: "stored row carried no id".to_string(),
        })
}

/// Parses one backend row into its typed record.
pub(crate) fn parse_row<T: DeserializeOwned>(row: Value) -> Result<T> {
    Ok(serde_json::from_value(row)?)
}

/// Parses a whole result set, failing on the first malformed row.
pub(crate) fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter().map(parse_row).collect()
}

/// A patch whose optional fields were all absent serializes to `{}`; sending that to
/// the backend is a wasted (and rejected) request.
pub(crate) fn is_empty_patch(patch: &Value) -> bool {
    patch.as_object().is_some_and(|fields| fields.is_empty())
}
