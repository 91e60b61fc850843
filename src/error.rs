use thiserror::Error;

/// PortalError
///
/// The single error taxonomy surfaced by every operation in this crate. Pages match on
/// these variants to decide what to render: validation failures are shown inline next
/// to the offending field, authorization failures redirect or hide controls, and
/// transport failures become a transient notification. Nothing in this layer retries;
/// a failed operation is abandoned until the user re-triggers it.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Rejected client-side before any network call. `field` names the offending input.
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: String,
    },

    /// The operation requires a signed-in caller and none is present.
    #[error("sign-in required")]
    Unauthorized,

    /// A session exists but its role/ownership does not permit the operation.
    #[error("not permitted for this account")]
    Forbidden,

    /// The requested record does not exist (or is not visible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// File rejected before or during upload.
    #[error("upload rejected: {0}")]
    Upload(String),

    /// Sign-in failed: the backend did not accept the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Sign-up failed: the email already has an account.
    #[error("email is already registered")]
    EmailTaken,

    /// Sign-up failed: the password does not meet the backend's minimum policy.
    #[error("password does not meet the minimum requirements")]
    WeakPassword,

    /// The backend answered with a status this layer has no mapping for.
    #[error("backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Network/transport failure: the backend could not be reached at all.
    #[error("backend unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    /// The backend's payload did not match the expected schema for the entity.
    #[error("malformed backend payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl PortalError {
    /// Shorthand for the inline-validation case.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Result
///
/// Crate-wide result alias; every fallible operation in the public surface returns it.
pub type Result<T, E = PortalError> = std::result::Result<T, E>;
