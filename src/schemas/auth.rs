use serde::Serialize;

use crate::schemas::user::UserResponse;

/// Returned by signup and login.
#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: &'static str,
    /// Seconds until `access_token` expires.
    pub(crate) expires_in: u64,
    pub(crate) user: UserResponse,
}
