use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Returned for every successful username recovery request, whether or not an account exists
pub const FORGOT_USERNAME_MESSAGE: &str = "If an account with that email exists, we've sent the username to it.";

/// Username recovery request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ForgotUsernameRequest {
    /// Email address the account was registered with
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ForgotUsernameResponse {
    pub message: String,
}

impl ForgotUsernameResponse {
    pub fn generic() -> Self {
        Self {
            message: FORGOT_USERNAME_MESSAGE.to_string(),
        }
    }
}
