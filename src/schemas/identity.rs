use serde::{Deserialize, Serialize};
use validator::Validate;

/// Identifying information a student supplies on the entry screen. The PIN
/// is only present for quizzes that require one.
#[derive(Debug, Clone, Serialize, Validate)]
pub(crate) struct RegistrationRequest {
    #[validate(length(min = 1, message = "first_name must not be empty"))]
    pub(crate) first_name: String,
    #[validate(length(min = 1, message = "last_name must not be empty"))]
    pub(crate) last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) pin: Option<String>,
}

impl RegistrationRequest {
    pub(crate) fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StudentIdentity {
    pub(crate) id: String,
    pub(crate) display_name: String,
}
