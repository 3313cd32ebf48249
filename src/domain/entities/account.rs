use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::payment::UserType;

/// A user or company account. Email is the natural key for guest-to-account
/// resolution and is stored lowercased and trimmed.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub user_type: UserType,
    /// sha256 hex digest of the credential; never the credential itself.
    #[serde(skip_serializing)]
    pub credential_digest: String,
    /// False for accounts created by the provisioner until the owner
    /// completes onboarding.
    pub profile_complete: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Normalize an email for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(normalize_email("  A@B.Com "), "a@b.com");
        assert_eq!(normalize_email("user@example.com"), "user@example.com");
    }
}
