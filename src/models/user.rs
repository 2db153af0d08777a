//! User identity model shared by the API and the client cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "guest")]
    Trekker,
    Admin,
}

/// Where the account's credentials live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Local,
    Google,
}

/// Committed user profile, owned by the server of record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Set once through the verified set-mobile flow, never edited afterwards.
    pub mobile: Option<String>,
    pub role: Role,
    #[serde(rename = "isBlocked")]
    pub blocked: bool,
    pub provider: AuthProvider,
    pub created_at: DateTime<Utc>,
}

impl UserIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Body of `PUT update-profile`: the full draft, not a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub mobile: Option<String>,
}

/// Returns true for exactly ten ASCII digits.
pub fn is_valid_mobile(value: &str) -> bool {
    value.len() == 10 && value.bytes().all(|b| b.is_ascii_digit())
}

/// Normalize an email address for comparison and indexing.
pub fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}
