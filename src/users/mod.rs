//! User records and the OAuth linkage stored on them.
//!
//! A user is **Unlinked** while `google_refresh_token` is `None` and **Linked**
//! once a code exchange has produced a refresh token. Only
//! [`UserStore::set_refresh_token`] moves a user to Linked.

mod encryption;
mod store;

pub use store::UserStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored user, including the decrypted refresh token.
///
/// Never serialize this to clients; use [`UserProfile`].
#[derive(Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// Google OAuth refresh token (None = account not linked)
    pub google_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn is_linked(&self) -> bool {
        self.google_refresh_token.is_some()
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("linked", &self.is_linked())
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Public profile view returned by `/profile/:id`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub google_linked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&UserRecord> for UserProfile {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            email: record.email.clone(),
            display_name: record.display_name.clone(),
            google_linked: record.is_linked(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Profile fields a client may set. `None` leaves the stored value alone.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.display_name.is_none()
    }
}
