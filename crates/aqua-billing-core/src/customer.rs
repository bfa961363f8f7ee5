//! Customer directory entries.
//!
//! Profiles are populated out-of-band (account management lives in Zero-ID);
//! billing only reads them, mainly to build gateway customer details.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// A customer directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProfile {
    /// The user ID (from Zero-ID).
    pub user_id: UserId,

    /// Full name as shown on the gateway payment page.
    pub full_name: String,

    /// Contact email, if known.
    pub email: Option<String>,

    /// Contact phone number, if known.
    pub phone: Option<String>,

    /// When the profile was created.
    pub created_at: DateTime<Utc>,

    /// When the profile was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CustomerProfile {
    /// Create a new profile.
    #[must_use]
    pub fn new(user_id: UserId, full_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            full_name: full_name.into(),
            email: None,
            phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the contact email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the contact phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}
