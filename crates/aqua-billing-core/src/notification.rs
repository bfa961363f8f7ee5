//! Persisted customer notifications.
//!
//! Billing operations fan out notification records (new bill, payment
//! outcome, overdue warning, due-soon reminder). Delivery to devices is
//! another service's job; this log is what it reads, and what the reminder
//! sweep consults to avoid paging a customer twice on the same day.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{NotificationId, UserId};

/// Category of a notification, used for client-side grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    /// New bill issued.
    Billing,

    /// Payment outcome (success, pending, failure).
    Payment,

    /// Overdue or due-soon warning.
    Warning,

    /// Anything else.
    Info,
}

/// A persisted notification record.
///
/// IDs are ULIDs, so per-user logs are naturally ordered by creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// The notification ID (time-ordered).
    pub id: NotificationId,

    /// The customer notified.
    pub user_id: UserId,

    /// Short headline.
    pub title: String,

    /// Body text.
    pub message: String,

    /// Category for grouping.
    pub category: NotificationCategory,

    /// Deep link into the frontend (e.g. a bill detail page).
    pub link: Option<String>,

    /// When the notification was written.
    pub created_at: DateTime<Utc>,
}

impl NotificationRecord {
    /// Create a new notification.
    #[must_use]
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        category: NotificationCategory,
        link: Option<String>,
    ) -> Self {
        Self {
            id: NotificationId::generate(),
            user_id,
            title: title.into(),
            message: message.into(),
            category,
            link,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_by_creation_time() {
        let user_id = UserId::generate();
        let first = NotificationRecord::new(user_id, "a", "a", NotificationCategory::Info, None);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = NotificationRecord::new(user_id, "b", "b", NotificationCategory::Info, None);
        assert!(first.id.to_bytes() < second.id.to_bytes());
    }
}
