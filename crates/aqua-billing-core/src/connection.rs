//! Connection (installation) requests.
//!
//! New connections carry a one-off installation fee, paid through the same
//! gateway flow as bills but with no effect on any meter ledger. The
//! surrounding survey/technician workflow lives in other services; billing
//! only tracks the fee.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ConnectionRequestId, UserId};

/// A connection request awaiting (or having completed) fee payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    /// The request ID.
    pub id: ConnectionRequestId,

    /// The requesting customer.
    pub user_id: UserId,

    /// Installation fee in rupiah.
    pub total_cost: i64,

    /// Whether the fee has been paid.
    pub is_paid: bool,

    /// When the fee was paid.
    pub paid_at: Option<DateTime<Utc>>,

    /// Free-form operator notes.
    pub notes: Option<String>,

    /// When the request was created.
    pub created_at: DateTime<Utc>,

    /// When the request was last updated.
    pub updated_at: DateTime<Utc>,
}

impl ConnectionRequest {
    /// Create a new unpaid connection request.
    #[must_use]
    pub fn new(user_id: UserId, total_cost: i64) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionRequestId::generate(),
            user_id,
            total_cost,
            is_paid: false,
            paid_at: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record fee payment.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) {
        self.is_paid = true;
        self.paid_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_paid_sets_the_paid_fields() {
        let mut request = ConnectionRequest::new(UserId::generate(), 250_000);
        assert!(!request.is_paid);

        let now = Utc::now();
        request.mark_paid(now);

        assert!(request.is_paid);
        assert_eq!(request.paid_at, Some(now));
    }
}
