//! Payment references, gateway statuses, and payment sessions.
//!
//! The payment gateway correlates everything through a flat `order_id`
//! string. [`PaymentReference`] is the single place that string is encoded
//! and decoded; nothing else in the system inspects reference prefixes. The
//! wire forms are an external protocol shared with the gateway dashboard and
//! the frontend, bit-exact:
//!
//! - `BILLING-{bill_id}` for a single bill
//! - `BILLING-MULTI-{user_id}-{timestamp_ms}` for all of a user's unpaid bills
//! - `RAB-{request_id}-{timestamp_ms}` for a connection (installation) fee,
//!   with a legacy form lacking the timestamp suffix

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{BillId, ConnectionRequestId, UserId};

const MULTI_PREFIX: &str = "BILLING-MULTI-";
const SINGLE_PREFIX: &str = "BILLING-";
const CONNECTION_PREFIX: &str = "RAB-";

/// Canonical UUID text form is fixed-width; used to split embedded ids from
/// trailing timestamp suffixes.
const UUID_STR_LEN: usize = 36;

// ============================================================================
// Payment references
// ============================================================================

/// The decoded form of a gateway `order_id`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PaymentReference {
    /// Payment for a single bill.
    Bill(BillId),

    /// Aggregate payment for all of a user's unpaid bills at issue time.
    MultiBill {
        /// The paying customer.
        user_id: UserId,
        /// Unix milliseconds at session creation, making the reference unique
        /// per attempt.
        issued_at_ms: i64,
    },

    /// Payment of a connection (installation) fee. No ledger effect.
    ConnectionFee {
        /// The connection request being paid for.
        request_id: ConnectionRequestId,
        /// Unix milliseconds at session creation. `None` for legacy
        /// references that predate the suffix.
        issued_at_ms: Option<i64>,
    },
}

impl PaymentReference {
    /// Reference for a single-bill payment.
    #[must_use]
    pub const fn bill(bill_id: BillId) -> Self {
        Self::Bill(bill_id)
    }

    /// Reference for an aggregate payment issued at `issued_at`.
    #[must_use]
    pub fn multi_bill(user_id: UserId, issued_at: DateTime<Utc>) -> Self {
        Self::MultiBill {
            user_id,
            issued_at_ms: issued_at.timestamp_millis(),
        }
    }

    /// Reference for a connection-fee payment issued at `issued_at`.
    #[must_use]
    pub fn connection_fee(request_id: ConnectionRequestId, issued_at: DateTime<Utc>) -> Self {
        Self::ConnectionFee {
            request_id,
            issued_at_ms: Some(issued_at.timestamp_millis()),
        }
    }
}

impl fmt::Display for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bill(bill_id) => write!(f, "{SINGLE_PREFIX}{bill_id}"),
            Self::MultiBill {
                user_id,
                issued_at_ms,
            } => write!(f, "{MULTI_PREFIX}{user_id}-{issued_at_ms}"),
            Self::ConnectionFee {
                request_id,
                issued_at_ms: Some(ms),
            } => write!(f, "{CONNECTION_PREFIX}{request_id}-{ms}"),
            Self::ConnectionFee {
                request_id,
                issued_at_ms: None,
            } => write!(f, "{CONNECTION_PREFIX}{request_id}"),
        }
    }
}

impl fmt::Debug for PaymentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentReference({self})")
    }
}

impl FromStr for PaymentReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // MULTI before SINGLE: the single prefix is a prefix of the multi one.
        if let Some(rest) = s.strip_prefix(MULTI_PREFIX) {
            let (user_part, ts_part) = split_id_and_suffix(rest, s)?;
            let user_id = user_part
                .parse::<UserId>()
                .map_err(|_| ReferenceError::malformed(s))?;
            let issued_at_ms = ts_part
                .ok_or_else(|| ReferenceError::malformed(s))?
                .parse::<i64>()
                .map_err(|_| ReferenceError::malformed(s))?;
            return Ok(Self::MultiBill {
                user_id,
                issued_at_ms,
            });
        }
        if let Some(rest) = s.strip_prefix(SINGLE_PREFIX) {
            let bill_id = rest
                .parse::<BillId>()
                .map_err(|_| ReferenceError::malformed(s))?;
            return Ok(Self::Bill(bill_id));
        }
        if let Some(rest) = s.strip_prefix(CONNECTION_PREFIX) {
            let (request_part, ts_part) = split_id_and_suffix(rest, s)?;
            let request_id = request_part
                .parse::<ConnectionRequestId>()
                .map_err(|_| ReferenceError::malformed(s))?;
            let issued_at_ms = match ts_part {
                Some(ts) => Some(ts.parse::<i64>().map_err(|_| ReferenceError::malformed(s))?),
                None => None,
            };
            return Ok(Self::ConnectionFee {
                request_id,
                issued_at_ms,
            });
        }
        Err(ReferenceError::UnknownPrefix(s.to_string()))
    }
}

/// Split `rest` into the fixed-width UUID part and an optional `-{suffix}`
/// tail. UUIDs embed hyphens, so splitting on `-` would be wrong.
fn split_id_and_suffix<'a>(
    rest: &'a str,
    original: &str,
) -> Result<(&'a str, Option<&'a str>), ReferenceError> {
    let id_part = rest
        .get(..UUID_STR_LEN)
        .ok_or_else(|| ReferenceError::malformed(original))?;
    let tail = &rest[UUID_STR_LEN..];
    if tail.is_empty() {
        return Ok((id_part, None));
    }
    let suffix = tail
        .strip_prefix('-')
        .ok_or_else(|| ReferenceError::malformed(original))?;
    Ok((id_part, Some(suffix)))
}

impl TryFrom<String> for PaymentReference {
    type Error = ReferenceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PaymentReference> for String {
    fn from(reference: PaymentReference) -> Self {
        reference.to_string()
    }
}

/// Errors that can occur when decoding a gateway order id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    /// The order id carries none of the known prefixes.
    #[error("unknown payment reference prefix: {0}")]
    UnknownPrefix(String),

    /// The order id has a known prefix but a malformed body.
    #[error("malformed payment reference: {0}")]
    Malformed(String),
}

impl ReferenceError {
    fn malformed(s: &str) -> Self {
        Self::Malformed(s.to_string())
    }
}

// ============================================================================
// Gateway statuses
// ============================================================================

/// Transaction status reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Funds confirmed (bank transfers, wallets).
    Settlement,
    /// Card authorization captured; settled only once fraud review accepts.
    Capture,
    /// Customer has not completed payment yet.
    Pending,
    /// Payment rejected by the gateway or issuer.
    Deny,
    /// Customer or merchant cancelled the attempt.
    Cancel,
    /// The hosted session timed out.
    Expire,
    /// A status this service does not act on (refund, chargeback, ...).
    Other(String),
}

impl GatewayStatus {
    /// Decode the gateway's `transaction_status` field.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        match status {
            "settlement" => Self::Settlement,
            "capture" => Self::Capture,
            "pending" => Self::Pending,
            "deny" => Self::Deny,
            "cancel" => Self::Cancel,
            "expire" => Self::Expire,
            other => Self::Other(other.to_string()),
        }
    }

    /// Whether this status, with the given fraud status, confirms captured
    /// funds.
    #[must_use]
    pub fn settles(&self, fraud_status: Option<&FraudStatus>) -> bool {
        match self {
            Self::Settlement => true,
            Self::Capture => matches!(fraud_status, Some(FraudStatus::Accept)),
            _ => false,
        }
    }

    /// Whether this status terminates the payment attempt without funds.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Deny | Self::Cancel | Self::Expire)
    }

    /// The wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Settlement => "settlement",
            Self::Capture => "capture",
            Self::Pending => "pending",
            Self::Deny => "deny",
            Self::Cancel => "cancel",
            Self::Expire => "expire",
            Self::Other(raw) => raw,
        }
    }
}

/// Fraud review status accompanying card captures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FraudStatus {
    /// Review passed; the capture is good funds.
    Accept,
    /// Held for manual review.
    Challenge,
    /// Review failed.
    Deny,
    /// A value this service does not recognize.
    Other(String),
}

impl FraudStatus {
    /// Decode the gateway's `fraud_status` field.
    #[must_use]
    pub fn from_wire(status: &str) -> Self {
        match status {
            "accept" => Self::Accept,
            "challenge" => Self::Challenge,
            "deny" => Self::Deny,
            other => Self::Other(other.to_string()),
        }
    }
}

// ============================================================================
// Payment sessions
// ============================================================================

/// Lifecycle of a hosted-payment session, as far as this service tracks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session issued; no terminal callback yet.
    Pending,
    /// A settlement callback was processed.
    Settled,
    /// The gateway denied or the customer cancelled.
    Failed,
    /// The hosted session expired unused.
    Expired,
}

/// A hosted-payment session issued to a customer.
///
/// Sessions are keyed by their encoded reference. The covered bill set is
/// captured when the session is created; settlement credits the intersection
/// of that set with the bills still unpaid, so bills generated after the
/// session is issued are never settled by it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    /// The gateway order id, decoded.
    pub reference: PaymentReference,

    /// The paying customer.
    pub user_id: UserId,

    /// Bills this session pays for. Empty for connection-fee sessions.
    pub covered_bills: Vec<BillId>,

    /// Amount the customer is asked to pay, in rupiah.
    pub gross_amount: i64,

    /// Last known lifecycle state.
    pub status: SessionStatus,

    /// Token for the gateway's hosted payment page.
    pub snap_token: String,

    /// Redirect URL for the gateway's hosted payment page.
    pub redirect_url: String,

    /// When the session was created.
    pub created_at: DateTime<Utc>,

    /// When the session state last changed.
    pub updated_at: DateTime<Utc>,
}

impl PaymentSession {
    /// Create a pending session.
    #[must_use]
    pub fn new(
        reference: PaymentReference,
        user_id: UserId,
        covered_bills: Vec<BillId>,
        gross_amount: i64,
        snap_token: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            reference,
            user_id,
            covered_bills,
            gross_amount,
            status: SessionStatus::Pending,
            snap_token: snap_token.into(),
            redirect_url: redirect_url.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The storage key for this session: the encoded reference.
    #[must_use]
    pub fn key(&self) -> String {
        self.reference.to_string()
    }

    /// Record a lifecycle transition.
    pub fn mark(&mut self, status: SessionStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn single_bill_reference_roundtrip() {
        let bill_id = BillId::generate();
        let reference = PaymentReference::bill(bill_id);
        let encoded = reference.to_string();
        assert_eq!(encoded, format!("BILLING-{bill_id}"));
        assert_eq!(encoded.parse::<PaymentReference>().unwrap(), reference);
    }

    #[test]
    fn multi_bill_reference_roundtrip() {
        let user_id = UserId::generate();
        let issued_at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let reference = PaymentReference::multi_bill(user_id, issued_at);
        let encoded = reference.to_string();
        assert_eq!(
            encoded,
            format!("BILLING-MULTI-{user_id}-{}", issued_at.timestamp_millis())
        );
        assert_eq!(encoded.parse::<PaymentReference>().unwrap(), reference);
    }

    #[test]
    fn multi_bill_requires_a_timestamp_suffix() {
        let user_id = UserId::generate();
        let encoded = format!("BILLING-MULTI-{user_id}");
        assert!(matches!(
            encoded.parse::<PaymentReference>(),
            Err(ReferenceError::Malformed(_))
        ));
    }

    #[test]
    fn connection_fee_reference_roundtrip() {
        let request_id = ConnectionRequestId::generate();
        let issued_at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap();
        let reference = PaymentReference::connection_fee(request_id, issued_at);
        let encoded = reference.to_string();
        assert_eq!(
            encoded,
            format!("RAB-{request_id}-{}", issued_at.timestamp_millis())
        );
        assert_eq!(encoded.parse::<PaymentReference>().unwrap(), reference);
    }

    #[test]
    fn legacy_connection_fee_reference_without_timestamp_parses() {
        let request_id = ConnectionRequestId::generate();
        let encoded = format!("RAB-{request_id}");
        let parsed = encoded.parse::<PaymentReference>().unwrap();
        assert_eq!(
            parsed,
            PaymentReference::ConnectionFee {
                request_id,
                issued_at_ms: None,
            }
        );
    }

    #[test]
    fn unknown_prefix_is_rejected() {
        assert!(matches!(
            "SHOP-123".parse::<PaymentReference>(),
            Err(ReferenceError::UnknownPrefix(_))
        ));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!("BILLING-not-a-uuid".parse::<PaymentReference>().is_err());
        assert!("RAB-too-short".parse::<PaymentReference>().is_err());
        let user_id = UserId::generate();
        assert!(format!("BILLING-MULTI-{user_id}-abc")
            .parse::<PaymentReference>()
            .is_err());
    }

    #[test]
    fn reference_serde_uses_the_wire_string() {
        let bill_id = BillId::generate();
        let reference = PaymentReference::bill(bill_id);
        let json = serde_json::to_string(&reference).unwrap();
        assert_eq!(json, format!("\"BILLING-{bill_id}\""));
        let parsed: PaymentReference = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, reference);
    }

    #[test]
    fn settlement_always_settles() {
        let status = GatewayStatus::from_wire("settlement");
        assert!(status.settles(None));
        assert!(status.settles(Some(&FraudStatus::Challenge)));
    }

    #[test]
    fn capture_settles_only_with_fraud_accept() {
        let status = GatewayStatus::from_wire("capture");
        assert!(status.settles(Some(&FraudStatus::Accept)));
        assert!(!status.settles(Some(&FraudStatus::Challenge)));
        assert!(!status.settles(None));
    }

    #[test]
    fn terminal_failures_are_classified() {
        assert!(GatewayStatus::from_wire("deny").is_failure());
        assert!(GatewayStatus::from_wire("cancel").is_failure());
        assert!(GatewayStatus::from_wire("expire").is_failure());
        assert!(!GatewayStatus::from_wire("pending").is_failure());
        assert!(!GatewayStatus::from_wire("settlement").is_failure());
        assert!(!GatewayStatus::from_wire("refund").is_failure());
    }

    #[test]
    fn unrecognized_statuses_are_preserved() {
        let status = GatewayStatus::from_wire("partial_refund");
        assert_eq!(status, GatewayStatus::Other("partial_refund".to_string()));
        assert_eq!(status.as_str(), "partial_refund");
        assert!(!status.settles(None));
    }
}
