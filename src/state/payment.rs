//! Payment records and the advance/balance classification heuristic.

use crate::TimestampMs;
use serde::{Deserialize, Serialize};

/// Normalized gateway payment-link status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Created,
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    /// Parse a gateway status string. "captured" counts as paid; strings we
    /// do not recognize return `None` and leave the stored status alone.
    pub fn parse(raw: &str) -> Option<PaymentStatus> {
        match raw.to_ascii_lowercase().as_str() {
            "paid" | "captured" => Some(PaymentStatus::Paid),
            "created" | "issued" => Some(PaymentStatus::Created),
            "pending" | "partially_paid" => Some(PaymentStatus::Pending),
            "failed" | "expired" => Some(PaymentStatus::Failed),
            "cancelled" | "canceled" => Some(PaymentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        *self == PaymentStatus::Paid
    }
}

/// Whether a payment covers the advance or the balance portion of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentKind {
    Advance,
    Balance,
    Unknown,
}

impl PaymentKind {
    /// Reference-id trailing tag character used at link creation.
    pub fn tag(&self) -> &'static str {
        match self {
            PaymentKind::Advance => "A",
            PaymentKind::Balance => "B",
            PaymentKind::Unknown => "X",
        }
    }
}

/// Customer snapshot attached to the payment link.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentCustomer {
    pub name: String,
    pub email: String,
    pub contact: String,
}

/// One gateway payment link and its lifecycle.
///
/// `reference_id` is the correlation key for callbacks and is unique
/// system-wide. `paid_at` is set once; a later non-paid callback never
/// clears a recorded `Paid`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentRecord {
    pub reference_id: String,
    pub link_id: String,
    pub short_url: String,
    pub description: String,
    /// Amount in minor currency units
    pub amount: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// Tagged at link creation; `Unknown` when the link predates tagging
    pub kind: PaymentKind,
    pub customer: PaymentCustomer,
    pub payment_id: Option<String>,
    pub created_at: TimestampMs,
    pub expires_at: Option<TimestampMs>,
    pub paid_at: Option<TimestampMs>,
    /// Opaque audit copy of gateway payloads (JSON text); never read by
    /// business logic
    pub raw: Option<String>,
}

impl PaymentRecord {
    /// Apply a callback update. Paid is sticky: once paid, later non-paid
    /// statuses are ignored, and `paid_at` keeps its first value.
    ///
    /// Returns true if the stored status changed.
    pub fn apply_callback(
        &mut self,
        status: Option<PaymentStatus>,
        payment_id: Option<&str>,
        raw: Option<String>,
        now: TimestampMs,
    ) -> bool {
        if let Some(id) = payment_id {
            if !id.is_empty() {
                self.payment_id = Some(id.to_string());
            }
        }
        if let Some(raw) = raw {
            self.raw = Some(raw);
        }

        let new_status = match status {
            Some(s) => s,
            None => return false,
        };
        if self.status == PaymentStatus::Paid && new_status != PaymentStatus::Paid {
            return false;
        }
        if new_status == PaymentStatus::Paid && self.paid_at.is_none() {
            self.paid_at = Some(now);
        }
        let changed = self.status != new_status;
        self.status = new_status;
        changed
    }

    /// Classify advance vs balance: explicit tag first, then the reference
    /// id's trailing tag character, then description keywords.
    pub fn classify(&self) -> PaymentKind {
        if self.kind != PaymentKind::Unknown {
            return self.kind;
        }
        match self.reference_id.rsplit('-').next() {
            Some("A") => return PaymentKind::Advance,
            Some("B") => return PaymentKind::Balance,
            _ => {}
        }
        let desc = self.description.to_ascii_lowercase();
        if ["advance", "upfront", "deposit"].iter().any(|k| desc.contains(k)) {
            PaymentKind::Advance
        } else if ["balance", "final", "remaining", "full"]
            .iter()
            .any(|k| desc.contains(k))
        {
            PaymentKind::Balance
        } else {
            PaymentKind::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(reference: &str, description: &str, kind: PaymentKind) -> PaymentRecord {
        PaymentRecord {
            reference_id: reference.to_string(),
            link_id: "pl_1".to_string(),
            short_url: "https://rzp.io/x".to_string(),
            description: description.to_string(),
            amount: 8_024,
            currency: "INR".to_string(),
            status: PaymentStatus::Created,
            kind,
            customer: PaymentCustomer::default(),
            payment_id: None,
            created_at: 1_000,
            expires_at: None,
            paid_at: None,
            raw: None,
        }
    }

    #[test]
    fn test_parse_status_normalizes_captured() {
        assert_eq!(PaymentStatus::parse("captured"), Some(PaymentStatus::Paid));
        assert_eq!(PaymentStatus::parse("PAID"), Some(PaymentStatus::Paid));
        assert_eq!(PaymentStatus::parse("whatever"), None);
    }

    #[test]
    fn test_paid_is_sticky() {
        let mut p = record("L1-x-y-A", "", PaymentKind::Unknown);
        assert!(p.apply_callback(Some(PaymentStatus::Paid), Some("pay_1"), None, 2_000));
        assert_eq!(p.paid_at, Some(2_000));

        // Later "created" update must not erase paid
        assert!(!p.apply_callback(Some(PaymentStatus::Created), None, None, 3_000));
        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.paid_at, Some(2_000));
    }

    #[test]
    fn test_paid_at_first_wins() {
        let mut p = record("L1-x-y-A", "", PaymentKind::Unknown);
        p.apply_callback(Some(PaymentStatus::Paid), None, None, 2_000);
        p.apply_callback(Some(PaymentStatus::Paid), None, None, 9_000);
        assert_eq!(p.paid_at, Some(2_000));
    }

    #[test]
    fn test_classify_prefers_explicit_kind() {
        let p = record("L1-x-y-B", "advance payment", PaymentKind::Advance);
        assert_eq!(p.classify(), PaymentKind::Advance);
    }

    #[test]
    fn test_classify_by_reference_suffix() {
        let p = record("L1-170000-R1-A", "", PaymentKind::Unknown);
        assert_eq!(p.classify(), PaymentKind::Advance);
        let p = record("L1-170000-R1-B", "", PaymentKind::Unknown);
        assert_eq!(p.classify(), PaymentKind::Balance);
    }

    #[test]
    fn test_classify_by_description_keywords() {
        let p = record("noref", "50% UPFRONT to confirm", PaymentKind::Unknown);
        assert_eq!(p.classify(), PaymentKind::Advance);
        let p = record("noref", "Remaining amount", PaymentKind::Unknown);
        assert_eq!(p.classify(), PaymentKind::Balance);
        let p = record("noref", "misc", PaymentKind::Unknown);
        assert_eq!(p.classify(), PaymentKind::Unknown);
    }
}
