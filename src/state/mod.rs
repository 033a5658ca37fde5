pub mod design;
pub mod install;
pub mod lead;
pub mod payment;
pub mod quote;

pub use design::{ApprovalState, Design, DesignRevision, FrozenDesign};
pub use install::{DeferredInstallation, Installation};
pub use lead::{
    ActivityEntry, CallEntry, Contact, Disposition, FollowUp, FollowUpState, Lead, Measurement,
    StageEntry, Tracking,
};
pub use payment::{PaymentCustomer, PaymentKind, PaymentRecord, PaymentStatus};
pub use quote::{LineItem, Quotation};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Core domain state: all leads plus cross-lead bookkeeping.
///
/// Loaded, mutated and persisted as one unit (single writer). Secondary
/// lookups (payment reference, tracking token, design token) scan the
/// leads map; the pipeline is small enough that indexes would be noise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct State {
    /// All leads indexed by lead id
    pub leads: HashMap<String, Lead>,

    /// Round-robin assignment cursor, persisted so fairness survives
    /// restarts
    #[serde(default)]
    pub rotation_cursor: u64,

    /// Payment references whose kind could not be classified; surfaced
    /// for manual review instead of silently dropped
    #[serde(default)]
    pub review_queue: Vec<String>,

    /// Monotonic counter for lead id generation
    #[serde(default)]
    pub next_lead_seq: u64,
}

impl State {
    /// Create empty state
    pub fn new() -> Self {
        State {
            leads: HashMap::new(),
            rotation_cursor: 0,
            review_queue: Vec::new(),
            next_lead_seq: 0,
        }
    }

    /// Allocate the next lead id ("L1", "L2", ...).
    pub fn allocate_lead_id(&mut self) -> String {
        self.next_lead_seq += 1;
        format!("L{}", self.next_lead_seq)
    }

    pub fn insert_lead(&mut self, lead: Lead) {
        self.leads.insert(lead.id.clone(), lead);
    }

    pub fn get_lead(&self, id: &str) -> Option<&Lead> {
        self.leads.get(id)
    }

    pub fn get_lead_mut(&mut self, id: &str) -> Option<&mut Lead> {
        self.leads.get_mut(id)
    }

    /// Lead by id, or `LeadNotFound`.
    pub fn lead(&self, id: &str) -> Result<&Lead> {
        self.get_lead(id)
            .ok_or_else(|| Error::LeadNotFound(id.to_string()))
    }

    /// Mutable lead by id, or `LeadNotFound`.
    pub fn lead_mut(&mut self, id: &str) -> Result<&mut Lead> {
        self.leads
            .get_mut(id)
            .ok_or_else(|| Error::LeadNotFound(id.to_string()))
    }

    /// Lead id owning a payment record with this reference id.
    pub fn find_lead_by_reference(&self, reference: &str) -> Option<&Lead> {
        self.leads
            .values()
            .find(|l| l.payment_by_reference(reference).is_some())
    }

    /// Lead holding a non-revoked tracking token.
    pub fn find_lead_by_tracking_token(&self, token: &str) -> Option<&Lead> {
        self.leads.values().find(|l| {
            l.tracking
                .as_ref()
                .map(|t| t.token == token && !t.revoked)
                .unwrap_or(false)
        })
    }

    /// Lead holding a design revision with this review token.
    pub fn find_lead_by_design_token(&self, token: &str) -> Option<&Lead> {
        self.leads
            .values()
            .find(|l| l.design.revision_by_token(token).is_some())
    }

    /// Mutable variants of the scans above; borrow rules keep them separate.
    pub fn find_lead_by_reference_mut(&mut self, reference: &str) -> Option<&mut Lead> {
        self.leads
            .values_mut()
            .find(|l| l.payment_by_reference(reference).is_some())
    }

    pub fn find_lead_by_design_token_mut(&mut self, token: &str) -> Option<&mut Lead> {
        self.leads
            .values_mut()
            .find(|l| l.design.revision_by_token(token).is_some())
    }

    /// True if any payment record anywhere already uses this reference id.
    pub fn reference_exists(&self, reference: &str) -> bool {
        self.find_lead_by_reference(reference).is_some()
    }

    /// Queue a payment reference for manual kind review (deduplicated).
    pub fn queue_for_review(&mut self, reference: &str) {
        if !self.review_queue.iter().any(|r| r == reference) {
            self.review_queue.push(reference.to_string());
        }
    }

    /// Leads sorted by id for stable listing output.
    pub fn leads_sorted(&self) -> Vec<&Lead> {
        let mut all: Vec<&Lead> = self.leads.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

impl Default for State {
    fn default() -> Self {
        State::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::payment::{PaymentCustomer, PaymentKind, PaymentStatus};

    fn lead_with_payment(id: &str, reference: &str) -> Lead {
        let mut l = Lead::new(
            id.to_string(),
            "sess".to_string(),
            "Door".to_string(),
            Contact::default(),
            0,
        );
        l.payments.push(PaymentRecord {
            reference_id: reference.to_string(),
            link_id: "pl_1".to_string(),
            short_url: String::new(),
            description: String::new(),
            amount: 100,
            currency: "INR".to_string(),
            status: PaymentStatus::Created,
            kind: PaymentKind::Advance,
            customer: PaymentCustomer::default(),
            payment_id: None,
            created_at: 0,
            expires_at: None,
            paid_at: None,
            raw: None,
        });
        l
    }

    #[test]
    fn test_state_creation() {
        let state = State::new();
        assert!(state.leads.is_empty());
        assert_eq!(state.rotation_cursor, 0);
    }

    #[test]
    fn test_allocate_lead_id() {
        let mut state = State::new();
        assert_eq!(state.allocate_lead_id(), "L1");
        assert_eq!(state.allocate_lead_id(), "L2");
    }

    #[test]
    fn test_find_lead_by_reference() {
        let mut state = State::new();
        state.insert_lead(lead_with_payment("L1", "L1-x-y-A"));

        assert!(state.find_lead_by_reference("L1-x-y-A").is_some());
        assert!(state.find_lead_by_reference("missing").is_none());
        assert!(state.reference_exists("L1-x-y-A"));
    }

    #[test]
    fn test_tracking_token_lookup_skips_revoked() {
        let mut state = State::new();
        let mut l = lead_with_payment("L1", "r1");
        l.tracking = Some(Tracking {
            token: "tok".to_string(),
            token_hash: String::new(),
            created_at: 0,
            revoked: false,
        });
        state.insert_lead(l);
        assert!(state.find_lead_by_tracking_token("tok").is_some());

        state
            .get_lead_mut("L1")
            .unwrap()
            .tracking
            .as_mut()
            .unwrap()
            .revoked = true;
        assert!(state.find_lead_by_tracking_token("tok").is_none());
    }

    #[test]
    fn test_review_queue_dedupes() {
        let mut state = State::new();
        state.queue_for_review("ref-1");
        state.queue_for_review("ref-1");
        assert_eq!(state.review_queue.len(), 1);
    }
}
