use crate::stage::Stage;
use crate::state::design::Design;
use crate::state::install::Installation;
use crate::state::payment::PaymentRecord;
use crate::state::quote::Quotation;
use crate::TimestampMs;
use serde::{Deserialize, Serialize};

/// Customer contact details captured at intake.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub pin: String,
    pub notes: String,
}

/// One row of the append-only stage ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageEntry {
    pub stage: Stage,
    /// Who should act on this stage
    pub responsible: String,
    /// Who recorded the entry
    pub updated_by: String,
    pub at: TimestampMs,
    pub due_at: Option<TimestampMs>,
}

/// Audit-trail entry; `details` is opaque JSON text kept for display only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub kind: String,
    pub actor: String,
    pub at: TimestampMs,
    pub details: Option<String>,
}

/// Call-log entry from the qualification sub-flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallEntry {
    pub outcome: Option<String>,
    pub logged_by: String,
    pub at: TimestampMs,
    pub notes: Option<String>,
}

/// Site measurement captured by the technician.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Measurement {
    pub label: String,
    pub width_mm: u32,
    pub height_mm: u32,
    pub thickness_mm: u32,
    pub quantity: u32,
    pub notes: Option<String>,
    pub completed_at: TimestampMs,
}

/// Public tracking token; revoked tokens stop resolving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tracking {
    pub token: String,
    pub token_hash: String,
    pub created_at: TimestampMs,
    pub revoked: bool,
}

/// Retry/side states for the qualification loop. These ride alongside the
/// primary pipeline rank and never demote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUpState {
    Callback,
    DataFix,
    Postponed,
}

/// Pending follow-up call with reminder bookkeeping.
///
/// `notified` is cleared whenever a new follow-up is scheduled so the
/// sweep re-alerts exactly once per due-date crossing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FollowUp {
    pub state: FollowUpState,
    pub due_at: TimestampMs,
    pub notified: bool,
    pub attempts: u32,
}

/// Terminal outcome of qualification; a side channel, not a pipeline rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    Disqualified,
    AlreadyPurchased,
}

/// Lead aggregate root.
///
/// Invariants:
/// - `status` only moves forward in rank (see [`crate::workflow`])
/// - `stage_history` ranks are non-decreasing; backward rows are rejected
/// - payment reference ids are unique across the whole state
/// - never hard-deleted; terminal outcomes live in `disposition`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lead {
    pub id: String,
    pub session_id: String,
    pub category: String,
    pub quantity: u32,
    pub contact: Contact,
    pub status: Stage,
    pub assignee: Option<String>,
    pub stage_history: Vec<StageEntry>,
    pub activity_log: Vec<ActivityEntry>,
    pub calls: Vec<CallEntry>,
    pub measurements: Vec<Measurement>,
    pub quotations: Vec<Quotation>,
    pub payments: Vec<PaymentRecord>,
    pub design: Design,
    pub installation: Installation,
    pub tracking: Option<Tracking>,
    pub follow_up: Option<FollowUp>,
    pub disposition: Option<Disposition>,
    /// Optimistic version, bumped on every committed mutation
    pub version: u64,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

impl Lead {
    pub fn new(id: String, session_id: String, category: String, contact: Contact, now: TimestampMs) -> Self {
        Lead {
            id,
            session_id,
            category,
            quantity: 1,
            contact,
            status: Stage::LeadNew,
            assignee: None,
            stage_history: Vec::new(),
            activity_log: Vec::new(),
            calls: Vec::new(),
            measurements: Vec::new(),
            quotations: Vec::new(),
            payments: Vec::new(),
            design: Design::default(),
            installation: Installation::default(),
            tracking: None,
            follow_up: None,
            disposition: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump version and updated-at; call once per committed mutation.
    pub fn touch(&mut self, now: TimestampMs) {
        self.version += 1;
        self.updated_at = now;
    }

    /// Latest ledger row, if any.
    pub fn last_stage_entry(&self) -> Option<&StageEntry> {
        self.stage_history.last()
    }

    /// Most recent ledger row for `stage`, scanned from the end.
    pub fn latest_entry_for(&self, stage: Stage) -> Option<&StageEntry> {
        self.stage_history.iter().rev().find(|e| e.stage == stage)
    }

    /// Timestamp the lead most recently reached `stage`, if ever.
    pub fn reached_at(&self, stage: Stage) -> Option<TimestampMs> {
        self.latest_entry_for(stage).map(|e| e.at)
    }

    /// Latest authoritative quotation.
    pub fn latest_quotation(&self) -> Option<&Quotation> {
        self.quotations.last()
    }

    /// Payment record by reference id.
    pub fn payment_by_reference(&self, reference: &str) -> Option<&PaymentRecord> {
        self.payments.iter().find(|p| p.reference_id == reference)
    }

    pub fn payment_by_reference_mut(&mut self, reference: &str) -> Option<&mut PaymentRecord> {
        self.payments.iter_mut().find(|p| p.reference_id == reference)
    }

    /// Payment record by gateway link id (fallback lookup for callbacks).
    pub fn payment_by_link_mut(&mut self, link_id: &str) -> Option<&mut PaymentRecord> {
        self.payments.iter_mut().find(|p| p.link_id == link_id)
    }

    pub fn log_activity(&mut self, kind: &str, actor: &str, at: TimestampMs, details: Option<String>) {
        self.activity_log.push(ActivityEntry {
            kind: kind.to_string(),
            actor: actor.to_string(),
            at,
            details,
        });
    }

    /// Schedule a follow-up in the given side state; resets `notified`.
    pub fn schedule_follow_up(&mut self, state: FollowUpState, due_at: TimestampMs) {
        let attempts = self.follow_up.as_ref().map(|f| f.attempts).unwrap_or(0);
        self.follow_up = Some(FollowUp {
            state,
            due_at,
            notified: false,
            attempts: attempts + 1,
        });
    }

    pub fn clear_follow_up(&mut self) {
        self.follow_up = None;
    }

    /// Responsible party string for ledger rows ("System" when unassigned).
    pub fn responsible(&self) -> String {
        self.assignee.clone().unwrap_or_else(|| "System".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead() -> Lead {
        Lead::new(
            "L1".to_string(),
            "sess-1".to_string(),
            "Main Door".to_string(),
            Contact::default(),
            1_000,
        )
    }

    #[test]
    fn test_new_lead_starts_at_intake() {
        let l = lead();
        assert_eq!(l.status, Stage::LeadNew);
        assert!(l.stage_history.is_empty());
        assert_eq!(l.version, 0);
    }

    #[test]
    fn test_latest_entry_scans_from_end() {
        let mut l = lead();
        for (i, stage) in [Stage::LeadNew, Stage::LeadQualified, Stage::LeadQualified]
            .into_iter()
            .enumerate()
        {
            l.stage_history.push(StageEntry {
                stage,
                responsible: "System".to_string(),
                updated_by: "System".to_string(),
                at: 1_000 + i as i64,
                due_at: None,
            });
        }
        assert_eq!(l.reached_at(Stage::LeadQualified), Some(1_002));
        assert_eq!(l.reached_at(Stage::MeasureBooked), None);
    }

    #[test]
    fn test_schedule_follow_up_resets_notified_and_counts_attempts() {
        let mut l = lead();
        l.schedule_follow_up(FollowUpState::Callback, 2_000);
        l.follow_up.as_mut().unwrap().notified = true;
        l.schedule_follow_up(FollowUpState::Callback, 3_000);

        let f = l.follow_up.as_ref().unwrap();
        assert!(!f.notified);
        assert_eq!(f.attempts, 2);
        assert_eq!(f.due_at, 3_000);
    }

    #[test]
    fn test_touch_bumps_version() {
        let mut l = lead();
        l.touch(2_000);
        l.touch(3_000);
        assert_eq!(l.version, 2);
        assert_eq!(l.updated_at, 3_000);
    }
}
