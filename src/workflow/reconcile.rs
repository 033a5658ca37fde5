//! Payment reconciliation: gateway callbacks to state transitions.
//!
//! Callbacks are delivered at-least-once and in no particular order, so
//! every step here is guarded to make a duplicate delivery a no-op for
//! promotion-side effects.

use crate::error::{Error, Result};
use crate::gateway::{CallbackPayload, Gateway};
use crate::hook::Hook;
use crate::logger::Logger;
use crate::stage::Stage;
use crate::state::{PaymentKind, PaymentStatus, State};
use crate::workflow::{billing, install, Workflow};
use crate::TimestampMs;
use serde::Serialize;

/// What a callback did to the system.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub lead_id: String,
    pub reference: String,
    pub status: PaymentStatus,
    pub kind: PaymentKind,
    /// True only when this delivery moved the pipeline forward
    pub promoted: bool,
    /// Set when a fully-settled balance auto-booked the installation
    pub scheduled_at: Option<TimestampMs>,
    /// Paid but unclassifiable; parked for a human
    pub needs_review: bool,
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Process one gateway callback end to end.
    ///
    /// Verification is best-effort: if the gateway cannot be reached we
    /// log a warning and trust the status the callback asserted.
    pub fn payment_callback(
        &mut self,
        state: &mut State,
        payload: CallbackPayload,
        now: TimestampMs,
    ) -> Result<ReconcileOutcome> {
        let lead_id = state
            .find_lead_by_reference(&payload.reference_id)
            .map(|l| l.id.clone())
            .or_else(|| {
                // Older links carried only the gateway link id
                state
                    .leads
                    .values()
                    .find(|l| {
                        !payload.link_id.is_empty()
                            && l.payments.iter().any(|p| p.link_id == payload.link_id)
                    })
                    .map(|l| l.id.clone())
            })
            .ok_or_else(|| Error::LeadNotFound(payload.reference_id.clone()))?;

        let status = if payload.link_id.is_empty() {
            payload.asserted_status()
        } else {
            match self.gateway.fetch_link_status(&payload.link_id) {
                Ok(s) => Some(s),
                Err(e) => {
                    Logger::warn(&format!(
                        "could not verify link {}, trusting callback: {}",
                        payload.link_id, e
                    ));
                    payload.asserted_status()
                }
            }
        };

        let mut promoted = false;
        let mut scheduled_at = None;
        let mut needs_review = false;
        let reference;
        let final_status;
        let kind;
        {
            let lead = state.lead_mut(&lead_id)?;
            let raw_text = payload.raw.to_string();
            let payment_id = if payload.payment_id.is_empty() {
                None
            } else {
                Some(payload.payment_id.as_str())
            };
            let rec = if lead.payment_by_reference(&payload.reference_id).is_some() {
                lead.payment_by_reference_mut(&payload.reference_id)
            } else {
                lead.payment_by_link_mut(&payload.link_id)
            }
            .ok_or_else(|| Error::PaymentNotFound(payload.reference_id.clone()))?;

            let changed = rec.apply_callback(status, payment_id, Some(raw_text), now);
            kind = rec.classify();
            if rec.kind == PaymentKind::Unknown && kind != PaymentKind::Unknown {
                rec.kind = kind;
            }
            reference = rec.reference_id.clone();
            final_status = rec.status;
            let paid = rec.status.is_paid();

            if changed && paid {
                match kind {
                    PaymentKind::Advance => {
                        let (p, _) = self.promote_with_entry(
                            lead,
                            Stage::OrderConfirmed,
                            "System",
                            now,
                            Some(Stage::OrderConfirmed.due_at(now)),
                        );
                        promoted = p;
                        lead.log_activity(
                            "Advance Received",
                            "System",
                            now,
                            Some(serde_json::json!({ "reference": reference }).to_string()),
                        );
                    }
                    PaymentKind::Balance => {
                        let due = billing::compute_totals(lead, &self.config).due;
                        if due == 0 {
                            lead.installation.mark_fully_paid(now);
                            if lead.status.rank() >= Stage::ProdCompleted.rank() {
                                let at = install::schedule_on_lead(lead, None, "System", now);
                                scheduled_at = Some(at);
                            } else {
                                // Hold until production completes
                                lead.installation.defer(None, Some(reference.clone()));
                            }
                        }
                        lead.log_activity(
                            "Balance Received",
                            "System",
                            now,
                            Some(
                                serde_json::json!({ "reference": reference, "due": due })
                                    .to_string(),
                            ),
                        );
                    }
                    PaymentKind::Unknown => {
                        needs_review = true;
                    }
                }
            }
            if changed {
                lead.touch(now);
            }
        }

        if needs_review {
            state.queue_for_review(&reference);
            let lead_ref = state.lead(&lead_id)?;
            let sent = self.hook.on_manual_review_needed(lead_ref, &reference);
            self.notify(sent, "manual review");
        }
        if let Some(at) = scheduled_at {
            let lead_ref = state.lead(&lead_id)?;
            let sent = self.hook.on_installation_scheduled(lead_ref, at);
            self.notify(sent, "installation scheduled");
        }

        Ok(ReconcileOutcome {
            lead_id,
            reference,
            status: final_status,
            kind,
            promoted,
            scheduled_at,
            needs_review,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::OfflineGateway;
    use crate::hook::NoOpHook;
    use crate::state::{Contact, Lead, PaymentCustomer, PaymentRecord};
    use serde_json::json;

    fn lead_with_link(reference: &str, kind: PaymentKind, amount: i64, status: Stage) -> Lead {
        let mut l = Lead::new(
            "L1".to_string(),
            "s".to_string(),
            "Door".to_string(),
            Contact::default(),
            0,
        );
        l.status = status;
        l.payments.push(PaymentRecord {
            reference_id: reference.to_string(),
            link_id: "pl_1".to_string(),
            short_url: String::new(),
            description: String::new(),
            amount,
            currency: "INR".to_string(),
            status: PaymentStatus::Created,
            kind,
            customer: PaymentCustomer::default(),
            payment_id: None,
            created_at: 0,
            expires_at: None,
            paid_at: None,
            raw: None,
        });
        l
    }

    fn setup(lead: Lead) -> (Workflow<OfflineGateway, NoOpHook>, State) {
        let wf = Workflow::new(Config::new(), OfflineGateway, NoOpHook);
        let mut state = State::new();
        state.insert_lead(lead);
        (wf, state)
    }

    fn paid_callback(reference: &str) -> CallbackPayload {
        CallbackPayload::from_json(json!({
            "razorpay_payment_link_reference_id": reference,
            "razorpay_payment_link_id": "pl_1",
            "razorpay_payment_id": "pay_7",
            "razorpay_payment_link_status": "paid"
        }))
        .unwrap()
    }

    #[test]
    fn test_advance_suffix_promotes_to_order_confirmed() {
        let lead = lead_with_link("L1-170000-R1-A", PaymentKind::Unknown, 8_024, Stage::ProposalSent);
        let (mut wf, mut state) = setup(lead);

        let out = wf
            .payment_callback(&mut state, paid_callback("L1-170000-R1-A"), 1_000)
            .unwrap();
        assert!(out.promoted);
        assert_eq!(out.kind, PaymentKind::Advance);
        assert_eq!(out.status, PaymentStatus::Paid);

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.status, Stage::OrderConfirmed);
        assert_eq!(lead.payments[0].paid_at, Some(1_000));
        assert!(lead.payments[0].raw.is_some());
    }

    #[test]
    fn test_duplicate_webhook_is_a_safe_no_op() {
        let lead = lead_with_link("L1-x-y-A", PaymentKind::Advance, 8_024, Stage::ProposalSent);
        let (mut wf, mut state) = setup(lead);

        let first = wf
            .payment_callback(&mut state, paid_callback("L1-x-y-A"), 1_000)
            .unwrap();
        assert!(first.promoted);
        let rows = state.lead("L1").unwrap().stage_history.len();
        let acts = state.lead("L1").unwrap().activity_log.len();

        let second = wf
            .payment_callback(&mut state, paid_callback("L1-x-y-A"), 2_000)
            .unwrap();
        assert!(!second.promoted);

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.stage_history.len(), rows);
        assert_eq!(lead.activity_log.len(), acts);
        assert_eq!(lead.payments[0].paid_at, Some(1_000));
    }

    #[test]
    fn test_non_paid_never_overwrites_paid() {
        let lead = lead_with_link("L1-x-y-A", PaymentKind::Advance, 8_024, Stage::ProposalSent);
        let (mut wf, mut state) = setup(lead);
        wf.payment_callback(&mut state, paid_callback("L1-x-y-A"), 1_000)
            .unwrap();

        let stale = CallbackPayload::from_json(json!({
            "reference_id": "L1-x-y-A",
            "status": "created"
        }))
        .unwrap();
        let out = wf.payment_callback(&mut state, stale, 2_000).unwrap();
        assert_eq!(out.status, PaymentStatus::Paid);
        assert_eq!(state.lead("L1").unwrap().status, Stage::OrderConfirmed);
    }

    #[test]
    fn test_unknown_reference_is_lead_not_found() {
        let lead = lead_with_link("L1-x-y-A", PaymentKind::Advance, 100, Stage::ProposalSent);
        let (mut wf, mut state) = setup(lead);
        let err = wf
            .payment_callback(&mut state, paid_callback("L9-missing"), 0)
            .unwrap_err();
        assert!(matches!(err, Error::LeadNotFound(_)));
    }

    #[test]
    fn test_balance_before_completion_defers() {
        // Balance covers the full amount but production is still running
        let lead = lead_with_link("L1-x-y-B", PaymentKind::Balance, 13_216, Stage::ProdRunning);
        let (mut wf, mut state) = setup(lead);

        let out = wf
            .payment_callback(&mut state, paid_callback("L1-x-y-B"), 1_000)
            .unwrap();
        assert!(out.scheduled_at.is_none());

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.status, Stage::ProdRunning);
        let d = lead.installation.deferred.as_ref().unwrap();
        assert_eq!(d.fully_paid_at, Some(1_000));
        assert_eq!(d.reference_id.as_deref(), Some("L1-x-y-B"));
    }

    #[test]
    fn test_balance_after_completion_auto_schedules() {
        let lead = lead_with_link("L1-x-y-B", PaymentKind::Balance, 13_216, Stage::ProdCompleted);
        let (mut wf, mut state) = setup(lead);

        let out = wf
            .payment_callback(&mut state, paid_callback("L1-x-y-B"), 1_000)
            .unwrap();
        assert!(out.scheduled_at.is_some());
        assert_eq!(state.lead("L1").unwrap().status, Stage::InstallBooked);
    }

    #[test]
    fn test_unclassifiable_paid_payment_goes_to_review() {
        let lead = lead_with_link("oddref", PaymentKind::Unknown, 5_000, Stage::ProposalSent);
        let (mut wf, mut state) = setup(lead);

        let out = wf
            .payment_callback(&mut state, paid_callback("oddref"), 1_000)
            .unwrap();
        assert!(out.needs_review);
        assert!(!out.promoted);
        assert_eq!(state.review_queue, vec!["oddref".to_string()]);

        // Same payload again: still parked once, pipeline untouched
        wf.payment_callback(&mut state, paid_callback("oddref"), 2_000)
            .unwrap();
        assert_eq!(state.review_queue.len(), 1);
        assert_eq!(state.lead("L1").unwrap().status, Stage::ProposalSent);
    }

    #[test]
    fn test_lookup_falls_back_to_link_id() {
        let lead = lead_with_link("L1-x-y-A", PaymentKind::Advance, 100, Stage::ProposalSent);
        let (mut wf, mut state) = setup(lead);

        let payload = CallbackPayload::from_json(json!({
            "reference_id": "not-on-file",
            "payment_link_id": "pl_1",
            "status": "paid"
        }))
        .unwrap();
        let out = wf.payment_callback(&mut state, payload, 1_000).unwrap();
        assert_eq!(out.reference, "L1-x-y-A");
        assert_eq!(out.status, PaymentStatus::Paid);
    }
}
