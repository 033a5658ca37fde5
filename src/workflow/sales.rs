//! Sales operations: measurement visits, quotations, and the proposal
//! with its 50% advance payment link.

use crate::error::{Error, Result};
use crate::gateway::{build_reference_id, Gateway, PaymentLinkRequest};
use crate::stage::Stage;
use crate::state::{
    LineItem, Measurement, PaymentCustomer, PaymentKind, PaymentRecord, Quotation, State,
};
use crate::hook::Hook;
use crate::workflow::{billing, TransitionOutcome, Workflow};
use crate::TimestampMs;
use serde::Serialize;

/// Proposal result: the new status plus the advance link to hand the
/// customer.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalOutcome {
    pub transition: TransitionOutcome,
    pub reference_id: String,
    pub pay_url: String,
    pub amount: i64,
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Book the site measurement visit. The ledger due date is the
    /// appointment itself, not the stage SLA.
    pub fn schedule_measurement(
        &mut self,
        state: &mut State,
        id: &str,
        technician: &str,
        at: TimestampMs,
        actor: &str,
        now: TimestampMs,
    ) -> Result<TransitionOutcome> {
        if technician.is_empty() {
            return Err(Error::Validation("technician name is required".to_string()));
        }
        let lead = state.lead_mut(id)?;
        let (promoted, entry) =
            self.promote_with_entry(lead, Stage::MeasureBooked, actor, now, Some(at));
        if promoted {
            lead.log_activity(
                "Measurement Scheduled",
                actor,
                now,
                Some(serde_json::json!({ "technician": technician, "at": at }).to_string()),
            );
            lead.touch(now);
        }
        let outcome = TransitionOutcome::from_lead(lead, promoted, entry);

        if promoted {
            let lead_ref = state.lead(id)?;
            let sent = self.hook.on_measurement_scheduled(lead_ref, at);
            self.notify(sent, "measurement scheduled");
        }
        Ok(outcome)
    }

    /// Record measurements taken on site. The whole list is validated
    /// before anything is written; a malformed payload changes nothing.
    pub fn complete_measurement(
        &mut self,
        state: &mut State,
        id: &str,
        items: Vec<Measurement>,
        actor: &str,
        now: TimestampMs,
    ) -> Result<TransitionOutcome> {
        if items.is_empty() {
            return Err(Error::Validation("at least one measurement is required".to_string()));
        }
        for m in &items {
            if m.width_mm == 0 || m.height_mm == 0 {
                return Err(Error::Validation(format!(
                    "measurement '{}' has zero dimensions",
                    m.label
                )));
            }
        }

        let count = items.len();
        let lead = state.lead_mut(id)?;
        lead.measurements = items;
        let (promoted, entry) = self.promote_with_entry(
            lead,
            Stage::MeasureDone,
            actor,
            now,
            Some(Stage::MeasureDone.due_at(now)),
        );
        lead.log_activity(
            "Measurement Completed",
            actor,
            now,
            Some(serde_json::json!({ "items": count }).to_string()),
        );
        lead.touch(now);
        Ok(TransitionOutcome::from_lead(lead, promoted, entry))
    }

    /// Store a new quotation; the latest one becomes authoritative for
    /// totals.
    pub fn record_quotation(
        &mut self,
        state: &mut State,
        id: &str,
        number: &str,
        items: Vec<LineItem>,
        file_name: Option<String>,
        valid_until: Option<TimestampMs>,
        actor: &str,
        now: TimestampMs,
    ) -> Result<TransitionOutcome> {
        if items.is_empty() {
            return Err(Error::Validation("quotation needs at least one line item".to_string()));
        }
        let lead = state.lead_mut(id)?;
        lead.quotations.push(Quotation {
            number: number.to_string(),
            items,
            file_name,
            created_at: now,
            valid_until,
        });
        let (promoted, entry) = self.promote_with_entry(
            lead,
            Stage::QuoteDrafted,
            actor,
            now,
            Some(Stage::QuoteDrafted.due_at(now)),
        );
        lead.log_activity(
            "Quotation Recorded",
            actor,
            now,
            Some(serde_json::json!({ "number": number }).to_string()),
        );
        lead.touch(now);
        Ok(TransitionOutcome::from_lead(lead, promoted, entry))
    }

    /// Mark the latest quotation as shared with the customer.
    pub fn send_quotation(
        &mut self,
        state: &mut State,
        id: &str,
        actor: &str,
        now: TimestampMs,
    ) -> Result<TransitionOutcome> {
        let lead = state.lead_mut(id)?;
        if lead.latest_quotation().is_none() {
            return Err(Error::Validation("no quotation recorded yet".to_string()));
        }
        let (promoted, entry) = self.promote_with_entry(
            lead,
            Stage::QuoteSent,
            actor,
            now,
            Some(Stage::QuoteSent.due_at(now)),
        );
        if promoted {
            lead.log_activity("Quotation Sent", actor, now, None);
            lead.touch(now);
        }
        let outcome = TransitionOutcome::from_lead(lead, promoted, entry);

        if promoted {
            let lead_ref = state.lead(id)?;
            let sent = self.hook.on_quotation_sent(lead_ref);
            self.notify(sent, "quotation sent");
        }
        Ok(outcome)
    }

    /// Send the proposal: mint a payment link for 50% of the grand total
    /// (tagged `A`, kind Advance), record it, and move to ProposalSent.
    pub fn send_proposal(
        &mut self,
        state: &mut State,
        id: &str,
        actor: &str,
        now: TimestampMs,
    ) -> Result<ProposalOutcome> {
        let (amount, customer) = {
            let lead = state.lead(id)?;
            if lead.latest_quotation().is_none() {
                return Err(Error::Validation("no quotation recorded yet".to_string()));
            }
            let totals = billing::compute_totals(lead, &self.config);
            let customer = PaymentCustomer {
                name: lead.contact.name.clone(),
                email: lead.contact.email.clone(),
                contact: lead.contact.phone.clone(),
            };
            (totals.grand_total / 2, customer)
        };
        if amount <= 0 {
            return Err(Error::Validation("grand total is zero; nothing to collect".to_string()));
        }

        // Reference ids are unique system-wide; regenerate on the rare
        // collision
        let mut reference = build_reference_id(id, PaymentKind::Advance.tag(), now);
        while state.reference_exists(&reference) {
            reference = build_reference_id(id, PaymentKind::Advance.tag(), now);
        }

        let description = "50% advance to confirm your order".to_string();
        let link = self.gateway.create_payment_link(&PaymentLinkRequest {
            amount,
            currency: self.config.currency.clone(),
            reference_id: reference.clone(),
            description: description.clone(),
            customer: customer.clone(),
        })?;

        let lead = state.lead_mut(id)?;
        lead.payments.push(PaymentRecord {
            reference_id: reference.clone(),
            link_id: link.link_id.clone(),
            short_url: link.short_url.clone(),
            description,
            amount,
            currency: self.config.currency.clone(),
            status: link.status,
            kind: PaymentKind::Advance,
            customer,
            payment_id: None,
            created_at: now,
            expires_at: link.expires_at,
            paid_at: None,
            raw: None,
        });
        let (promoted, entry) =
            self.promote_with_entry(lead, Stage::ProposalSent, actor, now, None);
        lead.log_activity(
            "Payment Link Created",
            actor,
            now,
            Some(serde_json::json!({ "reference": reference, "amount": amount }).to_string()),
        );
        lead.touch(now);
        let transition = TransitionOutcome::from_lead(lead, promoted, entry);

        let lead_ref = state.lead(id)?;
        let sent = self.hook.on_proposal_sent(lead_ref, &link.short_url);
        self.notify(sent, "proposal sent");

        Ok(ProposalOutcome {
            transition,
            reference_id: reference,
            pay_url: link.short_url,
            amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::OfflineGateway;
    use crate::hook::NoOpHook;
    use crate::state::{Contact, Lead, PaymentStatus};

    fn setup() -> (Workflow<OfflineGateway, NoOpHook>, State) {
        let wf = Workflow::new(Config::new(), OfflineGateway, NoOpHook);
        let mut state = State::new();
        let mut lead = Lead::new(
            "L1".to_string(),
            "s".to_string(),
            "Door".to_string(),
            Contact::default(),
            0,
        );
        lead.status = Stage::LeadQualified;
        state.insert_lead(lead);
        (wf, state)
    }

    fn quote_items() -> Vec<LineItem> {
        vec![
            LineItem {
                description: "panel".to_string(),
                rate: 1_000,
                discount_rate: 0,
                quantity: 2,
            },
            LineItem {
                description: "frame".to_string(),
                rate: 500,
                discount_rate: 400,
                quantity: 1,
            },
        ]
    }

    #[test]
    fn test_schedule_measurement_uses_appointment_as_due() {
        let (mut wf, mut state) = setup();
        let at = 5_000_000;
        let out = wf
            .schedule_measurement(&mut state, "L1", "Ravi", at, "emp", 1_000)
            .unwrap();
        assert!(out.promoted);
        assert_eq!(out.entry.unwrap().due_at, Some(at));
    }

    #[test]
    fn test_complete_measurement_validates_before_writing() {
        let (mut wf, mut state) = setup();
        let bad = vec![Measurement {
            label: "door".to_string(),
            width_mm: 0,
            height_mm: 2_100,
            thickness_mm: 40,
            quantity: 1,
            notes: None,
            completed_at: 0,
        }];
        assert!(wf.complete_measurement(&mut state, "L1", bad, "emp", 0).is_err());
        assert!(wf.complete_measurement(&mut state, "L1", vec![], "emp", 0).is_err());

        let lead = state.lead("L1").unwrap();
        assert!(lead.measurements.is_empty());
        assert_eq!(lead.status, Stage::LeadQualified);
        assert_eq!(lead.version, 0);
    }

    #[test]
    fn test_complete_measurement_stores_and_promotes() {
        let (mut wf, mut state) = setup();
        let items = vec![Measurement {
            label: "main door".to_string(),
            width_mm: 900,
            height_mm: 2_100,
            thickness_mm: 40,
            quantity: 1,
            notes: None,
            completed_at: 10,
        }];
        let out = wf.complete_measurement(&mut state, "L1", items, "emp", 10).unwrap();
        assert!(out.promoted);
        assert_eq!(state.lead("L1").unwrap().measurements.len(), 1);
    }

    #[test]
    fn test_send_quotation_requires_a_recorded_quote() {
        let (mut wf, mut state) = setup();
        assert!(wf.send_quotation(&mut state, "L1", "emp", 0).is_err());

        wf.record_quotation(&mut state, "L1", "Q-1", quote_items(), None, None, "emp", 10)
            .unwrap();
        let out = wf.send_quotation(&mut state, "L1", "emp", 20).unwrap();
        assert!(out.promoted);
        assert_eq!(out.status, Stage::QuoteSent);
    }

    #[test]
    fn test_send_proposal_creates_half_advance_link() {
        let (mut wf, mut state) = setup();
        wf.record_quotation(&mut state, "L1", "Q-1", quote_items(), None, None, "emp", 10)
            .unwrap();
        let out = wf.send_proposal(&mut state, "L1", "emp", 20).unwrap();

        // Grand total 16_048 → 50% advance
        assert_eq!(out.amount, 8_024);
        assert!(out.reference_id.ends_with("-A"));
        assert_eq!(out.transition.status, Stage::ProposalSent);

        let lead = state.lead("L1").unwrap();
        let rec = lead.payment_by_reference(&out.reference_id).unwrap();
        assert_eq!(rec.kind, PaymentKind::Advance);
        assert_eq!(rec.status, PaymentStatus::Created);
        assert_eq!(rec.amount, 8_024);
    }

    #[test]
    fn test_send_proposal_requires_quotation() {
        let (mut wf, mut state) = setup();
        assert!(matches!(
            wf.send_proposal(&mut state, "L1", "emp", 0),
            Err(Error::Validation(_))
        ));
    }
}
