//! Production kickoff and completion, including the balance-payment
//! handoff at dispatch time.

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::hook::Hook;
use crate::stage::Stage;
use crate::state::{PaymentCustomer, PaymentKind, State};
use crate::workflow::{billing, install, TransitionOutcome, Workflow};
use crate::TimestampMs;
use serde::Serialize;

/// What production completion resolved to.
#[derive(Debug, Clone, Serialize)]
pub enum ProductionOutcome {
    /// Money still owed; customer gets the balance link.
    BalanceRequired {
        due: i64,
        reference_id: String,
        pay_url: String,
    },
    /// Fully settled with a verified balance payment: installation booked.
    InstallationScheduled { at: TimestampMs },
    /// Totals say zero due but no paid balance record backs it up; a
    /// human needs to confirm before booking.
    WaitingForBalanceProof,
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Kick off manufacturing. Requires the design freeze (ProdReady).
    pub fn start_production(
        &mut self,
        state: &mut State,
        id: &str,
        actor: &str,
        now: TimestampMs,
    ) -> Result<TransitionOutcome> {
        let outcome = {
            let lead = state.lead_mut(id)?;
            if lead.status != Stage::ProdReady {
                return Err(Error::InvalidTransition(format!(
                    "production needs a frozen design (status is {})",
                    lead.status
                )));
            }
            let eta = Stage::ProdRunning.due_at(now);
            let (promoted, entry) =
                self.promote_with_entry(lead, Stage::ProdRunning, actor, now, Some(eta));
            lead.log_activity("Production Started", actor, now, None);
            lead.touch(now);
            TransitionOutcome::from_lead(lead, promoted, entry)
        };

        let eta = Stage::ProdRunning.due_at(now);
        let lead_ref = state.lead(id)?;
        let sent = self.hook.on_production_started(lead_ref, eta);
        self.notify(sent, "production started");
        Ok(outcome)
    }

    /// Mark manufacturing finished. With a balance outstanding this mints
    /// the balance link; with everything paid and proven it books the
    /// installation straight away.
    pub fn complete_production(
        &mut self,
        state: &mut State,
        id: &str,
        actor: &str,
        now: TimestampMs,
    ) -> Result<ProductionOutcome> {
        let (due, customer, has_balance_proof) = {
            let lead = state.lead_mut(id)?;
            if lead.status.rank() < Stage::ProdRunning.rank() {
                return Err(Error::InvalidTransition(
                    "production has not started".to_string(),
                ));
            }
            self.promote_with_entry(lead, Stage::ProdCompleted, actor, now, None);
            lead.log_activity("Production Completed", actor, now, None);
            lead.touch(now);

            let due = billing::compute_totals(lead, &self.config).due;
            let customer = PaymentCustomer {
                name: lead.contact.name.clone(),
                email: lead.contact.email.clone(),
                contact: lead.contact.phone.clone(),
            };
            let has_balance_proof = lead
                .payments
                .iter()
                .any(|p| p.status.is_paid() && p.classify() == PaymentKind::Balance);
            (due, customer, has_balance_proof)
        };

        if due > 0 {
            let (reference, pay_url) =
                self.create_balance_link(state, id, due, customer, now)?;
            let lead_ref = state.lead(id)?;
            let sent = self.hook.on_balance_due(lead_ref, due, &pay_url);
            self.notify(sent, "balance due");
            return Ok(ProductionOutcome::BalanceRequired {
                due,
                reference_id: reference,
                pay_url,
            });
        }

        if !has_balance_proof {
            return Ok(ProductionOutcome::WaitingForBalanceProof);
        }

        let at = {
            let lead = state.lead_mut(id)?;
            let at = install::schedule_on_lead(lead, None, actor, now);
            lead.touch(now);
            at
        };
        let lead_ref = state.lead(id)?;
        let sent = self.hook.on_installation_scheduled(lead_ref, at);
        self.notify(sent, "installation scheduled");
        Ok(ProductionOutcome::InstallationScheduled { at })
    }
}
