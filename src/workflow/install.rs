//! Installation scheduling and completion.
//!
//! Scheduling is gated on the balance being fully paid; attempts while
//! money is outstanding either fail with the amount due or turn into a
//! deferred request carrying a balance payment link.

use crate::error::{Error, Result};
use crate::gateway::{build_reference_id, Gateway, PaymentLinkRequest};
use crate::hook::Hook;
use crate::stage::Stage;
use crate::state::{Lead, PaymentCustomer, PaymentKind, PaymentRecord, State};
use crate::workflow::{billing, status, Workflow};
use crate::{TimestampMs, DAY_MS};
use chrono::{TimeZone, Utc};
use serde::Serialize;

/// Installer details recorded at completion.
#[derive(Debug, Clone, Default)]
pub struct InstallerInfo {
    pub installer_name: Option<String>,
    pub installer_phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub enum InstallationOutcome {
    Scheduled { at: TimestampMs },
    PaymentRequired {
        due: i64,
        reference_id: String,
        pay_url: String,
        desired_at: TimestampMs,
    },
    Completed { at: TimestampMs },
    AlreadyCompleted,
}

/// Default installation slot: two days out at 10:00 UTC.
pub(crate) fn default_slot(now: TimestampMs) -> TimestampMs {
    let fallback = now + 2 * DAY_MS;
    Utc.timestamp_millis_opt(fallback)
        .single()
        .and_then(|dt| dt.date_naive().and_hms_opt(10, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
        .unwrap_or(fallback)
}

/// Set the installation date and write the matching ledger row. Promotion
/// is rank-guarded, so running this again on an already-booked lead just
/// refreshes the date. Consumes any deferred desired date when the caller
/// did not supply one.
pub(crate) fn schedule_on_lead(
    lead: &mut Lead,
    when: Option<TimestampMs>,
    actor: &str,
    now: TimestampMs,
) -> TimestampMs {
    let deferred = lead.installation.take_deferred();
    let at = when
        .or(deferred.and_then(|d| d.desired_at))
        .unwrap_or_else(|| default_slot(now));
    lead.installation.scheduled_at = Some(at);

    if status::advance(lead, Stage::InstallBooked) {
        let responsible = lead.responsible();
        status::record_stage(lead, Stage::InstallBooked, &responsible, actor, now, Some(at));
    }
    lead.log_activity(
        "Installation Scheduled",
        actor,
        now,
        Some(serde_json::json!({ "at": at }).to_string()),
    );
    at
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Schedule installation, refusing outright while money is owed.
    pub fn auto_schedule(
        &mut self,
        state: &mut State,
        id: &str,
        when: Option<TimestampMs>,
        actor: &str,
        now: TimestampMs,
    ) -> Result<InstallationOutcome> {
        let at = {
            let lead = state.lead_mut(id)?;
            let due = billing::compute_totals(lead, &self.config).due;
            if due > 0 {
                return Err(Error::BalanceDue { due });
            }
            let at = schedule_on_lead(lead, when, actor, now);
            lead.touch(now);
            at
        };

        let lead_ref = state.lead(id)?;
        let sent = self.hook.on_installation_scheduled(lead_ref, at);
        self.notify(sent, "installation scheduled");
        Ok(InstallationOutcome::Scheduled { at })
    }

    /// Customer-initiated scheduling after dispatch. With money still
    /// owed this creates a balance link and a deferred request instead of
    /// failing; the date is honored once the payment lands.
    pub fn schedule_installation(
        &mut self,
        state: &mut State,
        id: &str,
        when: Option<TimestampMs>,
        actor: &str,
        now: TimestampMs,
    ) -> Result<InstallationOutcome> {
        let (due, customer) = {
            let lead = state.lead(id)?;
            if lead.status.rank() < Stage::ProdCompleted.rank() {
                return Err(Error::InvalidTransition(
                    "production has not completed yet".to_string(),
                ));
            }
            let customer = PaymentCustomer {
                name: lead.contact.name.clone(),
                email: lead.contact.email.clone(),
                contact: lead.contact.phone.clone(),
            };
            (billing::compute_totals(lead, &self.config).due, customer)
        };

        if due == 0 {
            return self.auto_schedule(state, id, when, actor, now);
        }

        let desired_at = when.unwrap_or_else(|| default_slot(now));
        let (reference, pay_url) =
            self.create_balance_link(state, id, due, customer, now)?;
        {
            let lead = state.lead_mut(id)?;
            lead.installation.defer(Some(desired_at), Some(reference.clone()));
            lead.log_activity(
                "Installation Deferred",
                actor,
                now,
                Some(serde_json::json!({ "desired_at": desired_at, "due": due }).to_string()),
            );
            lead.touch(now);
        }

        let lead_ref = state.lead(id)?;
        let sent = self.hook.on_balance_due(lead_ref, due, &pay_url);
        self.notify(sent, "balance due");
        Ok(InstallationOutcome::PaymentRequired {
            due,
            reference_id: reference,
            pay_url,
            desired_at,
        })
    }

    /// Record the finished installation. Repeating the call on a done
    /// lead is a no-op, not an error.
    pub fn complete_installation(
        &mut self,
        state: &mut State,
        id: &str,
        info: InstallerInfo,
        actor: &str,
        now: TimestampMs,
    ) -> Result<InstallationOutcome> {
        {
            let lead = state.lead_mut(id)?;
            if lead.status == Stage::InstallDone {
                return Ok(InstallationOutcome::AlreadyCompleted);
            }
            if lead.status.rank() < Stage::InstallBooked.rank() {
                return Err(Error::InvalidTransition(
                    "installation has not been booked".to_string(),
                ));
            }
            lead.installation.completed_at = Some(now);
            if info.installer_name.is_some() {
                lead.installation.installer_name = info.installer_name;
            }
            if info.installer_phone.is_some() {
                lead.installation.installer_phone = info.installer_phone;
            }
            if info.notes.is_some() {
                lead.installation.notes = info.notes;
            }
            self.promote_with_entry(lead, Stage::InstallDone, actor, now, None);
            lead.log_activity("Installation Completed", actor, now, None);
            lead.touch(now);
        }

        let lead_ref = state.lead(id)?;
        let sent = self.hook.on_installation_completed(lead_ref, now);
        self.notify(sent, "installation completed");
        Ok(InstallationOutcome::Completed { at: now })
    }

    /// Mint a balance payment link (tag `B`) and record it on the lead.
    pub(crate) fn create_balance_link(
        &mut self,
        state: &mut State,
        id: &str,
        amount: i64,
        customer: PaymentCustomer,
        now: TimestampMs,
    ) -> Result<(String, String)> {
        let mut reference = build_reference_id(id, PaymentKind::Balance.tag(), now);
        while state.reference_exists(&reference) {
            reference = build_reference_id(id, PaymentKind::Balance.tag(), now);
        }

        let description = "Balance payment for your order".to_string();
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
            kind: PaymentKind::Balance,
            customer,
            payment_id: None,
            created_at: now,
            expires_at: link.expires_at,
            paid_at: None,
            raw: None,
        });
        lead.log_activity(
            "Payment Link Created",
            "System",
            now,
            Some(serde_json::json!({ "reference": reference, "amount": amount }).to_string()),
        );
        Ok((reference, link.short_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::OfflineGateway;
    use crate::hook::NoOpHook;
    use crate::state::{Contact, Lead, PaymentStatus};

    fn paid_lead(status: Stage, amount: i64) -> Lead {
        let mut l = Lead::new(
            "L1".to_string(),
            "s".to_string(),
            "Door".to_string(),
            Contact::default(),
            0,
        );
        l.status = status;
        if amount > 0 {
            l.payments.push(PaymentRecord {
                reference_id: "L1-x-y-B".to_string(),
                link_id: "pl_b".to_string(),
                short_url: String::new(),
                description: String::new(),
                amount,
                currency: "INR".to_string(),
                status: PaymentStatus::Paid,
                kind: PaymentKind::Balance,
                customer: PaymentCustomer::default(),
                payment_id: None,
                created_at: 0,
                expires_at: None,
                paid_at: Some(0),
                raw: None,
            });
        }
        l
    }

    fn setup(lead: Lead) -> (Workflow<OfflineGateway, NoOpHook>, State) {
        let wf = Workflow::new(Config::new(), OfflineGateway, NoOpHook);
        let mut state = State::new();
        state.insert_lead(lead);
        (wf, state)
    }

    #[test]
    fn test_default_slot_is_two_days_out_at_ten() {
        // 2023-11-14T22:13:20Z
        let now = 1_700_000_000_000;
        let at = default_slot(now);
        let dt = Utc.timestamp_millis_opt(at).single().unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "10:00:00");
        assert!(at > now + DAY_MS && at < now + 3 * DAY_MS);
    }

    #[test]
    fn test_auto_schedule_refuses_while_due() {
        // No quote → grand 13_440ish? With no quotation, fixed charges still
        // apply, so due > 0.
        let (mut wf, mut state) = setup(paid_lead(Stage::ProdCompleted, 0));
        let err = wf.auto_schedule(&mut state, "L1", None, "emp", 0).unwrap_err();
        assert!(matches!(err, Error::BalanceDue { due } if due > 0));
        assert_eq!(state.lead("L1").unwrap().status, Stage::ProdCompleted);
    }

    #[test]
    fn test_auto_schedule_books_and_promotes_when_settled() {
        // Paid record covers fixed charges + tax with no quotation
        let (mut wf, mut state) = setup(paid_lead(Stage::ProdCompleted, 13_216));
        let out = wf.auto_schedule(&mut state, "L1", Some(9_000), "emp", 100).unwrap();
        assert!(matches!(out, InstallationOutcome::Scheduled { at: 9_000 }));

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.status, Stage::InstallBooked);
        assert_eq!(lead.installation.scheduled_at, Some(9_000));
    }

    #[test]
    fn test_reschedule_is_tolerated() {
        let (mut wf, mut state) = setup(paid_lead(Stage::ProdCompleted, 13_216));
        wf.auto_schedule(&mut state, "L1", Some(9_000), "emp", 100).unwrap();
        wf.auto_schedule(&mut state, "L1", Some(12_000), "emp", 200).unwrap();

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.installation.scheduled_at, Some(12_000));
        // Only one InstallBooked ledger row; the promotion was guarded
        let rows = lead
            .stage_history
            .iter()
            .filter(|e| e.stage == Stage::InstallBooked)
            .count();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_schedule_with_due_defers_and_links() {
        let (mut wf, mut state) = setup(paid_lead(Stage::ProdCompleted, 0));
        let out = wf
            .schedule_installation(&mut state, "L1", Some(77_000), "cust", 100)
            .unwrap();
        match out {
            InstallationOutcome::PaymentRequired { due, reference_id, desired_at, .. } => {
                assert!(due > 0);
                assert!(reference_id.ends_with("-B"));
                assert_eq!(desired_at, 77_000);
            }
            other => panic!("expected PaymentRequired, got {:?}", other),
        }

        let lead = state.lead("L1").unwrap();
        let d = lead.installation.deferred.as_ref().unwrap();
        assert_eq!(d.desired_at, Some(77_000));
        assert_eq!(lead.status, Stage::ProdCompleted);
    }

    #[test]
    fn test_schedule_requires_production_done() {
        let (mut wf, mut state) = setup(paid_lead(Stage::ProdRunning, 0));
        assert!(matches!(
            wf.schedule_installation(&mut state, "L1", None, "cust", 0),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_complete_installation_idempotent() {
        let (mut wf, mut state) = setup(paid_lead(Stage::InstallBooked, 13_216));
        let info = InstallerInfo {
            installer_name: Some("Arun".to_string()),
            ..InstallerInfo::default()
        };
        let out = wf
            .complete_installation(&mut state, "L1", info, "emp", 500)
            .unwrap();
        assert!(matches!(out, InstallationOutcome::Completed { at: 500 }));

        let out = wf
            .complete_installation(&mut state, "L1", InstallerInfo::default(), "emp", 600)
            .unwrap();
        assert!(matches!(out, InstallationOutcome::AlreadyCompleted));

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.installation.completed_at, Some(500));
        assert_eq!(lead.installation.installer_name.as_deref(), Some("Arun"));
    }

    #[test]
    fn test_complete_requires_booking() {
        let (mut wf, mut state) = setup(paid_lead(Stage::ProdCompleted, 0));
        assert!(matches!(
            wf.complete_installation(&mut state, "L1", InstallerInfo::default(), "emp", 0),
            Err(Error::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_deferred_desired_date_consumed_on_schedule() {
        let mut lead = paid_lead(Stage::ProdCompleted, 13_216);
        lead.installation.defer(Some(55_000), Some("L1-x-y-B".to_string()));
        let (mut wf, mut state) = setup(lead);

        let out = wf.auto_schedule(&mut state, "L1", None, "System", 100).unwrap();
        assert!(matches!(out, InstallationOutcome::Scheduled { at: 55_000 }));
        assert!(state.lead("L1").unwrap().installation.deferred.is_none());
    }
}
