//! Workflow orchestrator: validates an operation, mutates state in one
//! unit, then fires notification hooks.
//!
//! Hooks run only after the mutation is complete; a hook failure is
//! logged and never rolls back or propagates (the state change already
//! committed).

pub mod assign;
pub mod billing;
pub mod design;
pub mod followup;
pub mod install;
pub mod production;
pub mod qualify;
pub mod reconcile;
pub mod sales;
pub mod status;
pub mod tracking;

pub use billing::{compute_totals, Totals};
pub use design::{DesignDecision, DesignDecisionOutcome, DesignReviewView};
pub use install::{InstallationOutcome, InstallerInfo};
pub use production::ProductionOutcome;
pub use qualify::{CallOutcome, QualifyDetails, QualifyOutcome};
pub use reconcile::ReconcileOutcome;
pub use sales::ProposalOutcome;
pub use status::{advance, record_stage};
pub use tracking::{TimelineStage, TrackingView};

use crate::config::Config;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::hook::Hook;
use crate::logger::Logger;
use crate::stage::Stage;
use crate::state::{Contact, Lead, StageEntry, State};
use crate::TimestampMs;
use serde::Serialize;

/// Result of a workflow-advancing operation: the new status plus the
/// ledger entry just written, so a caller can render feedback without
/// re-fetching the aggregate.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    pub lead_id: String,
    pub status: Stage,
    pub promoted: bool,
    pub entry: Option<StageEntry>,
    pub version: u64,
}

impl TransitionOutcome {
    fn from_lead(lead: &Lead, promoted: bool, entry: Option<StageEntry>) -> Self {
        TransitionOutcome {
            lead_id: lead.id.clone(),
            status: lead.status,
            promoted,
            entry,
            version: lead.version,
        }
    }
}

/// New-lead intake payload from the web form.
#[derive(Debug, Clone, Default)]
pub struct IntakeRequest {
    pub session_id: String,
    pub category: String,
    pub quantity: u32,
    pub contact: Contact,
    pub city: Option<String>,
    pub message: Option<String>,
}

/// Workflow engine parameterized over the payment gateway and the
/// notification hook.
pub struct Workflow<G: Gateway, H: Hook> {
    pub config: Config,
    pub gateway: G,
    pub hook: H,
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    pub fn new(config: Config, gateway: G, hook: H) -> Self {
        Workflow {
            config,
            gateway,
            hook,
        }
    }

    /// Log a failed notification; the mutation already committed.
    pub(crate) fn notify(&self, result: Result<()>, what: &str) {
        if let Err(e) = result {
            Logger::warn(&format!("notification failed ({}): {}", what, e));
        }
    }

    /// Promote and append the matching ledger row in one step. Returns
    /// (promoted, entry written).
    pub(crate) fn promote_with_entry(
        &self,
        lead: &mut Lead,
        target: Stage,
        updated_by: &str,
        at: TimestampMs,
        due_at: Option<TimestampMs>,
    ) -> (bool, Option<StageEntry>) {
        let promoted = advance(lead, target);
        if !promoted {
            return (false, None);
        }
        let responsible = lead.responsible();
        record_stage(lead, target, &responsible, updated_by, at, due_at);
        (true, lead.last_stage_entry().cloned())
    }

    /// Create a lead from the web form: seed the first ledger row, start
    /// the audit trail, issue a tracking token, send the welcome message.
    pub fn intake(&mut self, state: &mut State, req: IntakeRequest, now: TimestampMs) -> Result<TransitionOutcome> {
        if req.contact.name.is_empty() && req.contact.phone.is_empty() && req.contact.email.is_empty()
        {
            return Err(crate::error::Error::Validation(
                "contact needs at least a name, phone or email".to_string(),
            ));
        }

        let id = state.allocate_lead_id();
        let mut contact = req.contact;
        let mut extra = Vec::new();
        if let Some(city) = req.city {
            extra.push(format!("City: {}", city));
        }
        if let Some(message) = req.message {
            extra.push(format!("Message: {}", message));
        }
        if !extra.is_empty() {
            if !contact.notes.is_empty() {
                extra.insert(0, contact.notes.clone());
            }
            contact.notes = extra.join("\n");
        }

        let session_id = if req.session_id.is_empty() {
            // Derive a stable session from contact details, as the web
            // form does not always send one
            if contact.phone.is_empty() {
                contact.email.clone()
            } else {
                contact.phone.clone()
            }
        } else {
            req.session_id
        };

        let mut lead = Lead::new(id.clone(), session_id.clone(), req.category, contact, now);
        if req.quantity > 0 {
            lead.quantity = req.quantity;
        }

        record_stage(
            &mut lead,
            Stage::LeadNew,
            "Unassigned",
            &session_id,
            now,
            Some(now + 4 * crate::HOUR_MS),
        );
        lead.log_activity(
            "Lead Created",
            "System",
            now,
            Some(serde_json::json!({"source": "Web Form"}).to_string()),
        );
        let token = tracking::ensure_tracking(&mut lead, now);
        let tracking_url = self.config.tracking_url(&token);
        lead.touch(now);

        let entry = lead.last_stage_entry().cloned();
        let outcome = TransitionOutcome::from_lead(&lead, true, entry);
        state.insert_lead(lead);

        let lead_ref = state.lead(&id)?;
        let sent = self.hook.on_lead_created(lead_ref, &tracking_url);
        self.notify(sent, "lead created");
        Ok(outcome)
    }

    /// Promote a lead to `target` by rank; equal or lower targets are a
    /// no-op (`promoted: false`), never an error and never a demotion.
    pub fn advance_to(
        &mut self,
        state: &mut State,
        id: &str,
        target: Stage,
        actor: &str,
        now: TimestampMs,
    ) -> Result<TransitionOutcome> {
        let lead = state.lead_mut(id)?;
        let (promoted, entry) =
            self.promote_with_entry(lead, target, actor, now, Some(target.due_at(now)));
        if promoted {
            lead.log_activity(
                &format!("Stage -> {}", target.code()),
                actor,
                now,
                None,
            );
            lead.touch(now);
        }
        Ok(TransitionOutcome::from_lead(lead, promoted, entry))
    }
}
