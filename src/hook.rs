//! Hook: injectable notification boundary for workflow side effects.
//!
//! Mailer and WhatsApp senders live behind this trait. Hooks fire after
//! the state mutation has committed; the orchestrator logs a failed hook
//! as a warning and never rolls back or propagates it.

use crate::error::Result;
use crate::logger::Logger;
use crate::state::Lead;
use crate::TimestampMs;

/// Trait-based hook for customer/staff notifications.
///
/// Every method defaults to a no-op so implementations only pick up the
/// events they care about.
pub trait Hook {
    /// Lead created from the web form; welcome message + tracking link.
    fn on_lead_created(&mut self, _lead: &Lead, _tracking_url: &str) -> Result<()> {
        Ok(())
    }

    /// Follow-up call is due for the assigned employee.
    fn on_followup_reminder(&mut self, _lead: &Lead, _due_at: TimestampMs) -> Result<()> {
        Ok(())
    }

    /// Repeated follow-ups missed; escalate to the admin address.
    fn on_admin_escalation(&mut self, _lead: &Lead, _attempts: u32) -> Result<()> {
        Ok(())
    }

    /// Measurement visit booked with a technician.
    fn on_measurement_scheduled(&mut self, _lead: &Lead, _at: TimestampMs) -> Result<()> {
        Ok(())
    }

    /// Quotation shared with the customer.
    fn on_quotation_sent(&mut self, _lead: &Lead) -> Result<()> {
        Ok(())
    }

    /// Proposal + advance payment link shared.
    fn on_proposal_sent(&mut self, _lead: &Lead, _pay_url: &str) -> Result<()> {
        Ok(())
    }

    /// Design revision sent for client review.
    fn on_design_review_requested(
        &mut self,
        _lead: &Lead,
        _version: u32,
        _review_url: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// Client approved a design revision.
    fn on_design_approved(&mut self, _lead: &Lead, _version: u32) -> Result<()> {
        Ok(())
    }

    /// Production kicked off; share the ETA.
    fn on_production_started(&mut self, _lead: &Lead, _eta: TimestampMs) -> Result<()> {
        Ok(())
    }

    /// Balance payment required; share the payment link.
    fn on_balance_due(&mut self, _lead: &Lead, _due: i64, _pay_url: &str) -> Result<()> {
        Ok(())
    }

    /// Installation booked.
    fn on_installation_scheduled(&mut self, _lead: &Lead, _at: TimestampMs) -> Result<()> {
        Ok(())
    }

    /// Installation completed on site.
    fn on_installation_completed(&mut self, _lead: &Lead, _at: TimestampMs) -> Result<()> {
        Ok(())
    }

    /// A paid payment could not be classified advance/balance; a human
    /// must look at it.
    fn on_manual_review_needed(&mut self, _lead: &Lead, _reference: &str) -> Result<()> {
        Ok(())
    }
}

/// No-op hook: default for tests and replay-style usage.
#[derive(Debug, Clone, Default)]
pub struct NoOpHook;

impl Hook for NoOpHook {}

/// Hook that logs every notification; used by the CLI where no real
/// mailer/WhatsApp client is wired up.
#[derive(Debug, Clone, Default)]
pub struct LoggingHook;

impl Hook for LoggingHook {
    fn on_lead_created(&mut self, lead: &Lead, tracking_url: &str) -> Result<()> {
        Logger::info(&format!(
            "notify {}: welcome, track at {}",
            lead.contact.email, tracking_url
        ));
        Ok(())
    }

    fn on_followup_reminder(&mut self, lead: &Lead, due_at: TimestampMs) -> Result<()> {
        Logger::info(&format!(
            "notify assignee of {}: follow-up due at {}",
            lead.id, due_at
        ));
        Ok(())
    }

    fn on_admin_escalation(&mut self, lead: &Lead, attempts: u32) -> Result<()> {
        Logger::warn(&format!(
            "escalation: lead {} missed {} follow-ups",
            lead.id, attempts
        ));
        Ok(())
    }

    fn on_measurement_scheduled(&mut self, lead: &Lead, at: TimestampMs) -> Result<()> {
        Logger::info(&format!("notify {}: measurement at {}", lead.id, at));
        Ok(())
    }

    fn on_quotation_sent(&mut self, lead: &Lead) -> Result<()> {
        Logger::info(&format!("notify {}: quotation sent", lead.id));
        Ok(())
    }

    fn on_proposal_sent(&mut self, lead: &Lead, pay_url: &str) -> Result<()> {
        Logger::info(&format!("notify {}: proposal, pay at {}", lead.id, pay_url));
        Ok(())
    }

    fn on_design_review_requested(
        &mut self,
        lead: &Lead,
        version: u32,
        review_url: &str,
    ) -> Result<()> {
        Logger::info(&format!(
            "notify {}: review design v{} at {}",
            lead.id, version, review_url
        ));
        Ok(())
    }

    fn on_design_approved(&mut self, lead: &Lead, version: u32) -> Result<()> {
        Logger::info(&format!("notify {}: design v{} approved", lead.id, version));
        Ok(())
    }

    fn on_production_started(&mut self, lead: &Lead, eta: TimestampMs) -> Result<()> {
        Logger::info(&format!("notify {}: production started, eta {}", lead.id, eta));
        Ok(())
    }

    fn on_balance_due(&mut self, lead: &Lead, due: i64, pay_url: &str) -> Result<()> {
        Logger::info(&format!(
            "notify {}: balance {} due, pay at {}",
            lead.id, due, pay_url
        ));
        Ok(())
    }

    fn on_installation_scheduled(&mut self, lead: &Lead, at: TimestampMs) -> Result<()> {
        Logger::info(&format!("notify {}: installation at {}", lead.id, at));
        Ok(())
    }

    fn on_installation_completed(&mut self, lead: &Lead, at: TimestampMs) -> Result<()> {
        Logger::info(&format!("notify {}: installation done at {}", lead.id, at));
        Ok(())
    }

    fn on_manual_review_needed(&mut self, lead: &Lead, reference: &str) -> Result<()> {
        Logger::warn(&format!(
            "manual review: payment {} on lead {} has unknown kind",
            reference, lead.id
        ));
        Ok(())
    }
}
