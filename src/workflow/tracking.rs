//! Public order-tracking view, keyed by an unguessable token instead of
//! the lead id.

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::hook::Hook;
use crate::stage::{Stage, STAGE_ORDER};
use crate::state::{Lead, State, Tracking};
use crate::workflow::{billing, Totals, Workflow};
use crate::{new_token, token_hash, TimestampMs};
use serde::Serialize;

/// One row of the public timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineStage {
    pub code: &'static str,
    pub label: &'static str,
    pub tip: &'static str,
    pub eta_hours: i64,
    pub reached: bool,
    pub reached_at: Option<TimestampMs>,
    pub current: bool,
}

/// Everything the tracking page shows. Read-only; no internal notes, no
/// payment references.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingView {
    pub lead_id: String,
    pub category: String,
    pub quantity: u32,
    pub status: &'static str,
    pub status_label: &'static str,
    pub progress_index: usize,
    pub timeline: Vec<TimelineStage>,
    pub totals: Totals,
    pub quotation_file: Option<String>,
    pub next_action: &'static str,
}

/// Issue (or reuse) the lead's tracking token. A revoked token is
/// replaced with a fresh one.
pub fn ensure_tracking(lead: &mut Lead, now: TimestampMs) -> String {
    if let Some(t) = &lead.tracking {
        if !t.revoked {
            return t.token.clone();
        }
    }
    let token = new_token();
    lead.tracking = Some(Tracking {
        token: token.clone(),
        token_hash: token_hash(&token),
        created_at: now,
        revoked: false,
    });
    token
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Issue or return the tracking token for a lead.
    pub fn issue_tracking(
        &mut self,
        state: &mut State,
        id: &str,
        now: TimestampMs,
    ) -> Result<String> {
        let lead = state.lead_mut(id)?;
        let token = ensure_tracking(lead, now);
        lead.touch(now);
        Ok(token)
    }

    /// Kill a leaked tracking link; the token stops resolving immediately.
    pub fn revoke_tracking(&mut self, state: &mut State, id: &str, now: TimestampMs) -> Result<()> {
        let lead = state.lead_mut(id)?;
        match lead.tracking.as_mut() {
            Some(t) => {
                t.revoked = true;
                lead.touch(now);
                Ok(())
            }
            None => Err(Error::Validation("no tracking token issued".to_string())),
        }
    }

    /// Resolve a token to the public view. Unknown and revoked tokens are
    /// indistinguishable from a missing lead.
    pub fn track(&self, state: &State, token: &str) -> Result<TrackingView> {
        let lead = state
            .find_lead_by_tracking_token(token)
            .ok_or_else(|| Error::LeadNotFound(token.to_string()))?;

        let current_rank = lead.status.rank();
        let timeline: Vec<TimelineStage> = STAGE_ORDER
            .iter()
            .map(|s| TimelineStage {
                code: s.code(),
                label: s.label(),
                tip: s.tip(),
                eta_hours: s.eta_hours(),
                reached: s.rank() <= current_rank,
                reached_at: lead.reached_at(*s),
                current: s.rank() == current_rank,
            })
            .collect();

        let next_action = STAGE_ORDER
            .get(current_rank + 1)
            .map(|s| s.tip())
            .unwrap_or("Your order is complete. Thank you!");

        Ok(TrackingView {
            lead_id: lead.id.clone(),
            category: lead.category.clone(),
            quantity: lead.quantity,
            status: lead.status.code(),
            status_label: lead.status.label(),
            progress_index: current_rank,
            timeline,
            totals: billing::compute_totals(lead, &self.config),
            quotation_file: lead.latest_quotation().and_then(|q| q.file_name.clone()),
            next_action,
        })
    }
}
