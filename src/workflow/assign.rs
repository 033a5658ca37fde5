//! Round-robin lead assignment over the configured pool.
//!
//! The rotation cursor lives in persisted state, so restarts do not
//! reset fairness back to the first assignee.

use crate::error::Result;
use crate::gateway::Gateway;
use crate::hook::Hook;
use crate::stage::Stage;
use crate::state::State;
use crate::workflow::{status, Workflow};
use crate::{TimestampMs, HOUR_MS};

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Assign every unassigned fresh lead to the next assignee in
    /// rotation. Returns the (lead, assignee) pairs made.
    pub fn auto_assign(
        &mut self,
        state: &mut State,
        now: TimestampMs,
    ) -> Result<Vec<(String, String)>> {
        if self.config.assignees.is_empty() {
            return Ok(Vec::new());
        }

        let pending: Vec<String> = state
            .leads_sorted()
            .into_iter()
            .filter(|l| l.status == Stage::LeadNew && l.assignee.is_none())
            .map(|l| l.id.clone())
            .collect();

        let pool = self.config.assignees.clone();
        let mut made = Vec::with_capacity(pending.len());
        for id in pending {
            let assignee = pool[(state.rotation_cursor % pool.len() as u64) as usize].clone();
            state.rotation_cursor = state.rotation_cursor.wrapping_add(1);

            let lead = state.lead_mut(&id)?;
            lead.assignee = Some(assignee.clone());
            // Same-rank row: ownership changed, pipeline position did not
            status::record_stage(
                lead,
                Stage::LeadNew,
                &assignee,
                "System",
                now,
                Some(now + 4 * HOUR_MS),
            );
            lead.log_activity(
                "Assigned",
                "System",
                now,
                Some(serde_json::json!({ "assignee": assignee }).to_string()),
            );
            lead.touch(now);
            made.push((id, assignee));
        }
        Ok(made)
    }
}
