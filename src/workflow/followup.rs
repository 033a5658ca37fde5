//! Follow-up sweep: reminders for overdue callback/data-fix/postponed
//! leads, escalating to the admin after repeated misses.

use crate::error::Result;
use crate::gateway::Gateway;
use crate::hook::Hook;
use crate::state::State;
use crate::workflow::Workflow;
use crate::TimestampMs;

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Notify once per due-date crossing: each lead whose follow-up is
    /// past due and not yet flagged gets a reminder (or an escalation at
    /// three or more attempts), then `notified` is set so the next sweep
    /// stays quiet until a new follow-up is scheduled.
    pub fn follow_up_sweep(&mut self, state: &mut State, now: TimestampMs) -> Result<Vec<String>> {
        let due: Vec<(String, u32)> = state
            .leads_sorted()
            .into_iter()
            .filter_map(|l| {
                let f = l.follow_up.as_ref()?;
                if f.due_at <= now && !f.notified {
                    Some((l.id.clone(), f.attempts))
                } else {
                    None
                }
            })
            .collect();

        let mut notified = Vec::with_capacity(due.len());
        for (id, attempts) in due {
            {
                let lead = state.lead_mut(&id)?;
                if let Some(f) = lead.follow_up.as_mut() {
                    f.notified = true;
                }
                lead.log_activity("Follow-up Reminder", "System", now, None);
                lead.touch(now);
            }

            let lead_ref = state.lead(&id)?;
            let due_at = lead_ref.follow_up.as_ref().map(|f| f.due_at).unwrap_or(now);
            if attempts >= 3 {
                let sent = self.hook.on_admin_escalation(lead_ref, attempts);
                self.notify(sent, "admin escalation");
            } else {
                let sent = self.hook.on_followup_reminder(lead_ref, due_at);
                self.notify(sent, "follow-up reminder");
            }
            notified.push(id);
        }
        Ok(notified)
    }
}
