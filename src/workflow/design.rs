//! Design approval sub-flow: revision uploads, client review links, and
//! the decision handling that freezes a design for production.

use crate::error::{Error, Result};
use crate::gateway::Gateway;
use crate::hook::Hook;
use crate::new_token;
use crate::stage::Stage;
use crate::state::{ApprovalState, DesignRevision, FrozenDesign, State};
use crate::workflow::{status, Workflow};
use crate::TimestampMs;
use serde::Serialize;

/// Client decision on a revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DesignDecision {
    Approve,
    RequestChanges,
}

/// Result of a design decision. `already` marks an idempotent repeat.
#[derive(Debug, Clone, Serialize)]
pub struct DesignDecisionOutcome {
    pub lead_id: String,
    pub version: u32,
    pub state: ApprovalState,
    pub already: bool,
    pub promoted: bool,
}

/// Read-only view for the public review page.
#[derive(Debug, Clone, Serialize)]
pub struct DesignReviewView {
    pub lead_id: String,
    pub category: String,
    pub customer_name: String,
    pub version: u32,
    pub files: Vec<String>,
    pub ops_notes: String,
    pub state: ApprovalState,
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Store a new Draft revision; version numbers are strictly
    /// increasing per lead.
    pub fn upload_design(
        &mut self,
        state: &mut State,
        id: &str,
        files: Vec<String>,
        ops_notes: String,
        actor: &str,
        now: TimestampMs,
    ) -> Result<u32> {
        if files.is_empty() {
            return Err(Error::Validation("a design upload needs at least one file".to_string()));
        }
        let lead = state.lead_mut(id)?;
        let version = lead.design.next_version();
        lead.design
            .revisions
            .push(DesignRevision::draft(version, files, ops_notes, now));
        lead.log_activity(
            "Design Uploaded",
            actor,
            now,
            Some(serde_json::json!({ "version": version }).to_string()),
        );
        lead.touch(now);
        Ok(version)
    }

    /// Send the latest revision for client review. A Draft goes out as
    /// is; a latest revision already decided is cloned into a fresh
    /// Pending revision so the decided one stays immutable.
    pub fn request_design_approval(
        &mut self,
        state: &mut State,
        id: &str,
        actor: &str,
        now: TimestampMs,
    ) -> Result<(u32, String)> {
        let (version, review_url) = {
            let lead = state.lead_mut(id)?;
            let latest = lead
                .design
                .latest()
                .cloned()
                .ok_or_else(|| Error::Validation("no design uploaded yet".to_string()))?;

            let token = new_token();
            let version = if latest.approval == ApprovalState::Draft {
                let rev = lead
                    .design
                    .latest_mut()
                    .ok_or_else(|| Error::StateError("design revision vanished".to_string()))?;
                rev.approval = ApprovalState::Pending;
                rev.token = Some(token.clone());
                rev.version
            } else {
                let version = lead.design.next_version();
                let mut rev = DesignRevision::draft(version, latest.files, latest.ops_notes, now);
                rev.approval = ApprovalState::Pending;
                rev.token = Some(token.clone());
                lead.design.revisions.push(rev);
                version
            };

            lead.log_activity(
                "Design Review Requested",
                actor,
                now,
                Some(serde_json::json!({ "version": version }).to_string()),
            );
            lead.touch(now);
            (version, self.config.design_review_url(&token))
        };

        let lead_ref = state.lead(id)?;
        let sent = self
            .hook
            .on_design_review_requested(lead_ref, version, &review_url);
        self.notify(sent, "design review requested");
        Ok((version, review_url))
    }

    /// Public review page data, looked up by revision token.
    pub fn design_review(&self, state: &State, token: &str) -> Result<DesignReviewView> {
        let lead = state
            .find_lead_by_design_token(token)
            .ok_or_else(|| Error::RevisionNotFound(token.to_string()))?;
        let rev = lead
            .design
            .revision_by_token(token)
            .ok_or_else(|| Error::RevisionNotFound(token.to_string()))?;
        Ok(DesignReviewView {
            lead_id: lead.id.clone(),
            category: lead.category.clone(),
            customer_name: lead.contact.name.clone(),
            version: rev.version,
            files: rev.files.clone(),
            ops_notes: rev.ops_notes.clone(),
            state: rev.approval,
        })
    }

    /// Apply the client's decision to the revision behind `token`.
    ///
    /// Only the latest revision is decidable; older tokens get
    /// `StaleRevision` pointing at the current version. Repeat decisions
    /// are flagged `already` rather than erroring, so a double-submitted
    /// form is harmless.
    pub fn decide_design(
        &mut self,
        state: &mut State,
        token: &str,
        decision: DesignDecision,
        notes: Option<String>,
        now: TimestampMs,
    ) -> Result<DesignDecisionOutcome> {
        let (lead_id, outcome_version) = {
            let lead = state
                .find_lead_by_design_token_mut(token)
                .ok_or_else(|| Error::RevisionNotFound(token.to_string()))?;
            let latest_version = lead
                .design
                .latest()
                .map(|r| r.version)
                .unwrap_or(0);
            let rev = lead
                .design
                .revision_by_token_mut(token)
                .ok_or_else(|| Error::RevisionNotFound(token.to_string()))?;
            if rev.version != latest_version {
                return Err(Error::StaleRevision {
                    latest: latest_version,
                });
            }
            (lead.id.clone(), rev.version)
        };

        match decision {
            DesignDecision::Approve => self.approve_design(state, &lead_id, token, notes, now),
            DesignDecision::RequestChanges => {
                self.request_changes(state, &lead_id, token, notes, now, outcome_version)
            }
        }
    }

    fn approve_design(
        &mut self,
        state: &mut State,
        lead_id: &str,
        token: &str,
        notes: Option<String>,
        now: TimestampMs,
    ) -> Result<DesignDecisionOutcome> {
        let (version, already, promoted) = {
            let lead = state.lead_mut(lead_id)?;
            let rev = lead
                .design
                .revision_by_token_mut(token)
                .ok_or_else(|| Error::RevisionNotFound(token.to_string()))?;
            if rev.approval == ApprovalState::Approved {
                return Ok(DesignDecisionOutcome {
                    lead_id: lead_id.to_string(),
                    version: rev.version,
                    state: ApprovalState::Approved,
                    already: true,
                    promoted: false,
                });
            }
            rev.approval = ApprovalState::Approved;
            rev.approval_notes = notes;
            rev.decided_at = Some(now);
            let version = rev.version;

            lead.design.frozen = Some(FrozenDesign { version, at: now });
            let (promoted, _) = self.promote_with_entry(
                lead,
                Stage::ProdReady,
                "Client",
                now,
                Some(Stage::ProdReady.due_at(now)),
            );
            lead.log_activity(
                "Design Approved",
                "Client",
                now,
                Some(serde_json::json!({ "version": version }).to_string()),
            );
            lead.touch(now);
            (version, false, promoted)
        };

        let lead_ref = state.lead(lead_id)?;
        let sent = self.hook.on_design_approved(lead_ref, version);
        self.notify(sent, "design approved");
        Ok(DesignDecisionOutcome {
            lead_id: lead_id.to_string(),
            version,
            state: ApprovalState::Approved,
            already,
            promoted,
        })
    }

    fn request_changes(
        &mut self,
        state: &mut State,
        lead_id: &str,
        token: &str,
        notes: Option<String>,
        now: TimestampMs,
        version: u32,
    ) -> Result<DesignDecisionOutcome> {
        let lead = state.lead_mut(lead_id)?;
        let rev = lead
            .design
            .revision_by_token_mut(token)
            .ok_or_else(|| Error::RevisionNotFound(token.to_string()))?;
        if rev.approval == ApprovalState::ChangesRequested && rev.approval_notes == notes {
            // Double-submitted form; nothing new to record
            return Ok(DesignDecisionOutcome {
                lead_id: lead_id.to_string(),
                version,
                state: ApprovalState::ChangesRequested,
                already: true,
                promoted: false,
            });
        }
        rev.approval = ApprovalState::ChangesRequested;
        rev.approval_notes = notes.clone();
        rev.decided_at = Some(now);

        // Same-rank row keeps the revision loop visible on the timeline
        let responsible = lead.responsible();
        status::record_stage(
            lead,
            Stage::OrderConfirmed,
            &responsible,
            "Client",
            now,
            Some(Stage::OrderConfirmed.due_at(now)),
        );
        lead.log_activity(
            "Design Changes Requested",
            "Client",
            now,
            notes.map(|n| serde_json::json!({ "notes": n }).to_string()),
        );
        lead.touch(now);
        Ok(DesignDecisionOutcome {
            lead_id: lead_id.to_string(),
            version,
            state: ApprovalState::ChangesRequested,
            already: false,
            promoted: false,
        })
    }
}
