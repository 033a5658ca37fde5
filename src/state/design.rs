//! Design revisions and their approval lifecycle.

use crate::TimestampMs;
use serde::{Deserialize, Serialize};

/// Approval state of one revision: draft → pending → approved | changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    Draft,
    Pending,
    Approved,
    ChangesRequested,
}

/// Versioned design revision with a public review token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DesignRevision {
    /// 1-based, strictly increasing per lead
    pub version: u32,
    /// Public review token; set when sent for approval
    pub token: Option<String>,
    /// File names only; storage mechanics live outside the core
    pub files: Vec<String>,
    pub ops_notes: String,
    pub created_at: TimestampMs,
    pub approval: ApprovalState,
    pub approval_notes: Option<String>,
    pub decided_at: Option<TimestampMs>,
}

impl DesignRevision {
    pub fn draft(version: u32, files: Vec<String>, ops_notes: String, now: TimestampMs) -> Self {
        DesignRevision {
            version,
            token: None,
            files,
            ops_notes,
            created_at: now,
            approval: ApprovalState::Draft,
            approval_notes: None,
            decided_at: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approval == ApprovalState::Approved
    }
}

/// Frozen revision marker recorded on approval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrozenDesign {
    pub version: u32,
    pub at: TimestampMs,
}

/// Per-lead design aggregate. Only the latest revision may be approved.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Design {
    pub revisions: Vec<DesignRevision>,
    pub frozen: Option<FrozenDesign>,
}

impl Design {
    pub fn latest(&self) -> Option<&DesignRevision> {
        self.revisions.last()
    }

    pub fn latest_mut(&mut self) -> Option<&mut DesignRevision> {
        self.revisions.last_mut()
    }

    pub fn next_version(&self) -> u32 {
        self.latest().map(|r| r.version).unwrap_or(0) + 1
    }

    pub fn revision_by_token(&self, token: &str) -> Option<&DesignRevision> {
        self.revisions
            .iter()
            .find(|r| r.token.as_deref() == Some(token))
    }

    pub fn revision_by_token_mut(&mut self, token: &str) -> Option<&mut DesignRevision> {
        self.revisions
            .iter_mut()
            .find(|r| r.token.as_deref() == Some(token))
    }

    /// True when `version` is the latest revision's version.
    pub fn is_latest(&self, version: u32) -> bool {
        self.latest().map(|r| r.version) == Some(version)
    }
}
