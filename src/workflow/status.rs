//! Status engine: promote-only status updates and the append-only stage
//! ledger guard.

use crate::stage::Stage;
use crate::state::{Lead, StageEntry};
use crate::TimestampMs;

/// Promote `lead.status` to `target` if it is ahead in rank; never
/// demote. Returns true only when the status actually changed.
pub fn advance(lead: &mut Lead, target: Stage) -> bool {
    if lead.status.rank() < target.rank() {
        lead.status = target;
        true
    } else {
        false
    }
}

/// Append a ledger row only if `stage` is at or past the last recorded
/// row's rank. Backward rows are rejected silently (they confuse the
/// timeline view), returning false with the ledger unchanged.
pub fn record_stage(
    lead: &mut Lead,
    stage: Stage,
    responsible: &str,
    updated_by: &str,
    at: TimestampMs,
    due_at: Option<TimestampMs>,
) -> bool {
    let last_rank = lead
        .last_stage_entry()
        .map(|e| e.stage.rank())
        .unwrap_or_else(|| lead.status.rank());
    if stage.rank() < last_rank {
        return false;
    }
    lead.stage_history.push(StageEntry {
        stage,
        responsible: responsible.to_string(),
        updated_by: updated_by.to_string(),
        at,
        due_at,
    });
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Contact;
    use proptest::prelude::*;

    fn lead() -> Lead {
        Lead::new(
            "L1".to_string(),
            "s".to_string(),
            "Door".to_string(),
            Contact::default(),
            0,
        )
    }

    #[test]
    fn test_advance_promotes_forward_only() {
        let mut l = lead();
        assert!(advance(&mut l, Stage::LeadQualified));
        assert_eq!(l.status, Stage::LeadQualified);

        // Same rank: no-op
        assert!(!advance(&mut l, Stage::LeadQualified));
        // Lower rank: no-op, no demotion
        assert!(!advance(&mut l, Stage::LeadNew));
        assert_eq!(l.status, Stage::LeadQualified);
    }

    #[test]
    fn test_record_stage_rejects_backward_rows() {
        let mut l = lead();
        assert!(record_stage(&mut l, Stage::QuoteSent, "a", "b", 10, None));
        assert!(!record_stage(&mut l, Stage::LeadQualified, "a", "b", 20, None));
        assert_eq!(l.stage_history.len(), 1);
    }

    #[test]
    fn test_record_stage_allows_same_rank_repeat() {
        let mut l = lead();
        assert!(record_stage(&mut l, Stage::OrderConfirmed, "a", "b", 10, None));
        assert!(record_stage(&mut l, Stage::OrderConfirmed, "a", "c", 20, None));
        assert_eq!(l.stage_history.len(), 2);
    }

    fn arb_stage() -> impl Strategy<Value = Stage> {
        (0usize..crate::stage::STAGE_ORDER.len())
            .prop_map(|i| crate::stage::STAGE_ORDER[i])
    }

    proptest! {
        /// For all sequences of advance calls, status rank never decreases.
        #[test]
        fn prop_status_rank_non_decreasing(targets in proptest::collection::vec(arb_stage(), 1..40)) {
            let mut l = lead();
            let mut prev = l.status.rank();
            for t in targets {
                advance(&mut l, t);
                prop_assert!(l.status.rank() >= prev);
                prev = l.status.rank();
            }
        }

        /// For all sequences of record_stage calls, the ledger's rank
        /// sequence is non-decreasing and rejected rows leave it unchanged.
        #[test]
        fn prop_ledger_ranks_non_decreasing(stages in proptest::collection::vec(arb_stage(), 1..40)) {
            let mut l = lead();
            for (i, s) in stages.into_iter().enumerate() {
                let before = l.stage_history.len();
                let appended = record_stage(&mut l, s, "a", "b", i as i64, None);
                if !appended {
                    prop_assert_eq!(l.stage_history.len(), before);
                }
            }
            let ranks: Vec<usize> = l.stage_history.iter().map(|e| e.stage.rank()).collect();
            prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
