//! Qualification sub-flow: call outcomes and their total mapping onto
//! promotion, follow-up side states or terminal dispositions.

use crate::error::{Error, Result};
use crate::stage::Stage;
use crate::state::{CallEntry, Disposition, FollowUpState, State};
use crate::workflow::{TransitionOutcome, Workflow};
use crate::gateway::Gateway;
use crate::hook::Hook;
use crate::{TimestampMs, DAY_MS, HOUR_MS};
use serde::Serialize;

/// Closed set of call outcomes. Anything else coming off the wire is a
/// validation error, not a silent pass-through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallOutcome {
    Interested,
    CallBackLater,
    Busy,
    NoResponse,
    NotReachable,
    InvalidNumber,
    NotInterested,
    PlanPostponed,
    AlreadyPurchased,
}

impl CallOutcome {
    pub fn parse(raw: &str) -> Result<CallOutcome> {
        match raw.to_ascii_uppercase().as_str() {
            "INTERESTED" => Ok(CallOutcome::Interested),
            "CALL_BACK_LATER" => Ok(CallOutcome::CallBackLater),
            "BUSY" => Ok(CallOutcome::Busy),
            "NO_RESPONSE" => Ok(CallOutcome::NoResponse),
            "NOT_REACHABLE" => Ok(CallOutcome::NotReachable),
            "INVALID_NUMBER" => Ok(CallOutcome::InvalidNumber),
            "NOT_INTERESTED" => Ok(CallOutcome::NotInterested),
            "PLAN_POSTPONED" => Ok(CallOutcome::PlanPostponed),
            "ALREADY_PURCHASED" => Ok(CallOutcome::AlreadyPurchased),
            other => Err(Error::Validation(format!("unknown call outcome: {}", other))),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            CallOutcome::Interested => "INTERESTED",
            CallOutcome::CallBackLater => "CALL_BACK_LATER",
            CallOutcome::Busy => "BUSY",
            CallOutcome::NoResponse => "NO_RESPONSE",
            CallOutcome::NotReachable => "NOT_REACHABLE",
            CallOutcome::InvalidNumber => "INVALID_NUMBER",
            CallOutcome::NotInterested => "NOT_INTERESTED",
            CallOutcome::PlanPostponed => "PLAN_POSTPONED",
            CallOutcome::AlreadyPurchased => "ALREADY_PURCHASED",
        }
    }
}

/// Optional extras alongside an outcome: caller's preferred callback
/// time, a corrected phone number, free-form notes.
#[derive(Debug, Clone, Default)]
pub struct QualifyDetails {
    pub next_call_at: Option<TimestampMs>,
    pub corrected_phone: Option<String>,
    pub notes: Option<String>,
}

/// What qualification did with the outcome.
#[derive(Debug, Clone, Serialize)]
pub struct QualifyOutcome {
    pub lead_id: String,
    pub outcome: CallOutcome,
    pub promoted: bool,
    pub follow_up_due: Option<TimestampMs>,
    pub disposition: Option<Disposition>,
    pub version: u64,
}

impl<G: Gateway, H: Hook> Workflow<G, H> {
    /// Log a call attempt without an outcome (notes only).
    pub fn place_call(
        &mut self,
        state: &mut State,
        id: &str,
        notes: Option<String>,
        actor: &str,
        now: TimestampMs,
    ) -> Result<TransitionOutcome> {
        let lead = state.lead_mut(id)?;
        lead.calls.push(CallEntry {
            outcome: None,
            logged_by: actor.to_string(),
            at: now,
            notes,
        });
        lead.log_activity("Call Placed", actor, now, None);
        lead.touch(now);
        Ok(TransitionOutcome::from_lead(lead, false, None))
    }

    /// Apply a call outcome: promote on interest, schedule a follow-up
    /// side state for retryable outcomes, or record a terminal
    /// disposition. Side states never touch the pipeline rank.
    pub fn qualify(
        &mut self,
        state: &mut State,
        id: &str,
        outcome: CallOutcome,
        details: QualifyDetails,
        actor: &str,
        now: TimestampMs,
    ) -> Result<QualifyOutcome> {
        let lead = state.lead_mut(id)?;

        lead.calls.push(CallEntry {
            outcome: Some(outcome.code().to_string()),
            logged_by: actor.to_string(),
            at: now,
            notes: details.notes.clone(),
        });

        let mut promoted = false;
        let mut follow_up_due = None;

        match outcome {
            CallOutcome::Interested => {
                lead.clear_follow_up();
                let (p, _) = self.promote_with_entry(
                    lead,
                    Stage::LeadQualified,
                    actor,
                    now,
                    Some(Stage::LeadQualified.due_at(now)),
                );
                promoted = p;
            }
            CallOutcome::CallBackLater
            | CallOutcome::Busy
            | CallOutcome::NoResponse
            | CallOutcome::NotReachable => {
                let due = details.next_call_at.unwrap_or(now + 4 * HOUR_MS);
                lead.schedule_follow_up(FollowUpState::Callback, due);
                follow_up_due = Some(due);
            }
            CallOutcome::InvalidNumber => {
                if let Some(phone) = details.corrected_phone.clone() {
                    // Number fixed on the spot; retry as a normal callback
                    lead.contact.phone = phone;
                    let due = details.next_call_at.unwrap_or(now + 4 * HOUR_MS);
                    lead.schedule_follow_up(FollowUpState::Callback, due);
                    follow_up_due = Some(due);
                } else {
                    let due = details.next_call_at.unwrap_or(now + 24 * HOUR_MS);
                    lead.schedule_follow_up(FollowUpState::DataFix, due);
                    follow_up_due = Some(due);
                }
            }
            CallOutcome::PlanPostponed => {
                let due = details.next_call_at.unwrap_or(now + 7 * DAY_MS);
                lead.schedule_follow_up(FollowUpState::Postponed, due);
                follow_up_due = Some(due);
            }
            CallOutcome::NotInterested => {
                lead.clear_follow_up();
                lead.disposition = Some(Disposition::Disqualified);
            }
            CallOutcome::AlreadyPurchased => {
                lead.clear_follow_up();
                lead.disposition = Some(Disposition::AlreadyPurchased);
            }
        }

        lead.log_activity(
            &format!("Call Outcome: {}", outcome.code()),
            actor,
            now,
            details
                .notes
                .map(|n| serde_json::json!({ "notes": n }).to_string()),
        );
        lead.touch(now);

        Ok(QualifyOutcome {
            lead_id: lead.id.clone(),
            outcome,
            promoted,
            follow_up_due,
            disposition: lead.disposition,
            version: lead.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::gateway::OfflineGateway;
    use crate::hook::NoOpHook;
    use crate::state::{Contact, Lead};

    fn setup() -> (Workflow<OfflineGateway, NoOpHook>, State) {
        let wf = Workflow::new(Config::new(), OfflineGateway, NoOpHook);
        let mut state = State::new();
        state.insert_lead(Lead::new(
            "L1".to_string(),
            "s".to_string(),
            "Door".to_string(),
            Contact::default(),
            0,
        ));
        (wf, state)
    }

    #[test]
    fn test_parse_rejects_unknown_outcomes() {
        assert!(CallOutcome::parse("INTERESTED").is_ok());
        assert!(matches!(
            CallOutcome::parse("MAYBE_LATER"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_interested_promotes_and_clears_follow_up() {
        let (mut wf, mut state) = setup();
        state.get_lead_mut("L1").unwrap().schedule_follow_up(FollowUpState::Callback, 50);

        let out = wf
            .qualify(&mut state, "L1", CallOutcome::Interested, QualifyDetails::default(), "emp", 100)
            .unwrap();
        assert!(out.promoted);

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.status, Stage::LeadQualified);
        assert!(lead.follow_up.is_none());
        assert_eq!(lead.calls.len(), 1);
    }

    #[test]
    fn test_busy_schedules_callback_with_default_due() {
        let (mut wf, mut state) = setup();
        let out = wf
            .qualify(&mut state, "L1", CallOutcome::Busy, QualifyDetails::default(), "emp", 1_000)
            .unwrap();
        assert!(!out.promoted);
        assert_eq!(out.follow_up_due, Some(1_000 + 4 * HOUR_MS));

        let f = state.lead("L1").unwrap().follow_up.as_ref().unwrap().clone();
        assert_eq!(f.state, FollowUpState::Callback);
        assert!(!f.notified);
        assert_eq!(f.attempts, 1);
    }

    #[test]
    fn test_caller_supplied_next_call_at_wins() {
        let (mut wf, mut state) = setup();
        let details = QualifyDetails {
            next_call_at: Some(9_999),
            ..QualifyDetails::default()
        };
        let out = wf
            .qualify(&mut state, "L1", CallOutcome::CallBackLater, details, "emp", 1_000)
            .unwrap();
        assert_eq!(out.follow_up_due, Some(9_999));
    }

    #[test]
    fn test_invalid_number_with_correction_retries_as_callback() {
        let (mut wf, mut state) = setup();
        let details = QualifyDetails {
            corrected_phone: Some("9999999999".to_string()),
            ..QualifyDetails::default()
        };
        wf.qualify(&mut state, "L1", CallOutcome::InvalidNumber, details, "emp", 0)
            .unwrap();

        let lead = state.lead("L1").unwrap();
        assert_eq!(lead.contact.phone, "9999999999");
        assert_eq!(lead.follow_up.as_ref().unwrap().state, FollowUpState::Callback);
    }

    #[test]
    fn test_invalid_number_without_correction_needs_data_fix() {
        let (mut wf, mut state) = setup();
        wf.qualify(&mut state, "L1", CallOutcome::InvalidNumber, QualifyDetails::default(), "emp", 0)
            .unwrap();
        assert_eq!(
            state.lead("L1").unwrap().follow_up.as_ref().unwrap().state,
            FollowUpState::DataFix
        );
    }

    #[test]
    fn test_terminal_outcomes_set_disposition_without_demoting() {
        let (mut wf, mut state) = setup();
        wf.qualify(&mut state, "L1", CallOutcome::Interested, QualifyDetails::default(), "emp", 0)
            .unwrap();
        let out = wf
            .qualify(&mut state, "L1", CallOutcome::NotInterested, QualifyDetails::default(), "emp", 10)
            .unwrap();
        assert_eq!(out.disposition, Some(Disposition::Disqualified));
        // Rank untouched by the terminal side channel
        assert_eq!(state.lead("L1").unwrap().status, Stage::LeadQualified);
    }

    #[test]
    fn test_repeat_follow_ups_count_attempts() {
        let (mut wf, mut state) = setup();
        for i in 0..3 {
            wf.qualify(&mut state, "L1", CallOutcome::NoResponse, QualifyDetails::default(), "emp", i * 100)
                .unwrap();
        }
        assert_eq!(state.lead("L1").unwrap().follow_up.as_ref().unwrap().attempts, 3);
    }
}
