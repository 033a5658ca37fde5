//! Pipeline stage enumeration and per-stage SLA table.
//!
//! The stage codes form one closed, totally ordered enumeration; `rank()`
//! is the position in that ordering and is the only comparison used by
//! promote/append checks.

use crate::{TimestampMs, DAY_MS, HOUR_MS};
use serde::{Deserialize, Serialize};

/// Ordered pipeline stages, intake through installation.
///
/// Variant order IS the pipeline order; derived `Ord` gives the rank
/// comparison directly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Stage {
    LeadNew,
    LeadQualified,
    MeasureBooked,
    MeasureDone,
    QuoteDrafted,
    QuoteSent,
    QuoteNegotiate,
    ProposalSent,
    OrderConfirmed,
    ProdReady,
    ProdRunning,
    ProdCompleted,
    InstallBooked,
    InstallDone,
}

/// All stages in pipeline order, for timeline rendering.
pub const STAGE_ORDER: [Stage; 14] = [
    Stage::LeadNew,
    Stage::LeadQualified,
    Stage::MeasureBooked,
    Stage::MeasureDone,
    Stage::QuoteDrafted,
    Stage::QuoteSent,
    Stage::QuoteNegotiate,
    Stage::ProposalSent,
    Stage::OrderConfirmed,
    Stage::ProdReady,
    Stage::ProdRunning,
    Stage::ProdCompleted,
    Stage::InstallBooked,
    Stage::InstallDone,
];

impl Stage {
    /// Position in the pipeline ordering.
    pub fn rank(&self) -> usize {
        *self as usize
    }

    /// Stable wire/storage code, e.g. "ORDER_CONFIRMED".
    pub fn code(&self) -> &'static str {
        match self {
            Stage::LeadNew => "LEAD_NEW",
            Stage::LeadQualified => "LEAD_QUALIFIED",
            Stage::MeasureBooked => "MEASURE_BOOKED",
            Stage::MeasureDone => "MEASURE_DONE",
            Stage::QuoteDrafted => "QUOTE_DRAFTED",
            Stage::QuoteSent => "QUOTE_SENT",
            Stage::QuoteNegotiate => "QUOTE_NEGOTIATE",
            Stage::ProposalSent => "PROPOSAL_SENT",
            Stage::OrderConfirmed => "ORDER_CONFIRMED",
            Stage::ProdReady => "PROD_READY",
            Stage::ProdRunning => "PROD_RUNNING",
            Stage::ProdCompleted => "PROD_COMPLETED",
            Stage::InstallBooked => "INSTALL_BOOKED",
            Stage::InstallDone => "INSTALL_DONE",
        }
    }

    /// Parse a stage code; unknown codes are rejected (closed enumeration).
    pub fn parse(code: &str) -> Option<Stage> {
        STAGE_ORDER.iter().copied().find(|s| s.code() == code)
    }

    /// SLA offset for this stage in milliseconds (0 = immediate).
    pub fn sla_offset_ms(&self) -> i64 {
        match self {
            Stage::LeadNew => 0,
            Stage::LeadQualified => 12 * HOUR_MS,
            Stage::MeasureBooked => 24 * HOUR_MS,
            Stage::MeasureDone => 8 * HOUR_MS,
            Stage::QuoteDrafted => 48 * HOUR_MS,
            Stage::QuoteSent => 24 * HOUR_MS,
            Stage::QuoteNegotiate => 5 * DAY_MS,
            Stage::ProposalSent => 0,
            Stage::OrderConfirmed => 24 * HOUR_MS,
            Stage::ProdReady => 3 * DAY_MS,
            Stage::ProdRunning => 30 * DAY_MS,
            Stage::ProdCompleted => 0,
            Stage::InstallBooked => 48 * HOUR_MS,
            Stage::InstallDone => 0,
        }
    }

    /// Default due timestamp for entering this stage at `now`.
    pub fn due_at(&self, now: TimestampMs) -> TimestampMs {
        now + self.sla_offset_ms()
    }

    /// Customer-facing label for the tracking timeline.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::LeadNew => "Lead Created",
            Stage::LeadQualified => "Qualified",
            Stage::MeasureBooked => "Measurement Booked",
            Stage::MeasureDone => "Measurement Done",
            Stage::QuoteDrafted => "Quote Drafted",
            Stage::QuoteSent => "Quote Sent",
            Stage::QuoteNegotiate => "Negotiation",
            Stage::ProposalSent => "Proposal Sent",
            Stage::OrderConfirmed => "Order Confirmed",
            Stage::ProdReady => "Design Freeze",
            Stage::ProdRunning => "Production Running",
            Stage::ProdCompleted => "Dispatched",
            Stage::InstallBooked => "Installation Booked",
            Stage::InstallDone => "Installation Done",
        }
    }

    /// One-line hint shown next to the stage on the tracking page.
    pub fn tip(&self) -> &'static str {
        match self {
            Stage::LeadNew => "We received your request.",
            Stage::LeadQualified => "Our team validated your requirements.",
            Stage::MeasureBooked => "Site visit scheduled.",
            Stage::MeasureDone => "Dimensions captured; preparing estimate.",
            Stage::QuoteDrafted => "Internal review.",
            Stage::QuoteSent => "Awaiting your confirmation/advance.",
            Stage::QuoteNegotiate => "Discussion on scope/pricing.",
            Stage::ProposalSent => "Proposal shared with payment link.",
            Stage::OrderConfirmed => "Advance received; kicking off production prep.",
            Stage::ProdReady => "Final design confirmation.",
            Stage::ProdRunning => "Manufacturing in progress.",
            Stage::ProdCompleted => "Shipped from factory.",
            Stage::InstallBooked => "Team assigned with schedule.",
            Stage::InstallDone => "Installed at site.",
        }
    }

    /// Expected hours in this stage, for the tracking page ETA column.
    pub fn eta_hours(&self) -> i64 {
        self.sla_offset_ms() / HOUR_MS
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_matches_order() {
        for (i, s) in STAGE_ORDER.iter().enumerate() {
            assert_eq!(s.rank(), i);
        }
    }

    #[test]
    fn test_ordering_is_pipeline_order() {
        assert!(Stage::LeadNew < Stage::LeadQualified);
        assert!(Stage::ProposalSent < Stage::OrderConfirmed);
        assert!(Stage::ProdCompleted < Stage::InstallBooked);
        assert!(Stage::InstallBooked < Stage::InstallDone);
    }

    #[test]
    fn test_parse_round_trip() {
        for s in STAGE_ORDER {
            assert_eq!(Stage::parse(s.code()), Some(s));
        }
        assert_eq!(Stage::parse("NOT_A_STAGE"), None);
    }

    #[test]
    fn test_due_at_uses_sla_offset() {
        let now = 1_700_000_000_000;
        assert_eq!(Stage::MeasureBooked.due_at(now), now + 24 * HOUR_MS);
        assert_eq!(Stage::ProdRunning.due_at(now), now + 30 * DAY_MS);
        assert_eq!(Stage::InstallDone.due_at(now), now);
    }
}
