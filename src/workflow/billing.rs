//! Billing calculator: pure totals over the latest quotation and the
//! current order cycle's payments.

use crate::config::Config;
use crate::stage::Stage;
use crate::state::Lead;
use serde::Serialize;

/// Computed money figures, all in integer minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub subtotal: i64,
    pub fixed_charges: i64,
    pub tax: i64,
    pub grand_total: i64,
    pub paid: i64,
    pub due: i64,
}

impl Totals {
    /// Display helper: minor units as decimal major units.
    pub fn major(amount: i64) -> f64 {
        amount as f64 / 100.0
    }
}

/// Round-half-up basis-points share of `amount`.
fn tax_of(amount: i64, bps: i64) -> i64 {
    (amount * bps + 5_000) / 10_000
}

/// Compute subtotal / tax / grand total / paid / due for a lead.
///
/// Pure and deterministic: the tracking page and installation gating both
/// call this and must agree. Paid sums only records in a paid state whose
/// effective timestamp (paid-at, else created-at) falls at or after the
/// most recent proposal-sent ledger row — payments from a superseded
/// order cycle do not carry over. With no proposal row, all paid records
/// count.
pub fn compute_totals(lead: &Lead, config: &Config) -> Totals {
    let subtotal = lead.latest_quotation().map(|q| q.subtotal()).unwrap_or(0);
    let fixed_charges = config.transport_charge + config.handling_charge;
    let pre_tax = subtotal + fixed_charges;
    let tax = tax_of(pre_tax, config.tax_bps);
    let grand_total = pre_tax + tax;

    let cutoff = lead.reached_at(Stage::ProposalSent).unwrap_or(i64::MIN);
    let paid: i64 = lead
        .payments
        .iter()
        .filter(|p| p.status.is_paid())
        .filter(|p| p.paid_at.unwrap_or(p.created_at) >= cutoff)
        .map(|p| p.amount)
        .sum();

    Totals {
        subtotal,
        fixed_charges,
        tax,
        grand_total,
        paid,
        due: (grand_total - paid).max(0),
    }
}
