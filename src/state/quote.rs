use crate::TimestampMs;
use serde::{Deserialize, Serialize};

/// Quotation line item. `discount_rate` overrides `rate` when positive.
/// All money in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub description: String,
    pub rate: i64,
    pub discount_rate: i64,
    pub quantity: i64,
}

impl LineItem {
    /// Effective per-unit rate after discount.
    pub fn effective_rate(&self) -> i64 {
        if self.discount_rate > 0 {
            self.discount_rate
        } else {
            self.rate
        }
    }

    pub fn line_total(&self) -> i64 {
        self.effective_rate() * self.quantity
    }
}

/// Quote document. Multiple may exist per lead; only the most recent is
/// authoritative for totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quotation {
    pub number: String,
    pub items: Vec<LineItem>,
    pub file_name: Option<String>,
    pub created_at: TimestampMs,
    pub valid_until: Option<TimestampMs>,
}

impl Quotation {
    pub fn subtotal(&self) -> i64 {
        self.items.iter().map(|i| i.line_total()).sum()
    }
}
