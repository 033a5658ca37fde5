//! Payment gateway boundary: link creation, verification and callback
//! payload normalization.

use crate::error::{Error, Result};
use crate::state::{PaymentCustomer, PaymentStatus};
use crate::TimestampMs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request to create a hosted payment link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLinkRequest {
    pub amount: i64,
    pub currency: String,
    pub reference_id: String,
    pub description: String,
    pub customer: PaymentCustomer,
}

/// Created payment link as reported by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    pub link_id: String,
    pub short_url: String,
    pub status: PaymentStatus,
    pub created_at: TimestampMs,
    pub expires_at: Option<TimestampMs>,
}

/// Gateway client. Both calls are network I/O and fallible; callers treat
/// verification failure as degraded, not fatal.
pub trait Gateway {
    fn create_payment_link(&self, req: &PaymentLinkRequest) -> Result<PaymentLink>;

    /// Re-fetch the authoritative link status by link id.
    fn fetch_link_status(&self, link_id: &str) -> Result<PaymentStatus>;
}

/// Build a payment reference id: sanitized lead-id prefix, base36
/// timestamp, random chunk, kind tag ('A' advance, 'B' balance).
pub fn build_reference_id(lead_id: &str, tag: &str, now: TimestampMs) -> String {
    use rand::Rng;
    let id_part: String = lead_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(12)
        .collect();
    let ts = to_base36(now as u64);
    let rnd: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(4)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}-{}-{}", id_part, ts, rnd, tag)
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize] as char);
        n /= 36;
    }
    out.reverse();
    out.into_iter().collect()
}

/// Callback fields normalized from the gateway's loosely-named payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub reference_id: String,
    pub link_id: String,
    pub payment_id: String,
    /// Status string asserted by the callback, lowercased
    pub raw_status: String,
    /// Original payload kept verbatim for audit
    pub raw: Value,
}

impl CallbackPayload {
    /// Normalize gateway-specific field aliases into one canonical shape.
    /// Fails with `MissingReference` when no reference id is present.
    pub fn from_json(raw: Value) -> Result<CallbackPayload> {
        let get = |keys: &[&str]| -> String {
            for k in keys {
                if let Some(v) = raw.get(k).and_then(Value::as_str) {
                    if !v.is_empty() {
                        return v.to_string();
                    }
                }
            }
            String::new()
        };

        let reference_id = get(&[
            "razorpay_payment_link_reference_id",
            "reference_id",
            "ref",
        ]);
        if reference_id.is_empty() {
            return Err(Error::MissingReference);
        }

        let link_id = get(&["razorpay_payment_link_id", "payment_link_id", "plink"]);
        let payment_id = get(&["razorpay_payment_id", "payment_id"]);
        let raw_status = get(&[
            "razorpay_payment_link_status",
            "payment_link_status",
            "status",
        ])
        .to_ascii_lowercase();

        Ok(CallbackPayload {
            reference_id,
            link_id,
            payment_id,
            raw_status,
            raw,
        })
    }

    /// Status asserted by the callback itself (may be unrecognized).
    pub fn asserted_status(&self) -> Option<PaymentStatus> {
        PaymentStatus::parse(&self.raw_status)
    }
}

/// Offline gateway used by the CLI and tests: mints link ids locally and
/// cannot verify, so reconciliation always exercises the fall-back to the
/// callback-asserted status.
#[derive(Debug, Clone, Default)]
pub struct OfflineGateway;

impl Gateway for OfflineGateway {
    fn create_payment_link(&self, req: &PaymentLinkRequest) -> Result<PaymentLink> {
        let mut bytes = [0u8; 7];
        use rand::RngCore;
        rand::thread_rng().fill_bytes(&mut bytes);
        let link_id = format!("pl_{}", hex::encode(bytes));
        // Reference travels in the short URL for manual testing
        let short_url = format!("https://pay.local/{}?ref={}", link_id, req.reference_id);
        Ok(PaymentLink {
            link_id,
            short_url,
            status: PaymentStatus::Created,
            created_at: crate::current_timestamp_ms(),
            expires_at: None,
        })
    }

    fn fetch_link_status(&self, link_id: &str) -> Result<PaymentStatus> {
        Err(Error::Gateway(format!(
            "offline gateway cannot verify link {}",
            link_id
        )))
    }
}
