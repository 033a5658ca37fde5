use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Lead not found: {0}")]
    LeadNotFound(String),

    #[error("Payment record not found: {0}")]
    PaymentNotFound(String),

    #[error("Design revision not found: {0}")]
    RevisionNotFound(String),

    #[error("A newer design revision (v{latest}) exists; review the latest")]
    StaleRevision { latest: u32 },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Balance due: {due} minor units outstanding")]
    BalanceDue { due: i64 },

    #[error("Callback payload has no reference id")]
    MissingReference,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("State error: {0}")]
    StateError(String),
}

pub type Result<T> = std::result::Result<T, Error>;
