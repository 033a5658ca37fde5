use crate::TimestampMs;
use serde::{Deserialize, Serialize};

/// Deferred installation request: created when the balance is paid before
/// production finishes, consumed and cleared when production completion
/// triggers scheduling.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeferredInstallation {
    /// Date the caller wanted, to be honored once scheduling is possible
    pub desired_at: Option<TimestampMs>,
    /// Balance payment reference this request is waiting on
    pub reference_id: Option<String>,
    /// Set when the balance payment landed pre-completion
    pub fully_paid_at: Option<TimestampMs>,
}

/// Installation metadata for a lead.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Installation {
    pub scheduled_at: Option<TimestampMs>,
    pub completed_at: Option<TimestampMs>,
    pub installer_name: Option<String>,
    pub installer_phone: Option<String>,
    pub notes: Option<String>,
    pub deferred: Option<DeferredInstallation>,
}

impl Installation {
    /// Take and clear the deferred request (consumed exactly once).
    pub fn take_deferred(&mut self) -> Option<DeferredInstallation> {
        self.deferred.take()
    }

    pub fn defer(&mut self, desired_at: Option<TimestampMs>, reference_id: Option<String>) {
        let d = self.deferred.get_or_insert_with(DeferredInstallation::default);
        if desired_at.is_some() {
            d.desired_at = desired_at;
        }
        if reference_id.is_some() {
            d.reference_id = reference_id;
        }
    }

    pub fn mark_fully_paid(&mut self, at: TimestampMs) {
        self.deferred
            .get_or_insert_with(DeferredInstallation::default)
            .fully_paid_at = Some(at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defer_then_take_clears() {
        let mut inst = Installation::default();
        inst.defer(Some(5_000), Some("REF-B".to_string()));
        inst.mark_fully_paid(4_000);

        let d = inst.take_deferred().unwrap();
        assert_eq!(d.desired_at, Some(5_000));
        assert_eq!(d.reference_id.as_deref(), Some("REF-B"));
        assert_eq!(d.fully_paid_at, Some(4_000));
        assert!(inst.deferred.is_none());
    }

    #[test]
    fn test_defer_merges_fields() {
        let mut inst = Installation::default();
        inst.defer(None, Some("REF-B".to_string()));
        inst.defer(Some(9_000), None);
        let d = inst.deferred.as_ref().unwrap();
        assert_eq!(d.desired_at, Some(9_000));
        assert_eq!(d.reference_id.as_deref(), Some("REF-B"));
    }
}
