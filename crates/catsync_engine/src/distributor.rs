//! Object event distribution.

use crate::error::SyncResult;
use crate::summary::{Summary, UnitOutcome};
use crate::target::{IndexNotification, IndexNotificationSink, IndexOperation, IndexType};
use catsync_job::{ChangeKind, DomainType};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Observes applied objects and reacts once the run is complete.
pub trait ObjectEventDistributor: Send + Sync {
    /// Called after an object was applied inside a unit.
    fn object_applied(&self, _unit_name: &str, _domain_type: DomainType, _guid: &str, _change_kind: ChangeKind) {}

    /// Called when a unit ends.
    fn unit_completed(&self, _unit_name: &str, _outcome: UnitOutcome) {}

    /// Called exactly once at the end of the run.
    fn finished(&self, summary: &Summary) -> SyncResult<()>;
}

/// A distributor that ignores every event.
#[derive(Debug, Default)]
pub struct NoopDistributor;

impl ObjectEventDistributor for NoopDistributor {
    fn finished(&self, _summary: &Summary) -> SyncResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PriceChanges {
    current: Vec<String>,
    committed: Vec<String>,
}

/// Fires one price-change notification per change set that touched price rows.
///
/// Units that rolled back are forgotten. Notifications are enqueued when the
/// run finishes, in unit order.
pub struct IndexNotificationDistributor {
    sink: Arc<dyn IndexNotificationSink>,
    changes: Mutex<PriceChanges>,
}

impl IndexNotificationDistributor {
    /// Creates the distributor.
    pub fn new(sink: Arc<dyn IndexNotificationSink>) -> Self {
        Self {
            sink,
            changes: Mutex::new(PriceChanges::default()),
        }
    }
}

impl ObjectEventDistributor for IndexNotificationDistributor {
    fn object_applied(&self, unit_name: &str, domain_type: DomainType, _guid: &str, _change_kind: ChangeKind) {
        if domain_type != DomainType::BaseAmount {
            return;
        }
        let mut changes = self.changes.lock();
        if !changes.current.iter().any(|name| name == unit_name) {
            changes.current.push(unit_name.to_string());
        }
    }

    fn unit_completed(&self, _unit_name: &str, outcome: UnitOutcome) {
        let mut changes = self.changes.lock();
        let current = std::mem::take(&mut changes.current);
        if outcome == UnitOutcome::Applied {
            for name in current {
                if !changes.committed.contains(&name) {
                    changes.committed.push(name);
                }
            }
        }
    }

    fn finished(&self, summary: &Summary) -> SyncResult<()> {
        let committed = std::mem::take(&mut self.changes.lock().committed);
        for change_set in &committed {
            self.sink.enqueue(IndexNotification::new(
                IndexType::PriceChange,
                IndexOperation::Update,
                change_set.as_str(),
            ))?;
        }
        info!(
            price_changes = committed.len(),
            errors = summary.number_of_errors(),
            "object event distribution finished"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTarget;

    fn price_change(change_set: &str) -> IndexNotification {
        IndexNotification::new(IndexType::PriceChange, IndexOperation::Update, change_set)
    }

    #[test]
    fn one_notification_per_change_set() {
        let target = Arc::new(MemoryTarget::new());
        let distributor = IndexNotificationDistributor::new(target.clone());

        for guid in ["ba-1", "ba-2", "ba-3"] {
            distributor.object_applied("cs-1", DomainType::BaseAmount, guid, ChangeKind::Update);
        }
        distributor.object_applied("cs-1", DomainType::Product, "p-1", ChangeKind::Update);
        distributor.unit_completed("cs-1", UnitOutcome::Applied);

        distributor.object_applied("cs-2", DomainType::Product, "p-2", ChangeKind::Update);
        distributor.unit_completed("cs-2", UnitOutcome::Applied);

        distributor.object_applied("cs-3", DomainType::BaseAmount, "ba-4", ChangeKind::Delete);
        distributor.unit_completed("cs-3", UnitOutcome::Applied);

        assert!(target.notifications().is_empty());
        distributor.finished(&Summary::new()).unwrap();
        assert_eq!(
            target.notifications(),
            vec![price_change("cs-1"), price_change("cs-3")]
        );

        // A second call has nothing left to send.
        distributor.finished(&Summary::new()).unwrap();
        assert_eq!(target.notifications().len(), 2);
    }

    #[test]
    fn rolled_back_units_are_forgotten() {
        let target = Arc::new(MemoryTarget::new());
        let distributor = IndexNotificationDistributor::new(target.clone());

        distributor.object_applied("cs-1", DomainType::BaseAmount, "ba-1", ChangeKind::Update);
        distributor.unit_completed("cs-1", UnitOutcome::Failed);
        distributor.finished(&Summary::new()).unwrap();

        assert!(target.notifications().is_empty());
    }
}
