use super::TargetDaoAdapter;
use crate::error::SyncResult;
use crate::target::{BaseAmountDao, DomainService};
use catsync_job::{DomainType, SerializableObject};
use std::sync::Arc;

/// Price row adapter.
///
/// Updates go through [`BaseAmountDao`] rather than the domain service. The
/// service fires a price-change notification per row; the run instead fires
/// one per change set when it finishes.
pub struct BaseAmountDaoAdapter {
    service: Arc<dyn DomainService>,
    dao: Arc<dyn BaseAmountDao>,
}

impl BaseAmountDaoAdapter {
    /// Creates the adapter.
    pub fn new(service: Arc<dyn DomainService>, dao: Arc<dyn BaseAmountDao>) -> Self {
        Self { service, dao }
    }
}

impl TargetDaoAdapter for BaseAmountDaoAdapter {
    fn domain_type(&self) -> DomainType {
        DomainType::BaseAmount
    }

    fn get(&self, guid: &str) -> SyncResult<Option<SerializableObject>> {
        self.service.find(DomainType::BaseAmount, guid)
    }

    fn add(&self, object: &SerializableObject) -> SyncResult<()> {
        self.service.add(object)
    }

    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject> {
        self.dao.update(object)
    }

    fn remove(&self, guid: &str) -> SyncResult<()> {
        self.service.remove(DomainType::BaseAmount, guid)
    }
}
