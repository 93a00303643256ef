use super::TargetDaoAdapter;
use crate::error::SyncResult;
use crate::target::DomainService;
use catsync_job::{DomainType, SerializableObject};
use std::sync::Arc;

/// Adapter that delegates every operation to the domain service.
pub struct ServiceDaoAdapter {
    domain_type: DomainType,
    service: Arc<dyn DomainService>,
}

impl ServiceDaoAdapter {
    /// Creates an adapter for `domain_type`.
    pub fn new(domain_type: DomainType, service: Arc<dyn DomainService>) -> Self {
        Self {
            domain_type,
            service,
        }
    }
}

impl TargetDaoAdapter for ServiceDaoAdapter {
    fn domain_type(&self) -> DomainType {
        self.domain_type
    }

    fn get(&self, guid: &str) -> SyncResult<Option<SerializableObject>> {
        self.service.find(self.domain_type, guid)
    }

    fn add(&self, object: &SerializableObject) -> SyncResult<()> {
        self.service.add(object)
    }

    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject> {
        self.service.update(object)
    }

    fn remove(&self, guid: &str) -> SyncResult<()> {
        self.service.remove(self.domain_type, guid)
    }
}
