use super::TargetDaoAdapter;
use crate::error::SyncResult;
use crate::target::{DomainService, EntityLocator, ProductSkuService};
use catsync_job::{DomainType, SerializableObject};
use std::sync::Arc;
use tracing::debug;

/// Sku adapter.
///
/// Removal resolves the sku through the [`EntityLocator`] before removing
/// the sku tree, so owned objects are cascaded from the same instance the
/// rest of the unit sees.
pub struct ProductSkuDaoAdapter {
    service: Arc<dyn DomainService>,
    locator: Arc<dyn EntityLocator>,
    skus: Arc<dyn ProductSkuService>,
}

impl ProductSkuDaoAdapter {
    /// Creates the adapter.
    pub fn new(
        service: Arc<dyn DomainService>,
        locator: Arc<dyn EntityLocator>,
        skus: Arc<dyn ProductSkuService>,
    ) -> Self {
        Self {
            service,
            locator,
            skus,
        }
    }
}

impl TargetDaoAdapter for ProductSkuDaoAdapter {
    fn domain_type(&self) -> DomainType {
        DomainType::ProductSku
    }

    fn get(&self, guid: &str) -> SyncResult<Option<SerializableObject>> {
        self.locator.locate(DomainType::ProductSku, guid)
    }

    fn add(&self, object: &SerializableObject) -> SyncResult<()> {
        self.service.add(object)
    }

    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject> {
        self.service.update(object)
    }

    fn remove(&self, guid: &str) -> SyncResult<()> {
        match self.locator.locate(DomainType::ProductSku, guid)? {
            Some(sku) => self.skus.remove_product_sku_tree(&sku),
            None => {
                debug!(guid, "sku already absent from target");
                Ok(())
            }
        }
    }

    fn associated_guids(&self, owner_type: DomainType, owner_guid: &str) -> SyncResult<Vec<String>> {
        if owner_type != DomainType::Product {
            return Ok(Vec::new());
        }
        Ok(self
            .skus
            .find_by_product(owner_guid)?
            .into_iter()
            .map(|sku| sku.guid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryTarget, TargetCall};
    use catsync_job::{BaseAmountSnapshot, DomainSnapshot, ProductSkuSnapshot};

    fn sku(guid: &str) -> SerializableObject {
        SerializableObject::new(
            guid,
            DomainSnapshot::ProductSku(ProductSkuSnapshot {
                sku_code: guid.to_uppercase(),
                product_guid: "p-1".into(),
            }),
        )
    }

    fn adapter(target: &Arc<MemoryTarget>) -> ProductSkuDaoAdapter {
        ProductSkuDaoAdapter::new(target.clone(), target.clone(), target.clone())
    }

    #[test]
    fn remove_locates_then_removes_tree() {
        let target = Arc::new(MemoryTarget::new());
        target.seed(sku("sku-1"));
        target.seed(SerializableObject::new(
            "ba-sku-1",
            DomainSnapshot::BaseAmount(BaseAmountSnapshot {
                price_list_guid: "pl-usd".into(),
                object_guid: "sku-1".into(),
                object_type: DomainType::ProductSku,
                quantity: 1,
                list_value: 500,
                sale_value: None,
            }),
        ));

        adapter(&target).remove("sku-1").unwrap();

        let calls = target.calls();
        let locate = calls
            .iter()
            .position(|c| *c == TargetCall::Locate(DomainType::ProductSku, "sku-1".into()))
            .unwrap();
        let tree = calls
            .iter()
            .position(|c| *c == TargetCall::RemoveSkuTree("sku-1".into()))
            .unwrap();
        assert!(locate < tree);
        assert!(target.object(DomainType::ProductSku, "sku-1").is_none());
        assert!(target.object(DomainType::BaseAmount, "ba-sku-1").is_none());
    }

    #[test]
    fn remove_of_absent_sku_is_noop() {
        let target = Arc::new(MemoryTarget::new());
        adapter(&target).remove("sku-9").unwrap();
        assert!(!target
            .calls()
            .iter()
            .any(|c| matches!(c, TargetCall::RemoveSkuTree(_))));
    }

    #[test]
    fn skus_associated_with_product() {
        let target = Arc::new(MemoryTarget::new());
        target.seed(sku("sku-1"));
        target.seed(sku("sku-2"));

        let mut guids = adapter(&target)
            .associated_guids(DomainType::Product, "p-1")
            .unwrap();
        guids.sort();
        assert_eq!(guids, vec!["sku-1", "sku-2"]);
        assert!(adapter(&target)
            .associated_guids(DomainType::Category, "p-1")
            .unwrap()
            .is_empty());
    }
}
