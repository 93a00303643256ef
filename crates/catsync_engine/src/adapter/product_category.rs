use super::TargetDaoAdapter;
use crate::error::{SyncError, SyncResult};
use crate::target::{DomainService, ProductCategoryService};
use catsync_job::{DomainSnapshot, DomainType, ProductCategorySnapshot, SerializableObject};
use std::sync::Arc;

/// Product to category assignment adapter.
///
/// Assignments have no guid of their own. They are addressed by the
/// composite guid `categoryGuid|productCode`.
pub struct ProductCategoryDaoAdapter {
    service: Arc<dyn DomainService>,
    assignments: Arc<dyn ProductCategoryService>,
}

impl ProductCategoryDaoAdapter {
    /// Creates the adapter.
    pub fn new(service: Arc<dyn DomainService>, assignments: Arc<dyn ProductCategoryService>) -> Self {
        Self {
            service,
            assignments,
        }
    }

    fn assign(&self, object: &SerializableObject) -> SyncResult<()> {
        match &object.snapshot {
            DomainSnapshot::ProductCategory(assignment) => self
                .assignments
                .assign(&assignment.category_guid, &assignment.product_code),
            other => Err(SyncError::Adapter {
                domain_type: DomainType::ProductCategory,
                message: format!("unexpected {} payload for {}", other.domain_type(), object.guid),
            }),
        }
    }

    fn product_code(&self, product_guid: &str) -> SyncResult<Option<String>> {
        Ok(self
            .service
            .find(DomainType::Product, product_guid)?
            .and_then(|object| match object.snapshot {
                DomainSnapshot::Product(product) => Some(product.code),
                _ => None,
            }))
    }
}

impl TargetDaoAdapter for ProductCategoryDaoAdapter {
    fn domain_type(&self) -> DomainType {
        DomainType::ProductCategory
    }

    fn get(&self, guid: &str) -> SyncResult<Option<SerializableObject>> {
        let (category_guid, product_code) = ProductCategorySnapshot::parse_composite_guid(guid)?;
        if !self.assignments.is_assigned(&category_guid, &product_code)? {
            return Ok(None);
        }
        Ok(Some(SerializableObject::new(
            guid,
            DomainSnapshot::ProductCategory(ProductCategorySnapshot {
                category_guid,
                product_code,
            }),
        )))
    }

    fn add(&self, object: &SerializableObject) -> SyncResult<()> {
        self.assign(object)
    }

    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject> {
        self.assign(object)?;
        Ok(object.clone())
    }

    fn remove(&self, guid: &str) -> SyncResult<()> {
        let (category_guid, product_code) = ProductCategorySnapshot::parse_composite_guid(guid)?;
        self.assignments.unassign(&category_guid, &product_code)
    }

    fn associated_guids(&self, owner_type: DomainType, owner_guid: &str) -> SyncResult<Vec<String>> {
        match owner_type {
            DomainType::Category => Ok(self
                .assignments
                .find_products_by_category(owner_guid)?
                .into_iter()
                .filter_map(|object| match object.snapshot {
                    DomainSnapshot::Product(product) => Some(
                        ProductCategorySnapshot::composite_guid(owner_guid, &product.code),
                    ),
                    _ => None,
                })
                .collect()),
            DomainType::Product => {
                let Some(code) = self.product_code(owner_guid)? else {
                    return Ok(Vec::new());
                };
                Ok(self
                    .assignments
                    .find_categories_by_product(&code)?
                    .into_iter()
                    .map(|category_guid| ProductCategorySnapshot::composite_guid(&category_guid, &code))
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryTarget, TargetCall};
    use catsync_job::{JobError, ProductSnapshot};

    fn target_with_product() -> Arc<MemoryTarget> {
        let target = Arc::new(MemoryTarget::new());
        target.seed(SerializableObject::new(
            "p-1",
            DomainSnapshot::Product(ProductSnapshot {
                code: "P1".into(),
                category_guids: vec!["cat-1".into()],
            }),
        ));
        target.seed_assignment("cat-1", "P1");
        target
    }

    fn adapter(target: &Arc<MemoryTarget>) -> ProductCategoryDaoAdapter {
        ProductCategoryDaoAdapter::new(target.clone(), target.clone())
    }

    #[test]
    fn associated_guids_for_category_are_composite() {
        let target = target_with_product();
        let guids = adapter(&target)
            .associated_guids(DomainType::Category, "cat-1")
            .unwrap();
        assert_eq!(guids, vec!["cat-1|P1"]);
    }

    #[test]
    fn associated_guids_for_product() {
        let target = target_with_product();
        let adapter = adapter(&target);
        assert_eq!(
            adapter.associated_guids(DomainType::Product, "p-1").unwrap(),
            vec!["cat-1|P1"]
        );
        assert!(adapter
            .associated_guids(DomainType::Product, "p-missing")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn add_get_remove_by_composite_guid() {
        let target = target_with_product();
        let adapter = adapter(&target);
        let object = SerializableObject::new(
            "cat-2|P1",
            DomainSnapshot::ProductCategory(ProductCategorySnapshot {
                category_guid: "cat-2".into(),
                product_code: "P1".into(),
            }),
        );

        assert!(adapter.get("cat-2|P1").unwrap().is_none());
        adapter.add(&object).unwrap();
        assert_eq!(adapter.get("cat-2|P1").unwrap(), Some(object));

        adapter.remove("cat-2|P1").unwrap();
        assert!(adapter.get("cat-2|P1").unwrap().is_none());
        assert!(target
            .calls()
            .contains(&TargetCall::Unassign("cat-2".into(), "P1".into())));
    }

    #[test]
    fn malformed_guid_rejected() {
        let target = target_with_product();
        let err = adapter(&target).remove("no-separator").unwrap_err();
        assert!(matches!(err, SyncError::Job(JobError::MalformedGuid(_))));
    }
}
