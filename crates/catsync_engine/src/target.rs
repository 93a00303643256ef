//! Target-side collaborators.
//!
//! These traits are the boundary to the target deployment's persistence
//! and search-index services. The engine depends only on these typed
//! interfaces; [`MemoryTarget`](crate::MemoryTarget) implements all of them.

use crate::error::SyncResult;
use catsync_job::{DomainType, SerializableObject};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The target persistence session shared by one run.
///
/// At most one transaction is open at a time.
pub trait TargetSession: Send + Sync {
    /// Opens a transaction.
    fn begin(&self) -> SyncResult<()>;

    /// Commits the open transaction.
    fn commit(&self) -> SyncResult<()>;

    /// Discards the open transaction.
    fn rollback(&self) -> SyncResult<()>;

    /// Writes pending changes of the open transaction to the store.
    fn flush(&self) -> SyncResult<()>;

    /// Suppresses or restores change tracking for the open transaction.
    fn set_ignore_changes(&self, ignore: bool);
}

/// Generic domain service for reading and writing objects.
pub trait DomainService: Send + Sync {
    /// Finds an object.
    fn find(&self, domain_type: DomainType, guid: &str) -> SyncResult<Option<SerializableObject>>;

    /// Inserts an object.
    fn add(&self, object: &SerializableObject) -> SyncResult<()>;

    /// Updates an object and returns the stored version.
    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject>;

    /// Removes an object. Removing a missing object is not an error.
    fn remove(&self, domain_type: DomainType, guid: &str) -> SyncResult<()>;
}

/// Low-level price row persistence that bypasses the domain service's
/// side effects.
pub trait BaseAmountDao: Send + Sync {
    /// Updates a price row and returns the stored version.
    fn update(&self, object: &SerializableObject) -> SyncResult<SerializableObject>;
}

/// Resolves objects the same way ordinary lookups inside a unit do.
pub trait EntityLocator: Send + Sync {
    /// Locates an object.
    fn locate(&self, domain_type: DomainType, guid: &str) -> SyncResult<Option<SerializableObject>>;

    /// Locates a product by its code.
    fn locate_product_by_code(&self, code: &str) -> SyncResult<Option<SerializableObject>>;
}

/// Sku operations.
pub trait ProductSkuService: Send + Sync {
    /// Removes a sku together with the objects it owns.
    fn remove_product_sku_tree(&self, sku: &SerializableObject) -> SyncResult<()>;

    /// Returns the skus of a product.
    fn find_by_product(&self, product_guid: &str) -> SyncResult<Vec<SerializableObject>>;
}

/// Coupon usage lookups.
pub trait CouponUsageService: Send + Sync {
    /// Returns the usages of a coupon configuration.
    fn find_by_coupon_config(&self, coupon_config_guid: &str) -> SyncResult<Vec<SerializableObject>>;
}

/// Product to category assignments.
pub trait ProductCategoryService: Send + Sync {
    /// Returns the products assigned to a category.
    fn find_products_by_category(&self, category_guid: &str) -> SyncResult<Vec<SerializableObject>>;

    /// Returns the guids of the categories a product code is assigned to.
    fn find_categories_by_product(&self, product_code: &str) -> SyncResult<Vec<String>>;

    /// Returns true if the product is assigned to the category.
    fn is_assigned(&self, category_guid: &str, product_code: &str) -> SyncResult<bool>;

    /// Assigns a product to a category. Assigning twice is not an error.
    fn assign(&self, category_guid: &str, product_code: &str) -> SyncResult<()>;

    /// Removes an assignment. Removing a missing assignment is not an error.
    fn unassign(&self, category_guid: &str, product_code: &str) -> SyncResult<()>;
}

/// Search indexes fed by the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// Product index.
    Product,
    /// Sku index.
    Sku,
    /// Category index.
    Category,
    /// Promotion index.
    Promotion,
    /// Price change queue, keyed by change set.
    PriceChange,
}

/// Index update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexOperation {
    /// Reindex the object.
    Update,
    /// Drop the object from the index.
    Delete,
}

/// A queued search-index notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexNotification {
    /// Index to update.
    pub index_type: IndexType,
    /// Operation.
    pub operation: IndexOperation,
    /// Object guid, or change set name for price changes.
    pub key: String,
}

impl IndexNotification {
    /// Creates a notification.
    pub fn new(index_type: IndexType, operation: IndexOperation, key: impl Into<String>) -> Self {
        Self {
            index_type,
            operation,
            key: key.into(),
        }
    }
}

/// The search-index notification queue.
///
/// Notifications enqueued inside a transaction are published on commit.
pub trait IndexNotificationSink: Send + Sync {
    /// Enqueues a notification.
    fn enqueue(&self, notification: IndexNotification) -> SyncResult<()>;
}

/// The typed collaborators of a target system.
#[derive(Clone)]
pub struct TargetServices {
    /// Persistence session.
    pub session: Arc<dyn TargetSession>,
    /// Generic domain service.
    pub domain: Arc<dyn DomainService>,
    /// Price row persistence.
    pub base_amounts: Arc<dyn BaseAmountDao>,
    /// Object resolution.
    pub locator: Arc<dyn EntityLocator>,
    /// Sku operations.
    pub skus: Arc<dyn ProductSkuService>,
    /// Coupon usage lookups.
    pub coupon_usages: Arc<dyn CouponUsageService>,
    /// Product to category assignments.
    pub product_categories: Arc<dyn ProductCategoryService>,
    /// Search-index queue.
    pub index_sink: Arc<dyn IndexNotificationSink>,
}
