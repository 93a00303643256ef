//! Materialized domain snapshots.

use crate::domain::DomainType;
use crate::error::{JobError, JobResult};
use serde::{Deserialize, Serialize};

/// Separator used in synthetic product-category guids.
const COMPOSITE_SEPARATOR: char = '|';

/// A materialized object handed from the job loader to the processing pipeline.
///
/// `SerializableObject` carries the object's guid and a snapshot of its
/// persistent state. The domain type is derived from the snapshot, so the
/// two can never disagree. Ownership moves to the processor once delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializableObject {
    /// Object guid.
    pub guid: String,
    /// Snapshot of the object's state.
    pub snapshot: DomainSnapshot,
}

impl SerializableObject {
    /// Creates a new object.
    pub fn new(guid: impl Into<String>, snapshot: DomainSnapshot) -> Self {
        Self {
            guid: guid.into(),
            snapshot,
        }
    }

    /// Returns the domain type of this object.
    pub fn domain_type(&self) -> DomainType {
        self.snapshot.domain_type()
    }
}

/// Snapshot of a domain object's persistent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainSnapshot {
    /// Catalog state.
    Catalog(CatalogSnapshot),
    /// Category state.
    Category(CategorySnapshot),
    /// Product state.
    Product(ProductSnapshot),
    /// SKU state.
    ProductSku(ProductSkuSnapshot),
    /// Price list state.
    PriceList(PriceListSnapshot),
    /// Price row state.
    BaseAmount(BaseAmountSnapshot),
    /// Product to category association.
    ProductCategory(ProductCategorySnapshot),
    /// Coupon configuration state.
    CouponConfig(CouponConfigSnapshot),
    /// Coupon usage state.
    CouponUsage(CouponUsageSnapshot),
}

impl DomainSnapshot {
    /// Returns the domain type of this snapshot.
    pub fn domain_type(&self) -> DomainType {
        match self {
            DomainSnapshot::Catalog(_) => DomainType::Catalog,
            DomainSnapshot::Category(_) => DomainType::Category,
            DomainSnapshot::Product(_) => DomainType::Product,
            DomainSnapshot::ProductSku(_) => DomainType::ProductSku,
            DomainSnapshot::PriceList(_) => DomainType::PriceList,
            DomainSnapshot::BaseAmount(_) => DomainType::BaseAmount,
            DomainSnapshot::ProductCategory(_) => DomainType::ProductCategory,
            DomainSnapshot::CouponConfig(_) => DomainType::CouponConfig,
            DomainSnapshot::CouponUsage(_) => DomainType::CouponUsage,
        }
    }

    /// Returns the objects this snapshot points at.
    ///
    /// These are merge boundaries: the referenced objects are not copied
    /// along with the snapshot and must already exist on the target.
    pub fn references(&self) -> Vec<ObjectReference> {
        match self {
            DomainSnapshot::Category(category) => {
                let mut references = vec![ObjectReference::guid(DomainType::Catalog, &category.catalog_guid)];
                if let Some(parent) = &category.parent_guid {
                    references.push(ObjectReference::guid(DomainType::Category, parent));
                }
                if let Some(master) = &category.master_category_guid {
                    references.push(ObjectReference::guid(DomainType::Category, master));
                }
                references
            }
            DomainSnapshot::ProductSku(sku) => {
                vec![ObjectReference::guid(DomainType::Product, &sku.product_guid)]
            }
            DomainSnapshot::BaseAmount(amount) => vec![
                ObjectReference::guid(DomainType::PriceList, &amount.price_list_guid),
                ObjectReference::guid(amount.object_type, &amount.object_guid),
            ],
            DomainSnapshot::ProductCategory(assignment) => vec![
                ObjectReference::guid(DomainType::Category, &assignment.category_guid),
                ObjectReference::ProductCode(assignment.product_code.clone()),
            ],
            DomainSnapshot::CouponUsage(usage) => {
                vec![ObjectReference::guid(DomainType::CouponConfig, &usage.coupon_config_guid)]
            }
            DomainSnapshot::Catalog(_)
            | DomainSnapshot::Product(_)
            | DomainSnapshot::PriceList(_)
            | DomainSnapshot::CouponConfig(_) => Vec::new(),
        }
    }
}

/// A reference from a snapshot to another persistent object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectReference {
    /// An object addressed by its guid.
    Guid {
        /// Type of the referenced object.
        domain_type: DomainType,
        /// Guid of the referenced object.
        guid: String,
    },
    /// A product addressed by its code.
    ProductCode(String),
}

impl ObjectReference {
    /// Creates a guid reference.
    pub fn guid(domain_type: DomainType, guid: &str) -> Self {
        ObjectReference::Guid {
            domain_type,
            guid: guid.to_string(),
        }
    }

    /// Returns the type of the referenced object.
    pub fn domain_type(&self) -> DomainType {
        match self {
            ObjectReference::Guid { domain_type, .. } => *domain_type,
            ObjectReference::ProductCode(_) => DomainType::Product,
        }
    }

    /// Returns the guid or code the reference is resolved by.
    pub fn key(&self) -> &str {
        match self {
            ObjectReference::Guid { guid, .. } => guid,
            ObjectReference::ProductCode(code) => code,
        }
    }
}

/// Catalog state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Catalog code.
    pub code: String,
    /// Whether this is a master catalog.
    pub master: bool,
}

/// Category state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    /// Category code.
    pub code: String,
    /// Guid of the owning catalog.
    pub catalog_guid: String,
    /// Guid of the parent category, if any.
    pub parent_guid: Option<String>,
    /// Guid of the master category for linked categories.
    pub master_category_guid: Option<String>,
}

impl CategorySnapshot {
    /// Returns true if this category is linked into a virtual catalog.
    pub fn is_linked(&self) -> bool {
        self.master_category_guid.is_some()
    }
}

/// Product state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Product code.
    pub code: String,
    /// Guids of the categories the product is assigned to.
    #[serde(default)]
    pub category_guids: Vec<String>,
}

/// SKU state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSkuSnapshot {
    /// SKU code.
    pub sku_code: String,
    /// Guid of the owning product.
    pub product_guid: String,
}

/// Price list state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceListSnapshot {
    /// Price list name.
    pub name: String,
    /// ISO currency code.
    pub currency: String,
}

/// Price row state. Monetary values are in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseAmountSnapshot {
    /// Guid of the owning price list.
    pub price_list_guid: String,
    /// Guid of the priced object (product or SKU).
    pub object_guid: String,
    /// Type of the priced object.
    pub object_type: DomainType,
    /// Minimum quantity this tier applies to.
    pub quantity: u32,
    /// List price.
    pub list_value: i64,
    /// Sale price, if any.
    pub sale_value: Option<i64>,
}

/// Association between a product and a category.
///
/// The association has no guid of its own; it is addressed by the
/// composite guid `categoryGuid|productCode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductCategorySnapshot {
    /// Guid of the category.
    pub category_guid: String,
    /// Code of the product.
    pub product_code: String,
}

impl ProductCategorySnapshot {
    /// Builds the composite guid for a category and product code.
    pub fn composite_guid(category_guid: &str, product_code: &str) -> String {
        format!("{category_guid}{COMPOSITE_SEPARATOR}{product_code}")
    }

    /// Splits a composite guid into category guid and product code.
    pub fn parse_composite_guid(guid: &str) -> JobResult<(String, String)> {
        match guid.split_once(COMPOSITE_SEPARATOR) {
            Some((category, product)) if !category.is_empty() && !product.is_empty() => {
                Ok((category.to_string(), product.to_string()))
            }
            _ => Err(JobError::MalformedGuid(guid.to_string())),
        }
    }

    /// Returns the composite guid of this association.
    pub fn guid(&self) -> String {
        Self::composite_guid(&self.category_guid, &self.product_code)
    }
}

/// Coupon configuration state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponConfigSnapshot {
    /// Code of the promotion rule the coupons belong to.
    pub rule_code: String,
    /// Maximum number of uses per coupon (0 means unlimited).
    pub usage_limit: u32,
}

/// Coupon usage state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponUsageSnapshot {
    /// Guid of the coupon configuration.
    pub coupon_config_guid: String,
    /// Coupon code.
    pub coupon_code: String,
    /// Customer email address. Anonymous usages have none.
    pub customer_email: Option<String>,
    /// Number of times the coupon was used.
    pub use_count: u32,
}

impl CouponUsageSnapshot {
    /// Returns true if this usage is tied to an addressable customer.
    pub fn is_addressable(&self) -> bool {
        self.customer_email
            .as_deref()
            .is_some_and(|email| !email.trim().is_empty())
    }
}
