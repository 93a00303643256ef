//! Domain types and change kinds.

use crate::error::JobError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The domain types the engine knows how to synchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DomainType {
    /// A master or virtual catalog.
    Catalog,
    /// A category, either master or linked into a virtual catalog.
    Category,
    /// A product.
    Product,
    /// A sellable SKU owned by a product.
    ProductSku,
    /// A price list descriptor.
    PriceList,
    /// A price row of a price list.
    BaseAmount,
    /// The association between a product and a category.
    ProductCategory,
    /// A coupon configuration of a promotion.
    CouponConfig,
    /// A coupon usage record.
    CouponUsage,
}

impl DomainType {
    /// All known domain types.
    pub const ALL: [DomainType; 9] = [
        DomainType::Catalog,
        DomainType::Category,
        DomainType::Product,
        DomainType::ProductSku,
        DomainType::PriceList,
        DomainType::BaseAmount,
        DomainType::ProductCategory,
        DomainType::CouponConfig,
        DomainType::CouponUsage,
    ];

    /// Returns the stable name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            DomainType::Catalog => "Catalog",
            DomainType::Category => "Category",
            DomainType::Product => "Product",
            DomainType::ProductSku => "ProductSku",
            DomainType::PriceList => "PriceList",
            DomainType::BaseAmount => "BaseAmount",
            DomainType::ProductCategory => "ProductCategory",
            DomainType::CouponConfig => "CouponConfig",
            DomainType::CouponUsage => "CouponUsage",
        }
    }
}

impl fmt::Display for DomainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DomainType {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DomainType::ALL
            .iter()
            .copied()
            .find(|t| t.name() == s)
            .ok_or_else(|| JobError::UnknownDomainType(s.to_string()))
    }
}

/// The kind of change detected for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The object was created on the source.
    Add,
    /// The object was modified on the source.
    Update,
    /// The object was removed from the source.
    Delete,
}

impl ChangeKind {
    /// Returns true for changes that write an object to the target.
    pub fn is_upsert(&self) -> bool {
        matches!(self, ChangeKind::Add | ChangeKind::Update)
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Add => "ADD",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        };
        f.write_str(name)
    }
}
