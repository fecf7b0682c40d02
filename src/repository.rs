// 🗂️ Repository Port - Where purchase snapshots come from
//
// One trait, several media. SQLite supports the full capability set,
// document feeds (CSV / JSON) are read-only and report the rest as unsupported.

use crate::error::RepositoryError;
use crate::model::{Customer, Product, Purchase};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

// ============================================================================
// SOURCE TYPE
// ============================================================================

/// Which medium backs a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Sql,
    Csv,
    Json,
    Memory,
}

impl SourceType {
    /// Short code used in configuration (`SOURCE=...`)
    pub fn code(&self) -> &'static str {
        match self {
            SourceType::Sql => "sql",
            SourceType::Csv => "csv",
            SourceType::Json => "json",
            SourceType::Memory => "memory",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::Sql => "SQL",
            SourceType::Csv => "CSV",
            SourceType::Json => "JSON",
            SourceType::Memory => "in-memory",
        };
        f.write_str(name)
    }
}

impl FromStr for SourceType {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sql" => Ok(SourceType::Sql),
            "csv" => Ok(SourceType::Csv),
            "json" => Ok(SourceType::Json),
            "memory" => Ok(SourceType::Memory),
            _ => Err(crate::error::ConfigError::UnknownSource(s.to_string())),
        }
    }
}

// ============================================================================
// PORT
// ============================================================================

/// PurchaseRepository - capability set {save, find, delete, list, get_purchases}
///
/// Only `get_purchases` and `source_type` are required. Every other method
/// defaults to `RepositoryError::Unsupported`, so read-only media implement
/// just the two.
pub trait PurchaseRepository: Send + Sync {
    /// The currently known full snapshot
    fn get_purchases(&self) -> Result<Purchase>;

    /// Which medium backs this repository
    fn source_type(&self) -> SourceType;

    /// All stored aggregates (a single snapshot for every built-in medium)
    fn find_all(&self) -> Result<Vec<Purchase>> {
        Ok(vec![self.get_purchases()?])
    }

    fn find_customer(&self, _customer_id: i64) -> Result<Option<Customer>> {
        Err(self.unsupported("finding by id"))
    }

    /// Record that `customer` bought `product` (creating either if new)
    fn save_purchase(&self, _customer: &Customer, _product: &Product) -> Result<()> {
        Err(self.unsupported("saving data"))
    }

    fn delete_customer(&self, _customer_id: i64) -> Result<()> {
        Err(self.unsupported("deleting data"))
    }

    fn delete_all(&self) -> Result<()> {
        Err(self.unsupported("deleting data"))
    }

    #[doc(hidden)]
    fn unsupported(&self, operation: &'static str) -> anyhow::Error {
        RepositoryError::Unsupported {
            source_type: self.source_type(),
            operation,
        }
        .into()
    }
}

impl<R: PurchaseRepository + ?Sized> PurchaseRepository for Box<R> {
    fn get_purchases(&self) -> Result<Purchase> {
        (**self).get_purchases()
    }

    fn source_type(&self) -> SourceType {
        (**self).source_type()
    }

    fn find_all(&self) -> Result<Vec<Purchase>> {
        (**self).find_all()
    }

    fn find_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        (**self).find_customer(customer_id)
    }

    fn save_purchase(&self, customer: &Customer, product: &Product) -> Result<()> {
        (**self).save_purchase(customer, product)
    }

    fn delete_customer(&self, customer_id: i64) -> Result<()> {
        (**self).delete_customer(customer_id)
    }

    fn delete_all(&self) -> Result<()> {
        (**self).delete_all()
    }
}

// ============================================================================
// IN-MEMORY ADAPTER
// ============================================================================

/// Thread-safe in-memory repository with full CRUD.
///
/// Every `get_purchases` call returns a fresh clone, so snapshots handed to
/// the engine never alias the stored state.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    purchases: RwLock<Purchase>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_purchases(purchases: Purchase) -> Self {
        InMemoryRepository {
            purchases: RwLock::new(purchases),
        }
    }

    /// Mutate the stored snapshot in place
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Purchase),
    {
        let mut purchases = self
            .purchases
            .write()
            .map_err(|_| anyhow::anyhow!("in-memory repository lock poisoned"))?;
        f(&mut purchases);
        Ok(())
    }
}

impl PurchaseRepository for InMemoryRepository {
    fn get_purchases(&self) -> Result<Purchase> {
        let purchases = self
            .purchases
            .read()
            .map_err(|_| anyhow::anyhow!("in-memory repository lock poisoned"))?;
        Ok(purchases.clone())
    }

    fn source_type(&self) -> SourceType {
        SourceType::Memory
    }

    fn find_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        Ok(self.get_purchases()?.find_customer(customer_id).cloned())
    }

    /// Customers are upserted by id: changed details replace the stored ones
    /// and the purchase history carries over.
    fn save_purchase(&self, customer: &Customer, product: &Product) -> Result<()> {
        self.update(|p| {
            let mut products = p
                .remove_customer(customer.id)
                .map(|(_, products)| products)
                .unwrap_or_default();
            products.push(product.clone());
            *p.products_mut(customer) = products;
        })
    }

    fn delete_customer(&self, customer_id: i64) -> Result<()> {
        self.update(|p| {
            p.remove_customer(customer_id);
        })
    }

    fn delete_all(&self) -> Result<()> {
        self.update(|p| *p = Purchase::new())
    }
}

// ============================================================================
// TESTS
// ============================================================================
