// 📊 Aggregation Engine - Spend, rankings, category stats, debt
//
// Pure functions over one Purchase snapshot, plus PurchaseAnalytics which
// fetches a fresh snapshot per call from an injected repository.
//
// Deterministic tie-breaks:
//   - age_category_preference: lexicographically smallest category wins
//   - price ties in most/least expensive: first-seen product wins
//   - unique products: first-seen occurrence of each product id wins
//
// Money arithmetic is checked: leaving the Decimal range is an AmountOverflow error.

use crate::error::AnalyticsError;
use crate::model::{Customer, Product, PriceRange, Purchase};
use crate::repository::PurchaseRepository;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Debt reported for a customer id that is not in the snapshot
pub const UNKNOWN_CUSTOMER_DEBT: Decimal = Decimal::NEGATIVE_ONE;

// ============================================================================
// PURE AGGREGATES
// ============================================================================

/// Sum of prices of everything the customer bought, 0 when unknown
pub fn total_spent(purchase: &Purchase, customer_id: i64) -> Result<Decimal> {
    match purchase.products_of(customer_id) {
        Some(products) => sum_prices(products),
        None => Ok(Decimal::ZERO),
    }
}

/// Customers whose total spend equals the maximum (ties included)
pub fn top_spenders(purchase: &Purchase) -> Result<Vec<Customer>> {
    let spent = purchase
        .iter()
        .map(|(customer, products)| Ok((customer, sum_prices(products)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(customers_at_max(spent))
}

/// Customers who spent the most within `category`; empty if nobody spent anything there
pub fn top_spenders_in_category(purchase: &Purchase, category: &str) -> Result<Vec<Customer>> {
    let spent = purchase
        .iter()
        .map(|(customer, products)| {
            let in_category = checked_sum(
                "category spend",
                products
                    .iter()
                    .filter(|p| p.category == category)
                    .map(|p| p.price),
            )?;
            Ok((customer, in_category))
        })
        .collect::<Result<Vec<_>>>()?;

    let max_spent = spent
        .iter()
        .map(|(_, amount)| *amount)
        .max()
        .unwrap_or(Decimal::ZERO);
    if max_spent.is_zero() {
        return Ok(Vec::new());
    }

    Ok(customers_at_max(spent))
}

/// Most purchased category per customer age
pub fn age_category_preference(purchase: &Purchase) -> BTreeMap<u32, String> {
    let mut counts: BTreeMap<u32, BTreeMap<&str, usize>> = BTreeMap::new();

    for (customer, products) in purchase {
        for product in products {
            *counts
                .entry(customer.age)
                .or_default()
                .entry(product.category.as_str())
                .or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter_map(|(age, category_counts)| {
            most_counted(&category_counts).map(|category| (age, category.to_string()))
        })
        .collect()
}

/// Average price of the unique products in each category
pub fn category_avg_price(purchase: &Purchase) -> Result<BTreeMap<String, Decimal>> {
    products_by_category(purchase)
        .into_iter()
        .map(|(category, products)| {
            let avg = if products.is_empty() {
                Decimal::ZERO
            } else {
                let sum = checked_sum("category average", products.iter().map(|p| p.price))?;
                sum / Decimal::from(products.len())
            };
            Ok((category, avg))
        })
        .collect()
}

/// Most and least expensive unique product in each category
pub fn most_and_least_expensive_by_category(purchase: &Purchase) -> BTreeMap<String, PriceRange> {
    products_by_category(purchase)
        .into_iter()
        .filter_map(|(category, products)| {
            let mut iter = products.into_iter();
            let first = iter.next()?;
            let (max, min) = iter.fold((first, first), |(max, min), p| {
                // strict comparisons keep the first-seen product on ties
                let max = if p.price > max.price { p } else { max };
                let min = if p.price < min.price { p } else { min };
                (max, min)
            });
            Some((
                category,
                PriceRange {
                    max: max.clone(),
                    min: min.clone(),
                },
            ))
        })
        .collect()
}

/// For each category, the customers for whom it is their most purchased one.
///
/// A customer tied between several categories is listed under each of them.
pub fn most_frequent_category_per_customer(purchase: &Purchase) -> BTreeMap<String, Vec<Customer>> {
    let mut result: BTreeMap<String, Vec<Customer>> = BTreeMap::new();

    for (customer, products) in purchase {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for product in products {
            *counts.entry(product.category.as_str()).or_insert(0) += 1;
        }

        let Some(own_max) = counts.values().copied().max() else {
            continue;
        };

        for (category, count) in counts {
            if count == own_max {
                result
                    .entry(category.to_string())
                    .or_default()
                    .push(customer.clone());
            }
        }
    }

    result
}

/// `max(total_spent - cash, 0)`, or [`UNKNOWN_CUSTOMER_DEBT`] when the id is unknown
pub fn debt(purchase: &Purchase, customer_id: i64) -> Result<Decimal> {
    match purchase.find_customer(customer_id) {
        Some(customer) => debt_of(customer, total_spent(purchase, customer_id)?),
        None => Ok(UNKNOWN_CUSTOMER_DEBT),
    }
}

pub fn can_pay(purchase: &Purchase, customer_id: i64) -> Result<bool> {
    Ok(debt(purchase, customer_id)?.is_zero())
}

/// Customer id -> debt, only for customers who owe something
pub fn customers_with_debt(purchase: &Purchase) -> Result<BTreeMap<i64, Decimal>> {
    let mut indebted = BTreeMap::new();
    for (customer, products) in purchase {
        let debt = debt_of(customer, sum_prices(products)?)?;
        if debt > Decimal::ZERO {
            indebted.insert(customer.id, debt);
        }
    }
    Ok(indebted)
}

/// Products deduplicated by id across the snapshot, first occurrence wins
pub fn unique_products(purchase: &Purchase) -> Vec<&Product> {
    let mut seen = HashSet::new();
    purchase
        .all_products()
        .filter(|p| seen.insert(p.id))
        .collect()
}

// ============================================================================
// HELPERS
// ============================================================================

fn checked_sum<I>(operation: &'static str, amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    let mut total = Decimal::ZERO;
    for amount in amounts {
        total = total
            .checked_add(amount)
            .ok_or(AnalyticsError::AmountOverflow { operation })?;
    }
    Ok(total)
}

fn sum_prices(products: &[Product]) -> Result<Decimal> {
    checked_sum("total spent", products.iter().map(|p| p.price))
}

fn debt_of(customer: &Customer, spent: Decimal) -> Result<Decimal> {
    let owed = spent
        .checked_sub(customer.cash)
        .ok_or(AnalyticsError::AmountOverflow { operation: "debt" })?;
    Ok(owed.max(Decimal::ZERO))
}

/// Customers whose amount equals the maximum amount, in snapshot order
fn customers_at_max(amounts: Vec<(&Customer, Decimal)>) -> Vec<Customer> {
    let max_amount = amounts
        .iter()
        .map(|(_, amount)| *amount)
        .max()
        .unwrap_or(Decimal::ZERO);

    amounts
        .into_iter()
        .filter(|(_, amount)| *amount == max_amount)
        .map(|(customer, _)| customer.clone())
        .collect()
}

/// Key with the highest count; iteration is in key order, so ties go to the smallest key
fn most_counted<'a>(counts: &BTreeMap<&'a str, usize>) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for (&key, &count) in counts {
        match best {
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((key, count)),
        }
    }
    best.map(|(key, _)| key)
}

fn products_by_category(purchase: &Purchase) -> BTreeMap<String, Vec<&Product>> {
    let mut grouped: BTreeMap<String, Vec<&Product>> = BTreeMap::new();
    for product in unique_products(purchase) {
        grouped
            .entry(product.category.clone())
            .or_default()
            .push(product);
    }
    grouped
}

// ============================================================================
// ANALYTICS REPORT
// ============================================================================

/// Every whole-snapshot aggregate computed over one snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub customer_count: usize,
    pub purchase_count: usize,
    pub top_spenders: Vec<Customer>,
    pub age_category_preference: BTreeMap<u32, String>,
    pub category_avg_price: BTreeMap<String, Decimal>,
    pub most_and_least_expensive: BTreeMap<String, PriceRange>,
    pub most_frequent_category: BTreeMap<String, Vec<Customer>>,
    pub indebted_customers: BTreeMap<i64, Decimal>,
    pub total_debt: Decimal,
}

impl AnalyticsReport {
    pub fn from_snapshot(purchase: &Purchase) -> Result<Self> {
        let indebted_customers = customers_with_debt(purchase)?;
        let total_debt = checked_sum("total debt", indebted_customers.values().copied())?;

        Ok(AnalyticsReport {
            report_id: uuid::Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            customer_count: purchase.customer_count(),
            purchase_count: purchase.purchase_count(),
            top_spenders: top_spenders(purchase)?,
            age_category_preference: age_category_preference(purchase),
            category_avg_price: category_avg_price(purchase)?,
            most_and_least_expensive: most_and_least_expensive_by_category(purchase),
            most_frequent_category: most_frequent_category_per_customer(purchase),
            indebted_customers,
            total_debt,
        })
    }

    pub fn summary(&self) -> String {
        format!(
            "Report {}: {} customers, {} purchases, {} categories, {} indebted (total debt {})",
            self.report_id,
            self.customer_count,
            self.purchase_count,
            self.category_avg_price.len(),
            self.indebted_customers.len(),
            self.total_debt
        )
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// PurchaseAnalytics - stateless engine over an injected repository.
///
/// Each method fetches one fresh snapshot; nothing is retained between calls.
/// Repository failures propagate unchanged (with context).
pub struct PurchaseAnalytics<R: PurchaseRepository> {
    repository: R,
}

impl<R: PurchaseRepository> PurchaseAnalytics<R> {
    pub fn new(repository: R) -> Self {
        PurchaseAnalytics { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// The full current snapshot
    pub fn all_purchases(&self) -> Result<Purchase> {
        self.repository.get_purchases().with_context(|| {
            format!(
                "Failed to fetch purchases from {} repository",
                self.repository.source_type()
            )
        })
    }

    pub fn total_spent(&self, customer_id: i64) -> Result<Decimal> {
        let spent = total_spent(&self.all_purchases()?, customer_id)?;
        debug!(customer_id, %spent, "total_spent");
        Ok(spent)
    }

    pub fn top_spenders(&self) -> Result<Vec<Customer>> {
        let customers = top_spenders(&self.all_purchases()?)?;
        debug!(count = customers.len(), "top_spenders");
        Ok(customers)
    }

    pub fn top_spenders_in_category(&self, category: &str) -> Result<Vec<Customer>> {
        let customers = top_spenders_in_category(&self.all_purchases()?, category)?;
        debug!(category, count = customers.len(), "top_spenders_in_category");
        Ok(customers)
    }

    pub fn age_category_preference(&self) -> Result<BTreeMap<u32, String>> {
        let preference = age_category_preference(&self.all_purchases()?);
        debug!(ages = preference.len(), "age_category_preference");
        Ok(preference)
    }

    pub fn category_avg_price(&self) -> Result<BTreeMap<String, Decimal>> {
        let averages = category_avg_price(&self.all_purchases()?)?;
        debug!(categories = averages.len(), "category_avg_price");
        Ok(averages)
    }

    pub fn most_and_least_expensive_by_category(&self) -> Result<BTreeMap<String, PriceRange>> {
        let ranges = most_and_least_expensive_by_category(&self.all_purchases()?);
        debug!(categories = ranges.len(), "most_and_least_expensive_by_category");
        Ok(ranges)
    }

    pub fn most_frequent_category_per_customer(&self) -> Result<BTreeMap<String, Vec<Customer>>> {
        let grouped = most_frequent_category_per_customer(&self.all_purchases()?);
        debug!(categories = grouped.len(), "most_frequent_category_per_customer");
        Ok(grouped)
    }

    pub fn can_pay(&self, customer_id: i64) -> Result<bool> {
        Ok(self.debt(customer_id)?.is_zero())
    }

    pub fn debt(&self, customer_id: i64) -> Result<Decimal> {
        let debt = debt(&self.all_purchases()?, customer_id)?;
        debug!(customer_id, %debt, "debt");
        Ok(debt)
    }

    pub fn customers_with_debt(&self) -> Result<BTreeMap<i64, Decimal>> {
        let indebted = customers_with_debt(&self.all_purchases()?)?;
        debug!(count = indebted.len(), "customers_with_debt");
        Ok(indebted)
    }

    /// Every whole-snapshot aggregate over a single fetch
    pub fn report(&self) -> Result<AnalyticsReport> {
        let report = AnalyticsReport::from_snapshot(&self.all_purchases()?)?;
        debug!(report_id = %report.report_id, "report");
        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================
