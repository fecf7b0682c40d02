// 🛒 Domain Model - Customers, products, and who bought what
//
// Customer and Product are immutable values (usable as map keys).
// Purchase is the one mutable aggregate: customer -> ordered product list.

use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::btree_map;
use std::collections::BTreeMap;

// ============================================================================
// CUSTOMER
// ============================================================================

/// A customer with personal details and a cash balance.
///
/// Field order matters: the derived `Ord` sorts by `id` first, which fixes the
/// iteration order of every `Purchase` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub cash: Decimal,
}

impl Customer {
    pub fn new(id: i64, first_name: &str, last_name: &str, age: u32, cash: Decimal) -> Self {
        Customer {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            age,
            cash,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

// ============================================================================
// PRODUCT
// ============================================================================

/// A catalog product. `price` is expected to be non-negative but not validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: Decimal,
}

impl Product {
    pub fn new(id: i64, name: &str, category: &str, price: Decimal) -> Self {
        Product {
            id,
            name: name.to_string(),
            category: category.to_string(),
            price,
        }
    }
}

/// Most and least expensive product of a single category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub max: Product,
    pub min: Product,
}

// ============================================================================
// PURCHASE (aggregate root)
// ============================================================================

/// Snapshot of every customer and the products they bought.
///
/// Repeat purchases are duplicate entries in a customer's list; nothing is
/// deduplicated here. A customer may be present with an empty list.
#[derive(Debug, Clone, Default)]
pub struct Purchase {
    customers_and_products: BTreeMap<Customer, Vec<Product>>,
}

impl Purchase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a customer without any purchase (no-op if already present)
    pub fn add_customer(&mut self, customer: Customer) {
        self.customers_and_products.entry(customer).or_default();
    }

    /// Append one bought product to the customer's list, registering the customer if needed
    pub fn record(&mut self, customer: Customer, product: Product) {
        self.customers_and_products
            .entry(customer)
            .or_default()
            .push(product);
    }

    /// Mutable access to a customer's product list (created empty when absent)
    pub fn products_mut(&mut self, customer: &Customer) -> &mut Vec<Product> {
        self.customers_and_products
            .entry(customer.clone())
            .or_default()
    }

    pub fn remove_customer(&mut self, customer_id: i64) -> Option<(Customer, Vec<Product>)> {
        let key = self.find_customer(customer_id)?.clone();
        self.customers_and_products.remove_entry(&key)
    }

    pub fn find_customer(&self, customer_id: i64) -> Option<&Customer> {
        self.customers_and_products
            .keys()
            .find(|customer| customer.id == customer_id)
    }

    /// Products bought by the customer with this id, `None` when the id is unknown
    pub fn products_of(&self, customer_id: i64) -> Option<&[Product]> {
        self.customers_and_products
            .iter()
            .find(|(customer, _)| customer.id == customer_id)
            .map(|(_, products)| products.as_slice())
    }

    pub fn customers(&self) -> impl Iterator<Item = &Customer> {
        self.customers_and_products.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Customer, Vec<Product>> {
        self.customers_and_products.iter()
    }

    /// Every bought product in snapshot order (customers by id, then purchase order)
    pub fn all_products(&self) -> impl Iterator<Item = &Product> {
        self.customers_and_products.values().flatten()
    }

    pub fn customer_count(&self) -> usize {
        self.customers_and_products.len()
    }

    pub fn purchase_count(&self) -> usize {
        self.customers_and_products.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.customers_and_products.is_empty()
    }
}

impl<'a> IntoIterator for &'a Purchase {
    type Item = (&'a Customer, &'a Vec<Product>);
    type IntoIter = btree_map::Iter<'a, Customer, Vec<Product>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<(Customer, Vec<Product>)> for Purchase {
    fn from_iter<I: IntoIterator<Item = (Customer, Vec<Product>)>>(iter: I) -> Self {
        let mut purchase = Purchase::new();
        for (customer, products) in iter {
            purchase.products_mut(&customer).extend(products);
        }
        purchase
    }
}

/// Serialized as `{"<customer id>": [product, ...]}`
impl Serialize for Purchase {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.customers_and_products.len()))?;
        for (customer, products) in &self.customers_and_products {
            map.serialize_entry(&customer.id.to_string(), products)?;
        }
        map.end()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn money(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_customer_is_value_type() {
        let a = Customer::new(1, "John", "Doe", 30, money("1000.00"));
        let b = Customer::new(1, "John", "Doe", 30, money("1000.00"));

        let mut purchase = Purchase::new();
        purchase.record(a.clone(), Product::new(1, "Laptop", "Electronics", money("1200.00")));
        purchase.record(b, Product::new(2, "Smartphone", "Electronics", money("800.00")));

        // Identical customers collapse onto the same key
        assert_eq!(purchase.customer_count(), 1);
        assert_eq!(purchase.products_of(1).unwrap().len(), 2);
        assert_eq!(a.full_name(), "John Doe");
    }

    #[test]
    fn test_repeat_purchases_are_kept() {
        let customer = Customer::new(7, "Sam", "Smith", 28, money("10"));
        let shoes = Product::new(3, "Shoes", "Clothing", money("100.00"));

        let mut purchase = Purchase::new();
        purchase.record(customer.clone(), shoes.clone());
        purchase.record(customer, shoes);

        assert_eq!(purchase.purchase_count(), 2);
        assert_eq!(purchase.all_products().count(), 2);
    }

    #[test]
    fn test_snapshot_iterates_by_customer_id() {
        let mut purchase = Purchase::new();
        purchase.add_customer(Customer::new(3, "C", "C", 40, Decimal::ZERO));
        purchase.add_customer(Customer::new(1, "A", "A", 20, Decimal::ZERO));
        purchase.add_customer(Customer::new(2, "B", "B", 30, Decimal::ZERO));

        let ids: Vec<i64> = purchase.customers().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_mutation_and_removal() {
        let sam = Customer::new(3, "Sam", "Smith", 28, money("100.00"));
        let mut purchase = Purchase::new();

        purchase.products_mut(&sam).push(Product::new(9, "Book", "Books", money("12.50")));
        assert_eq!(purchase.products_of(3).unwrap().len(), 1);
        assert!(purchase.products_of(4).is_none());

        let (removed, products) = purchase.remove_customer(3).unwrap();
        assert_eq!(removed, sam);
        assert_eq!(products.len(), 1);
        assert!(purchase.is_empty());
        assert!(purchase.remove_customer(3).is_none());
    }

    #[test]
    fn test_serialize_keys_by_customer_id() {
        let mut purchase = Purchase::new();
        purchase.record(
            Customer::new(2, "Jane", "Doe", 25, money("1500.00")),
            Product::new(3, "Shoes", "Clothing", money("100.00")),
        );

        let json = serde_json::to_value(&purchase).unwrap();
        assert_eq!(json["2"][0]["name"], "Shoes");
        assert_eq!(json["2"][0]["price"], "100.00");
    }
}
