// 📥 Document Feeds - CSV and JSON purchase exports
//
// Both feeds are read-only snapshots located either on disk or behind an
// http(s) URL. Every get_purchases call re-reads the document.
//
// CSV columns:  ID, FirstName, LastName, Age, Salary, ProductID, Product, Category, Price
// JSON layout:  [{ID, FirstName, LastName, Age, Salary, Purchases: [{ProductID, Product, Category, Price}]}]

use crate::error::RepositoryError;
use crate::model::{Customer, Product, Purchase};
use crate::repository::{PurchaseRepository, SourceType};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

// ============================================================================
// FEED LOCATION
// ============================================================================

/// Where a feed document lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedLocation {
    File(PathBuf),
    Url(String),
}

impl FeedLocation {
    /// `http://` / `https://` values are URLs, anything else is a file path
    pub fn parse(location: &str) -> Self {
        let trimmed = location.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            FeedLocation::Url(trimmed.to_string())
        } else {
            FeedLocation::File(PathBuf::from(trimmed))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FeedLocation::File(path) => path.display().to_string(),
            FeedLocation::Url(url) => url.clone(),
        }
    }

    /// Fetch the whole document as text
    pub fn fetch(&self) -> Result<String> {
        match self {
            FeedLocation::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read feed file {}", path.display())),
            FeedLocation::Url(url) => {
                let response = reqwest::blocking::get(url)
                    .with_context(|| format!("Failed to request feed {}", url))?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RepositoryError::FeedUnavailable {
                        location: url.clone(),
                        status: status.as_u16(),
                    }
                    .into());
                }
                response
                    .text()
                    .with_context(|| format!("Failed to read body of feed {}", url))
            }
        }
    }
}

// ============================================================================
// CSV FEED
// ============================================================================

/// One CSV line: a customer, optionally with one bought product
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "ID")]
    id: Option<String>,
    #[serde(rename = "FirstName")]
    first_name: Option<String>,
    #[serde(rename = "LastName")]
    last_name: Option<String>,
    #[serde(rename = "Age")]
    age: Option<String>,
    #[serde(rename = "Salary")]
    salary: Option<String>,
    #[serde(rename = "ProductID")]
    product_id: Option<String>,
    #[serde(rename = "Product")]
    product: Option<String>,
    #[serde(rename = "Category")]
    category: Option<String>,
    #[serde(rename = "Price")]
    price: Option<String>,
}

/// Parse a CSV purchase export.
///
/// Rows without a customer ID are skipped. Rows without a ProductID register
/// the customer with no purchase. The first row seen for an ID defines the customer.
pub fn parse_csv(content: &str) -> Result<Purchase> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut customers: HashMap<i64, Customer> = HashMap::new();
    let mut purchase = Purchase::new();
    let mut skipped = 0;

    for (index, result) in rdr.deserialize::<CsvRow>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = result.with_context(|| format!("Failed to deserialize CSV line {}", line))?;

        let Some(customer_id) = non_empty(&row.id) else {
            skipped += 1;
            continue;
        };
        let customer_id: i64 = parse_field(customer_id, SourceType::Csv, line, "ID")?;

        let customer = match customers.get(&customer_id) {
            Some(existing) => existing.clone(),
            None => {
                let customer = Customer {
                    id: customer_id,
                    first_name: text_or_empty(&row.first_name),
                    last_name: text_or_empty(&row.last_name),
                    age: optional_field(&row.age, SourceType::Csv, line, "Age")?.unwrap_or(0),
                    cash: optional_field(&row.salary, SourceType::Csv, line, "Salary")?
                        .unwrap_or(Decimal::ZERO),
                };
                customers.insert(customer_id, customer.clone());
                purchase.add_customer(customer.clone());
                customer
            }
        };

        if let Some(product_id) = non_empty(&row.product_id) {
            let product = Product {
                id: parse_field(product_id, SourceType::Csv, line, "ProductID")?,
                name: text_or_empty(&row.product),
                category: text_or_empty(&row.category),
                price: optional_field(&row.price, SourceType::Csv, line, "Price")?
                    .unwrap_or(Decimal::ZERO),
            };
            purchase.record(customer, product);
        }
    }

    if skipped > 0 {
        warn!(skipped, "skipped CSV rows without a customer ID");
    }

    Ok(purchase)
}

/// Read-only repository over a CSV export
pub struct CsvPurchaseRepository {
    location: FeedLocation,
}

impl CsvPurchaseRepository {
    pub fn new(location: FeedLocation) -> Self {
        CsvPurchaseRepository { location }
    }
}

impl PurchaseRepository for CsvPurchaseRepository {
    fn get_purchases(&self) -> Result<Purchase> {
        let purchase = parse_csv(&self.location.fetch()?)
            .with_context(|| format!("Invalid CSV feed {}", self.location.describe()))?;
        info!(
            source = %self.location.describe(),
            customers = purchase.customer_count(),
            purchases = purchase.purchase_count(),
            "loaded CSV feed"
        );
        Ok(purchase)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Csv
    }
}

// ============================================================================
// JSON FEED
// ============================================================================

#[derive(Debug, Deserialize)]
struct JsonCustomer {
    #[serde(rename = "ID")]
    id: i64,
    #[serde(rename = "FirstName")]
    first_name: String,
    #[serde(rename = "LastName")]
    last_name: String,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "Salary")]
    salary: serde_json::Value,
    #[serde(rename = "Purchases", default)]
    purchases: Vec<JsonProduct>,
}

#[derive(Debug, Deserialize)]
struct JsonProduct {
    #[serde(rename = "ProductID")]
    product_id: i64,
    #[serde(rename = "Product")]
    product: String,
    #[serde(rename = "Category")]
    category: String,
    #[serde(rename = "Price")]
    price: serde_json::Value,
}

/// Parse a JSON purchase export.
///
/// A repeated customer ID keeps the first entry's details and appends the
/// later entries' purchases to it.
pub fn parse_json(content: &str) -> Result<Purchase> {
    let entries: Vec<JsonCustomer> =
        serde_json::from_str(content).context("Failed to deserialize JSON feed")?;

    let mut customers: HashMap<i64, Customer> = HashMap::new();
    let mut purchase = Purchase::new();

    for (index, entry) in entries.into_iter().enumerate() {
        let location = format!("entry {}", index);

        let customer = match customers.get(&entry.id) {
            Some(existing) => existing.clone(),
            None => {
                let customer = Customer {
                    id: entry.id,
                    first_name: entry.first_name,
                    last_name: entry.last_name,
                    age: entry.age,
                    cash: json_money(&entry.salary, &location, "Salary")?,
                };
                customers.insert(entry.id, customer.clone());
                purchase.add_customer(customer.clone());
                customer
            }
        };

        for item in entry.purchases {
            let product = Product {
                id: item.product_id,
                price: json_money(&item.price, &location, "Price")?,
                name: item.product,
                category: item.category,
            };
            purchase.record(customer.clone(), product);
        }
    }

    Ok(purchase)
}

/// Read-only repository over a JSON export
pub struct JsonPurchaseRepository {
    location: FeedLocation,
}

impl JsonPurchaseRepository {
    pub fn new(location: FeedLocation) -> Self {
        JsonPurchaseRepository { location }
    }
}

impl PurchaseRepository for JsonPurchaseRepository {
    fn get_purchases(&self) -> Result<Purchase> {
        let purchase = parse_json(&self.location.fetch()?)
            .with_context(|| format!("Invalid JSON feed {}", self.location.describe()))?;
        info!(
            source = %self.location.describe(),
            customers = purchase.customer_count(),
            purchases = purchase.purchase_count(),
            "loaded JSON feed"
        );
        Ok(purchase)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Json
    }
}

// ============================================================================
// FIELD HELPERS
// ============================================================================

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn text_or_empty(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn parse_field<T>(value: &str, source_type: SourceType, line: usize, field: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        RepositoryError::MalformedRecord {
            source_type,
            location: format!("line {}", line),
            reason: format!("{} {:?}: {}", field, value, e),
        }
        .into()
    })
}

fn optional_field<T>(
    value: &Option<String>,
    source_type: SourceType,
    line: usize,
    field: &str,
) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(value)
        .map(|v| parse_field(v, source_type, line, field))
        .transpose()
}

/// Money may arrive as a JSON string ("12.50") or number (12.5)
fn json_money(value: &serde_json::Value, location: &str, field: &str) -> Result<Decimal> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => {
            return Err(RepositoryError::MalformedRecord {
                source_type: SourceType::Json,
                location: location.to_string(),
                reason: format!("{} must be a string or number, got {}", field, other),
            }
            .into())
        }
    };

    Decimal::from_str(&text).map_err(|e| {
        RepositoryError::MalformedRecord {
            source_type: SourceType::Json,
            location: location.to_string(),
            reason: format!("{} {:?}: {}", field, text, e),
        }
        .into()
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV_FEED: &str = "\
ID,FirstName,LastName,Age,Salary,ProductID,Product,Category,Price
1,John,Doe,30,1000.00,1,Laptop,Electronics,1200.00
1,John,Doe,30,1000.00,2,Smartphone,Electronics,800.00
2,Jane,Doe,25,1500.00,3,Shoes,Clothing,100.00
3,Sam,Smith,28,100.00,,,,
,Ghost,Row,99,5.00,4,Hat,Clothing,20.00
";

    const JSON_FEED: &str = r#"[
        {"ID": 1, "FirstName": "John", "LastName": "Doe", "Age": 30, "Salary": "1000.00",
         "Purchases": [
            {"ProductID": 1, "Product": "Laptop", "Category": "Electronics", "Price": "1200.00"},
            {"ProductID": 2, "Product": "Smartphone", "Category": "Electronics", "Price": 800}
         ]},
        {"ID": 2, "FirstName": "Jane", "LastName": "Doe", "Age": 25, "Salary": 1500.5},
        {"ID": 2, "FirstName": "Janet", "LastName": "Other", "Age": 99, "Salary": "1.00",
         "Purchases": [{"ProductID": 3, "Product": "Shoes", "Category": "Clothing", "Price": "100.00"}]}
    ]"#;

    fn money(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_feed_location_parse() {
        assert_eq!(
            FeedLocation::parse("https://example.com/data.csv"),
            FeedLocation::Url("https://example.com/data.csv".to_string())
        );
        assert_eq!(
            FeedLocation::parse(" data/purchases.json "),
            FeedLocation::File(PathBuf::from("data/purchases.json"))
        );
    }

    #[test]
    fn test_parse_csv() {
        let purchase = parse_csv(CSV_FEED).unwrap();

        assert_eq!(purchase.customer_count(), 3);
        assert_eq!(purchase.purchase_count(), 3);

        let john = purchase.find_customer(1).unwrap();
        assert_eq!(john.cash, money("1000.00"));
        assert_eq!(purchase.products_of(1).unwrap().len(), 2);

        // Customer listed without a product
        assert_eq!(purchase.products_of(3).unwrap().len(), 0);

        println!("✅ CSV feed parsed: {} customers", purchase.customer_count());
    }

    #[test]
    fn test_parse_csv_blank_fields_default() {
        let content = "\
ID,FirstName,LastName,Age,Salary,ProductID,Product,Category,Price
5,,,,,7,,,
";
        let purchase = parse_csv(content).unwrap();
        let customer = purchase.find_customer(5).unwrap();

        assert_eq!(customer.age, 0);
        assert_eq!(customer.cash, Decimal::ZERO);
        assert_eq!(customer.first_name, "");

        let product = &purchase.products_of(5).unwrap()[0];
        assert_eq!(product.id, 7);
        assert_eq!(product.price, Decimal::ZERO);
    }

    #[test]
    fn test_parse_csv_rejects_bad_price() {
        let content = "\
ID,FirstName,LastName,Age,Salary,ProductID,Product,Category,Price
1,John,Doe,30,1000.00,1,Laptop,Electronics,expensive
";
        let err = parse_csv(content).unwrap_err();
        let malformed = err.downcast_ref::<RepositoryError>().unwrap();
        assert!(matches!(malformed, RepositoryError::MalformedRecord { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_json() {
        let purchase = parse_json(JSON_FEED).unwrap();

        assert_eq!(purchase.customer_count(), 2);
        assert_eq!(purchase.purchase_count(), 3);

        // Numeric money is accepted
        assert_eq!(purchase.products_of(1).unwrap()[1].price, money("800"));

        // Repeated ID keeps the first details but collects every purchase
        let jane = purchase.find_customer(2).unwrap();
        assert_eq!(jane.first_name, "Jane");
        assert_eq!(jane.cash, money("1500.5"));
        assert_eq!(purchase.products_of(2).unwrap()[0].name, "Shoes");
    }

    #[test]
    fn test_parse_json_rejects_bad_money() {
        let content = r#"[{"ID": 1, "FirstName": "A", "LastName": "B", "Age": 1, "Salary": true}]"#;
        let err = parse_json(content).unwrap_err();
        assert!(err.to_string().contains("Salary must be a string or number"));
    }

    #[test]
    fn test_file_backed_repositories() {
        let mut csv_file = tempfile::NamedTempFile::new().unwrap();
        csv_file.write_all(CSV_FEED.as_bytes()).unwrap();
        let mut json_file = tempfile::NamedTempFile::new().unwrap();
        json_file.write_all(JSON_FEED.as_bytes()).unwrap();

        let csv_repo = CsvPurchaseRepository::new(FeedLocation::File(csv_file.path().to_path_buf()));
        let json_repo = JsonPurchaseRepository::new(FeedLocation::File(json_file.path().to_path_buf()));

        assert_eq!(csv_repo.get_purchases().unwrap().customer_count(), 3);
        assert_eq!(json_repo.get_purchases().unwrap().customer_count(), 2);

        // Feeds are read-only
        assert!(csv_repo.delete_all().is_err());
        assert!(json_repo.find_customer(1).is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let repo = CsvPurchaseRepository::new(FeedLocation::parse("/nonexistent/purchases.csv"));
        let err = repo.get_purchases().unwrap_err();
        assert!(err.to_string().contains("Failed to read feed file"));
    }
}
