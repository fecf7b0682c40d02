// 🗄️ SQLite Repository - customers, products, and the purchases joining them
//
// Schema:
//   customers(id, first_name, last_name, age, cash)
//   products(id, name, category, price)
//   customer_product(id, customer_id, product_id)   -- one row per purchase
//
// Money is stored as TEXT so decimals round-trip exactly.

use crate::model::{Customer, Product, Purchase};
use crate::repository::{PurchaseRepository, SourceType};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            age INTEGER NOT NULL,
            cash TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            price TEXT NOT NULL
        )",
        [],
    )?;

    // Own row id so the same customer may buy the same product repeatedly
    conn.execute(
        "CREATE TABLE IF NOT EXISTS customer_product (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_customer_product_customer ON customer_product(customer_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_products_category ON products(category)",
        [],
    )?;

    Ok(())
}

/// Insert or replace a customer row (keyed by id)
pub fn insert_customer(conn: &Connection, customer: &Customer) -> Result<()> {
    conn.execute(
        "INSERT INTO customers (id, first_name, last_name, age, cash)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            age = excluded.age,
            cash = excluded.cash",
        params![
            customer.id,
            customer.first_name,
            customer.last_name,
            customer.age,
            customer.cash.to_string(),
        ],
    )
    .with_context(|| format!("Failed to store customer {}", customer.id))?;

    Ok(())
}

/// Insert a product row; an existing id keeps its first stored values
pub fn insert_product(conn: &Connection, product: &Product) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO products (id, name, category, price) VALUES (?1, ?2, ?3, ?4)",
            params![
                product.id,
                product.name,
                product.category,
                product.price.to_string(),
            ],
        )
        .with_context(|| format!("Failed to store product {}", product.id))?;

    Ok(inserted == 1)
}

/// Record one purchase of an already stored product by an already stored customer
pub fn insert_purchase(conn: &Connection, customer_id: i64, product_id: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO customer_product (customer_id, product_id) VALUES (?1, ?2)",
        params![customer_id, product_id],
    )
    .with_context(|| {
        format!(
            "Failed to record purchase of product {} by customer {}",
            product_id, customer_id
        )
    })?;

    Ok(())
}

/// Store a whole snapshot inside one SQLite transaction. Returns the number of purchases written.
///
/// Each imported customer's stored purchases are replaced by the snapshot's list,
/// so importing the same feed twice leaves the database unchanged.
pub fn import_purchase(conn: &mut Connection, purchase: &Purchase) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut written = 0;

    for (customer, products) in purchase {
        insert_customer(&tx, customer)?;
        tx.execute(
            "DELETE FROM customer_product WHERE customer_id = ?1",
            [customer.id],
        )
        .with_context(|| format!("Failed to clear purchases of customer {}", customer.id))?;
        for product in products {
            insert_product(&tx, product)?;
            insert_purchase(&tx, customer.id, product.id)?;
            written += 1;
        }
    }

    tx.commit()?;
    info!(
        customers = purchase.customer_count(),
        purchases = written,
        "imported snapshot into SQLite"
    );

    Ok(written)
}

pub fn get_customers(conn: &Connection) -> Result<HashMap<i64, Customer>> {
    let mut stmt = conn.prepare("SELECT id, first_name, last_name, age, cash FROM customers")?;

    let customers = stmt
        .query_map([], row_to_customer)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(customers.into_iter().map(|c| (c.id, c)).collect())
}

pub fn get_products(conn: &Connection) -> Result<HashMap<i64, Product>> {
    let mut stmt = conn.prepare("SELECT id, name, category, price FROM products")?;

    let products = stmt
        .query_map([], |row| {
            let price: String = row.get(3)?;
            Ok(Product {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                price: parse_money(3, &price)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(products.into_iter().map(|p| (p.id, p)).collect())
}

pub fn find_customer(conn: &Connection, customer_id: i64) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            "SELECT id, first_name, last_name, age, cash FROM customers WHERE id = ?1",
            [customer_id],
            row_to_customer,
        )
        .optional()?;

    Ok(customer)
}

/// Build the purchase snapshot: every customer, with their purchases in insertion order.
///
/// Join rows pointing at a missing customer or product are skipped.
pub fn load_purchases(conn: &Connection) -> Result<Purchase> {
    let customers = get_customers(conn)?;
    let products = get_products(conn)?;

    let mut purchase = Purchase::new();
    for customer in customers.values() {
        purchase.add_customer(customer.clone());
    }

    let mut stmt = conn.prepare("SELECT customer_id, product_id FROM customer_product ORDER BY id")?;
    let links = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    let mut dangling = 0;
    for (customer_id, product_id) in links {
        match (customers.get(&customer_id), products.get(&product_id)) {
            (Some(customer), Some(product)) => purchase.record(customer.clone(), product.clone()),
            _ => dangling += 1,
        }
    }

    if dangling > 0 {
        warn!(dangling, "skipped purchases referencing unknown customers or products");
    }

    Ok(purchase)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM customer_product", [], |row| row.get(0))?;

    Ok(count)
}

fn row_to_customer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    let cash: String = row.get(4)?;
    Ok(Customer {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        age: row.get(3)?,
        cash: parse_money(4, &cash)?,
    })
}

fn parse_money(column: usize, value: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ============================================================================
// REPOSITORY
// ============================================================================

/// SQLite-backed repository supporting the full capability set
pub struct SqlPurchaseRepository {
    conn: Mutex<Connection>,
}

impl SqlPurchaseRepository {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqlPurchaseRepository {
            conn: Mutex::new(conn),
        })
    }

    /// Bulk load of a snapshot, replacing the purchases of every customer it contains
    pub fn import(&self, purchase: &Purchase) -> Result<usize> {
        let mut conn = self.lock()?;
        import_purchase(&mut conn, purchase)
    }

    pub fn purchase_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        verify_count(&conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
    }
}

impl PurchaseRepository for SqlPurchaseRepository {
    fn get_purchases(&self) -> Result<Purchase> {
        let conn = self.lock()?;
        load_purchases(&conn)
    }

    fn source_type(&self) -> SourceType {
        SourceType::Sql
    }

    fn find_customer(&self, customer_id: i64) -> Result<Option<Customer>> {
        let conn = self.lock()?;
        find_customer(&conn, customer_id)
    }

    fn save_purchase(&self, customer: &Customer, product: &Product) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        insert_customer(&tx, customer)?;
        insert_product(&tx, product)?;
        insert_purchase(&tx, customer.id, product.id)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_customer(&self, customer_id: i64) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM customers WHERE id = ?1", [customer_id])?;
        Ok(())
    }

    fn delete_all(&self) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM customer_product", [])?;
        tx.execute("DELETE FROM customers", [])?;
        tx.execute("DELETE FROM products", [])?;
        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
