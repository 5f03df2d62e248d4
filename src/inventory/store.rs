use crate::db::{self, SharedConnection};
use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Maximum product name length after trimming.
pub const MAX_PRODUCT_NAME_LEN: usize = 100;

/// A stocked product. Held as whole cents, exchanged as a decimal `price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    #[serde(rename = "price", with = "decimal_price")]
    pub price_cents: i64,
}

/// Fields accepted when creating a product.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default, rename = "price", with = "decimal_price")]
    pub price_cents: i64,
}

/// `19.99` on the wire, `1999` in storage.
mod decimal_price {
    use serde::{de, Deserialize, Deserializer, Serializer};

    // Beyond this an f64 no longer holds every cent exactly.
    const MAX_ABS_CENTS: f64 = 9_007_199_254_740_991.0;

    pub fn serialize<S: Serializer>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(*cents as f64 / 100.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let price = f64::deserialize(deserializer)?;
        let cents = (price * 100.0).round();
        if !cents.is_finite() || cents.abs() > MAX_ABS_CENTS {
            return Err(de::Error::custom("price out of range"));
        }
        Ok(cents as i64)
    }
}

/// Rejection of a product write.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("invalid product: {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub struct ProductStore {
    conn: SharedConnection,
}

impl ProductStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        Self::with_shared(db::open_shared(db_path)?)
    }

    pub fn with_connection(conn: Connection) -> Result<Self> {
        Self::with_shared(Arc::new(Mutex::new(conn)))
    }

    pub fn with_shared(conn: SharedConnection) -> Result<Self> {
        conn.lock()
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS products (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    quantity INTEGER NOT NULL DEFAULT 0,
                    price_cents INTEGER NOT NULL DEFAULT 0
                );",
            )
            .context("creating products table")?;

        Ok(Self { conn })
    }

    /// All products, oldest first.
    pub fn list(&self) -> Result<Vec<Product>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT id, name, quantity, price_cents FROM products ORDER BY id")?;
        let products = stmt
            .query_map([], |row| {
                Ok(Product {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    quantity: row.get(2)?,
                    price_cents: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Validate and insert a product, returning it with its assigned id.
    pub fn create(&self, new: NewProduct) -> Result<Product, InventoryError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(InventoryError::Invalid("name is required"));
        }
        if name.chars().count() > MAX_PRODUCT_NAME_LEN {
            return Err(InventoryError::Invalid("name too long (max 100 characters)"));
        }
        if new.quantity < 0 {
            return Err(InventoryError::Invalid("quantity cannot be negative"));
        }
        if new.price_cents < 0 {
            return Err(InventoryError::Invalid("price cannot be negative"));
        }

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO products (name, quantity, price_cents) VALUES (?1, ?2, ?3)",
            params![name, new.quantity, new.price_cents],
        )
        .context("inserting product")?;

        Ok(Product {
            id: conn.last_insert_rowid(),
            name: name.to_string(),
            quantity: new.quantity,
            price_cents: new.price_cents,
        })
    }
}
