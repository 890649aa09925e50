//! # Product Repository
//!
//! Catalog CRUD.
//!
//! ## Price Changes and History
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products.price_cents           sale_items.unit_price_cents             │
//! │  ─────────────────────          ───────────────────────────             │
//! │  6500 ── sale #1 ─────────────► 6500                                    │
//! │  7000 (update)                                                          │
//! │  7000 ── sale #2 ─────────────► 7000                                    │
//! │                                                                         │
//! │  Updating the product never rewrites sale #1.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use retail_core::validation::{validate_brand, validate_price_cents, validate_product_name};
use retail_core::{CoreError, Product};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;

const PRODUCT_COLUMNS: &str = "id, name, brand, description, price_cents, created_at, updated_at";

/// Body of a product create request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i64,
}

impl NewProduct {
    pub fn validate(&self) -> DbResult<()> {
        validate_product_name(&self.name)?;
        validate_brand(&self.brand)?;
        validate_price_cents(self.price_cents)?;
        Ok(())
    }
}

/// Body of a product update request. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// All products ordered by brand, then name.
    pub async fn list(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products ORDER BY brand, name",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    /// Products of one brand, matched case-insensitively.
    pub async fn list_by_brand(&self, brand: &str) -> DbResult<Vec<Product>> {
        debug!(brand = %brand, "Listing products by brand");

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE brand = ?1 COLLATE NOCASE ORDER BY name",
            PRODUCT_COLUMNS
        ))
        .bind(brand.trim())
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Exact name-and-brand lookup, used by the seed binary to stay idempotent.
    pub async fn find_by_name_and_brand(&self, name: &str, brand: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {} FROM products WHERE name = ?1 AND brand = ?2",
            PRODUCT_COLUMNS
        ))
        .bind(name)
        .bind(brand)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn create(&self, input: &NewProduct) -> DbResult<Product> {
        input.validate()?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            brand: input.brand.trim().to_string(),
            description: input
                .description
                .as_ref()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            price_cents: input.price_cents,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO products (id, name, brand, description, price_cents, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(id = %product.id, name = %product.name, brand = %product.brand, "Product created");
        Ok(product)
    }

    /// Updates catalog fields. Historical line items keep their own prices.
    pub async fn update(&self, id: &str, changes: &ProductUpdate) -> DbResult<Product> {
        let mut product = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))?;

        if let Some(name) = &changes.name {
            validate_product_name(name)?;
            product.name = name.trim().to_string();
        }
        if let Some(brand) = &changes.brand {
            validate_brand(brand)?;
            product.brand = brand.trim().to_string();
        }
        if let Some(description) = &changes.description {
            let trimmed = description.trim();
            product.description = (!trimmed.is_empty()).then(|| trimmed.to_string());
        }
        if let Some(price) = changes.price_cents {
            validate_price_cents(price)?;
            product.price_cents = price;
        }
        product.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE products SET name = ?2, brand = ?3, description = ?4, price_cents = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(&product.description)
        .bind(product.price_cents)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %product.id, price_cents = product.price_cents, "Product updated");
        Ok(product)
    }

    /// Deletes a product no stock row or line item references.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        if get_in(&mut tx, id).await?.is_none() {
            return Err(DbError::not_found("Product", id));
        }

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM stock_entries WHERE product_id = ?1) +
                (SELECT COUNT(*) FROM sale_items WHERE product_id = ?1) +
                (SELECT COUNT(*) FROM order_items WHERE product_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if references > 0 {
            return Err(CoreError::Conflict(
                "Product is still stocked or sold and cannot be deleted".to_string(),
            )
            .into());
        }

        sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(id = %id, "Product deleted");
        Ok(())
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {} FROM products WHERE id = ?1",
        PRODUCT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Fails with `NotFound` unless the product exists.
pub(crate) async fn require_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Product> {
    get_in(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Product", id).into())
}
