//! # Branch Repository
//!
//! Branch CRUD and headquarters lookup.
//!
//! ```text
//! ┌───────────────┐   restock   ┌───────────────┐
//! │  Nairobi HQ   │ ──────────► │    Kisumu     │
//! │ is_hq = 1     │ ──────────► │   Mombasa     │
//! └───────────────┘ ──────────► │    ...        │
//!                               └───────────────┘
//! ```
//! At most one row has `is_headquarters = 1`; a partial unique index turns a
//! second HQ into a `UniqueViolation`.

use chrono::Utc;
use retail_core::validation::{validate_branch_name, validate_location};
use retail_core::{Branch, CoreError};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_write;

const BRANCH_COLUMNS: &str = "id, name, location, is_headquarters, created_at, updated_at";

/// Body of a branch create request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub is_headquarters: bool,
}

impl NewBranch {
    pub fn validate(&self) -> DbResult<()> {
        validate_branch_name(&self.name)?;
        validate_location(&self.location)?;
        Ok(())
    }
}

/// Body of a branch update request. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchUpdate {
    pub name: Option<String>,
    pub location: Option<String>,
    pub is_headquarters: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BranchRepository {
    pool: SqlitePool,
}

impl BranchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BranchRepository { pool }
    }

    /// All branches, headquarters first.
    pub async fn list(&self) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(&format!(
            "SELECT {} FROM branches ORDER BY is_headquarters DESC, name",
            BRANCH_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Branch>> {
        let mut conn = self.pool.acquire().await?;
        get_in(&mut conn, id).await
    }

    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(&format!(
            "SELECT {} FROM branches WHERE name = ?1",
            BRANCH_COLUMNS
        ))
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    pub async fn get_headquarters(&self) -> DbResult<Option<Branch>> {
        let mut conn = self.pool.acquire().await?;
        headquarters_in(&mut conn).await
    }

    pub async fn create(&self, input: &NewBranch) -> DbResult<Branch> {
        input.validate()?;

        let now = Utc::now();
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            location: input.location.trim().to_string(),
            is_headquarters: input.is_headquarters,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO branches (id, name, location, is_headquarters, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(&branch.location)
        .bind(branch.is_headquarters)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_branch_error(e, &branch))?;

        info!(id = %branch.id, name = %branch.name, hq = branch.is_headquarters, "Branch created");
        Ok(branch)
    }

    pub async fn update(&self, id: &str, changes: &BranchUpdate) -> DbResult<Branch> {
        let mut branch = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Branch", id))?;

        if let Some(name) = &changes.name {
            validate_branch_name(name)?;
            branch.name = name.trim().to_string();
        }
        if let Some(location) = &changes.location {
            validate_location(location)?;
            branch.location = location.trim().to_string();
        }
        if let Some(is_hq) = changes.is_headquarters {
            branch.is_headquarters = is_hq;
        }
        branch.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE branches SET name = ?2, location = ?3, is_headquarters = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(&branch.location)
        .bind(branch.is_headquarters)
        .bind(branch.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| unique_branch_error(e, &branch))?;

        debug!(id = %branch.id, "Branch updated");
        Ok(branch)
    }

    /// Deletes a branch that holds no stock, sales or orders.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let mut tx = begin_write(&self.pool).await?;

        if get_in(&mut tx, id).await?.is_none() {
            return Err(DbError::not_found("Branch", id));
        }

        let references: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COUNT(*) FROM stock_entries WHERE branch_id = ?1) +
                (SELECT COUNT(*) FROM sales WHERE branch_id = ?1) +
                (SELECT COUNT(*) FROM orders WHERE branch_id = ?1) +
                (SELECT COUNT(*) FROM restock_logs WHERE branch_id = ?1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if references > 0 {
            return Err(CoreError::Conflict(
                "Branch still has stock, sales or orders and cannot be deleted".to_string(),
            )
            .into());
        }

        sqlx::query("DELETE FROM branches WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(id = %id, "Branch deleted");
        Ok(())
    }
}

fn unique_branch_error(err: sqlx::Error, branch: &Branch) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. } if field.contains("is_headquarters") => {
            DbError::duplicate("headquarters", &branch.name)
        }
        DbError::UniqueViolation { .. } => DbError::duplicate("branch name", &branch.name),
        other => other,
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

pub(crate) async fn get_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Branch>> {
    let branch = sqlx::query_as::<_, Branch>(&format!(
        "SELECT {} FROM branches WHERE id = ?1",
        BRANCH_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(branch)
}

/// Fails with `NotFound` unless the branch exists.
pub(crate) async fn require_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Branch> {
    get_in(conn, id)
        .await?
        .ok_or_else(|| CoreError::not_found("Branch", id).into())
}

pub(crate) async fn headquarters_in(conn: &mut SqliteConnection) -> DbResult<Option<Branch>> {
    let branch = sqlx::query_as::<_, Branch>(&format!(
        "SELECT {} FROM branches WHERE is_headquarters = 1 LIMIT 1",
        BRANCH_COLUMNS
    ))
    .fetch_optional(&mut *conn)
    .await?;

    Ok(branch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;

    #[tokio::test]
    async fn test_second_headquarters_is_rejected() {
        let f = fixture().await;

        let err = f
            .db
            .branches()
            .create(&NewBranch {
                name: "Thika".to_string(),
                location: "Thika".to_string(),
                is_headquarters: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        let hq = f.db.branches().get_headquarters().await.unwrap().unwrap();
        assert_eq!(hq.id, f.hq.id);
    }

    #[tokio::test]
    async fn test_delete_branch_with_stock_is_conflict() {
        let f = fixture().await;
        f.stock(&f.branch.id, &f.coke.id, 3).await;

        let err = f.db.branches().delete(&f.branch.id).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Conflict(_))));

        let empty = f
            .db
            .branches()
            .create(&NewBranch {
                name: "Eldoret".to_string(),
                location: "Eldoret".to_string(),
                is_headquarters: false,
            })
            .await
            .unwrap();
        f.db.branches().delete(&empty.id).await.unwrap();
        assert!(f.db.branches().get_by_id(&empty.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_keeps_absent_fields() {
        let f = fixture().await;

        let updated = f
            .db
            .branches()
            .update(
                &f.branch.id,
                &BranchUpdate {
                    location: Some("Oginga Odinga St".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, f.branch.name);
        assert_eq!(updated.location, "Oginga Odinga St");
    }
}
