//! # User Repository
//!
//! Accounts and their password hashes. The hash only leaves this module
//! inside [`UserCredentials`], which the login handler verifies and drops.

use chrono::Utc;
use retail_core::{Role, User};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

/// A user together with the stored PHC password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates a user. A taken email surfaces as `UniqueViolation`.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> DbResult<User> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            role,
            created_at: now,
        };

        debug!(id = %user.id, email = %user.email, role = %role, "Creating user");

        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(password_hash)
        .bind(user.role)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("email", &user.email),
            other => other,
        })?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, role, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Looks up login credentials by email (case-insensitive).
    pub async fn find_credentials(&self, email: &str) -> DbResult<Option<UserCredentials>> {
        let creds = sqlx::query_as::<_, UserCredentials>(
            r#"
            SELECT id, name, email, role, created_at, password_hash
            FROM users
            WHERE email = ?1
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::DbError;
    use crate::testing::fixture;
    use retail_core::Role;

    #[tokio::test]
    async fn test_create_and_find_credentials() {
        let f = fixture().await;
        let users = f.db.users();

        let user = users
            .create("Wanjiru", "Wanjiru@Example.com", "$argon2id$fake", Role::Customer)
            .await
            .unwrap();
        assert_eq!(user.email, "wanjiru@example.com");

        let creds = users
            .find_credentials("WANJIRU@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.user.id, user.id);
        assert_eq!(creds.password_hash, "$argon2id$fake");

        let err = users
            .create("Other", "wanjiru@example.com", "x", Role::Customer)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
