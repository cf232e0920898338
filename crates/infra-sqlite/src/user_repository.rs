// SQLite UserRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use keyrelay_core::domain::{UniqueField, User, UserFilter, UserId};
use keyrelay_core::error::Result;
use keyrelay_core::port::{AccountKeyAssignment, UserRepository};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, phone_number, full_name, password_digest,
                "key", account_key, metadata, metadata_search, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(&user.full_name)
        .bind(&user.password_digest)
        .bind(&user.key)
        .bind(&user.account_key)
        .bind(&user.metadata)
        .bind(user.metadata.as_deref().map(str::to_lowercase))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(UserRow::into_user))
    }

    async fn taken_fields(
        &self,
        email: &str,
        phone_number: &str,
        key: &str,
    ) -> Result<Vec<UniqueField>> {
        let (email_taken, phone_taken, key_taken): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                EXISTS(SELECT 1 FROM users WHERE email = ?),
                EXISTS(SELECT 1 FROM users WHERE phone_number = ?),
                EXISTS(SELECT 1 FROM users WHERE "key" = ?)
            "#,
        )
        .bind(email)
        .bind(phone_number)
        .bind(key)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut taken = Vec::new();
        if email_taken != 0 {
            taken.push(UniqueField::Email);
        }
        if phone_taken != 0 {
            taken.push(UniqueField::PhoneNumber);
        }
        if key_taken != 0 {
            taken.push(UniqueField::Key);
        }
        Ok(taken)
    }

    async fn assign_account_key(
        &self,
        id: &UserId,
        account_key: &str,
        now_millis: i64,
    ) -> Result<AccountKeyAssignment> {
        // Conditional write: concurrent acquisitions for one user cannot both win
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET account_key = ?, updated_at = ?
            WHERE id = ?
              AND (account_key IS NULL OR TRIM(account_key) = '')
            RETURNING *
            "#,
        )
        .bind(account_key)
        .bind(now_millis)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if let Some(row) = row {
            return Ok(AccountKeyAssignment::Assigned(row.into_user()));
        }

        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if exists > 0 {
            Ok(AccountKeyAssignment::AlreadyAssigned)
        } else {
            Ok(AccountKeyAssignment::UserMissing)
        }
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM users WHERE 1 = 1");

        if let Some(email) = &filter.email {
            query.push(" AND email = ").push_bind(email.clone());
        }
        if let Some(full_name) = &filter.full_name {
            query.push(" AND full_name = ").push_bind(full_name.clone());
        }
        if let Some(metadata) = &filter.metadata {
            query
                .push(" AND metadata_search LIKE ")
                .push_bind(format!("%{}%", escape_like(&metadata.to_lowercase())))
                .push(" ESCAPE '\\'");
        }

        query.push(" ORDER BY created_at DESC, rowid DESC");

        let rows: Vec<UserRow> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(UserRow::into_user).collect())
    }

    async fn ids_without_account_key(&self, limit: usize) -> Result<Vec<UserId>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE account_key IS NULL OR TRIM(account_key) = ''
            ORDER BY created_at ASC, rowid ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ids)
    }
}

/// Escape LIKE wildcards so the filter matches them literally
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    email: String,
    phone_number: String,
    full_name: Option<String>,
    password_digest: String,
    key: String,
    account_key: Option<String>,
    metadata: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl UserRow {
    fn into_user(self) -> User {
        User {
            id: self.id,
            email: self.email,
            phone_number: self.phone_number,
            full_name: self.full_name,
            password_digest: self.password_digest,
            key: self.key,
            account_key: self.account_key,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
