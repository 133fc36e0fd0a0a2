// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Postgres-backed user store.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};

use crate::store::{StoreError, UserRecord, UserStore};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new().max_connections(8).connect(url).await?;
        Ok(Self { pool })
    }

    /// Create both partitions if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for table in ["users", "deactivated_users"] {
            sqlx::query(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                     user_id TEXT PRIMARY KEY,
                     username TEXT UNIQUE NOT NULL,
                     password TEXT NOT NULL
                 )"
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
        _ => StoreError::Unavailable(e.to_string()),
    }
}

fn record(row: &PgRow) -> Result<UserRecord, sqlx::Error> {
    Ok(UserRecord {
        user_id: row.try_get("user_id")?,
        username: row.try_get("username")?,
        hashed_password: row.try_get("password")?,
    })
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create(
        &self,
        username: &str,
        hashed_password: &str,
    ) -> Result<UserRecord, StoreError> {
        let user_id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (user_id, username, password) VALUES ($1, $2, $3)")
            .bind(&user_id)
            .bind(username)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(UserRecord {
            user_id,
            username: username.to_owned(),
            hashed_password: hashed_password.to_owned(),
        })
    }

    async fn get_active_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT user_id, username, password FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(record).transpose().map_err(map_err)
    }

    async fn get_active_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query("SELECT user_id, username, password FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        row.as_ref().map(record).transpose().map_err(map_err)
    }

    async fn update_password(
        &self,
        user_id: &str,
        hashed_password: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET password = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate(&self, user_id: &str) -> Result<bool, StoreError> {
        // Single transaction so concurrent reads never observe the row in
        // both partitions or in neither.
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        let moved = sqlx::query(
            "INSERT INTO deactivated_users (user_id, username, password)
             SELECT user_id, username, password FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;
        if moved.rows_affected() == 0 {
            tx.rollback().await.map_err(map_err)?;
            return Ok(false);
        }
        sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;
        Ok(true)
    }

    async fn reactivate(&self, user_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;
        let moved = sqlx::query(
            "INSERT INTO users (user_id, username, password)
             SELECT user_id, username, password FROM deactivated_users WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;
        if moved.rows_affected() == 0 {
            tx.rollback().await.map_err(map_err)?;
            return Ok(false);
        }
        sqlx::query("DELETE FROM deactivated_users WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;
        tx.commit().await.map_err(map_err)?;
        Ok(true)
    }
}
