// ABOUTME: SQLite credential store backed by sqlx with transactional code redemption
// ABOUTME: Stores codes and tokens keyed by value with millisecond expiry timestamps
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use oauth2_authority_core::{AccessToken, AuthorizationCode, RefreshToken, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, SqliteConnection};
use tracing::{debug, info};

use super::{CredentialStore, PurgeReport};

/// Credential store on a SQLite database
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: Pool<Sqlite>,
}

impl SqliteCredentialStore {
    /// Connect to `database_url`, creating the database file if needed
    ///
    /// In-memory databases are pinned to a single long-lived connection so
    /// every caller sees the same data.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the database cannot be opened
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options.connect_with(options).await?;
        info!(in_memory, "Connected to SQLite credential store");
        Ok(Self { pool })
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Create credential tables if they do not exist
    ///
    /// # Errors
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS authorization_codes (
                code TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL,
                redirect_uri TEXT NOT NULL,
                scope TEXT,
                user_id TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS access_tokens (
                token TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL,
                scope TEXT,
                user_id TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS refresh_tokens (
                token TEXT PRIMARY KEY,
                expires_at INTEGER NOT NULL,
                scope TEXT,
                user_id TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        for (index, table) in [
            ("idx_authorization_codes_expires_at", "authorization_codes"),
            ("idx_access_tokens_expires_at", "access_tokens"),
            ("idx_refresh_tokens_expires_at", "refresh_tokens"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {index} ON {table}(expires_at)"
            ))
            .execute(&self.pool)
            .await?;
        }

        debug!("Credential store schema is up to date");
        Ok(())
    }
}

fn decode_timestamp(entity: &'static str, millis: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
        entity,
        reason: format!("expires_at {millis} is out of range"),
    })
}

fn code_from_row(row: &SqliteRow) -> Result<AuthorizationCode, StoreError> {
    Ok(AuthorizationCode {
        code: row.try_get("code")?,
        expires_at: decode_timestamp("authorization code", row.try_get("expires_at")?)?,
        redirect_uri: row.try_get("redirect_uri")?,
        scope: row.try_get("scope")?,
        user_id: row.try_get("user_id")?,
    })
}

fn access_token_from_row(row: &SqliteRow) -> Result<AccessToken, StoreError> {
    Ok(AccessToken {
        token: row.try_get("token")?,
        expires_at: decode_timestamp("access token", row.try_get("expires_at")?)?,
        scope: row.try_get("scope")?,
        user_id: row.try_get("user_id")?,
    })
}

fn refresh_token_from_row(row: &SqliteRow) -> Result<RefreshToken, StoreError> {
    Ok(RefreshToken {
        token: row.try_get("token")?,
        expires_at: decode_timestamp("refresh token", row.try_get("expires_at")?)?,
        scope: row.try_get("scope")?,
        user_id: row.try_get("user_id")?,
    })
}

async fn insert_access_token(
    conn: &mut SqliteConnection,
    token: &AccessToken,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO access_tokens (token, expires_at, scope, user_id) VALUES ($1, $2, $3, $4)",
    )
    .bind(&token.token)
    .bind(token.expires_at.timestamp_millis())
    .bind(&token.scope)
    .bind(&token.user_id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_refresh_token(
    conn: &mut SqliteConnection,
    token: &RefreshToken,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO refresh_tokens (token, expires_at, scope, user_id) VALUES ($1, $2, $3, $4)",
    )
    .bind(&token.token)
    .bind(token.expires_at.timestamp_millis())
    .bind(&token.scope)
    .bind(&token.user_id)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn store_authorization_code(&self, code: &AuthorizationCode) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO authorization_codes (code, expires_at, redirect_uri, scope, user_id)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(&code.code)
        .bind(code.expires_at.timestamp_millis())
        .bind(&code.redirect_uri)
        .bind(&code.scope)
        .bind(&code.user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_authorization_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT code, expires_at, redirect_uri, scope, user_id
            FROM authorization_codes WHERE code = $1
            ",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(code_from_row).transpose()
    }

    async fn delete_authorization_code(&self, code: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM authorization_codes WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn redeem_authorization_code(
        &self,
        code: &str,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM authorization_codes WHERE code = $1")
            .bind(code)
            .execute(&mut *tx)
            .await?;
        if consumed.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Ok(false);
        }

        insert_access_token(&mut tx, access_token).await?;
        insert_refresh_token(&mut tx, refresh_token).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn store_access_token(&self, token: &AccessToken) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_access_token(&mut conn, token).await
    }

    async fn get_access_token(&self, token: &str) -> Result<Option<AccessToken>, StoreError> {
        let row = sqlx::query(
            "SELECT token, expires_at, scope, user_id FROM access_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(access_token_from_row).transpose()
    }

    async fn delete_access_token(&self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM access_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_refresh_token(&mut conn, token).await
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        let row = sqlx::query(
            "SELECT token, expires_at, scope, user_id FROM refresh_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(refresh_token_from_row).transpose()
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn rotate_refresh_token(
        &self,
        old_refresh_token: &str,
        access_token: &AccessToken,
        refresh_token: &RefreshToken,
    ) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM refresh_tokens WHERE token = $1")
            .bind(old_refresh_token)
            .execute(&mut *tx)
            .await?;
        if consumed.rows_affected() == 0 {
            return Ok(false);
        }

        insert_access_token(&mut tx, access_token).await?;
        insert_refresh_token(&mut tx, refresh_token).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<PurgeReport, StoreError> {
        let cutoff = now.timestamp_millis();
        let mut tx = self.pool.begin().await?;

        let authorization_codes =
            sqlx::query("DELETE FROM authorization_codes WHERE expires_at <= $1")
                .bind(cutoff)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        let access_tokens = sqlx::query("DELETE FROM access_tokens WHERE expires_at <= $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let refresh_tokens = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(PurgeReport {
            authorization_codes,
            access_tokens,
            refresh_tokens,
        })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
