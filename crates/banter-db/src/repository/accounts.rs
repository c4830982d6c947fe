//! Account repository: Postgres queries plus the narrow lookup contract login uses.

use async_trait::async_trait;
use banter_common::{
    error::StoreError,
    models::account::{Account, AccountCredentials},
};
use sqlx::PgPool;
use uuid::Uuid;

/// The only thing session login needs from account storage.
#[async_trait]
pub trait AccountLookup: Send + Sync {
    /// Find the id and password hash for `username`, or `None` if no such account exists.
    async fn fetch_by_username(&self, username: &str)
        -> Result<Option<AccountCredentials>, StoreError>;
}

/// [`AccountLookup`] over the `accounts` table.
#[derive(Clone)]
pub struct PgAccounts {
    pool: PgPool,
}

impl PgAccounts {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountLookup for PgAccounts {
    async fn fetch_by_username(
        &self,
        username: &str,
    ) -> Result<Option<AccountCredentials>, StoreError> {
        let account = find_by_username(&self.pool, username).await?;
        Ok(account.as_ref().map(AccountCredentials::from))
    }
}

/// Create a new account.
pub async fn create_account(
    pool: &PgPool,
    id: Uuid,
    username: &str,
    email_address: &str,
    password_hash: &str,
) -> Result<Account, sqlx::Error> {
    sqlx::query_as::<_, Account>(
        r#"
        INSERT INTO accounts (id, username, email_address, password_hash, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        RETURNING id, username, email_address, password_hash, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(username)
    .bind(email_address)
    .bind(password_hash)
    .fetch_one(pool)
    .await
}

/// Find an account by its unique ID.
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Find an account by username (case-insensitive).
pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE LOWER(username) = LOWER($1)")
        .bind(username)
        .fetch_optional(pool)
        .await
}

/// Find an account by email address (case-insensitive).
pub async fn find_by_email(pool: &PgPool, email_address: &str) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE LOWER(email_address) = LOWER($1)")
        .bind(email_address)
        .fetch_optional(pool)
        .await
}

/// One page of accounts, oldest first. `page` is 1-based.
pub async fn list_accounts(
    pool: &PgPool,
    page: u32,
    page_size: u32,
) -> Result<Vec<Account>, sqlx::Error> {
    let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
    sqlx::query_as::<_, Account>(
        r#"
        SELECT * FROM accounts
        ORDER BY created_at, id
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(i64::from(page_size))
    .bind(offset)
    .fetch_all(pool)
    .await
}
