//! Account routes: signup, listing, lookup.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use banter_common::{
    error::{BanterError, BanterResult},
    models::account::{AccountListQuery, AccountResponse, SignupRequest},
    snowflake,
    validation::validate_request,
};
use banter_db::repository::accounts;
use std::sync::Arc;
use uuid::Uuid;

use crate::{auth, responses::Success, AppState};

/// Account router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/accounts", get(list_accounts).post(signup))
        .route("/accounts/{account_id}", get(get_account))
}

/// POST /v1/accounts
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SignupRequest>,
) -> BanterResult<Success<AccountResponse>> {
    validate_request(&body)?;

    if accounts::find_by_username(&state.pg, &body.username)
        .await?
        .is_some()
    {
        return Err(BanterError::AlreadyExists {
            resource: "Username",
        });
    }

    if accounts::find_by_email(&state.pg, &body.email_address)
        .await?
        .is_some()
    {
        return Err(BanterError::AlreadyExists {
            resource: "Email address",
        });
    }

    let password_hash = auth::hash_password(&body.password)
        .map_err(|e| BanterError::Internal(anyhow::anyhow!("{e}")))?;

    let account = accounts::create_account(
        &state.pg,
        snowflake::generate_id(),
        &body.username,
        &body.email_address,
        &password_hash,
    )
    .await
    .map_err(|e| match e {
        // Lost a race with a concurrent signup for the same name or address
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let resource = match db.constraint() {
                Some("accounts_email_lower_idx") => "Email address",
                _ => "Username",
            };
            BanterError::AlreadyExists { resource }
        }
        other => other.into(),
    })?;

    tracing::info!(account = %account.id, username = %account.username, "New account created");

    Ok(Success::created(account.into()))
}

/// GET /v1/accounts
async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AccountListQuery>,
) -> BanterResult<Success<Vec<AccountResponse>>> {
    validate_request(&query)?;

    let accounts = accounts::list_accounts(&state.pg, query.page, query.page_size).await?;
    Ok(Success::ok(accounts.into_iter().map(Into::into).collect()))
}

/// GET /v1/accounts/{account_id}
async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(account_id): Path<Uuid>,
) -> BanterResult<Success<AccountResponse>> {
    let account = accounts::find_by_id(&state.pg, account_id)
        .await?
        .ok_or(BanterError::AccountsNotFound)?;

    Ok(Success::ok(account.into()))
}
