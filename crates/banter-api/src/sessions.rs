//! Session service: login, lookup, listing, logout.
//!
//! Wraps a [`SessionStore`] with the domain rules: credentials are checked against
//! [`AccountLookup`] + [`PasswordVerifier`], session ids come from an [`IdGenerator`],
//! and every failure is one of exactly three kinds (see [`SessionError`]).
//!
//! The service knows nothing about live connections. Whoever calls [`SessionService::logout`]
//! owns any cleanup of sockets bound to that session.

use std::sync::Arc;

use banter_common::{
    error::{BanterError, StoreError},
    models::session::{Session, SessionFilter},
    snowflake::IdGenerator,
};
use banter_db::repository::{accounts::AccountLookup, sessions::SessionStore};
use uuid::Uuid;

use crate::auth::PasswordVerifier;

/// Everything that can go wrong in [`SessionService`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown username or wrong password; deliberately indistinguishable.
    #[error("Incorrect username or password")]
    CredentialsIncorrect,

    #[error("Session not found")]
    SessionsNotFound,

    /// The backing store failed. Never means "not found".
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SessionError> for BanterError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::CredentialsIncorrect => BanterError::CredentialsIncorrect,
            SessionError::SessionsNotFound => BanterError::SessionsNotFound,
            SessionError::Store(e) => BanterError::Store(e),
        }
    }
}

/// Collaborators the service is built from.
#[derive(Clone)]
pub struct SessionDeps {
    pub store: Arc<dyn SessionStore>,
    pub accounts: Arc<dyn AccountLookup>,
    pub verifier: Arc<dyn PasswordVerifier>,
    pub ids: Arc<dyn IdGenerator>,
}

#[derive(Clone)]
pub struct SessionService {
    deps: SessionDeps,
}

impl SessionService {
    pub fn new(deps: SessionDeps) -> Self {
        Self { deps }
    }

    /// Check credentials and mint a fresh session.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        user_agent: &str,
    ) -> Result<Session, SessionError> {
        let Some(account) = self.deps.accounts.fetch_by_username(username).await? else {
            return Err(SessionError::CredentialsIncorrect);
        };

        if !self.deps.verifier.verify(password, &account.password_hash) {
            return Err(SessionError::CredentialsIncorrect);
        }

        let session_id = self.deps.ids.next_id();
        let session = self
            .deps
            .store
            .create(session_id, account.id, user_agent)
            .await?;

        tracing::info!(
            session = %session.session_id,
            account = %session.account_id,
            "Session created"
        );
        Ok(session)
    }

    pub async fn fetch_one(&self, session_id: Uuid) -> Result<Session, SessionError> {
        self.deps
            .store
            .fetch_one(session_id)
            .await?
            .ok_or(SessionError::SessionsNotFound)
    }

    /// One page of sessions. Ordering is whatever the store's scan yields.
    pub async fn fetch_many(
        &self,
        filter: &SessionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<Session>, SessionError> {
        Ok(self.deps.store.fetch_many(filter, page, page_size).await?)
    }

    /// Delete the session and hand back the record it had.
    pub async fn logout(&self, session_id: Uuid) -> Result<Session, SessionError> {
        let session = self
            .deps
            .store
            .delete(session_id)
            .await?
            .ok_or(SessionError::SessionsNotFound)?;

        tracing::info!(
            session = %session.session_id,
            account = %session.account_id,
            "Session logged out"
        );
        Ok(session)
    }
}
