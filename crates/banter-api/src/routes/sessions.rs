//! Session routes: login, lookup, listing, logout.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::UserAgent,
    TypedHeader,
};
use banter_common::{
    error::{BanterError, BanterResult},
    models::session::{LoginRequest, Session, SessionListQuery},
    validation::validate_request,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{middleware::BearerSession, responses::Success, AppState};

pub const SESSION_COOKIE: &str = "session_id";

/// Session router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sessions",
            get(list_sessions).post(login).delete(logout),
        )
        .route("/sessions/{session_id}", get(get_session))
}

fn session_cookie(session: &Session) -> Cookie<'static> {
    let lifetime = (session.expires_at - session.created_at).num_seconds();
    Cookie::build((SESSION_COOKIE, session.session_id.to_string()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(lifetime))
        .build()
}

/// POST /v1/sessions
///
/// Exchange a username and password for a session. The id is returned in the body
/// and set as an HttpOnly cookie.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(body): Json<LoginRequest>,
) -> BanterResult<(CookieJar, Success<Session>)> {
    validate_request(&body)?;

    let TypedHeader(user_agent) = user_agent.ok_or_else(|| BanterError::Validation {
        message: "User-Agent header is required".into(),
    })?;

    let session = state
        .sessions
        .login(&body.username, &body.password, user_agent.as_str())
        .await?;

    Ok((jar.add(session_cookie(&session)), Success::created(session)))
}

/// GET /v1/sessions
async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SessionListQuery>,
) -> BanterResult<Success<Vec<Session>>> {
    validate_request(&query)?;

    let sessions = state
        .sessions
        .fetch_many(&query.filter(), query.page, query.page_size)
        .await?;

    Ok(Success::ok(sessions))
}

/// GET /v1/sessions/{session_id}
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> BanterResult<Success<Session>> {
    let session = state.sessions.fetch_one(session_id).await?;
    Ok(Success::ok(session))
}

/// DELETE /v1/sessions
///
/// Log out the session named by the bearer credential and clear the cookie.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    BearerSession(session_id): BearerSession,
) -> BanterResult<(CookieJar, Success<Session>)> {
    let session = state.sessions.logout(session_id).await?;
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Success::ok(session)))
}
