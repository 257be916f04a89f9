//! Session extractor for worksheet handlers.

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::convert::Infallible;

use crate::session::{generate_session_id, SessionHandle};
use crate::state::AppState;

pub const SESSION_COOKIE_NAME: &str = "worksheet_session";

/// The caller's worksheet session.
/// First-time visitors get a fresh session and a cookie in `jar`, which the
/// handler must return with its response.
pub struct WorksheetContext {
  pub session: SessionHandle,
  pub jar: CookieJar,
}

impl FromRequestParts<AppState> for WorksheetContext {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
    let jar = CookieJar::from_headers(&parts.headers);

    let existing = jar
      .get(SESSION_COOKIE_NAME)
      .map(|c| c.value().to_string())
      .filter(|id| !id.is_empty());

    let (session_id, jar) = match existing {
      Some(id) => (id, jar),
      None => {
        let id = generate_session_id();
        tracing::debug!("Starting new worksheet session");
        let jar = jar.add(session_cookie(id.clone()));
        (id, jar)
      }
    };

    let session = state.sessions.get_or_create(&session_id);
    Ok(WorksheetContext { session, jar })
  }
}

fn session_cookie(id: String) -> Cookie<'static> {
  Cookie::build((SESSION_COOKIE_NAME, id))
    .path("/")
    .http_only(true)
    .same_site(SameSite::Lax)
    .build()
}
