use actix_web::{HttpRequest, HttpResponse};
use tera::Context;

use crate::app_state::AppState;
use crate::db::user_repo;
use crate::error::Result;
use crate::models::User;
use crate::services::sessions::SESSION_COOKIE;

pub mod account;
pub mod auth;
pub mod images;
pub mod social;

pub async fn health_check() -> &'static str {
    "OK"
}

pub async fn metrics_handler() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::metrics::gather_metrics())
}

/// Render a Tera template as an HTML response.
pub(crate) fn render(state: &AppState, template: &str, ctx: &Context) -> Result<HttpResponse> {
    let body = state.templates.render(template, ctx)?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body))
}

pub(crate) fn session_cookie_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

/// Resolve the caller's session on a public route, where the auth
/// middleware has not run. Anonymous or stale-cookie callers get `None`.
pub(crate) async fn resolve_session(
    state: &AppState,
    req: &HttpRequest,
) -> Result<Option<(User, String)>> {
    let Some(token) = session_cookie_token(req) else {
        return Ok(None);
    };
    let Some(user_id) = state.sessions.user_id(&token).await? else {
        return Ok(None);
    };
    Ok(user_repo::find_by_id(&state.db, user_id)
        .await?
        .map(|user| (user, token)))
}

/// Base template context: active section, current user, and any pending
/// flash messages (drained here, so they render exactly once).
pub(crate) async fn page_context(
    state: &AppState,
    user: Option<&User>,
    session_token: Option<&str>,
    section: &str,
) -> Result<Context> {
    let mut ctx = Context::new();
    ctx.insert("section", section);
    ctx.insert("user", &user);

    let flashes = match session_token {
        Some(token) => state.sessions.take_flashes(token).await?,
        None => Vec::new(),
    };
    ctx.insert("flashes", &flashes);

    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;

    #[test]
    fn session_token_read_from_cookie() {
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, "abc123"))
            .to_http_request();
        assert_eq!(session_cookie_token(&req), Some("abc123".to_string()));
    }

    #[test]
    fn no_cookie_means_no_token() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(session_cookie_token(&req), None);
    }
}
