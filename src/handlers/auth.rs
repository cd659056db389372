/// Login, logout, dashboard, and the Google sign-in endpoints.
use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    http::header,
    web, HttpResponse,
};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::db::{contact_repo, user_repo};
use crate::error::{AppError, Result};
use crate::forms::LoginForm;
use crate::handlers::{page_context, render};
use crate::metrics::LOGIN_ATTEMPTS_TOTAL;
use crate::middleware::{SessionToken, UserId};
use crate::models::User;
use crate::services::sessions::SESSION_COOKIE;

const MSG_INVALID_LOGIN: &str = "Invalid login or password";
const MSG_ACCOUNT_DISABLED: &str = "Your account is disabled";

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    #[serde(default)]
    pub next: String,
}

/// Only follow local redirect targets; anything else falls back to the
/// dashboard.
pub(crate) fn safe_next(next: &str) -> Option<&str> {
    if next.starts_with('/') && !next.starts_with("//") {
        Some(next)
    } else {
        None
    }
}

fn session_cookie(state: &AppState, token: String) -> Cookie<'static> {
    let mut builder = Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(state.config.session.ttl_secs as i64));
    if state.config.session.cookie_secure {
        builder = builder.secure(true);
    }
    builder.finish()
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

async fn open_session(state: &AppState, user: &User, next: &str) -> Result<HttpResponse> {
    let token = state.sessions.create(user.id).await?;
    let target = safe_next(next).unwrap_or("/");

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, target))
        .cookie(session_cookie(state, token))
        .finish())
}

async fn render_login(
    state: &AppState,
    form: &LoginForm,
    errors: &crate::forms::FormErrors,
    auth_error: Option<&str>,
) -> Result<HttpResponse> {
    let mut ctx = page_context(state, None, None, "login").await?;
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("auth_error", &auth_error);
    render(state, "account/login.html", &ctx)
}

/// GET /account/login/
pub async fn login_page(
    state: web::Data<AppState>,
    query: web::Query<NextQuery>,
) -> Result<HttpResponse> {
    let form = LoginForm {
        next: query.next.clone(),
        ..Default::default()
    };
    render_login(&state, &form, &Default::default(), None).await
}

/// POST /account/login/
///
/// Credential check runs against the username first and falls back to
/// treating the identity as an email address. The two failure messages
/// stay generic so they never reveal which part was wrong.
pub async fn login(
    state: web::Data<AppState>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse> {
    let form = form.into_inner();

    let errors = form.form_errors();
    if !errors.is_empty() {
        return render_login(&state, &form, &errors, None).await;
    }

    let user = match user_repo::find_by_username(&state.db, &form.username).await? {
        Some(user) => Some(user),
        None => user_repo::find_by_email(&state.db, &form.username).await?,
    };

    let Some(user) = user else {
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failed"]).inc();
        return render_login(&state, &form, &errors, Some(MSG_INVALID_LOGIN)).await;
    };

    if !crate::security::password::verify_password(&form.password, &user.password_hash) {
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["failed"]).inc();
        return render_login(&state, &form, &errors, Some(MSG_INVALID_LOGIN)).await;
    }

    if !user.is_active {
        LOGIN_ATTEMPTS_TOTAL.with_label_values(&["inactive"]).inc();
        return render_login(&state, &form, &errors, Some(MSG_ACCOUNT_DISABLED)).await;
    }

    LOGIN_ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
    tracing::info!(user_id = %user.id, "user logged in");
    open_session(&state, &user, &form.next).await
}

/// POST /account/logout/
pub async fn logout(state: web::Data<AppState>, token: SessionToken) -> Result<HttpResponse> {
    state.sessions.destroy(&token.0).await?;

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, crate::middleware::session_auth::LOGIN_URL))
        .cookie(removal_cookie())
        .finish())
}

/// GET / — the dashboard, session-gated.
pub async fn dashboard(
    state: web::Data<AppState>,
    user_id: UserId,
    token: SessionToken,
) -> Result<HttpResponse> {
    let user = user_repo::find_by_id(&state.db, user_id.0)
        .await?
        .ok_or_else(|| AppError::Authentication("Unknown session user".to_string()))?;

    let followers = contact_repo::follower_count(&state.db, user.id).await?;
    let following = contact_repo::following_count(&state.db, user.id).await?;

    let mut ctx = page_context(&state, Some(&user), Some(&token.0), "dashboard").await?;
    ctx.insert("follower_count", &followers);
    ctx.insert("following_count", &following);
    render(&state, "account/dashboard.html", &ctx)
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /account/oauth/google/ — bounce to the provider.
pub async fn google_start(state: web::Data<AppState>) -> Result<HttpResponse> {
    let auth_url = state.oauth.start_flow().await?;
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, auth_url))
        .finish())
}

/// GET /account/oauth/google/callback/ — completes the flow and opens a
/// session exactly like a password login.
pub async fn google_callback(
    state: web::Data<AppState>,
    query: web::Query<OAuthCallbackQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        let reason = query.error.unwrap_or_else(|| "missing code".to_string());
        tracing::warn!("google sign-in aborted: {}", reason);
        return Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, crate::middleware::session_auth::LOGIN_URL))
            .finish());
    };

    let user = state.oauth.complete_flow(&code, &oauth_state).await?;

    if !user.is_active {
        let form = LoginForm::default();
        return render_login(&state, &form, &Default::default(), Some(MSG_ACCOUNT_DISABLED))
            .await;
    }

    open_session(&state, &user, "/").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_next_accepts_local_paths() {
        assert_eq!(safe_next("/images/?page=2"), Some("/images/?page=2"));
        assert_eq!(safe_next("/"), Some("/"));
    }

    #[test]
    fn safe_next_rejects_external_targets() {
        assert_eq!(safe_next("https://evil.example"), None);
        assert_eq!(safe_next("//evil.example"), None);
        assert_eq!(safe_next(""), None);
    }
}
