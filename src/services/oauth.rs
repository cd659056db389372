/// Google sign-in (authorization-code flow). A first-time sign-in
/// provisions a local user and profile keyed by the provider subject;
/// later sign-ins resolve to the same account.
use rand::Rng;
use redis::aio::ConnectionManager;
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::OAuthConfig;
use crate::db::oauth_repo;
use crate::db::user_repo;
use crate::error::{AppError, Result};
use crate::models::User;
use crate::text::slugify;

const OAUTH_STATE_TTL_SECONDS: usize = 600;
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub const PROVIDER_GOOGLE: &str = "google";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: String,
    #[serde(default)]
    given_name: String,
}

#[derive(Clone)]
pub struct OAuthService {
    config: OAuthConfig,
    db: PgPool,
    redis: ConnectionManager,
    http: Client,
}

impl OAuthService {
    pub fn new(config: OAuthConfig, db: PgPool, redis: ConnectionManager) -> Self {
        Self {
            config,
            db,
            redis,
            http: Client::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str, &str)> {
        match (
            self.config.google_client_id.as_deref(),
            self.config.google_client_secret.as_deref(),
            self.config.google_redirect_uri.as_deref(),
        ) {
            (Some(id), Some(secret), Some(redirect)) => Ok((id, secret, redirect)),
            _ => Err(AppError::BadRequest(
                "Google sign-in is not configured".to_string(),
            )),
        }
    }

    /// Begin the flow: store a one-time `state` and return the provider
    /// authorization URL to redirect the browser to.
    pub async fn start_flow(&self) -> Result<String> {
        let (client_id, _, redirect_uri) = self.credentials()?;

        let state = Uuid::new_v4().to_string();
        self.store_state(&state).await?;

        Ok(format!(
            "{GOOGLE_AUTH_URL}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            urlencoding::encode(client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(&state),
        ))
    }

    /// Finish the flow: consume the state, exchange the code, fetch the
    /// profile, and resolve (or provision) the local account.
    pub async fn complete_flow(&self, code: &str, state: &str) -> Result<User> {
        self.consume_state(state).await?;

        let info = self.exchange_code(code).await?;
        self.get_or_create_user(&info).await
    }

    async fn store_state(&self, state: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        redis::cmd("SETEX")
            .arg(format!("bookworm:oauth:state:{state}"))
            .arg(OAUTH_STATE_TTL_SECONDS)
            .arg("1")
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn consume_state(&self, state: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let deleted: i64 = redis::cmd("DEL")
            .arg(format!("bookworm:oauth:state:{state}"))
            .query_async(&mut conn)
            .await?;
        if deleted == 0 {
            return Err(AppError::Authentication(
                "Invalid or expired OAuth state".to_string(),
            ));
        }
        Ok(())
    }

    async fn exchange_code(&self, code: &str) -> Result<GoogleUserInfo> {
        let (client_id, client_secret, redirect_uri) = self.credentials()?;

        let token: TokenResponse = self
            .http
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("redirect_uri", redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("Token exchange failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Authentication(format!("Token exchange rejected: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Authentication(format!("Malformed token response: {e}")))?;

        let info: GoogleUserInfo = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("Userinfo fetch failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Authentication(format!("Userinfo fetch rejected: {e}")))?
            .json()
            .await
            .map_err(|e| AppError::Authentication(format!("Malformed userinfo: {e}")))?;

        Ok(info)
    }

    async fn get_or_create_user(&self, info: &GoogleUserInfo) -> Result<User> {
        if let Some(user) =
            oauth_repo::find_user_by_identity(&self.db, PROVIDER_GOOGLE, &info.sub).await?
        {
            return Ok(user);
        }

        let username = self.available_username(&info.email).await?;
        let user = oauth_repo::create_user_for_identity(
            &self.db,
            PROVIDER_GOOGLE,
            &info.sub,
            &username,
            &info.email,
            &info.given_name,
        )
        .await?;

        tracing::info!(user_id = %user.id, "provisioned account from google sign-in");
        Ok(user)
    }

    /// Derive a username from the email local part, suffixing until free.
    async fn available_username(&self, email: &str) -> Result<String> {
        let base = slugify(email.split('@').next().unwrap_or("user"));
        let base = if base.is_empty() {
            "user".to_string()
        } else {
            base
        };

        if !user_repo::username_taken(&self.db, &base).await? {
            return Ok(base);
        }

        loop {
            let candidate = format!("{base}-{:04}", rand::thread_rng().gen_range(0..10_000));
            if !user_repo::username_taken(&self.db, &candidate).await? {
                return Ok(candidate);
            }
        }
    }
}
