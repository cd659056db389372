use sqlx::PgPool;
use tera::Tera;

use crate::config::Config;
use crate::services::image_fetch::ImageFetcher;
use crate::services::oauth::OAuthService;
use crate::services::sessions::SessionStore;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub sessions: SessionStore,
    pub templates: Tera,
    pub fetcher: ImageFetcher,
    pub oauth: OAuthService,
    pub config: Config,
}
