use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub session: SessionConfig,
    pub media: MediaConfig,
    pub oauth: OAuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_env")]
    pub env: String,

    #[serde(default = "default_app_host")]
    pub host: String,

    #[serde(default = "default_app_port")]
    pub port: u16,

    #[serde(default = "default_templates_glob")]
    pub templates_glob: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_db_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    #[serde(default)]
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_root")]
    pub root: String,
}

/// Google sign-in credentials. All three must be set for the OAuth
/// endpoints to be usable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthConfig {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: Option<String>,
}

fn default_app_env() -> String {
    "development".to_string()
}

fn default_app_host() -> String {
    "0.0.0.0".to_string()
}

fn default_app_port() -> u16 {
    8080
}

fn default_templates_glob() -> String {
    "templates/**/*.html".to_string()
}

fn default_db_max_connections() -> u32 {
    20
}

fn default_session_ttl() -> u64 {
    // Two weeks, matching the usual session cookie age.
    1_209_600
}

fn default_media_root() -> String {
    "media".to_string()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let app = AppConfig {
            env: env::var("APP_ENV").unwrap_or_else(|_| default_app_env()),
            host: env::var("APP_HOST").unwrap_or_else(|_| default_app_host()),
            port: env::var("APP_PORT")
                .unwrap_or_else(|_| default_app_port().to_string())
                .parse()
                .unwrap_or(default_app_port()),
            templates_glob: env::var("TEMPLATES_GLOB")
                .unwrap_or_else(|_| default_templates_glob()),
        };

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| default_db_max_connections().to_string())
                .parse()
                .unwrap_or(default_db_max_connections()),
        };

        let redis = RedisConfig {
            url: env::var("REDIS_URL").map_err(|_| anyhow::anyhow!("REDIS_URL must be set"))?,
        };

        let session = SessionConfig {
            ttl_secs: env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| default_session_ttl().to_string())
                .parse()
                .unwrap_or(default_session_ttl()),
            cookie_secure: env::var("SESSION_COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        };

        let media = MediaConfig {
            root: env::var("MEDIA_ROOT").unwrap_or_else(|_| default_media_root()),
        };

        let oauth = OAuthConfig {
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").ok(),
            google_redirect_uri: env::var("GOOGLE_REDIRECT_URI").ok(),
        };

        Ok(Config {
            app,
            database,
            redis,
            session,
            media,
            oauth,
        })
    }
}
