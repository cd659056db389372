/// Redis-backed sessions and flash messages.
///
/// A session is an opaque random token handed to the browser in a cookie;
/// Redis maps it to the user id with a TTL. A per-user token set exists so
/// a password change can invalidate every other session.
use rand::RngCore;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flash {
    pub level: String,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: "success".to_string(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: "error".to_string(),
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct SessionStore {
    redis: ConnectionManager,
    ttl_secs: u64,
}

impl SessionStore {
    pub fn new(redis: ConnectionManager, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    fn session_key(token: &str) -> String {
        format!("bookworm:session:{token}")
    }

    fn user_sessions_key(user_id: Uuid) -> String {
        format!("bookworm:user_sessions:{user_id}")
    }

    fn flash_key(token: &str) -> String {
        format!("bookworm:flash:{token}")
    }

    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Open a session for `user_id` and return the cookie token.
    pub async fn create(&self, user_id: Uuid) -> Result<String> {
        let token = Self::generate_token();
        let mut conn = self.redis.clone();

        redis::cmd("SETEX")
            .arg(Self::session_key(&token))
            .arg(self.ttl_secs)
            .arg(user_id.to_string())
            .query_async::<_, ()>(&mut conn)
            .await?;

        redis::cmd("SADD")
            .arg(Self::user_sessions_key(user_id))
            .arg(&token)
            .query_async::<_, ()>(&mut conn)
            .await?;
        // The token set must not outlive its members: refresh its TTL on
        // every login so stale tokens cannot accumulate forever.
        Self::expire_user_sessions_cmd(user_id, self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(token)
    }

    fn expire_user_sessions_cmd(user_id: Uuid, ttl_secs: u64) -> redis::Cmd {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(Self::user_sessions_key(user_id)).arg(ttl_secs);
        cmd
    }

    /// Resolve a token to a user id; `None` for unknown or expired tokens.
    pub async fn user_id(&self, token: &str) -> Result<Option<Uuid>> {
        let mut conn = self.redis.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(Self::session_key(token))
            .query_async(&mut conn)
            .await?;

        Ok(value.and_then(|v| Uuid::parse_str(&v).ok()))
    }

    pub async fn destroy(&self, token: &str) -> Result<()> {
        let mut conn = self.redis.clone();

        let value: Option<String> = redis::cmd("GET")
            .arg(Self::session_key(token))
            .query_async(&mut conn)
            .await?;
        if let Some(user_id) = value.and_then(|v| Uuid::parse_str(&v).ok()) {
            redis::cmd("SREM")
                .arg(Self::user_sessions_key(user_id))
                .arg(token)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }

        redis::cmd("DEL")
            .arg(Self::session_key(token))
            .arg(Self::flash_key(token))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Invalidate every session of `user_id` except `keep` (used after a
    /// password change).
    pub async fn destroy_other_sessions(&self, user_id: Uuid, keep: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let tokens: Vec<String> = redis::cmd("SMEMBERS")
            .arg(Self::user_sessions_key(user_id))
            .query_async(&mut conn)
            .await?;

        for token in tokens.iter().filter(|t| t.as_str() != keep) {
            redis::cmd("DEL")
                .arg(Self::session_key(token))
                .arg(Self::flash_key(token))
                .query_async::<_, ()>(&mut conn)
                .await?;
            redis::cmd("SREM")
                .arg(Self::user_sessions_key(user_id))
                .arg(token)
                .query_async::<_, ()>(&mut conn)
                .await?;
        }
        Ok(())
    }

    /// Queue a flash notification for the next rendered page.
    pub async fn push_flash(&self, token: &str, flash: Flash) -> Result<()> {
        let mut conn = self.redis.clone();
        let payload = serde_json::to_string(&flash)
            .map_err(|e| crate::error::AppError::Internal(e.to_string()))?;

        redis::cmd("RPUSH")
            .arg(Self::flash_key(token))
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;
        redis::cmd("EXPIRE")
            .arg(Self::flash_key(token))
            .arg(self.ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    /// Drain pending flashes; they render once and are gone.
    pub async fn take_flashes(&self, token: &str) -> Result<Vec<Flash>> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = redis::cmd("LRANGE")
            .arg(Self::flash_key(token))
            .arg(0)
            .arg(-1)
            .query_async(&mut conn)
            .await?;
        redis::cmd("DEL")
            .arg(Self::flash_key(token))
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(raw
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_unique() {
        let a = SessionStore::generate_token();
        let b = SessionStore::generate_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn user_session_set_expires_with_the_newest_session() {
        let cmd = SessionStore::expire_user_sessions_cmd(Uuid::nil(), 120);
        let packed = String::from_utf8_lossy(&cmd.get_packed_command()).into_owned();
        assert!(packed.contains("EXPIRE"));
        assert!(packed.contains("bookworm:user_sessions:00000000-0000-0000-0000-000000000000"));
        assert!(packed.contains("120"));
    }

    #[test]
    fn flash_round_trips_through_json() {
        let flash = Flash::success("Profile updated successfully");
        let json = serde_json::to_string(&flash).unwrap();
        let back: Flash = serde_json::from_str(&json).unwrap();
        assert_eq!(back.level, "success");
        assert_eq!(back.message, flash.message);
    }
}
