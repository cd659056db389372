/// Remote image fetch-and-store for the bookmark creation flow, plus the
/// profile photo sink. Files land under the media root in date-bucketed
/// directories.
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use std::path::PathBuf;

use crate::error::{AppError, Result};

/// Extensions the create form accepts (compared lowercased).
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub fn extension_allowed(ext: &str) -> bool {
    ALLOWED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Relative media path for a fetched image: `images/YYYY/MM/DD/<slug>.<ext>`.
pub fn image_media_path(slug: &str, extension: &str, date: NaiveDate) -> String {
    format!(
        "images/{}/{slug}.{extension}",
        date.format("%Y/%m/%d")
    )
}

/// Relative media path for an uploaded profile photo.
pub fn photo_media_path(user_slug: &str, extension: &str, date: NaiveDate) -> String {
    format!(
        "users/{}/{user_slug}.{extension}",
        date.format("%Y/%m/%d")
    )
}

#[derive(Clone)]
pub struct ImageFetcher {
    http: Client,
    media_root: PathBuf,
}

impl ImageFetcher {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::new(),
            media_root: media_root.into(),
        }
    }

    /// Fetch the bytes at `url` synchronously (within this request) and
    /// store them under the media root. Returns the relative media path.
    pub async fn fetch_and_store(&self, url: &str, slug: &str, extension: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::BadRequest(format!("Could not fetch the image: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::BadRequest(format!(
                "Could not fetch the image: HTTP {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Could not read the image: {e}")))?;

        let relative = self
            .available_path(&image_media_path(slug, extension, Utc::now().date_naive()))
            .await;
        self.write_media(&relative, &bytes).await?;
        Ok(relative)
    }

    /// Store already-read bytes (profile photo upload).
    pub async fn store_photo(&self, user_slug: &str, extension: &str, bytes: &[u8]) -> Result<String> {
        let relative = self
            .available_path(&photo_media_path(user_slug, extension, Utc::now().date_naive()))
            .await;
        self.write_media(&relative, bytes).await?;
        Ok(relative)
    }

    /// A name already on disk gets a numeric suffix: two same-day bookmarks
    /// whose titles slugify identically must not share a file.
    async fn available_path(&self, relative: &str) -> String {
        if !self.occupied(relative).await {
            return relative.to_string();
        }

        let (stem, ext) = relative.rsplit_once('.').unwrap_or((relative, ""));
        let mut n = 2;
        loop {
            let candidate = if ext.is_empty() {
                format!("{stem}-{n}")
            } else {
                format!("{stem}-{n}.{ext}")
            };
            if !self.occupied(&candidate).await {
                return candidate;
            }
            n += 1;
        }
    }

    async fn occupied(&self, relative: &str) -> bool {
        tokio::fs::try_exists(self.media_root.join(relative))
            .await
            .unwrap_or(false)
    }

    async fn write_media(&self, relative: &str, bytes: &[u8]) -> Result<()> {
        let target = self.media_root.join(relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create media dir: {e}")))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write media file: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_accepts_jpg_jpeg_png_only() {
        for ext in ["jpg", "jpeg", "png", "JPG", "PnG"] {
            assert!(extension_allowed(ext), "{ext} should be allowed");
        }
        for ext in ["gif", "webp", "svg", "bmp", "com/pic"] {
            assert!(!extension_allowed(ext), "{ext} should be rejected");
        }
    }

    #[test]
    fn media_paths_are_date_bucketed() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 27).unwrap();
        assert_eq!(
            image_media_path("sunset-at-the-beach", "jpg", date),
            "images/2026/08/27/sunset-at-the-beach.jpg"
        );
        assert_eq!(
            photo_media_path("alice", "png", date),
            "users/2026/08/27/alice.png"
        );
    }

    #[tokio::test]
    async fn store_photo_writes_under_media_root() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ImageFetcher::new(dir.path());

        let relative = fetcher.store_photo("alice", "png", b"bytes").await.unwrap();
        let stored = tokio::fs::read(dir.path().join(&relative)).await.unwrap();
        assert_eq!(stored, b"bytes");
        assert!(relative.starts_with("users/"));
    }

    #[tokio::test]
    async fn colliding_names_get_a_fresh_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ImageFetcher::new(dir.path());

        let first = fetcher
            .store_photo("sunset", "jpg", b"first-image")
            .await
            .unwrap();
        let second = fetcher
            .store_photo("sunset", "jpg", b"second-image")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("sunset-2.jpg"));

        let kept = tokio::fs::read(dir.path().join(&first)).await.unwrap();
        assert_eq!(kept, b"first-image");
        let added = tokio::fs::read(dir.path().join(&second)).await.unwrap();
        assert_eq!(added, b"second-image");
    }
}
