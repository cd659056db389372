pub mod image_fetch;
pub mod oauth;
pub mod sessions;
