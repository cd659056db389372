/// Text helpers shared by the forms and image pipeline.

/// Build a URL-safe slug: lowercase alphanumerics joined by single hyphens.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut last_was_hyphen = true; // suppress a leading hyphen

    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Extension of the final path segment, lowercased. `None` when the URL has
/// no dot at all.
pub fn url_extension(url: &str) -> Option<String> {
    url.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Sunset -- at the   beach! "), "sunset-at-the-beach");
    }

    #[test]
    fn slugify_strips_non_ascii() {
        assert_eq!(slugify("Café photo"), "caf-photo");
    }

    #[test]
    fn slugify_empty() {
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn extension_lowercased() {
        assert_eq!(
            url_extension("https://example.com/pic.JPG"),
            Some("jpg".to_string())
        );
    }

    #[test]
    fn extension_missing() {
        assert_eq!(url_extension("https://example,com/pic"), None);
    }
}
