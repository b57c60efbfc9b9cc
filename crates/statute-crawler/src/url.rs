use crate::error::{CrawlError, Result};
use url::Url;

/// Resolve `href` against `base`, the way a browser resolves a link.
///
/// Absolute hrefs are returned as-is; protocol-relative, root-relative and
/// document-relative hrefs are resolved against the base URL.
pub fn complete_url(href: &str, base: &str) -> Result<String> {
    let base = Url::parse(base)
        .map_err(|e| CrawlError::Validation(format!("invalid base URL {base}: {e}")))?;
    let joined = base
        .join(href.trim())
        .map_err(|e| CrawlError::Validation(format!("cannot resolve {href}: {e}")))?;
    Ok(joined.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_url() {
        let base = "https://www.coloradojudicial.gov/supreme-court/rules/index.html";
        assert_eq!(
            complete_url("/rules/2024.pdf", base).unwrap(),
            "https://www.coloradojudicial.gov/rules/2024.pdf"
        );
        assert_eq!(
            complete_url("older.html", base).unwrap(),
            "https://www.coloradojudicial.gov/supreme-court/rules/older.html"
        );
        assert_eq!(
            complete_url("//cdn.gov/a.pdf", base).unwrap(),
            "https://cdn.gov/a.pdf"
        );
        assert_eq!(
            complete_url("https://other.gov/x", base).unwrap(),
            "https://other.gov/x"
        );
    }

    #[test]
    fn test_complete_url_bad_base() {
        assert!(complete_url("/x", "not a url").is_err());
    }
}
