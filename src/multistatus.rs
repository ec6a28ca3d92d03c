//! Extraction of resource hrefs from WebDAV `207 Multi-Status` bodies.
//!
//! Only the `href` of each `response` element is needed, so this is a
//! pattern-based scan rather than a full XML parse. Namespace prefixes vary by
//! server (`D:`, `d:`, `lp1:`, none) and are ignored.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::trace;

/// Detects the document root, with or without a namespace prefix.
#[allow(clippy::expect_used)]
static MULTISTATUS_ROOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.\-]*:)?multistatus[\s>/]").expect("multistatus root regex is valid") // Static pattern, safe to panic
});

/// One `<response>...</response>` element; `responsedescription` does not match.
#[allow(clippy::expect_used)]
static RESPONSE_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<(?:[A-Za-z_][\w.\-]*:)?response(?:\s[^>]*)?>(.*?)</(?:[A-Za-z_][\w.\-]*:)?response\s*>",
    )
    .expect("response element regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static HREF_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<(?:[A-Za-z_][\w.\-]*:)?href(?:\s[^>]*)?>(.*?)</(?:[A-Za-z_][\w.\-]*:)?href\s*>")
        .expect("href element regex is valid") // Static pattern, safe to panic
});

/// Errors from [`parse_multi_status`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MultiStatusError {
    /// The body has no `multistatus` element.
    #[error("response body is not a multistatus document")]
    MissingRoot,
}

/// Returns the `href` of every `response` element, in document order.
///
/// XML entities in hrefs are decoded; responses without an href are skipped.
///
/// # Errors
///
/// Returns [`MultiStatusError::MissingRoot`] when the body is not a
/// multi-status document.
pub fn parse_multi_status(body: &str) -> Result<Vec<String>, MultiStatusError> {
    if !MULTISTATUS_ROOT.is_match(body) {
        return Err(MultiStatusError::MissingRoot);
    }

    let hrefs: Vec<String> = RESPONSE_ELEMENT
        .captures_iter(body)
        .filter_map(|response| {
            let inner = response.get(1)?.as_str();
            let href = HREF_ELEMENT.captures(inner)?.get(1)?.as_str();
            Some(decode_entities(href.trim()))
        })
        .filter(|href| !href.is_empty())
        .collect();
    trace!(count = hrefs.len(), "parsed multistatus hrefs");
    Ok(hrefs)
}

// `&amp;` last so `&amp;lt;` stays `&lt;`.
fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LISTING: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/uploads/tmp/</D:href>
    <D:propstat><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
  </D:response>
  <D:response>
    <D:href>/uploads/tmp/x.bin</D:href>
    <D:propstat><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
  </D:response>
  <D:responsedescription>done</D:responsedescription>
</D:multistatus>"#;

    #[test]
    fn test_parses_hrefs_in_order() {
        let hrefs = parse_multi_status(LISTING).unwrap();
        assert_eq!(hrefs, ["/uploads/tmp/", "/uploads/tmp/x.bin"]);
    }

    #[test]
    fn test_prefix_agnostic() {
        let body = r#"<multistatus xmlns="DAV:"><response><href>/a</href></response>
<lp1:response xmlns:lp1="DAV:"><lp1:href> /b </lp1:href></lp1:response></multistatus>"#;
        assert_eq!(parse_multi_status(body).unwrap(), ["/a", "/b"]);
    }

    #[test]
    fn test_decodes_entities() {
        let body = "<d:multistatus xmlns:d=\"DAV:\"><d:response><d:href>/a&amp;b/&lt;c&gt;&amp;lt;</d:href></d:response></d:multistatus>";
        assert_eq!(parse_multi_status(body).unwrap(), ["/a&b/<c>&lt;"]);
    }

    #[test]
    fn test_empty_multistatus_yields_no_hrefs() {
        let body = r#"<D:multistatus xmlns:D="DAV:"/>"#;
        assert!(parse_multi_status(body).unwrap().is_empty());
    }

    #[test]
    fn test_non_multistatus_body_is_error() {
        assert_eq!(
            parse_multi_status("<html><body>Login</body></html>"),
            Err(MultiStatusError::MissingRoot)
        );
        assert_eq!(parse_multi_status(""), Err(MultiStatusError::MissingRoot));
    }
}
