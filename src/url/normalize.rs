use crate::UrlError;
use url::Url;

/// Schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Prefixes `https://` to a URL string that carries no scheme
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::ensure_scheme;
///
/// assert_eq!(ensure_scheme("example.com/docs"), "https://example.com/docs");
/// assert_eq!(ensure_scheme("http://example.com/"), "http://example.com/");
/// ```
pub fn ensure_scheme(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    }
}

/// Parses a seed string into a URL, defaulting the scheme to https
pub fn parse_seed(raw: &str) -> Result<Url, UrlError> {
    Url::parse(&ensure_scheme(raw)).map_err(|e| UrlError::Parse(e.to_string()))
}

/// Resolves `maybe_relative` against `source` unless it already names a host
///
/// Absolute values are passed through untouched, byte for byte.
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::ensure_absolute;
/// use url::Url;
///
/// let sitemap = Url::parse("https://example.com/docs/sitemap.xml").unwrap();
/// assert_eq!(ensure_absolute(&sitemap, "intro.html").unwrap(), "https://example.com/docs/intro.html");
/// assert_eq!(ensure_absolute(&sitemap, "https://other.com/a").unwrap(), "https://other.com/a");
/// ```
pub fn ensure_absolute(source: &Url, maybe_relative: &str) -> Result<String, UrlError> {
    let candidate = maybe_relative.trim();
    match Url::parse(candidate) {
        Ok(url) if url.has_host() => Ok(candidate.to_string()),
        _ => source
            .join(candidate)
            .map(|u| u.to_string())
            .map_err(|e| UrlError::Malformed(format!("{}: {}", candidate, e))),
    }
}

/// Resolves a link href to an absolute http(s) URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: and data: targets
/// - fragment-only links (same page anchors)
/// - invalid URLs
/// - non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url, drop_fragment: bool) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }

    let mut absolute = base_url.join(href).ok()?;
    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return None;
    }

    if drop_fragment {
        absolute.set_fragment(None);
    }

    Some(absolute)
}

/// Canonicalizes a forum URL to the board or thread it points into
///
/// The result always ends in `/`, and anything after the `threads/<slug>/`,
/// `boards/<slug>/` or `forums/<slug>/` segment (page numbers, post anchors)
/// is removed so pagination suffixes can be appended directly.
///
/// # Examples
///
/// ```
/// use sumi_sieve::url::canonical_forum_url;
///
/// assert_eq!(
///     canonical_forum_url("https://f.example/threads/hello.42/page-3"),
///     "https://f.example/threads/hello.42/"
/// );
/// assert_eq!(canonical_forum_url("https://f.example/b"), "https://f.example/b/");
/// ```
pub fn canonical_forum_url(raw: &str) -> String {
    let mut url = ensure_scheme(raw);
    if let Some(hash) = url.find('#') {
        url.truncate(hash);
    }
    if !url.ends_with('/') {
        url.push('/');
    }

    for marker in ["threads/", "boards/", "forums/"] {
        if let Some(start) = url.find(marker) {
            let slug_start = start + marker.len();
            if let Some(slash) = url[slug_start..].find('/') {
                url.truncate(slug_start + slash + 1);
            }
        }
    }

    url
}
