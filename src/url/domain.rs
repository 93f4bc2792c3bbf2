use url::Url;

/// Returns true when both URLs share scheme, host and port
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_sieve::url::same_origin;
///
/// let a = Url::parse("https://example.com/a").unwrap();
/// let b = Url::parse("https://example.com/b?x=1").unwrap();
/// let c = Url::parse("http://example.com/a").unwrap();
/// assert!(same_origin(&a, &b));
/// assert!(!same_origin(&a, &c));
/// ```
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.has_host() && a.origin() == b.origin()
}
