use crate::url::ensure_scheme;
use std::path::Path;

/// Reads a URL-list file: one URL per line, blank lines ignored
///
/// Lines lacking a scheme are prefixed with `https://`.
pub fn read_url_list(path: &Path) -> std::io::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_url_list(&content))
}

/// Parses URL-list text (see [`read_url_list`])
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ensure_scheme)
        .collect()
}
