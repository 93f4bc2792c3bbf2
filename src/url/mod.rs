//! URL handling module for Sumi-Sieve
//!
//! Scheme defaulting, link resolution, origin comparison, forum base-URL
//! canonicalization and URL-list file reading.

mod domain;
mod list;
mod normalize;

pub use domain::same_origin;
pub use list::{parse_url_list, read_url_list};
pub use normalize::{
    canonical_forum_url, ensure_absolute, ensure_scheme, parse_seed, resolve_link,
};
