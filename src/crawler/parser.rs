//! HTML parsing for link discovery
//!
//! Pagination and forum scraping only need three things from a DOM node:
//! an attribute, child nodes matching a selector, and the node's text.
//! [`DomNode`] captures exactly that so scraping logic does not depend on
//! the parser's own element type.

use crate::url::{resolve_link, same_origin};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Minimal read-only view of a parsed HTML element
pub trait DomNode: Sized {
    /// Returns the value of attribute `name`, if present
    fn attribute(&self, name: &str) -> Option<&str>;

    /// Returns all descendants matching `selector`, in document order
    fn children(&self, selector: &Selector) -> Vec<Self>;

    /// Returns the concatenated text content
    fn text(&self) -> String;

    /// Returns the first descendant matching `selector`
    fn first_child(&self, selector: &Selector) -> Option<Self> {
        self.children(selector).into_iter().next()
    }
}

impl<'a> DomNode for ElementRef<'a> {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }

    fn children(&self, selector: &Selector) -> Vec<Self> {
        self.select(selector).collect()
    }

    fn text(&self) -> String {
        ElementRef::text(self).collect()
    }
}

/// Parses a selector that is known to be valid
///
/// Selector strings from configuration are checked at load time; the ones in
/// this crate are literals. An unparseable selector is treated as matching
/// nothing.
pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Returns every followable link on a page that shares `origin`'s origin
///
/// Links come from `<a href>` elements plus the `src` of the first
/// `<iframe>`. They are resolved against `page_url`, optionally stripped of
/// their fragment, and deduplicated in document order.
pub fn discover_links(html: &str, page_url: &Url, origin: &Url, strip_fragments: bool) -> Vec<String> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut hrefs: Vec<String> = Vec::new();
    if let Some(anchors) = selector("a[href]") {
        for anchor in root.children(&anchors) {
            hrefs.extend(anchor.attribute("href").map(String::from));
        }
    }
    if let Some(iframes) = selector("iframe[src]") {
        if let Some(frame) = root.first_child(&iframes) {
            hrefs.extend(frame.attribute("src").map(String::from));
        }
    }

    let mut seen = HashSet::new();
    hrefs
        .iter()
        .filter_map(|href| resolve_link(href, page_url, strip_fragments))
        .filter(|link| same_origin(origin, link))
        .map(String::from)
        .filter(|link| seen.insert(link.clone()))
        .collect()
}
