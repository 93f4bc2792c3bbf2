//! Boilerplate stripping for rendered HTML

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;

/// Elements that never carry page prose
const STRUCTURAL_NOISE: &[&str] = &[
    "nav", "header", "footer", "script", "style", "noscript", "template", "svg", "iframe",
];

/// Class names used by documentation-site chrome (sticky bars, hidden widgets)
const CHROME_CLASSES: &[&str] = &["sticky", "hidden"];

/// Elements that end a line of text
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section",
    "table", "tbody", "td", "th", "thead", "tr", "ul",
];

/// Cleaned page text plus the inferred title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedHtml {
    pub title: Option<String>,
    pub cleaned_text: String,
}

/// Removes structural noise from an HTML page and returns its prose
#[derive(Debug, Clone)]
pub struct HtmlCleaner {
    noise_tags: HashSet<String>,
    strip_chrome_classes: bool,
}

impl HtmlCleaner {
    /// Creates a cleaner that removes the structural noise tags plus `additional_noise_tags`
    pub fn new(additional_noise_tags: &[String], strip_chrome_classes: bool) -> Self {
        let noise_tags = STRUCTURAL_NOISE
            .iter()
            .map(|tag| tag.to_string())
            .chain(additional_noise_tags.iter().map(|tag| tag.to_ascii_lowercase()))
            .collect();
        Self {
            noise_tags,
            strip_chrome_classes,
        }
    }

    /// Cleans a full HTML document
    pub fn clean(&self, html: &str) -> CleanedHtml {
        let document = Html::parse_document(html);
        let title = extract_title(&document);

        let mut raw = String::new();
        let body = Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next());
        match body {
            Some(body) => self.collect_text(body, &mut raw),
            None => self.collect_text(document.root_element(), &mut raw),
        }

        CleanedHtml {
            title,
            cleaned_text: normalize_text(&raw),
        }
    }

    fn is_noise(&self, element: &ElementRef<'_>) -> bool {
        let value = element.value();
        if self.noise_tags.contains(value.name()) {
            return true;
        }
        self.strip_chrome_classes && value.classes().any(|class| CHROME_CLASSES.contains(&class))
    }

    fn collect_text(&self, element: ElementRef<'_>, out: &mut String) {
        if self.is_noise(&element) {
            return;
        }

        let block = BLOCK_TAGS.contains(&element.value().name());
        if block {
            out.push('\n');
        }

        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                self.collect_text(child_element, out);
            } else if let Node::Text(text) = child.value() {
                out.push_str(text);
            }
        }

        if block {
            out.push('\n');
        }
    }
}

/// Returns the `<title>` text, falling back to the first `<h1>`
fn extract_title(document: &Html) -> Option<String> {
    ["title", "h1"].iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        document
            .select(&selector)
            .next()
            .map(|element| normalize_text(&element.text().collect::<String>()))
            .filter(|title| !title.is_empty())
    })
}

/// Collapses whitespace within lines and drops blank lines
pub fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
