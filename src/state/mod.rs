//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Frontier`: visited set plus the depth-first pending stack
//! - `CrawlState`: everything one crawl run mutates while it walks
//! - `PageError`: per-URL failure values folded into the crawl state
//! - `SessionState`: lifecycle of the rendering session
//! - `SyncMarker`: caller-supplied position for incremental sources

mod crawl_state;
mod frontier;
mod page_error;
mod session_state;
mod sync;

// Re-export main types
pub use crawl_state::{CrawlState, NO_VALID_PAGES};
pub use frontier::Frontier;
pub use page_error::{PageError, PageErrorKind};
pub use session_state::SessionState;
pub use sync::SyncMarker;
