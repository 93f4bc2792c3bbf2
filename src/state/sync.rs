//! Incremental filtering for sources whose items carry timestamps
//!
//! The caller owns the sync marker and passes it into each crawl. Two crawls
//! for different tenants never share "already ran once" status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of the previous successful run for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncMarker {
    /// When the previous successful run started; `None` before the first run
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Emit everything regardless of timestamps (first run, or a forced re-scan)
    pub first_run: bool,
}

impl SyncMarker {
    /// Marker for a source that has never been synced
    pub fn first_run() -> Self {
        Self {
            last_synced_at: None,
            first_run: true,
        }
    }

    /// Marker for an incremental run after a sync at `at`
    pub fn since(at: DateTime<Utc>) -> Self {
        Self {
            last_synced_at: Some(at),
            first_run: false,
        }
    }

    /// Returns true if an item stamped `item_ts` should be emitted
    ///
    /// Everything passes on a first run. Otherwise only items strictly newer
    /// than the marker pass; a missing marker passes everything.
    pub fn should_emit(&self, item_ts: DateTime<Utc>) -> bool {
        if self.first_run {
            return true;
        }
        match self.last_synced_at {
            Some(last) => item_ts > last,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_run_emits_everything() {
        let marker = SyncMarker::first_run();
        assert!(marker.should_emit(ts(1)));
        assert!(marker.should_emit(ts(28)));
    }

    #[test]
    fn test_forced_rescan_ignores_marker() {
        let marker = SyncMarker {
            last_synced_at: Some(ts(15)),
            first_run: true,
        };
        assert!(marker.should_emit(ts(1)));
    }

    #[test]
    fn test_incremental_emits_only_newer() {
        let marker = SyncMarker::since(ts(10));
        assert!(!marker.should_emit(ts(9)));
        assert!(!marker.should_emit(ts(10)));
        assert!(marker.should_emit(ts(11)));
    }

    #[test]
    fn test_missing_marker_emits_everything() {
        let marker = SyncMarker::default();
        assert!(!marker.first_run);
        assert!(marker.should_emit(ts(1)));
    }
}
