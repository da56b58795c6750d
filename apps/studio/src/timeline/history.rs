//! Shot Visual History Store.
//!
//! History is newest-first and append-only. The one exception is the
//! load-time backfill for shots persisted before history existed.

use chrono::Utc;
use uuid::Uuid;

use crate::models::shot::{HistoryEntry, Shot, VisualType};

impl Shot {
    /// Prepends a new artifact and makes it current.
    pub fn add_visual(&mut self, url: impl Into<String>, visual_type: VisualType) -> &HistoryEntry {
        let url = url.into();
        let entry = HistoryEntry {
            id: format!("h_{}", Uuid::new_v4().simple()),
            url: url.clone(),
            visual_type,
            timestamp: self.next_timestamp(),
        };
        self.current_visual = url;
        self.current_visual_type = visual_type;
        self.history.insert(0, entry);
        &self.history[0]
    }

    /// Points the shot at an earlier artifact without touching history order.
    pub fn select_visual(&mut self, history_id: &str) -> bool {
        let Some(entry) = self.history.iter().find(|h| h.id == history_id) else {
            return false;
        };
        self.current_visual = entry.url.clone();
        self.current_visual_type = entry.visual_type;
        true
    }

    /// Synthesizes the single entry a legacy shot is missing.
    /// Returns whether anything was written.
    pub fn backfill_history(&mut self) -> bool {
        if !self.history.is_empty() || self.current_visual.is_empty() {
            return false;
        }
        self.history.push(HistoryEntry {
            id: format!("init_h_{}", self.id),
            url: self.current_visual.clone(),
            visual_type: self.current_visual_type,
            timestamp: Utc::now().timestamp_millis(),
        });
        true
    }

    fn next_timestamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        match self.history.first() {
            Some(newest) if newest.timestamp >= now => newest.timestamp.saturating_add(1),
            _ => now,
        }
    }
}
