use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buffer::PixelBuffer;

pub const DEFAULT_HISTORY_MAX_ENTRIES: usize = 50;
pub const DEFAULT_HISTORY_MAX_BYTES: usize = 256 * 1024 * 1024;

/// Caps applied after each commit. The oldest snapshots go first; the log never
/// drops below one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryLimits {
    pub max_entries: usize,
    pub max_bytes: usize,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_HISTORY_MAX_ENTRIES,
            max_bytes: DEFAULT_HISTORY_MAX_BYTES,
        }
    }
}

pub type HistorySnapshot = Arc<PixelBuffer>;

/// Linear snapshot log with a cursor. Committing after an undo drops the redo tail.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    snapshots: Vec<HistorySnapshot>,
    cursor: usize,
    total_bytes: usize,
    limits: HistoryLimits,
}

impl HistoryLog {
    pub fn new(initial: PixelBuffer, limits: HistoryLimits) -> Self {
        let total_bytes = initial.byte_len();
        Self {
            snapshots: vec![Arc::new(initial)],
            cursor: 0,
            total_bytes,
            limits,
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub const fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub const fn limits(&self) -> HistoryLimits {
        self.limits
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    pub fn current(&self) -> &HistorySnapshot {
        &self.snapshots[self.cursor]
    }

    pub fn get(&self, index: usize) -> Option<&HistorySnapshot> {
        self.snapshots.get(index)
    }

    pub fn commit(&mut self, snapshot: PixelBuffer) {
        let discarded = self.snapshots.len() - (self.cursor + 1);
        for dropped in self.snapshots.drain(self.cursor + 1..) {
            self.total_bytes -= dropped.byte_len();
        }
        if discarded > 0 {
            tracing::debug!(discarded, "history redo tail discarded");
        }

        self.total_bytes += snapshot.byte_len();
        self.snapshots.push(Arc::new(snapshot));
        self.cursor = self.snapshots.len() - 1;
        self.evict_over_limits();
    }

    pub fn undo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.snapshots[self.cursor])
    }

    pub fn redo(&mut self) -> Option<&HistorySnapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(&self.snapshots[self.cursor])
    }

    fn over_limits(&self) -> bool {
        self.snapshots.len() > self.limits.max_entries.max(1)
            || self.total_bytes > self.limits.max_bytes
    }

    fn evict_over_limits(&mut self) {
        let mut evicted = 0;
        while self.snapshots.len() > 1 && self.over_limits() {
            let oldest = self.snapshots.remove(0);
            self.total_bytes -= oldest.byte_len();
            self.cursor = self.cursor.saturating_sub(1);
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining = self.snapshots.len(),
                total_bytes = self.total_bytes,
                "history evicted oldest snapshots"
            );
        }
    }
}
