//! Pending transfers produced by copy/cut and consumed by paste.

use std::collections::VecDeque;

use protocol::FileDescriptor;

/// A queued transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardEntry {
    /// Fetched content plus its origin.
    pub descriptor: FileDescriptor,
    /// Whether paste must delete the original after writing the copy.
    pub is_cut: bool,
}

/// First-in-first-out queue of pending transfers.
///
/// Entries are not deduplicated: copying the same file twice queues two
/// independent entries.
#[derive(Debug, Default)]
pub struct Clipboard {
    entries: VecDeque<ClipboardEntry>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, entry: ClipboardEntry) {
        self.entries.push_back(entry);
    }

    /// Remove and return the earliest-enqueued entry.
    pub fn dequeue_oldest(&mut self) -> Option<ClipboardEntry> {
        self.entries.pop_front()
    }

    /// Put an entry back at the head of the queue after a failed paste.
    pub fn restore(&mut self, entry: ClipboardEntry) {
        self.entries.push_front(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the queued entries, oldest first.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.descriptor.name.clone())
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
