use std::collections::VecDeque;

pub const DEFAULT_EDIT_LOG_LEN: usize = 256;

/// Bounded history of document snapshots, newest first, with a cursor for
/// stepping back and forth.
#[derive(Debug, Clone)]
pub struct EditLog {
    max_len: usize,
    entries: VecDeque<String>,
    pos: usize,
}

impl Default for EditLog {
    fn default() -> Self {
        Self::new(DEFAULT_EDIT_LOG_LEN)
    }
}

impl EditLog {
    pub fn new(max_len: usize) -> Self {
        Self {
            max_len: max_len.max(1),
            entries: VecDeque::new(),
            pos: 0,
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records a new snapshot, evicting the oldest past `max_len`. The cursor
    /// moves back to the newest entry.
    pub fn push(&mut self, snapshot: impl Into<String>) {
        self.entries.push_front(snapshot.into());
        if self.entries.len() > self.max_len {
            self.entries.pop_back();
        }
        self.pos = 0;
    }

    /// Newest snapshot.
    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    /// Snapshot under the cursor.
    pub fn current(&self) -> Option<&str> {
        self.entries.get(self.pos).map(String::as_str)
    }

    /// Steps to the next older snapshot.
    pub fn prev(&mut self) -> Option<&str> {
        if self.pos + 1 < self.entries.len() {
            self.pos += 1;
            return self.current();
        }
        None
    }

    /// Steps to the next newer snapshot.
    pub fn next(&mut self) -> Option<&str> {
        if self.pos > 0 {
            self.pos -= 1;
            return self.current();
        }
        None
    }
}
