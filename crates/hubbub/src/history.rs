use std::collections::VecDeque;

use chrono::{DateTime, Local};
use hubbub_utils::ByteVec;

use crate::{HISTORY_MAX, MSG_MAX, NICK_MAX, clock::Stamp};

pub type Nick = ByteVec<NICK_MAX>;
pub type Text = ByteVec<MSG_MAX>;

/// One posted message. The monotonic stamp anchors cursor comparisons;
/// the wall time is captured once here and only ever rendered.
pub struct Entry {
    pub nick: Nick,
    pub text: Text,
    pub stamp: Stamp,
    pub wall: DateTime<Local>,
}

/// Rolling newest-first history of the last [`HISTORY_MAX`] messages.
/// Stamps are non-increasing front to back because all appends happen on
/// the one loop thread.
pub struct History {
    entries: VecDeque<Entry>,
}

impl History {
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(HISTORY_MAX) }
    }

    pub fn append(&mut self, nick: Nick, text: Text, stamp: Stamp, wall: DateTime<Local>) {
        self.entries.push_front(Entry { nick, text, stamp, wall });
        self.entries.truncate(HISTORY_MAX);
    }

    /// Entries strictly newer than `cursor`, newest first. The newest-first
    /// ordering invariant makes the newer entries exactly the front run.
    pub fn newer_than(&self, cursor: Stamp) -> impl Iterator<Item = &Entry> {
        self.entries.iter().take_while(move |entry| entry.stamp > cursor)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
