use std::sync::Arc;

use chrono::{DateTime, Local};
use quanta::Mock;

/// An opaque reading of the monotonic clock. Only ordering is meaningful;
/// cursors compare stamps, never wall time, so NTP steps cannot drop or
/// replay history entries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stamp(u64);

/// Time source owned by the server.
///
/// Monotonic stamps drive the per-client "unseen" cursors; the wall clock
/// is read separately and only ever rendered, never compared.
#[derive(Clone, Debug)]
pub struct Clock {
    inner: quanta::Clock,
}

impl Clock {
    #[inline]
    pub fn new() -> Self {
        Self { inner: quanta::Clock::new() }
    }

    /// A controllable clock for tests. The returned handle advances it.
    #[inline]
    pub fn mocked() -> (Self, Arc<Mock>) {
        let (inner, mock) = quanta::Clock::mock();
        (Self { inner }, mock)
    }

    #[inline]
    pub fn stamp(&self) -> Stamp {
        Stamp(self.inner.raw())
    }

    #[inline]
    pub fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

impl Default for Clock {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
