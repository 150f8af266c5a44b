use std::sync::atomic::{AtomicU32, Ordering};

use qvl_types::NetTime;

/// Source of network-synchronised time.
pub trait NetClock: Send + Sync {
    /// Current network close time.
    fn now(&self) -> NetTime;
}

/// Wall clock shifted by the node's close-time offset.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock {
    offset_secs: i64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock running `offset_secs` ahead of (or, if negative, behind) the
    /// local wall clock.
    pub fn with_offset(offset_secs: i64) -> Self {
        Self { offset_secs }
    }
}

impl NetClock for SystemClock {
    fn now(&self) -> NetTime {
        NetTime::now().offset_by(self.offset_secs)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU32,
}

impl ManualClock {
    pub fn new(start: NetTime) -> Self {
        Self {
            secs: AtomicU32::new(start.as_secs()),
        }
    }

    pub fn set(&self, time: NetTime) {
        self.secs.store(time.as_secs(), Ordering::SeqCst);
    }

    /// Move the clock forward by `secs` seconds, saturating.
    pub fn advance(&self, secs: u32) {
        let _ = self
            .secs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                Some(s.saturating_add(secs))
            });
    }
}

impl NetClock for ManualClock {
    fn now(&self) -> NetTime {
        NetTime::from_secs(self.secs.load(Ordering::SeqCst))
    }
}
