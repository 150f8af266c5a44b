use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Network clock time: whole seconds since the network epoch,
/// 2000-01-01T00:00:00Z.
///
/// Validations carry their signing time in this resolution, and every node
/// on the network agrees on the epoch, so values compare directly across
/// peers.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetTime(u32);

impl NetTime {
    /// Seconds between the UNIX epoch and the network epoch.
    pub const EPOCH_OFFSET: i64 = 946_684_800;

    /// Create from seconds since the network epoch.
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs)
    }

    /// Seconds since the network epoch.
    pub const fn as_secs(&self) -> u32 {
        self.0
    }

    /// Convert a UNIX timestamp (seconds) into network time.
    pub fn from_unix(unix_secs: i64) -> Result<Self, TypeError> {
        let secs = unix_secs - Self::EPOCH_OFFSET;
        u32::try_from(secs)
            .map(Self)
            .map_err(|_| TypeError::TimeOutOfRange(unix_secs))
    }

    /// Current wall-clock time. Times before the network epoch clamp to zero.
    pub fn now() -> Self {
        let unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        Self::from_unix(unix).unwrap_or_default()
    }

    /// UNIX timestamp (seconds) for this network time.
    pub fn to_unix(&self) -> i64 {
        i64::from(self.0) + Self::EPOCH_OFFSET
    }

    /// This time as a UTC calendar date.
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.to_unix(), 0).unwrap_or_default()
    }

    /// Shift by a signed number of seconds, clamping at both ends.
    pub fn offset_by(&self, secs: i64) -> Self {
        let shifted = i64::from(self.0).saturating_add(secs);
        Self(shifted.clamp(0, i64::from(u32::MAX)) as u32)
    }
}

impl fmt::Debug for NetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetTime({})", self.0)
    }
}

impl fmt::Display for NetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().to_rfc3339())
    }
}
