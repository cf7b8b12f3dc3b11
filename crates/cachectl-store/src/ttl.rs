//! Entry lifetimes.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// How long a stored entry stays readable.
///
/// `None` in place of a `Ttl` means the entry never expires. A lifetime that
/// has already elapsed when the entry is written removes the entry instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// Relative lifetime in whole seconds.
    Seconds(u64),
    /// Relative lifetime.
    Duration(Duration),
    /// Absolute expiry.
    Until(DateTime<Utc>),
}

impl Ttl {
    /// Absolute expiry for an entry written at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let relative = match *self {
            Ttl::Seconds(secs) => Duration::from_secs(secs),
            Ttl::Duration(d) => d,
            Ttl::Until(at) => return at,
        };

        chrono::Duration::from_std(relative)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Whether an entry written at `now` would already be expired.
    pub fn is_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at(now) <= now
    }
}

impl From<u64> for Ttl {
    fn from(secs: u64) -> Self {
        Ttl::Seconds(secs)
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        Ttl::Duration(d)
    }
}

impl From<DateTime<Utc>> for Ttl {
    fn from(at: DateTime<Utc>) -> Self {
        Ttl::Until(at)
    }
}
