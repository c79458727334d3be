//! Refresh pacing policy: error circuit breaker plus cadence-based backoff.
//!
//! A feed's minimum refresh interval is derived from how long ago it last
//! published an entry. Tiers are checked in ascending age order; the first tier
//! whose bound is above the age wins, and anything older than every tier gets
//! the dormant interval.
//!
//! | age of newest entry | minimum interval |
//! |---------------------|------------------|
//! | < 9 days            | 0                |
//! | 9 days .. 22 days   | 6 hours          |
//! | >= 22 days          | 24 hours         |

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

// ============================================================================
// Defaults
// ============================================================================

/// Parsing errors at which a feed stops being scheduled automatically.
pub const DEFAULT_ERROR_THRESHOLD: i64 = 3;

/// Interval for feeds older than every cadence tier.
pub const DEFAULT_DORMANT_INTERVAL_HOURS: i64 = 24;

/// Default cadence tiers as `(younger_than_days, interval_hours)`.
pub const DEFAULT_CADENCE: [(i64, i64); 2] = [(9, 0), (22, 6)];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("error threshold must be at least 1 (got {0})")]
    InvalidThreshold(i64),

    #[error("cadence tier {index} is not older than the tier before it")]
    UnorderedTiers { index: usize },

    #[error("cadence tier {index} has a negative bound or interval")]
    NegativeTier { index: usize },

    #[error("dormant interval must not be negative")]
    NegativeDormantInterval,

    #[error("cadence value does not fit in a duration")]
    OutOfRange,
}

// ============================================================================
// Policy
// ============================================================================

/// One step of the cadence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadenceTier {
    /// Applies while the newest entry is strictly younger than this.
    pub younger_than: TimeDelta,
    /// Minimum time between two checks of the feed.
    pub interval: TimeDelta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPolicy {
    error_threshold: i64,
    tiers: Vec<CadenceTier>,
    dormant_interval: TimeDelta,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            tiers: DEFAULT_CADENCE
                .iter()
                .map(|&(days, hours)| CadenceTier {
                    younger_than: TimeDelta::days(days),
                    interval: TimeDelta::hours(hours),
                })
                .collect(),
            dormant_interval: TimeDelta::hours(DEFAULT_DORMANT_INTERVAL_HOURS),
        }
    }
}

impl RefreshPolicy {
    /// Build a policy, rejecting tables that are out of order or negative.
    pub fn new(
        error_threshold: i64,
        tiers: Vec<CadenceTier>,
        dormant_interval: TimeDelta,
    ) -> Result<Self, PolicyError> {
        if error_threshold < 1 {
            return Err(PolicyError::InvalidThreshold(error_threshold));
        }
        if dormant_interval < TimeDelta::zero() {
            return Err(PolicyError::NegativeDormantInterval);
        }
        for (index, tier) in tiers.iter().enumerate() {
            if tier.younger_than < TimeDelta::zero() || tier.interval < TimeDelta::zero() {
                return Err(PolicyError::NegativeTier { index });
            }
            if index > 0 && tier.younger_than <= tiers[index - 1].younger_than {
                return Err(PolicyError::UnorderedTiers { index });
            }
        }
        Ok(Self {
            error_threshold,
            tiers,
            dormant_interval,
        })
    }

    pub fn error_threshold(&self) -> i64 {
        self.error_threshold
    }

    pub fn tiers(&self) -> &[CadenceTier] {
        &self.tiers
    }

    pub fn dormant_interval(&self) -> TimeDelta {
        self.dormant_interval
    }

    /// Whether a feed with this many parsing errors may be scheduled automatically.
    pub fn accepts_error_count(&self, parsing_error_count: i64) -> bool {
        parsing_error_count < self.error_threshold
    }

    /// Minimum refresh interval for a feed whose newest entry is `age` old.
    ///
    /// A negative age (entry dated in the future) falls in the first tier.
    pub fn minimum_interval(&self, age: TimeDelta) -> TimeDelta {
        self.tiers
            .iter()
            .find(|tier| age < tier.younger_than)
            .map(|tier| tier.interval)
            .unwrap_or(self.dormant_interval)
    }

    /// Earliest time the feed may be checked again.
    ///
    /// Timestamps are Unix seconds, as stored in the feeds and entries tables.
    pub fn next_check_at(
        &self,
        checked_at: i64,
        last_published_at: i64,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let age = now - from_unix(last_published_at);
        from_unix(checked_at)
            .checked_add_signed(self.minimum_interval(age))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// A feed is due once `checked_at + minimum_interval <= now`.
    pub fn is_due(&self, checked_at: i64, last_published_at: i64, now: DateTime<Utc>) -> bool {
        self.next_check_at(checked_at, last_published_at, now) <= now
    }
}

/// Out-of-range timestamps clamp to the nearest representable end.
fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or(if secs > 0 {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}

// ============================================================================
// Tests
// ============================================================================
