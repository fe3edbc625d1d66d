//! Login throttle
//!
//! Counts failed logins per client address. After `max_failures` failures
//! inside `window_duration` the address is refused for `block_duration`,
//! whatever credentials it presents. A successful login clears the record.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::error::AuthError;

/// Throttle thresholds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Failures tolerated before the address is blocked
    pub max_failures: u32,

    /// How long a blocked address stays blocked
    pub block_duration: Duration,

    /// Failures older than this no longer count
    pub window_duration: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_failures: 10,
            block_duration: Duration::from_secs(300),
            window_duration: Duration::from_secs(600),
        }
    }
}

#[derive(Debug, Clone)]
struct FailureRecord {
    count: u32,
    window_start: Instant,
    blocked_at: Option<Instant>,
}

impl FailureRecord {
    fn empty(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_at: None,
        }
    }
}

/// Per-address failed-login tracker
#[derive(Debug)]
pub struct LoginThrottle {
    config: RateLimitConfig,
    records: RwLock<HashMap<IpAddr, FailureRecord>>,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl LoginThrottle {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Refuse the attempt if `ip` is currently blocked
    ///
    /// The error carries the remaining block time, rounded up to whole
    /// seconds.
    pub fn check(&self, ip: IpAddr) -> Result<(), AuthError> {
        match self.remaining_block_time(ip) {
            Some(remaining) => Err(AuthError::RateLimited {
                retry_after_secs: (remaining.as_millis() as u64).div_ceil(1000).max(1),
            }),
            None => Ok(()),
        }
    }

    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.is_blocked_at(ip, Instant::now())
    }

    /// Record a failed login; returns `true` if `ip` is now blocked
    pub fn record_failure(&self, ip: IpAddr) -> bool {
        self.record_failure_at(ip, Instant::now())
    }

    /// Forget everything about `ip`
    pub fn reset(&self, ip: IpAddr) {
        self.write().remove(&ip);
    }

    /// Failures counted in the current window
    pub fn failure_count(&self, ip: IpAddr) -> u32 {
        let now = Instant::now();
        self.read()
            .get(&ip)
            .filter(|r| now.duration_since(r.window_start) < self.config.window_duration)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    /// Time left on the block for `ip`, if any
    pub fn remaining_block_time(&self, ip: IpAddr) -> Option<Duration> {
        let now = Instant::now();
        let records = self.read();
        let blocked_at = records.get(&ip)?.blocked_at?;
        self.config
            .block_duration
            .checked_sub(now.duration_since(blocked_at))
            .filter(|d| !d.is_zero())
    }

    /// Drop records whose block and window have both lapsed
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    /// Number of addresses with a live record
    pub fn tracked_count(&self) -> usize {
        self.read().len()
    }

    fn is_blocked_at(&self, ip: IpAddr, now: Instant) -> bool {
        self.read()
            .get(&ip)
            .and_then(|r| r.blocked_at)
            .map(|blocked_at| now.duration_since(blocked_at) < self.config.block_duration)
            .unwrap_or(false)
    }

    fn record_failure_at(&self, ip: IpAddr, now: Instant) -> bool {
        let mut records = self.write();
        let record = records
            .entry(ip)
            .or_insert_with(|| FailureRecord::empty(now));

        if let Some(blocked_at) = record.blocked_at {
            if now.duration_since(blocked_at) < self.config.block_duration {
                return true;
            }
            *record = FailureRecord::empty(now);
        } else if now.duration_since(record.window_start) >= self.config.window_duration {
            *record = FailureRecord::empty(now);
        }

        record.count += 1;
        self.block_if_exhausted(record, now)
    }

    fn block_if_exhausted(&self, record: &mut FailureRecord, now: Instant) -> bool {
        if record.count >= self.config.max_failures {
            record.blocked_at = Some(now);
            tracing::warn!(
                failures = record.count,
                block_secs = self.config.block_duration.as_secs(),
                "Login throttle engaged"
            );
            true
        } else {
            false
        }
    }

    fn cleanup_at(&self, now: Instant) {
        let block = self.config.block_duration;
        let window = self.config.window_duration;
        self.write().retain(|_, r| {
            let still_blocked = r
                .blocked_at
                .map(|b| now.duration_since(b) < block)
                .unwrap_or(false);
            still_blocked || now.duration_since(r.window_start) < window
        });
    }

    // A poisoned lock only means another thread panicked mid-update; the
    // map itself is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<IpAddr, FailureRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<IpAddr, FailureRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}
