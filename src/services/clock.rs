use std::sync::atomic::{AtomicI64, Ordering};

/// Wall clock in epoch milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Timestamp for a snapshot that has to look newer than `observed_remote`
pub fn next_upload_timestamp(now_ms: i64, observed_remote: Option<i64>) -> i64 {
    match observed_remote {
        Some(remote) => now_ms.max(remote.saturating_add(1)),
        None => now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_timestamp_beats_remote() {
        assert_eq!(next_upload_timestamp(100, None), 100);
        assert_eq!(next_upload_timestamp(100, Some(50)), 100);
        // device clock behind the remote writer
        assert_eq!(next_upload_timestamp(100, Some(500)), 501);
    }

    #[test]
    fn test_upload_timestamp_saturates() {
        assert_eq!(next_upload_timestamp(100, Some(i64::MAX)), i64::MAX);
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(5);
        clock.set(9);
        assert_eq!(clock.now_ms(), 9);
    }
}
