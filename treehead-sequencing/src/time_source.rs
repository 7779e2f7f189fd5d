use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Wall clock used for guard windows and tree head timestamps.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FakeTimeSource {
    nanos: AtomicI64,
}

impl FakeTimeSource {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            nanos: AtomicI64::new(now.timestamp_nanos_opt().unwrap_or(i64::MAX)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.nanos
            .store(now.timestamp_nanos_opt().unwrap_or(i64::MAX), Ordering::SeqCst);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let by = by.num_nanoseconds().unwrap_or(i64::MAX);
        self.nanos
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(by)))
            .ok();
    }
}

impl TimeSource for FakeTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
