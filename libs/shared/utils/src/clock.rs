use chrono::{DateTime, FixedOffset, Utc};

/// Injectable time source. Day-boundary idempotency guards (reminder dispatch,
/// overdue sweeps) must read "now" through this trait so the guard is testable
/// and consistent across one tick.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    fn now_in(&self, offset: FixedOffset) -> DateTime<FixedOffset> {
        self.now_utc().with_timezone(&offset)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Builds the clinic-local offset from config minutes (east of UTC positive).
pub fn clinic_offset(offset_minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(offset_minutes * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}
