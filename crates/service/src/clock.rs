use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};

/// Source of "now" for timestamps and of "today" for date checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn today(&self) -> NaiveDate;
}

/// Wall clock. "Today" is the local calendar date.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> { Utc::now() }
    fn today(&self) -> NaiveDate { Local::now().date_naive() }
}

/// Frozen clock for tests and benchmarks.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    /// Noon UTC on `day`.
    pub fn on(day: NaiveDate) -> Self {
        let noon = day
            .and_hms_opt(12, 0, 0)
            .unwrap_or_else(|| day.and_time(NaiveTime::default()));
        Self { now: noon.and_utc() }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> { self.now }
    fn today(&self) -> NaiveDate { self.now.date_naive() }
}
