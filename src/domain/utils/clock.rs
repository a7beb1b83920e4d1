use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Source of wall-clock timestamps for run summaries.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Each reading advances it by `step`.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<DateTime<Utc>>>,
    step: Duration,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>, step: Duration) -> Self {
        ManualClock { state: Arc::new(Mutex::new(start)), step }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let mut now = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *now;
        *now += self.step;
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_steps_on_each_reading() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start, Duration::seconds(1));

        assert_eq!(clock.now_utc(), start);
        assert_eq!(clock.now_utc(), start + Duration::seconds(1));
        clock.advance(Duration::minutes(1));
        assert_eq!(clock.now_utc(), start + Duration::seconds(62));
    }
}
