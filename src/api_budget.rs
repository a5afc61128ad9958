use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};

use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

/// Daily allowance of weather provider calls.
///
/// The counter resets when the local calendar day changes. Once exhausted the
/// weather source stays on the simulated generator until the next day.
pub struct ProviderBudget {
    daily_limit: u32,
    tz: Tz,
    calls_today: AtomicU32,
    current_day: AtomicI64,
}

impl ProviderBudget {
    pub fn new(daily_limit: u32, tz: Tz) -> Self {
        Self {
            daily_limit,
            tz,
            calls_today: AtomicU32::new(0),
            current_day: AtomicI64::new(local_day(Utc::now(), tz)),
        }
    }

    /// Count one call. `false` means the allowance is spent and the call should not be made.
    pub fn try_spend(&self) -> bool {
        self.try_spend_at(Utc::now())
    }

    fn try_spend_at(&self, now: DateTime<Utc>) -> bool {
        self.roll_over(now);
        let prev = self.calls_today.fetch_add(1, Ordering::Relaxed);
        prev < self.daily_limit
    }

    pub fn remaining(&self) -> u32 {
        self.roll_over(Utc::now());
        self.daily_limit
            .saturating_sub(self.calls_today.load(Ordering::Relaxed))
    }

    fn roll_over(&self, now: DateTime<Utc>) {
        let today = local_day(now, self.tz);
        let stored = self.current_day.load(Ordering::Relaxed);
        if today != stored
            && self
                .current_day
                .compare_exchange(stored, today, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            self.calls_today.store(0, Ordering::Relaxed);
        }
    }
}

fn local_day(now: DateTime<Utc>, tz: Tz) -> i64 {
    i64::from(now.with_timezone(&tz).date_naive().num_days_from_ce())
}
