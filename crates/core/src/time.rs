use chrono::{DateTime, Duration, Utc};

/// Time source shared by every engine operation.
///
/// Timers are always derived from this clock on the server side; a client
/// reported elapsed time is never consulted.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that follows the system time.
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    /// Returns a clock frozen at the given instant.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Returns a copy of this clock moved forward by `delta`.
    ///
    /// A system clock is returned unchanged.
    #[must_use]
    pub fn advanced(self, delta: Duration) -> Self {
        match self {
            Clock::System => Clock::System,
            Clock::Fixed(t) => Clock::Fixed(t + delta),
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

/// Time left until `deadline`, floored at zero.
#[must_use]
pub fn saturating_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> Duration {
    let left = deadline - now;
    if left < Duration::zero() {
        Duration::zero()
    } else {
        left
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advanced_moves_fixed_clock_only() {
        let clock = fixed_clock().advanced(Duration::seconds(11));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(11));
        assert!(!Clock::system().advanced(Duration::seconds(5)).is_fixed());
    }

    #[test]
    fn saturating_until_floors_at_zero() {
        let now = fixed_now();
        assert_eq!(
            saturating_until(now, now - Duration::seconds(3)),
            Duration::zero()
        );
        assert_eq!(
            saturating_until(now, now + Duration::seconds(3)),
            Duration::seconds(3)
        );
    }
}
