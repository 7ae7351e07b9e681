//! Availability of a quiz as a pure function of its policy and the current time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::QuizPolicy;
use crate::time::saturating_until;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityStatus {
    Draft,
    Upcoming,
    Active,
    Closed,
}

impl AvailabilityStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AvailabilityStatus::Draft => "draft",
            AvailabilityStatus::Upcoming => "upcoming",
            AvailabilityStatus::Active => "active",
            AvailabilityStatus::Closed => "closed",
        }
    }

    /// Only an active quiz admits new attempts.
    #[must_use]
    pub fn admits_attempts(self) -> bool {
        matches!(self, AvailabilityStatus::Active)
    }
}

/// Maps `(policy, now)` to an availability status. First matching rule wins:
/// draft, not yet open, already closed, otherwise active.
#[must_use]
pub fn status(policy: &QuizPolicy, now: DateTime<Utc>) -> AvailabilityStatus {
    if policy.is_draft() {
        return AvailabilityStatus::Draft;
    }
    if policy.available_from().is_some_and(|from| now < from) {
        return AvailabilityStatus::Upcoming;
    }
    if policy.available_until().is_some_and(|until| now > until) {
        return AvailabilityStatus::Closed;
    }
    AvailabilityStatus::Active
}

/// Time until an upcoming quiz opens.
#[must_use]
pub fn time_until_available(policy: &QuizPolicy, now: DateTime<Utc>) -> Option<Duration> {
    policy
        .available_from()
        .filter(|from| now < *from)
        .map(|from| saturating_until(now, from))
}

/// Time until an open quiz closes.
#[must_use]
pub fn time_until_expires(policy: &QuizPolicy, now: DateTime<Utc>) -> Option<Duration> {
    policy
        .available_until()
        .filter(|until| now <= *until)
        .map(|until| saturating_until(now, until))
}
