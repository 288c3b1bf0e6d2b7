//! Validity windows and the "in effect" predicates.
//!
//! The two predicates deliberately disagree on the end boundary: "in effect
//! now" treats `end` as inclusive, "in effect at" treats it as exclusive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// A `[start, end]` validity window. `end == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// How the end of a window is compared against the query instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBound {
    /// `end >= instant`
    Inclusive,
    /// `end > instant`
    Exclusive,
}

/// A window predicate pushed down to the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPredicate {
    pub instant: DateTime<Utc>,
    pub end_bound: EndBound,
}

impl WindowPredicate {
    /// Predicate used by "in effect now".
    pub fn as_of(now: DateTime<Utc>) -> Self {
        Self {
            instant: now,
            end_bound: EndBound::Inclusive,
        }
    }

    /// Predicate used by "in effect at".
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            instant,
            end_bound: EndBound::Exclusive,
        }
    }

    /// Evaluates the predicate against a window.
    pub fn covers(&self, window: &TimeWindow) -> bool {
        if window.start > self.instant {
            return false;
        }
        match (window.end, self.end_bound) {
            (None, _) => true,
            (Some(end), EndBound::Inclusive) => end >= self.instant,
            (Some(end), EndBound::Exclusive) => end > self.instant,
        }
    }
}

impl TimeWindow {
    /// Creates a window, rejecting `start > end`.
    pub fn new(
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, ValidationError> {
        let window = Self { start, end };
        window.check()?;
        Ok(window)
    }

    /// Creates a window with no end.
    pub fn open_ended(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    /// Checks the `start <= end` invariant.
    pub fn check(&self) -> Result<(), ValidationError> {
        match self.end {
            Some(end) if self.start > end => Err(ValidationError::InvertedWindow {
                start: self.start,
                end,
            }),
            _ => Ok(()),
        }
    }

    /// True iff the window covers the current instant (end inclusive).
    pub fn is_in_effect_now(&self) -> bool {
        self.is_in_effect_as_of(Utc::now())
    }

    /// Same as [`is_in_effect_now`](Self::is_in_effect_now) with a pinned clock.
    pub fn is_in_effect_as_of(&self, now: DateTime<Utc>) -> bool {
        WindowPredicate::as_of(now).covers(self)
    }

    /// True iff the window covers `instant` (end exclusive).
    pub fn is_in_effect_at(&self, instant: DateTime<Utc>) -> bool {
        WindowPredicate::at(instant).covers(self)
    }
}
