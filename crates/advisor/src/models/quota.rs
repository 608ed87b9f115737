//! Rolling hourly submission quota.
//!
//! Each browser gets a counter window with a fixed one-hour expiry. The first
//! submission creates the window at 1; every later submission within the
//! window increments it, and a pre-increment value over
//! [`MAX_SUBMISSIONS_PER_WINDOW`] - 1 is rejected. An expired window is
//! treated as absent, which is what resets the quota.
//!
//! The window is keyed by the session, not the identity: multiple users
//! sharing a browser share one bucket.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Submissions allowed per window. The request that observes a higher count
/// is blocked.
pub const MAX_SUBMISSIONS_PER_WINDOW: u32 = 11;

/// Window length.
const WINDOW_HOURS: i64 = 1;

/// Session-persisted submission counter with a fixed expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionWindow {
    /// Submissions recorded in this window, including rejected ones.
    pub count: u32,
    /// Instant the window lapses.
    pub expires_at: DateTime<Utc>,
}

impl SubmissionWindow {
    /// Record a submission attempt against the previous window state.
    ///
    /// Returns the window to persist and whether the submission is allowed.
    /// The counter keeps incrementing past the cap so the rejection is stable
    /// for the rest of the window.
    #[must_use]
    pub fn record(previous: Option<Self>, now: DateTime<Utc>) -> (Self, bool) {
        match previous {
            Some(window) if window.expires_at > now => {
                let allowed = window.count < MAX_SUBMISSIONS_PER_WINDOW;
                (
                    Self {
                        count: window.count + 1,
                        expires_at: window.expires_at,
                    },
                    allowed,
                )
            }
            // Absent or lapsed: fresh window, first submission always allowed.
            _ => (
                Self {
                    count: 1,
                    expires_at: now + Duration::hours(WINDOW_HOURS),
                },
                true,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minute: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + minute * 60, 0).expect("valid timestamp")
    }

    #[test]
    fn test_first_submission_creates_window() {
        let (window, allowed) = SubmissionWindow::record(None, at(0));
        assert!(allowed);
        assert_eq!(window.count, 1);
        assert_eq!(window.expires_at, at(60));
    }

    #[test]
    fn test_nth_submission_allowed_iff_at_most_eleven() {
        let mut window = None;
        for n in 1..=15u32 {
            let (next, allowed) = SubmissionWindow::record(window, at(i64::from(n)));
            assert_eq!(allowed, n <= 11, "submission {n}");
            assert_eq!(next.count, n);
            window = Some(next);
        }
    }

    #[test]
    fn test_rejection_does_not_stop_counting() {
        let window = SubmissionWindow {
            count: 13,
            expires_at: at(60),
        };
        let (next, allowed) = SubmissionWindow::record(Some(window), at(1));
        assert!(!allowed);
        assert_eq!(next.count, 14);
    }

    #[test]
    fn test_expired_window_resets() {
        let window = SubmissionWindow {
            count: 11,
            expires_at: at(60),
        };
        let (next, allowed) = SubmissionWindow::record(Some(window), at(61));
        assert!(allowed);
        assert_eq!(next.count, 1);
        assert_eq!(next.expires_at, at(121));
    }

    #[test]
    fn test_window_keeps_original_expiry() {
        let (first, _) = SubmissionWindow::record(None, at(0));
        let (second, _) = SubmissionWindow::record(Some(first), at(30));
        assert_eq!(second.expires_at, first.expires_at);
    }
}
