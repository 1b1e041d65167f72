//! Per-sender submission cooldowns.
//!
//! State is in-memory only; after a restart every sender is treated as having
//! no prior submission.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::host::SenderId;

/// Result of asking the limiter to admit a submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// Admitted; the cooldown now runs from this admission.
    Admitted {
        /// The previously recorded admission, for [`RateLimiter::revert`].
        previous: Option<DateTime<Utc>>,
    },
    /// Still cooling down. Nothing was recorded.
    Rejected {
        /// Seconds left until the sender is admitted again.
        remaining_secs: f64,
    },
}

impl Admission {
    /// Returns true if the submission was admitted.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

/// Tracks the last admitted submission per sender.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_admitted: HashMap<SenderId, DateTime<Utc>>,
}

impl RateLimiter {
    /// Creates a limiter with no history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `sender` if at least `cooldown_secs` have passed since its last
    /// admission, recording `now` as the new admission time.
    ///
    /// The cooldown is consumed here, at admission, whether or not the sender
    /// goes on to submit anything. Rejection leaves the state untouched.
    /// A negative or non-finite cooldown is treated as zero.
    pub fn try_admit(
        &mut self,
        sender: SenderId,
        now: DateTime<Utc>,
        cooldown_secs: f64,
    ) -> Admission {
        let cooldown_secs = if cooldown_secs.is_finite() {
            cooldown_secs.max(0.0)
        } else {
            0.0
        };

        let previous = self.last_admitted.get(&sender).copied();
        if let Some(last) = previous {
            let elapsed = elapsed_secs(last, now);
            if elapsed < cooldown_secs {
                return Admission::Rejected {
                    remaining_secs: cooldown_secs - elapsed,
                };
            }
        }

        self.last_admitted.insert(sender, now);
        Admission::Admitted { previous }
    }

    /// Undoes an admission whose follow-up could not start.
    pub fn revert(&mut self, sender: SenderId, previous: Option<DateTime<Utc>>) {
        match previous {
            Some(last) => {
                self.last_admitted.insert(sender, last);
            }
            None => {
                self.last_admitted.remove(&sender);
            }
        }
    }

    /// Last admission time recorded for `sender`.
    #[must_use]
    pub fn last_admitted(&self, sender: SenderId) -> Option<DateTime<Utc>> {
        self.last_admitted.get(&sender).copied()
    }

    /// Number of senders with a recorded admission.
    #[must_use]
    pub fn len(&self) -> usize {
        self.last_admitted.len()
    }

    /// Returns true if no admission has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_admitted.is_empty()
    }
}

#[allow(clippy::cast_precision_loss)]
fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    delta
        .num_microseconds()
        .map_or_else(|| delta.num_seconds() as f64, |us| us as f64 / 1_000_000.0)
}
