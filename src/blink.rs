// Involuntary blink timing. Cosmetic and uncorrelated with gaze data.
// An explicit cancellable repeating task polled from the frame loop, rather
// than a chain of self-rescheduling closures, so teardown is deterministic.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::types::{Timestamp, ViewCommand};

/// How long the eyes stay closed per blink (milliseconds).
const BLINK_CLOSE_MS: u64 = 300;
/// Gap between blinks is uniform in [BLINK_GAP_MIN_MS, BLINK_GAP_MAX_MS).
const BLINK_GAP_MIN_MS: u64 = 3000;
const BLINK_GAP_MAX_MS: u64 = 7000;

/// Schedules periodic blinks: closes the eyes, reopens them 300ms later,
/// and picks a random gap until the next closure.
pub struct BlinkScheduler {
    rng: SmallRng,
    /// When the eyes next close. `None` while cancelled/disarmed.
    next_close_at: Option<Timestamp>,
    /// When the current closure ends. `Some` only while the eyes are shut.
    reopen_at: Option<Timestamp>,
}

impl BlinkScheduler {
    pub fn new(seed: u64) -> Self {
        BlinkScheduler {
            rng: SmallRng::seed_from_u64(seed),
            next_close_at: None,
            reopen_at: None,
        }
    }

    /// Schedule the first blink at `now + base_interval_ms`. Re-arming an
    /// already armed scheduler restarts the schedule.
    pub fn arm(&mut self, now: Timestamp, base_interval_ms: u64) {
        self.next_close_at = Some(now.plus(base_interval_ms));
        self.reopen_at = None;
    }

    /// Suppress any pending closure or reopen. Idempotent; used on teardown
    /// and when blinking is disabled mid-session.
    pub fn cancel(&mut self) {
        self.next_close_at = None;
        self.reopen_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_close_at.is_some() || self.reopen_at.is_some()
    }

    /// Advance the schedule. Emits at most one visual transition per call;
    /// the frame cadence is far finer than the blink timing.
    pub fn poll(&mut self, now: Timestamp) -> Option<ViewCommand> {
        if let Some(reopen_at) = self.reopen_at {
            if now >= reopen_at {
                self.reopen_at = None;
                return Some(ViewCommand::SetBlinkVisual { active: false });
            }
            return None;
        }

        match self.next_close_at {
            Some(close_at) if now >= close_at => {
                self.reopen_at = Some(now.plus(BLINK_CLOSE_MS));
                let gap = self.rng.gen_range(BLINK_GAP_MIN_MS..BLINK_GAP_MAX_MS);
                self.next_close_at = Some(now.plus(gap));
                Some(ViewCommand::SetBlinkVisual { active: true })
            }
            _ => None,
        }
    }
}
