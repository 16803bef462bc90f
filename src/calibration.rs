// Calibration sequencing: one target at a time, learned pairs forwarded to
// the external tracker, gaze trusted only once every target is done.

use crate::types::*;

/// Delay between acknowledging a target and showing the next one. A UX
/// pause for the click feedback, realized via `poll` so input handling is
/// never blocked.
const ADVANCE_DELAY_MS: u64 = 400;
/// How long the completion toast stays up.
const COMPLETION_TOAST_MS: u64 = 3000;

/// Where the sequencer is in the target sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    /// Tracker not ready yet; nothing shown.
    AwaitingFirstStart,
    /// Target `index` is the one accepting clicks.
    InProgress { index: usize },
    /// All targets done (or skipped); gaze data is trusted.
    Completed,
}

/// Drives the calibration target sequence and gates gaze trust.
pub struct CalibrationSequencer {
    state: CalibrationState,
    target_count: usize,
    /// Fallback prediction pulling requested by config; active only while
    /// completed.
    fallback_poll: bool,
    poll_active: bool,
    /// Deferred `advance` scheduled by an acknowledgment.
    pending_advance_at: Option<Timestamp>,
}

impl CalibrationSequencer {
    pub fn new(target_count: usize, fallback_poll: bool) -> Self {
        CalibrationSequencer {
            state: CalibrationState::AwaitingFirstStart,
            target_count,
            fallback_poll,
            poll_active: false,
            pending_advance_at: None,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// True only once the sequence has completed. While targets are still
    /// in progress the tracker's estimates are not to be trusted.
    pub fn trust_gaze(&self) -> bool {
        self.state == CalibrationState::Completed
    }

    /// Whether the host should pull `getLatestPrediction` each frame.
    pub fn poll_active(&self) -> bool {
        self.poll_active
    }

    /// Enter the sequence from `AwaitingFirstStart`. A view with zero
    /// target widgets completes immediately.
    pub fn begin(&mut self) -> Directives {
        if self.state != CalibrationState::AwaitingFirstStart {
            return Directives::none();
        }
        self.state = CalibrationState::InProgress { index: 0 };
        let mut directives = Directives::none();
        directives.view.push(ViewCommand::ShowView {
            name: ViewName::Calibration,
        });
        directives.merge(self.show_next());
        directives
    }

    /// Click on target `index`, whose bounding box the view reports as
    /// `rect`. Clicks on anything but the active target are inert.
    pub fn acknowledge_active(&mut self, index: usize, rect: PageRect, now: Timestamp) -> Directives {
        let active = match self.state {
            CalibrationState::InProgress { index } => index,
            _ => return Directives::none(),
        };
        if index != active || self.pending_advance_at.is_some() {
            return Directives::none();
        }

        let center = rect.center();
        self.pending_advance_at = Some(now.plus(ADVANCE_DELAY_MS));

        let mut directives = Directives::none();
        directives.tracker.push(TrackerCommand::RecordCalibrationPair {
            x: center.x,
            y: center.y,
        });
        directives.view.push(ViewCommand::SetCalibrationTargetVisual {
            index,
            state: TargetVisual::Acknowledged,
        });
        directives
    }

    /// Fire a due deferred advance, if any.
    pub fn poll(&mut self, now: Timestamp) -> Directives {
        match self.pending_advance_at {
            Some(due) if now >= due => {
                self.pending_advance_at = None;
                if let CalibrationState::InProgress { index } = self.state {
                    self.state = CalibrationState::InProgress { index: index + 1 };
                }
                self.show_next()
            }
            _ => Directives::none(),
        }
    }

    /// Jump straight to `Completed`, bypassing remaining targets.
    /// Semantically identical to exhausting them all.
    pub fn skip(&mut self) -> Directives {
        if self.state == CalibrationState::Completed {
            return Directives::none();
        }
        self.pending_advance_at = None;
        self.complete()
    }

    /// Back to the start of the sequence: clear the tracker's accumulated
    /// calibration data, drop trust, and re-show the first target.
    pub fn reset(&mut self) -> Directives {
        let mut directives = Directives::none();
        directives.tracker.push(TrackerCommand::ClearCalibrationData);

        self.state = CalibrationState::AwaitingFirstStart;
        self.poll_active = false;
        self.pending_advance_at = None;

        directives.merge(self.begin());
        directives
    }

    /// Show target `index`, or complete if the sequence is exhausted.
    fn show_next(&mut self) -> Directives {
        let index = match self.state {
            CalibrationState::InProgress { index } => index,
            _ => return Directives::none(),
        };

        let mut directives = Directives::none();
        // Clear active/acknowledged flags everywhere before lighting one up.
        for i in 0..self.target_count {
            directives.view.push(ViewCommand::SetCalibrationTargetVisual {
                index: i,
                state: TargetVisual::Idle,
            });
        }

        if index < self.target_count {
            directives.view.push(ViewCommand::SetCalibrationTargetVisual {
                index,
                state: TargetVisual::Active,
            });
            directives.view.push(ViewCommand::SetProgressCount { n: index });
            directives
        } else {
            directives.merge(self.complete());
            directives
        }
    }

    fn complete(&mut self) -> Directives {
        self.state = CalibrationState::Completed;
        self.poll_active = self.fallback_poll;

        Directives {
            view: vec![
                ViewCommand::ShowView {
                    name: ViewName::Main,
                },
                ViewCommand::ShowToast {
                    message: "Calibration complete! Move your eyes around.".to_string(),
                    duration_ms: COMPLETION_TOAST_MS,
                },
            ],
            tracker: vec![TrackerCommand::Resume],
        }
    }
}
