// Session composition root: wires the motion engine, blink scheduler, and
// calibration sequencer to the host's callbacks. One directive batch out
// per callback in.

use crate::blink::BlinkScheduler;
use crate::calibration::{CalibrationSequencer, CalibrationState};
use crate::error::EngineError;
use crate::motion::MotionEngine;
use crate::types::*;

/// Session-wide UI flags, kept in one explicit struct instead of scattered
/// module globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionFlags {
    pub camera_visible: bool,
    pub debug_visible: bool,
}

impl Default for SessionFlags {
    fn default() -> Self {
        SessionFlags {
            camera_visible: true,
            debug_visible: false,
        }
    }
}

/// The whole single-viewport, single-session animation state. All entry
/// points run on the one UI thread and return the commands the JS shell
/// should apply.
pub struct EyeSession {
    motion: MotionEngine,
    blink: BlinkScheduler,
    sequencer: CalibrationSequencer,
    viewport: Viewport,
    flags: SessionFlags,
    last_sample: Option<GazeSample>,
    /// Set once the tracker failed to initialize; every later entry point
    /// is inert.
    failed: bool,
}

impl EyeSession {
    pub fn new(config: SessionConfig, blink_seed: u64) -> Self {
        EyeSession {
            motion: MotionEngine::new(config.motion),
            blink: BlinkScheduler::new(blink_seed),
            sequencer: CalibrationSequencer::new(config.target_count, config.fallback_poll),
            viewport: config.viewport,
            flags: SessionFlags::default(),
            last_sample: None,
            failed: false,
        }
    }

    /// Startup command for the host: bring the external tracker up.
    pub fn start_directives(&self) -> Directives {
        Directives {
            view: vec![ViewCommand::ShowView {
                name: ViewName::Loading,
            }],
            tracker: vec![TrackerCommand::Start],
        }
    }

    /// The external tracker reached ready state: leave the loading screen
    /// and start the calibration sequence and the blink schedule.
    pub fn tracker_ready(&mut self, now: Timestamp) -> Directives {
        if self.failed {
            return Directives::none();
        }
        let directives = self.sequencer.begin();
        if self.motion.config().blink_enabled {
            self.blink.arm(now, self.motion.config().blink_base_interval_ms);
        }
        directives
    }

    /// The external tracker failed to reach ready state within its timeout.
    /// Fatal: surfaced once, no automatic retry, recovery is a full reload.
    pub fn tracker_failed(&mut self, reason: &str) -> Directives {
        if self.failed {
            return Directives::none();
        }
        self.failed = true;
        self.blink.cancel();
        let err = EngineError::TrackerInit(reason.to_string());
        Directives {
            view: vec![ViewCommand::ShowFatalError {
                message: err.to_string(),
            }],
            tracker: vec![],
        }
    }

    /// Push callback from the tracker. Fires at an arbitrary rate relative
    /// to the frame loop. Samples move the pupil even before calibration
    /// completes; trust gating applies to the debug readout, not motion.
    pub fn on_gaze_sample(&mut self, x: Option<f64>, y: Option<f64>, now: Timestamp) {
        if self.failed {
            return;
        }
        self.motion.ingest_sample(x, y, self.viewport);
        if let (Some(x), Some(y)) = (x, y) {
            if x.is_finite() && y.is_finite() && x != 0.0 && y != 0.0 {
                self.last_sample = Some(GazeSample {
                    point: PagePoint::new(x as f32, y as f32),
                    timestamp: now,
                });
            }
        }
    }

    /// Per-display-frame step: motion tick, blink schedule, and any due
    /// calibration advance.
    pub fn on_frame(&mut self, now: Timestamp) -> Directives {
        if self.failed {
            return Directives::none();
        }
        let mut directives = Directives::none();

        let tick = self.motion.tick(now);
        if let Some(offset) = tick.render {
            directives.view.push(ViewCommand::SetPupilOffset {
                dx: offset.dx,
                dy: offset.dy,
            });
        }
        if let Some(value) = tick.fps {
            directives.view.push(ViewCommand::SetFpsDisplay { value });
        }

        if let Some(cmd) = self.blink.poll(now) {
            directives.view.push(cmd);
        }

        directives.merge(self.sequencer.poll(now));
        directives
    }

    /// Whether the host should pull `getLatestPrediction` each frame and
    /// feed it through `on_gaze_sample`. True only while gaze is trusted
    /// and the fallback is configured.
    pub fn poll_active(&self) -> bool {
        !self.failed && self.sequencer.poll_active()
    }

    pub fn on_target_click(&mut self, index: usize, rect: PageRect, now: Timestamp) -> Directives {
        if self.failed {
            return Directives::none();
        }
        self.sequencer.acknowledge_active(index, rect, now)
    }

    pub fn skip_calibration(&mut self) -> Directives {
        if self.failed {
            return Directives::none();
        }
        self.sequencer.skip()
    }

    /// User asked to recalibrate: clear tracker data, re-center the pupils,
    /// and restart the target sequence.
    pub fn recalibrate(&mut self) -> Directives {
        if self.failed {
            return Directives::none();
        }
        let mut directives = self.sequencer.reset();
        self.motion.reset();
        self.last_sample = None;
        directives
            .view
            .push(ViewCommand::SetPupilOffset { dx: 0.0, dy: 0.0 });
        directives
    }

    /// Viewport resize invalidates the per-sample normalization constants,
    /// so motion state resets synchronously with the new geometry.
    pub fn on_resize(&mut self, width: f32, height: f32) -> Directives {
        if self.failed {
            return Directives::none();
        }
        self.viewport = Viewport::new(width, height);
        self.motion.reset();
        Directives {
            view: vec![ViewCommand::SetPupilOffset { dx: 0.0, dy: 0.0 }],
            tracker: vec![],
        }
    }

    pub fn update_motion_config(&mut self, patch: &MotionConfigPatch) {
        self.motion.update_config(patch);
        if !self.motion.config().blink_enabled {
            self.blink.cancel();
        }
    }

    /// Page teardown: stop the tracker and suppress any pending blink so no
    /// callback outlives the view.
    pub fn end(&mut self) -> Directives {
        self.blink.cancel();
        Directives {
            view: vec![],
            tracker: vec![TrackerCommand::End],
        }
    }

    pub fn toggle_camera(&mut self) -> bool {
        self.flags.camera_visible = !self.flags.camera_visible;
        self.flags.camera_visible
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.flags.debug_visible = !self.flags.debug_visible;
        self.flags.debug_visible
    }

    pub fn trust_gaze(&self) -> bool {
        self.sequencer.trust_gaze()
    }

    pub fn calibration_state(&self) -> CalibrationState {
        self.sequencer.state()
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    /// Rounded gaze and pupil coordinates for the debug overlay. `None`
    /// unless the overlay is enabled and gaze is trusted.
    pub fn debug_snapshot(&self) -> Option<DebugSnapshot> {
        if !self.flags.debug_visible || !self.sequencer.trust_gaze() {
            return None;
        }
        let gaze = self.last_sample?.point;
        let (pupil_dx, pupil_dy) = self.motion.current_position_rounded();
        Some(DebugSnapshot {
            gaze_x: gaze.x.round(),
            gaze_y: gaze.y.round(),
            pupil_dx,
            pupil_dy,
        })
    }
}
