// Strong typing over bare floats. Newtypes for timestamps and the two
// coordinate spaces (page coordinates vs. eye-local pupil displacement).

use serde::{Deserialize, Serialize};

/// Timestamp in milliseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, saturating at zero.
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn plus(&self, ms: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(ms))
    }
}

/// A point in page coordinates (pixels, origin at the top-left of the
/// viewport). Raw gaze estimates and calibration target centers live here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        PagePoint { x, y }
    }
}

/// A pupil displacement in eye-local coordinates (pixels relative to the
/// eye center). Never interchangeable with `PagePoint` across a function
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PupilOffset {
    pub dx: f32,
    pub dy: f32,
}

impl PupilOffset {
    pub fn new(dx: f32, dy: f32) -> Self {
        PupilOffset { dx, dy }
    }

    pub fn zero() -> Self {
        PupilOffset { dx: 0.0, dy: 0.0 }
    }
}

/// Viewport dimensions in pixels. Normalization constants are derived from
/// this per sample, which is why a resize must reset motion state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Viewport { width, height }
    }

    pub fn center(&self) -> PagePoint {
        PagePoint::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            width: 1280.0,
            height: 720.0,
        }
    }
}

/// Bounding box of an on-screen element, in page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct PageRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl PageRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        PageRect {
            left,
            top,
            width,
            height,
        }
    }

    pub fn center(&self) -> PagePoint {
        PagePoint::new(self.left + self.width / 2.0, self.top + self.height / 2.0)
    }
}

/// A single raw gaze estimate from the external tracker. Transient; not
/// retained beyond the smoothing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub point: PagePoint,
    pub timestamp: Timestamp,
}

/// Motion tuning passed from JS. Partial JSON is fine; missing fields take
/// the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionConfig {
    /// Maximum pupil displacement from the eye center (pixels).
    #[serde(default = "default_max_displacement")]
    pub max_displacement_px: f32,
    /// Per-frame convergence rate toward the target (0..1). Lower is
    /// smoother and laggier.
    #[serde(default = "default_convergence_rate")]
    pub convergence_rate: f32,
    /// Residual below which re-renders are suppressed (pixels).
    #[serde(default = "default_min_render_delta")]
    pub min_render_delta_px: f32,
    /// Moving-average window size. Larger trades latency for jitter
    /// suppression.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Whether the involuntary blink animation runs at all.
    #[serde(default = "default_true")]
    pub blink_enabled: bool,
    /// Delay before the first blink after engine start (milliseconds).
    #[serde(default = "default_blink_base_interval")]
    pub blink_base_interval_ms: u64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            max_displacement_px: default_max_displacement(),
            convergence_rate: default_convergence_rate(),
            min_render_delta_px: default_min_render_delta(),
            history_capacity: default_history_capacity(),
            blink_enabled: true,
            blink_base_interval_ms: default_blink_base_interval(),
        }
    }
}

impl MotionConfig {
    /// Shallow merge: only fields present in the patch are overwritten.
    pub fn apply(&mut self, patch: &MotionConfigPatch) {
        if let Some(v) = patch.max_displacement_px {
            self.max_displacement_px = v;
        }
        if let Some(v) = patch.convergence_rate {
            self.convergence_rate = v;
        }
        if let Some(v) = patch.min_render_delta_px {
            self.min_render_delta_px = v;
        }
        if let Some(v) = patch.history_capacity {
            self.history_capacity = v;
        }
        if let Some(v) = patch.blink_enabled {
            self.blink_enabled = v;
        }
        if let Some(v) = patch.blink_base_interval_ms {
            self.blink_base_interval_ms = v;
        }
    }
}

/// Partial update for `MotionConfig`. Absent fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MotionConfigPatch {
    pub max_displacement_px: Option<f32>,
    pub convergence_rate: Option<f32>,
    pub min_render_delta_px: Option<f32>,
    pub history_capacity: Option<usize>,
    pub blink_enabled: Option<bool>,
    pub blink_base_interval_ms: Option<u64>,
}

fn default_max_displacement() -> f32 {
    35.0
}

fn default_convergence_rate() -> f32 {
    0.3
}

fn default_min_render_delta() -> f32 {
    2.0
}

fn default_history_capacity() -> usize {
    5
}

fn default_blink_base_interval() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

/// Session configuration passed from JS at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of calibration target widgets present in the view.
    pub target_count: usize,
    #[serde(default)]
    pub viewport: Viewport,
    #[serde(default)]
    pub motion: MotionConfig,
    /// Pull the latest prediction every frame once calibrated, for hosts
    /// whose push listener is unreliable.
    #[serde(default)]
    pub fallback_poll: bool,
}

/// Visual state of a calibration target widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetVisual {
    Idle,
    Active,
    Acknowledged,
}

/// Named views the JS shell can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewName {
    Loading,
    Calibration,
    Main,
    Error,
}

/// Imperative operation for the view collaborator. The JS shell applies
/// these in order; the core never touches the DOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ViewCommand {
    SetPupilOffset { dx: f32, dy: f32 },
    SetFpsDisplay { value: u32 },
    SetBlinkVisual { active: bool },
    SetCalibrationTargetVisual { index: usize, state: TargetVisual },
    SetProgressCount { n: usize },
    ShowView { name: ViewName },
    ShowToast { message: String, duration_ms: u64 },
    ShowFatalError { message: String },
}

/// Lifecycle or calibration command for the external gaze tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TrackerCommand {
    Start,
    Pause,
    Resume,
    End,
    ClearCalibrationData,
    RecordCalibrationPair { x: f32, y: f32 },
}

/// Batch of commands returned by every session entry point. One JSON
/// crossing per host callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Directives {
    pub view: Vec<ViewCommand>,
    pub tracker: Vec<TrackerCommand>,
}

impl Directives {
    pub fn none() -> Self {
        Directives::default()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty() && self.tracker.is_empty()
    }

    pub fn merge(&mut self, other: Directives) {
        self.view.extend(other.view);
        self.tracker.extend(other.tracker);
    }
}

/// Diagnostic snapshot for the debug overlay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct DebugSnapshot {
    pub gaze_x: f32,
    pub gaze_y: f32,
    pub pupil_dx: f32,
    pub pupil_dy: f32,
}
