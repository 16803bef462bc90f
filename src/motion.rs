// Gaze smoothing and pupil motion.
// Rule: a slightly laggy, stable pupil feels better than a jittery "live" one.
// Two stages: a moving-average filter absorbs sample noise into `target`,
// then per-frame exponential interpolation walks `current` toward it, so the
// irregular sample arrival rate never shows up in the render cadence.

use std::collections::VecDeque;

use crate::types::*;

/// Result of one animation tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutput {
    /// New pupil position to render, or `None` when the residual is below
    /// the re-render threshold.
    pub render: Option<PupilOffset>,
    /// Freshly measured frames-per-second, at most once per second.
    pub fps: Option<u32>,
}

/// Frame-rate instrumentation over a rolling one-second window.
#[derive(Debug, Clone, Default)]
struct FpsCounter {
    frames: u32,
    window_start: Option<Timestamp>,
}

impl FpsCounter {
    fn tick(&mut self, now: Timestamp) -> Option<u32> {
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;

        let elapsed = now.since(start);
        if elapsed < 1000 {
            return None;
        }

        let fps = (self.frames as f64 * 1000.0 / elapsed as f64).round() as u32;
        self.frames = 0;
        self.window_start = Some(now);
        Some(fps)
    }

    fn reset(&mut self) {
        self.frames = 0;
        self.window_start = None;
    }
}

/// Converts raw gaze samples into a bounded, smoothed pupil displacement.
pub struct MotionEngine {
    config: MotionConfig,
    current: PupilOffset,
    target: PupilOffset,
    history: VecDeque<PupilOffset>,
    fps: FpsCounter,
}

impl MotionEngine {
    pub fn new(config: MotionConfig) -> Self {
        let capacity = config.history_capacity;
        MotionEngine {
            config,
            current: PupilOffset::zero(),
            target: PupilOffset::zero(),
            history: VecDeque::with_capacity(capacity),
            fps: FpsCounter::default(),
        }
    }

    /// Ingest one raw gaze sample. A missing, non-finite, or zero coordinate
    /// means "no signal" (the tracker lost the face), not gaze at the page
    /// origin, and leaves all state untouched.
    pub fn ingest_sample(&mut self, x: Option<f64>, y: Option<f64>, viewport: Viewport) {
        let (gaze_x, gaze_y) = match (x, y) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() && x != 0.0 && y != 0.0 => {
                (x as f32, y as f32)
            }
            _ => return,
        };

        let center = viewport.center();
        let max = self.config.max_displacement_px;

        // Offset from center, normalized by half-viewport extent, scaled to
        // the displacement budget, clamped per axis.
        let clamped = PupilOffset::new(
            ((gaze_x - center.x) / center.x * max).clamp(-max, max),
            ((gaze_y - center.y) / center.y * max).clamp(-max, max),
        );

        self.push_history(clamped);
        self.target = self.history_mean();
    }

    /// Advance one display frame: interpolate toward the target and update
    /// the FPS window. Tolerates zero, one, or many ingests in between.
    pub fn tick(&mut self, now: Timestamp) -> TickOutput {
        let rate = self.config.convergence_rate;
        self.current.dx += (self.target.dx - self.current.dx) * rate;
        self.current.dy += (self.target.dy - self.current.dy) * rate;

        // Suppress sub-pixel re-renders from floating residue as `current`
        // asymptotically approaches `target`.
        let residual_x = (self.target.dx - self.current.dx).abs();
        let residual_y = (self.target.dy - self.current.dy).abs();
        let render = if residual_x > self.config.min_render_delta_px
            || residual_y > self.config.min_render_delta_px
        {
            Some(self.current)
        } else {
            None
        };

        TickOutput {
            render,
            fps: self.fps.tick(now),
        }
    }

    /// Zero all motion state. Used on session restart and viewport resize
    /// (the per-sample normalization constants go stale). Idempotent.
    pub fn reset(&mut self) {
        self.current = PupilOffset::zero();
        self.target = PupilOffset::zero();
        self.history.clear();
        self.fps.reset();
    }

    /// Current position rounded to one decimal per axis. Read-only snapshot
    /// for the debug overlay, never used internally.
    pub fn current_position_rounded(&self) -> (f32, f32) {
        (round1(self.current.dx), round1(self.current.dy))
    }

    /// Shallow-merge a config patch. Takes effect on the next ingest/tick;
    /// history is not recomputed.
    pub fn update_config(&mut self, patch: &MotionConfigPatch) {
        self.config.apply(patch);
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn target(&self) -> PupilOffset {
        self.target
    }

    pub fn current(&self) -> PupilOffset {
        self.current
    }

    fn push_history(&mut self, offset: PupilOffset) {
        self.history.push_back(offset);
        // Also trims the backlog after a capacity-shrinking config patch.
        while self.history.len() > self.config.history_capacity {
            self.history.pop_front();
        }
    }

    fn history_mean(&self) -> PupilOffset {
        let len = self.history.len();
        if len == 0 {
            return PupilOffset::zero();
        }
        let (sum_x, sum_y) = self
            .history
            .iter()
            .fold((0.0f32, 0.0f32), |acc, p| (acc.0 + p.dx, acc.1 + p.dy));
        PupilOffset::new(sum_x / len as f32, sum_y / len as f32)
    }
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(1000.0, 800.0)
    }

    fn engine() -> MotionEngine {
        MotionEngine::new(MotionConfig::default())
    }

    #[test]
    fn sample_beyond_extent_clamps_to_max() {
        let mut engine = engine();
        // Offset 700 over a half-extent of 500 scales to 49, clamped at 35.
        engine.ingest_sample(Some(1200.0), Some(400.0), viewport());
        assert_eq!(engine.target(), PupilOffset::new(35.0, 0.0));
    }

    #[test]
    fn one_tick_converges_at_configured_rate() {
        let mut engine = engine();
        engine.ingest_sample(Some(1200.0), Some(400.0), viewport());

        let out = engine.tick(Timestamp::from_millis(0));
        // current moves 30% of the way from 0 toward 35.
        assert!((engine.current().dx - 10.5).abs() < 1e-4);
        // Residual 24.5 exceeds the 2px threshold, so a render fires.
        assert!(out.render.is_some());
    }

    #[test]
    fn zero_or_missing_coordinates_are_dropped() {
        let mut engine = engine();
        engine.ingest_sample(Some(0.0), Some(400.0), viewport());
        engine.ingest_sample(Some(750.0), Some(0.0), viewport());
        engine.ingest_sample(None, None, viewport());
        engine.ingest_sample(Some(f64::NAN), Some(400.0), viewport());

        assert_eq!(engine.target(), PupilOffset::zero());
        assert_eq!(engine.current(), PupilOffset::zero());
        assert!(engine.history.is_empty());
    }

    #[test]
    fn history_evicts_oldest_past_capacity() {
        let mut engine = engine();
        // First sample clamps to -35; five more at +35 flush it.
        engine.ingest_sample(Some(-200.0), Some(400.0), viewport());
        for _ in 0..5 {
            engine.ingest_sample(Some(1200.0), Some(400.0), viewport());
        }
        assert_eq!(engine.history.len(), 5);
        // Mean of five +35 entries; the -35 entry is gone.
        assert!((engine.target().dx - 35.0).abs() < 1e-4);
    }

    #[test]
    fn mean_reflects_mixed_window() {
        let mut engine = engine();
        engine.ingest_sample(Some(1200.0), Some(400.0), viewport()); // +35 (clamped)
        engine.ingest_sample(Some(-200.0), Some(400.0), viewport()); // -35 (clamped)
        assert!((engine.target().dx - 0.0).abs() < 1e-4);

        engine.ingest_sample(Some(750.0), Some(400.0), viewport()); // +17.5
        assert!((engine.target().dx - 17.5 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn converges_within_logarithmic_tick_bound() {
        let mut engine = engine();
        engine.ingest_sample(Some(1200.0), Some(400.0), viewport());

        let initial_error = 35.0f64;
        let min_delta = 2.0f64;
        let rate = 0.3f64;
        let bound = (min_delta / initial_error).ln() / (1.0 - rate).ln();

        let mut ticks = 0;
        loop {
            ticks += 1;
            let out = engine.tick(Timestamp::from_millis(ticks as u64));
            if out.render.is_none() {
                break;
            }
            assert!(ticks < 1000, "did not converge");
        }
        assert!(
            (ticks as f64) <= bound.ceil() + 1.0,
            "took {} ticks, bound {}",
            ticks,
            bound
        );
        assert!((engine.target().dx - engine.current().dx).abs() <= min_delta as f32);
    }

    #[test]
    fn render_suppressed_once_settled() {
        let mut engine = engine();
        engine.ingest_sample(Some(750.0), Some(400.0), viewport());
        for i in 0..100 {
            engine.tick(Timestamp::from_millis(i));
        }
        let out = engine.tick(Timestamp::from_millis(100));
        assert!(out.render.is_none());
    }

    #[test]
    fn fps_reports_sixty_for_sixty_frames_in_a_second() {
        let mut engine = engine();
        let mut reported = None;
        // 60 ticks; the 60th lands exactly 1000ms after the first.
        for i in 0..60u64 {
            let out = engine.tick(Timestamp::from_millis(i * 1000 / 59));
            if out.fps.is_some() {
                reported = out.fps;
            }
        }
        assert_eq!(reported, Some(60));
    }

    #[test]
    fn fps_window_restarts_after_report() {
        let mut engine = engine();
        for i in 0..=30u64 {
            engine.tick(Timestamp::from_millis(i * 50));
        }
        // Window reported at some point; the next second reports again.
        let mut second_report = None;
        for i in 31..=55u64 {
            if let Some(fps) = engine.tick(Timestamp::from_millis(i * 50)).fps {
                second_report = Some(fps);
            }
        }
        assert!(second_report.is_some());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut engine = engine();
        engine.ingest_sample(Some(750.0), Some(300.0), viewport());
        engine.tick(Timestamp::from_millis(16));

        engine.reset();
        let once = (engine.current(), engine.target(), engine.history.len());
        engine.reset();
        let twice = (engine.current(), engine.target(), engine.history.len());

        assert_eq!(once, twice);
        assert_eq!(once.0, PupilOffset::zero());
        assert_eq!(once.1, PupilOffset::zero());
        assert_eq!(once.2, 0);
    }

    #[test]
    fn rounded_position_has_one_decimal() {
        let mut engine = engine();
        engine.ingest_sample(Some(750.0), Some(400.0), viewport());
        engine.tick(Timestamp::from_millis(0));
        let (x, y) = engine.current_position_rounded();
        assert_eq!(x, 5.3); // 17.5 * 0.3 = 5.25, rounds to 5.3
        assert_eq!(y, 0.0);
    }

    #[test]
    fn config_patch_applies_to_next_tick() {
        let mut engine = engine();
        engine.ingest_sample(Some(1200.0), Some(400.0), viewport());
        engine.update_config(&MotionConfigPatch {
            convergence_rate: Some(1.0),
            ..Default::default()
        });
        engine.tick(Timestamp::from_millis(0));
        assert_eq!(engine.current().dx, 35.0);
    }

    #[test]
    fn shrinking_capacity_trims_on_next_push() {
        let mut engine = engine();
        for _ in 0..5 {
            engine.ingest_sample(Some(1200.0), Some(400.0), viewport());
        }
        engine.update_config(&MotionConfigPatch {
            history_capacity: Some(2),
            ..Default::default()
        });
        engine.ingest_sample(Some(750.0), Some(400.0), viewport());
        assert_eq!(engine.history.len(), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        /// Strategy for gaze coordinates, including off-page estimates the
        /// regression model can produce.
        fn coord_strategy() -> impl Strategy<Value = f64> {
            -5000.0f64..5000.0f64
        }

        proptest! {
            /// For all sequences of samples, the filtered target stays
            /// within the displacement budget on both axes.
            #[test]
            fn target_stays_within_budget(
                samples in prop::collection::vec((coord_strategy(), coord_strategy()), 1..50)
            ) {
                let mut engine = MotionEngine::new(MotionConfig::default());
                let viewport = Viewport::new(1000.0, 800.0);
                for (x, y) in samples {
                    engine.ingest_sample(Some(x), Some(y), viewport);
                    let target = engine.target();
                    prop_assert!(target.dx >= -35.0 && target.dx <= 35.0);
                    prop_assert!(target.dy >= -35.0 && target.dy <= 35.0);
                }
            }

            /// History never exceeds the configured capacity.
            #[test]
            fn history_never_exceeds_capacity(
                samples in prop::collection::vec((coord_strategy(), coord_strategy()), 0..40),
                capacity in 1usize..10
            ) {
                let config = MotionConfig {
                    history_capacity: capacity,
                    ..Default::default()
                };
                let mut engine = MotionEngine::new(config);
                let viewport = Viewport::new(1000.0, 800.0);
                for (x, y) in samples {
                    engine.ingest_sample(Some(x), Some(y), viewport);
                    prop_assert!(engine.history.len() <= capacity);
                }
            }

            /// Interpolation never overshoots: after a tick, `current` on
            /// each axis lies between its previous value and the target.
            #[test]
            fn tick_never_overshoots(
                target_x in -35.0f64..35.0,
                ticks in 1usize..30
            ) {
                let mut engine = MotionEngine::new(MotionConfig::default());
                let viewport = Viewport::new(1000.0, 800.0);
                // Map the desired displacement back to a page coordinate.
                let gaze_x = 500.0 + target_x / 35.0 * 500.0;
                let gaze_x = if gaze_x == 0.0 { 1.0 } else { gaze_x };
                engine.ingest_sample(Some(gaze_x), Some(400.0), viewport);

                let mut prev = engine.current().dx;
                for i in 0..ticks {
                    engine.tick(Timestamp::from_millis(i as u64));
                    let cur = engine.current().dx;
                    let target = engine.target().dx;
                    let lo = prev.min(target) - 1e-3;
                    let hi = prev.max(target) + 1e-3;
                    prop_assert!(cur >= lo && cur <= hi);
                    prev = cur;
                }
            }
        }
    }
}
