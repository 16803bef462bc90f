// gaze_engine: Rust/WASM core for a webcam gaze-tracked eye animation.
// All the motion and calibration logic lives here; the JS shell is plumbing
// that forwards tracker callbacks in and applies directive batches out.

mod blink;
mod calibration;
mod error;
mod motion;
mod session;
mod types;

use wasm_bindgen::prelude::*;

pub use blink::BlinkScheduler;
pub use calibration::{CalibrationSequencer, CalibrationState};
pub use error::EngineError;
pub use motion::{MotionEngine, TickOutput};
pub use session::{EyeSession, SessionFlags};
pub use types::*;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js_err(err: EngineError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn directives_json(directives: &Directives) -> Result<String, JsValue> {
    serde_json::to_string(directives).map_err(|e| to_js_err(EngineError::from(e)))
}

/// Main engine interface exposed to JavaScript. Every callback returns one
/// JSON directive batch to keep JS↔WASM crossings to one per event.
#[wasm_bindgen]
pub struct Engine {
    session: EyeSession,
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Engine, JsValue> {
        let config: SessionConfig = serde_json::from_str(config_json)
            .map_err(|e| to_js_err(EngineError::InvalidConfig(e.to_string())))?;

        // Wall clock only seeds the blink jitter; all scheduling uses the
        // timestamps the host passes in.
        let seed = js_sys::Date::now() as u64;
        Ok(Engine {
            session: EyeSession::new(config, seed),
        })
    }

    /// Commands to run at startup (show loading, start the tracker).
    pub fn start_directives(&self) -> Result<String, JsValue> {
        directives_json(&self.session.start_directives())
    }

    /// The tracker reached ready state.
    pub fn tracker_ready(&mut self, now_ms: f64) -> Result<String, JsValue> {
        directives_json(&self.session.tracker_ready(timestamp(now_ms)))
    }

    /// The tracker failed to initialize within its timeout.
    pub fn tracker_failed(&mut self, reason: &str) -> Result<String, JsValue> {
        directives_json(&self.session.tracker_failed(reason))
    }

    /// Push callback from the tracker's gaze listener. Pass nulls through
    /// unchanged; "no face detected" must not become gaze at the origin.
    pub fn on_gaze_sample(&mut self, x: Option<f64>, y: Option<f64>, timestamp_ms: f64) {
        self.session.on_gaze_sample(x, y, timestamp(timestamp_ms));
    }

    /// Per-animation-frame step, driven by requestAnimationFrame.
    pub fn on_frame(&mut self, now_ms: f64) -> Result<String, JsValue> {
        directives_json(&self.session.on_frame(timestamp(now_ms)))
    }

    /// Whether the host should pull the tracker's latest prediction this
    /// frame and feed it through `on_gaze_sample`.
    pub fn poll_active(&self) -> bool {
        self.session.poll_active()
    }

    /// Click on calibration target `index` with its bounding box.
    pub fn on_target_click(
        &mut self,
        index: usize,
        left: f64,
        top: f64,
        width: f64,
        height: f64,
        now_ms: f64,
    ) -> Result<String, JsValue> {
        let rect = PageRect::new(left as f32, top as f32, width as f32, height as f32);
        directives_json(&self.session.on_target_click(index, rect, timestamp(now_ms)))
    }

    pub fn skip_calibration(&mut self) -> Result<String, JsValue> {
        directives_json(&self.session.skip_calibration())
    }

    pub fn recalibrate(&mut self) -> Result<String, JsValue> {
        directives_json(&self.session.recalibrate())
    }

    pub fn on_resize(&mut self, width: f64, height: f64) -> Result<String, JsValue> {
        directives_json(&self.session.on_resize(width as f32, height as f32))
    }

    /// Shallow-merge a partial motion config, e.g. `{"convergence_rate":0.2}`.
    pub fn update_motion_config(&mut self, patch_json: &str) -> Result<(), JsValue> {
        let patch: MotionConfigPatch = serde_json::from_str(patch_json)
            .map_err(|e| to_js_err(EngineError::InvalidConfig(e.to_string())))?;
        self.session.update_motion_config(&patch);
        Ok(())
    }

    /// Page teardown.
    pub fn end(&mut self) -> Result<String, JsValue> {
        directives_json(&self.session.end())
    }

    pub fn toggle_camera(&mut self) -> bool {
        self.session.toggle_camera()
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.session.toggle_debug()
    }

    pub fn trust_gaze(&self) -> bool {
        self.session.trust_gaze()
    }

    /// Debug overlay readout, or `null` while hidden or uncalibrated.
    pub fn debug_snapshot(&self) -> Result<JsValue, JsValue> {
        match self.session.debug_snapshot() {
            Some(snapshot) => serde_json::to_string(&snapshot)
                .map(|s| JsValue::from_str(&s))
                .map_err(|e| to_js_err(EngineError::from(e))),
            None => Ok(JsValue::NULL),
        }
    }
}

fn timestamp(now_ms: f64) -> Timestamp {
    Timestamp::from_millis(now_ms.max(0.0) as u64)
}
