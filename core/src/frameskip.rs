//! Adaptive frameskip
//!
//! Two-sided hysteresis controller. Escalates after more than
//! `trouble_limit` windows with audio failures above threshold, and only
//! de-escalates after `recovery_required` windows in which a full render
//! comfortably fits into measured idle time.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::trouble::{TROUBLE_WINDOW_FRAMES, TroubleDetector};

/// Profiling event carrying the cost of rendering every active panel
pub const RENDER_COST_EVENT: &str = "render_all_panels";
/// Profiling event carrying the worker's idle time per frame
pub const IDLE_EVENT: &str = "idle";

/// Frameskip tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameskipConfig {
    /// Highest frameskip level the controller will reach
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    /// Failed/successful sample ratio above which a window counts as trouble
    #[serde(default = "default_increase_threshold")]
    pub increase_threshold: f64,
    /// Multiplier applied to render cost before comparing with idle time
    #[serde(default = "default_decrease_headroom")]
    pub decrease_headroom: f64,
    /// Trouble windows tolerated before escalating (escalates when exceeded)
    #[serde(default = "default_trouble_limit")]
    pub trouble_limit: u32,
    /// Recovery confirmations required before de-escalating
    #[serde(default = "default_recovery_required")]
    pub recovery_required: u32,
    /// Frame requests per evaluation window
    #[serde(default = "default_window_frames")]
    pub window_frames: u32,
}

fn default_max_level() -> u32 {
    2
}
fn default_increase_threshold() -> f64 {
    0.01
}
fn default_decrease_headroom() -> f64 {
    1.5
}
fn default_trouble_limit() -> u32 {
    3
}
fn default_recovery_required() -> u32 {
    10
}
fn default_window_frames() -> u32 {
    TROUBLE_WINDOW_FRAMES
}

impl Default for FrameskipConfig {
    fn default() -> Self {
        Self {
            max_level: default_max_level(),
            increase_threshold: default_increase_threshold(),
            decrease_headroom: default_decrease_headroom(),
            trouble_limit: default_trouble_limit(),
            recovery_required: default_recovery_required(),
            window_frames: default_window_frames(),
        }
    }
}

/// Latest average duration (ms) per named worker activity
#[derive(Debug, Clone, Default)]
pub struct ProfilingResults {
    averages: HashMap<String, f64>,
}

impl ProfilingResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event_name: &str, average_duration: f64) {
        self.averages.insert(event_name.to_string(), average_duration);
    }

    pub fn get(&self, event_name: &str) -> Option<f64> {
        self.averages.get(event_name).copied()
    }

    pub fn render_cost(&self) -> Option<f64> {
        self.get(RENDER_COST_EVENT)
    }

    pub fn idle(&self) -> Option<f64> {
        self.get(IDLE_EVENT)
    }
}

/// Outcome of one window evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameskipChange {
    /// Window not full yet, or level held
    Unchanged,
    Raised(u32),
    Lowered(u32),
}

/// Owns the frameskip level
#[derive(Debug, Clone)]
pub struct FrameskipController {
    level: u32,
    config: FrameskipConfig,
}

impl FrameskipController {
    pub fn new(config: FrameskipConfig) -> Self {
        Self { level: 0, config }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn config(&self) -> &FrameskipConfig {
        &self.config
    }

    /// Evaluate a window if the detector has accumulated one.
    ///
    /// Resets the detector's window tallies whenever a window is evaluated.
    pub fn evaluate(
        &mut self,
        detector: &mut TroubleDetector,
        profiling: &ProfilingResults,
    ) -> FrameskipChange {
        if !detector.window_full(self.config.window_frames) {
            return FrameskipChange::Unchanged;
        }

        let fail_ratio = detector.fail_ratio();
        let mut change = FrameskipChange::Unchanged;

        if self.level < self.config.max_level {
            match fail_ratio {
                Some(ratio) if ratio > self.config.increase_threshold => {
                    detector.trouble_count += 1;
                    detector.recovery_count = 0;
                    debug!(
                        ratio,
                        trouble_count = detector.trouble_count,
                        "audio failure ratio above threshold"
                    );
                    if detector.trouble_count > self.config.trouble_limit {
                        self.level += 1;
                        detector.trouble_count = 0;
                        change = FrameskipChange::Raised(self.level);
                        info!(level = self.level, "frameskip increased");
                    }
                }
                _ => {
                    if detector.trouble_count > 0 {
                        detector.trouble_count -= 1;
                        debug!(
                            trouble_count = detector.trouble_count,
                            "trouble count relaxed"
                        );
                    }
                }
            }
        }

        if self.level > 0
            && let Some(ratio) = fail_ratio
            && ratio < self.config.increase_threshold
        {
            change = self.evaluate_recovery(detector, profiling).unwrap_or(change);
        }

        detector.reset_window();
        change
    }

    fn evaluate_recovery(
        &mut self,
        detector: &mut TroubleDetector,
        profiling: &ProfilingResults,
    ) -> Option<FrameskipChange> {
        // Missing profiling leaves the recovery count untouched
        if let (Some(render_cost), Some(idle)) = (profiling.render_cost(), profiling.idle()) {
            let cost_with_headroom = render_cost * self.config.decrease_headroom;
            if cost_with_headroom < idle {
                detector.recovery_count += 1;
                debug!(
                    render_cost,
                    cost_with_headroom,
                    idle,
                    recovery_count = detector.recovery_count,
                    "full render fits in idle time"
                );
            } else if cost_with_headroom > idle && detector.recovery_count > 0 {
                detector.recovery_count -= 1;
                debug!(
                    recovery_count = detector.recovery_count,
                    "recovery count decreased"
                );
            }
        }

        if detector.recovery_count >= self.config.recovery_required {
            self.level -= 1;
            detector.recovery_count = 0;
            info!(level = self.level, "performance recovered, frameskip lowered");
            return Some(FrameskipChange::Lowered(self.level));
        }
        None
    }
}

impl Default for FrameskipController {
    fn default() -> Self {
        Self::new(FrameskipConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fill one window with the given played/underrun counts
    fn window(detector: &mut TroubleDetector, played: u32, underrun: u32) {
        detector.record_played(played);
        detector.record_underrun(underrun);
        for _ in 0..TROUBLE_WINDOW_FRAMES {
            detector.record_request();
        }
    }

    fn profiling(render_cost: f64, idle: f64) -> ProfilingResults {
        let mut results = ProfilingResults::new();
        results.record(RENDER_COST_EVENT, render_cost);
        results.record(IDLE_EVENT, idle);
        results
    }

    #[test]
    fn partial_window_is_not_evaluated() {
        let mut controller = FrameskipController::default();
        let mut detector = TroubleDetector::new();
        detector.record_underrun(1000);
        detector.record_request();
        let change = controller.evaluate(&mut detector, &ProfilingResults::new());
        assert_eq!(change, FrameskipChange::Unchanged);
        assert_eq!(detector.failed_samples, 1000);
        assert_eq!(detector.trouble_count, 0);
    }

    #[test]
    fn escalates_after_more_than_three_trouble_windows() {
        let mut controller = FrameskipController::default();
        let mut detector = TroubleDetector::new();
        let profiling = ProfilingResults::new();

        for expected_trouble in 1..=3 {
            window(&mut detector, 10_000, 200);
            assert_eq!(
                controller.evaluate(&mut detector, &profiling),
                FrameskipChange::Unchanged
            );
            assert_eq!(detector.trouble_count, expected_trouble);
            assert_eq!(controller.level(), 0);
        }

        window(&mut detector, 10_000, 200);
        assert_eq!(
            controller.evaluate(&mut detector, &profiling),
            FrameskipChange::Raised(1)
        );
        assert_eq!(detector.trouble_count, 0);
    }

    #[test]
    fn good_window_decays_trouble_by_one() {
        let mut controller = FrameskipController::default();
        let mut detector = TroubleDetector::new();
        let profiling = ProfilingResults::new();

        detector.trouble_count = 3;
        window(&mut detector, 10_000, 0);
        controller.evaluate(&mut detector, &profiling);
        assert_eq!(detector.trouble_count, 2);
        assert_eq!(controller.level(), 0);
    }

    #[test]
    fn ratio_at_threshold_is_not_trouble() {
        let mut controller = FrameskipController::default();
        let mut detector = TroubleDetector::new();
        detector.trouble_count = 1;
        window(&mut detector, 10_000, 100);
        controller.evaluate(&mut detector, &ProfilingResults::new());
        assert_eq!(detector.trouble_count, 0);
    }

    #[test]
    fn level_never_exceeds_cap() {
        let mut controller = FrameskipController::default();
        let mut detector = TroubleDetector::new();
        let profiling = ProfilingResults::new();

        for _ in 0..50 {
            window(&mut detector, 100, 100);
            controller.evaluate(&mut detector, &profiling);
            assert!(controller.level() <= 2);
        }
        assert_eq!(controller.level(), 2);
    }

    #[test]
    fn recovers_after_exactly_ten_confirmations() {
        let mut controller = FrameskipController::default();
        controller.level = 1;
        let mut detector = TroubleDetector::new();
        let profiling = profiling(2.0, 10.0);

        for confirmations in 1..10 {
            window(&mut detector, 10_000, 0);
            assert_eq!(
                controller.evaluate(&mut detector, &profiling),
                FrameskipChange::Unchanged
            );
            assert_eq!(detector.recovery_count, confirmations);
        }

        window(&mut detector, 10_000, 0);
        assert_eq!(
            controller.evaluate(&mut detector, &profiling),
            FrameskipChange::Lowered(0)
        );
        assert_eq!(detector.recovery_count, 0);
    }

    #[test]
    fn expensive_render_decays_recovery() {
        let mut controller = FrameskipController::default();
        controller.level = 2;
        let mut detector = TroubleDetector::new();
        detector.recovery_count = 4;

        window(&mut detector, 10_000, 0);
        controller.evaluate(&mut detector, &profiling(8.0, 10.0));
        assert_eq!(detector.recovery_count, 3);
        assert_eq!(controller.level(), 2);
    }

    #[test]
    fn missing_profiling_holds_recovery() {
        let mut controller = FrameskipController::default();
        controller.level = 1;
        let mut detector = TroubleDetector::new();
        detector.recovery_count = 9;

        window(&mut detector, 10_000, 0);
        controller.evaluate(&mut detector, &ProfilingResults::new());
        assert_eq!(detector.recovery_count, 9);
        assert_eq!(controller.level(), 1);
    }

    #[test]
    fn trouble_resets_recovery_progress() {
        let mut controller = FrameskipController::default();
        controller.level = 1;
        let mut detector = TroubleDetector::new();
        detector.recovery_count = 7;

        window(&mut detector, 1_000, 500);
        controller.evaluate(&mut detector, &profiling(1.0, 10.0));
        assert_eq!(detector.recovery_count, 0);
        assert_eq!(detector.trouble_count, 1);
    }

    #[test]
    fn silent_window_does_not_recover() {
        let mut controller = FrameskipController::default();
        controller.level = 1;
        let mut detector = TroubleDetector::new();
        detector.recovery_count = 9;

        window(&mut detector, 0, 0);
        controller.evaluate(&mut detector, &profiling(1.0, 10.0));
        assert_eq!(controller.level(), 1);
        assert_eq!(detector.recovery_count, 9);
    }

    #[test]
    fn window_tallies_reset_after_evaluation() {
        let mut controller = FrameskipController::default();
        let mut detector = TroubleDetector::new();
        window(&mut detector, 500, 50);
        controller.evaluate(&mut detector, &ProfilingResults::new());
        assert_eq!(detector.successful_samples, 0);
        assert_eq!(detector.failed_samples, 0);
        assert_eq!(detector.frames_requested, 0);
    }
}
