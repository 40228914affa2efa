//! Classify → debounce for one tick.

use tracing::debug;

use crate::classifier::{classify, ClassifierConfig, GestureSignals};
use crate::debounce::{DebounceBank, Signal, DEFAULT_THRESHOLD};
use crate::landmarks::HandFrame;

/// What one tick commits to application state.
///
/// `None` fields are left untouched by [`crate::state::AppState::apply_gestures`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameUpdate {
    pub openness:     Option<f32>,
    pub v_sign:       Option<bool>,
    pub finger_heart: Option<bool>,
}

impl FrameUpdate {
    pub fn is_empty(&self) -> bool {
        self.openness.is_none() && self.v_sign.is_none() && self.finger_heart.is_none()
    }
}

/// Gesture classifier plus its debounce counters.  Built once when the
/// tracker starts and owned by it for the tracker's lifetime.
#[derive(Clone, Debug)]
pub struct GesturePipeline {
    classifier: ClassifierConfig,
    debounce:   DebounceBank,
}

impl GesturePipeline {
    pub fn new(classifier: ClassifierConfig, threshold: u32) -> Self {
        GesturePipeline {
            classifier,
            debounce: DebounceBank::new(threshold),
        }
    }

    /// Process one tick.  `None` (no hand this frame) yields an empty
    /// update and leaves the counters untouched.
    pub fn process(&mut self, frame: Option<&HandFrame>) -> FrameUpdate {
        let Some(frame) = frame else { return FrameUpdate::default() };

        let GestureSignals { openness, v_sign, finger_heart } = classify(frame, &self.classifier);

        let v_commit     = self.debounce.update(Signal::VSign, v_sign);
        let heart_commit = self.debounce.update(Signal::FingerHeart, finger_heart);

        for (signal, commit) in [(Signal::VSign, v_commit), (Signal::FingerHeart, heart_commit)] {
            if let Some(value) = commit {
                debug!(signal = signal.name(), value, "gesture committed");
            }
        }

        FrameUpdate {
            openness:     Some(openness),
            v_sign:       v_commit,
            finger_heart: heart_commit,
        }
    }

    pub fn classifier(&self) -> &ClassifierConfig { &self.classifier }
    pub fn debounce(&self) -> &DebounceBank { &self.debounce }
}

impl Default for GesturePipeline {
    fn default() -> Self {
        GesturePipeline::new(ClassifierConfig::default(), DEFAULT_THRESHOLD)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticHand;

    #[test]
    fn no_hand_is_empty_and_keeps_counters() {
        let mut p = GesturePipeline::default();
        let v = SyntheticHand::v_sign().frame();
        p.process(Some(&v));
        p.process(Some(&v));
        let before = p.debounce().clone();
        let up = p.process(None);
        assert!(up.is_empty());
        assert_eq!(p.debounce(), &before);
        // The gap does not break the run: the next V-sign frame is the third.
        assert_eq!(p.process(Some(&v)).v_sign, Some(true));
    }

    #[test]
    fn openness_is_reported_every_frame() {
        let mut p = GesturePipeline::default();
        let up = p.process(Some(&SyntheticHand::fist().frame()));
        assert_eq!(up.openness, Some(0.0));
        assert_eq!(up.v_sign, None);
    }

    #[test]
    fn v_sign_commits_on_third_frame() {
        let mut p = GesturePipeline::default();
        let v = SyntheticHand::v_sign().frame();
        assert_eq!(p.process(Some(&v)).v_sign, None);
        assert_eq!(p.process(Some(&v)).v_sign, None);
        assert_eq!(p.process(Some(&v)).v_sign, Some(true));
        assert_eq!(p.process(Some(&v)).v_sign, None);
    }

    #[test]
    fn heart_then_release() {
        let mut p = GesturePipeline::new(ClassifierConfig::default(), 2);
        let heart = SyntheticHand::finger_heart().frame();
        let open  = SyntheticHand::open().frame();
        // Initial counters sit at (false, 0); the first two open frames
        // re-commit false.
        p.process(Some(&open));
        assert_eq!(p.process(Some(&open)).finger_heart, Some(false));
        p.process(Some(&heart));
        assert_eq!(p.process(Some(&heart)).finger_heart, Some(true));
        p.process(Some(&open));
        assert_eq!(p.process(Some(&open)).finger_heart, Some(false));
    }
}
