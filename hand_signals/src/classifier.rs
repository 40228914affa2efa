//! Per-frame gesture classification.
//!
//! Pure and stateless: the same [`HandFrame`] always yields the same
//! [`GestureSignals`].  Every measure is a ratio of distances to the wrist
//! (or to palm size), so results do not depend on where the hand sits in
//! the image, how far it is from the camera, or which way it points.
//!
//! # Algorithm
//!
//! * **Openness**: mean fingertip-to-wrist distance divided by palm size
//!   (middle MCP to wrist), mapped linearly from `[min_ratio, max_ratio]`
//!   onto `[0, 1]` and clamped.
//! * **Extended**: a finger's tip is farther from the wrist than its PIP
//!   joint by more than `extension_margin`.
//! * **V-sign**: index + middle extended, ring + pinky not.  Thumb ignored.
//! * **Finger-heart**: thumb tip within `heart_pinch_ratio × palm size` of
//!   the index tip, middle + ring + pinky not extended.

use crate::landmarks::{Finger, HandFrame, FINGERTIPS, INDEX_TIP, MIDDLE_MCP, THUMB_TIP, WRIST};

// ════════════════════════════════════════════════════════════════════════════
// ClassifierConfig
// ════════════════════════════════════════════════════════════════════════════

/// Thresholds (empirically tuned, not calibrated per user).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifierConfig {
    /// Tip/palm ratio at (and below) which the hand counts as fully closed.
    pub min_ratio:         f32,
    /// Tip/palm ratio at (and above) which the hand counts as fully open.
    pub max_ratio:         f32,
    /// Margin, in landmark units, by which a tip must out-reach its PIP.
    pub extension_margin:  f32,
    /// Thumb-tip to index-tip distance, as a fraction of palm size.
    pub heart_pinch_ratio: f32,
    /// Palm sizes below this are clamped up before dividing.
    pub min_palm_size:     f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            min_ratio:         0.9,
            max_ratio:         2.0,
            extension_margin:  0.015,
            heart_pinch_ratio: 0.35,
            min_palm_size:     1e-6,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// GestureSignals
// ════════════════════════════════════════════════════════════════════════════

/// Raw (un-debounced) signals for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureSignals {
    /// 0.0 = closed fist, 1.0 = fully open.
    pub openness:     f32,
    pub v_sign:       bool,
    pub finger_heart: bool,
}

// ════════════════════════════════════════════════════════════════════════════
// Classification
// ════════════════════════════════════════════════════════════════════════════

pub fn classify(frame: &HandFrame, cfg: &ClassifierConfig) -> GestureSignals {
    let palm = palm_size(frame, cfg);

    let index  = is_finger_extended(frame, Finger::Index,  cfg.extension_margin);
    let middle = is_finger_extended(frame, Finger::Middle, cfg.extension_margin);
    let ring   = is_finger_extended(frame, Finger::Ring,   cfg.extension_margin);
    let pinky  = is_finger_extended(frame, Finger::Pinky,  cfg.extension_margin);

    let v_sign = index && middle && !ring && !pinky;

    let pinch = frame.distance(THUMB_TIP, INDEX_TIP) / palm;
    let finger_heart = pinch < cfg.heart_pinch_ratio && !middle && !ring && !pinky;

    GestureSignals {
        openness: openness(frame, cfg),
        v_sign,
        finger_heart,
    }
}

/// Openness fraction for one frame, always within `[0, 1]`.
pub fn openness(frame: &HandFrame, cfg: &ClassifierConfig) -> f32 {
    let palm = palm_size(frame, cfg);
    let total: f32 = FINGERTIPS.iter().map(|&tip| frame.distance(tip, WRIST)).sum();
    let avg = total / FINGERTIPS.len() as f32;
    openness_from_ratio(avg / palm, cfg.min_ratio, cfg.max_ratio)
}

/// Map a tip/palm ratio linearly from `[min, max]` onto `[0, 1]`, clamping.
///
/// A non-finite ratio yields 0.  If `max <= min` the map degrades to a step
/// at `min`.
pub fn openness_from_ratio(ratio: f32, min: f32, max: f32) -> f32 {
    if !ratio.is_finite() { return 0.0; }
    if max <= min {
        return if ratio >= min { 1.0 } else { 0.0 };
    }
    ((ratio - min) / (max - min)).clamp(0.0, 1.0)
}

/// True if the finger's tip is farther from the wrist than its PIP joint
/// by more than `margin`.
pub fn is_finger_extended(frame: &HandFrame, finger: Finger, margin: f32) -> bool {
    frame.distance(finger.tip(), WRIST) > frame.distance(finger.pip(), WRIST) + margin
}

fn palm_size(frame: &HandFrame, cfg: &ClassifierConfig) -> f32 {
    frame.distance(MIDDLE_MCP, WRIST).max(cfg.min_palm_size)
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
