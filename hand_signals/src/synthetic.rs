//! Synthetic hand poses.
//!
//! A small, hand-measured skeleton that can be posed finger by finger and
//! then placed in image space.  The simulator uses it to stand in for a
//! real landmark detector; the tests use it to build classifier scenarios.
//!
//! Poses are authored in a local frame (wrist at the origin, fingers along
//! +y, palm facing −z) and converted to image coordinates, where y grows
//! downward, by [`SyntheticHand::landmarks`].

use crate::landmarks::{
    Finger, HandFrame, Landmark, LANDMARK_COUNT, THUMB_CMC, THUMB_IP, THUMB_MCP, THUMB_TIP, WRIST,
};

// ════════════════════════════════════════════════════════════════════════════
// Skeleton measurements (local units; palm size = 0.10)
// ════════════════════════════════════════════════════════════════════════════

/// MCP knuckle of index, middle, ring, pinky.
const KNUCKLES: [[f32; 3]; 4] = [
    [-0.025, 0.095, 0.0],
    [ 0.000, 0.100, 0.0],
    [ 0.022, 0.093, 0.0],
    [ 0.042, 0.082, 0.0],
];

/// Phalanx lengths (MCP→PIP, PIP→DIP, DIP→tip).
const PHALANGES: [[f32; 3]; 4] = [
    [0.045, 0.030, 0.027],
    [0.050, 0.033, 0.030],
    [0.047, 0.031, 0.027],
    [0.038, 0.025, 0.022],
];

/// PIP, DIP and tip of a fully curled finger, relative to its knuckle.
const CURLED: [[f32; 3]; 3] = [
    [0.0,  0.030, -0.025],
    [0.0,  0.015, -0.045],
    [0.0, -0.010, -0.035],
];

/// Thumb CMC, MCP, IP, tip when reaching out.
const THUMB_OUT: [[f32; 3]; 4] = [
    [-0.025, 0.025, 0.0],
    [-0.055, 0.050, 0.0],
    [-0.080, 0.075, 0.0],
    [-0.100, 0.100, 0.0],
];

/// Thumb folded across the middle phalanges.
const THUMB_TUCKED: [[f32; 3]; 4] = [
    [-0.025, 0.025,  0.000],
    [-0.035, 0.045, -0.015],
    [-0.010, 0.050, -0.035],
    [ 0.010, 0.050, -0.040],
];

/// Where the thumb tip sits relative to the index tip when pinching.
const PINCH_OFFSET: [f32; 3] = [-0.010, 0.005, 0.0];

fn lm(p: [f32; 3]) -> Landmark { Landmark::new(p[0], p[1], p[2]) }

fn offset(base: Landmark, d: [f32; 3]) -> Landmark {
    Landmark::new(base.x + d[0], base.y + d[1], base.z + d[2])
}

// ════════════════════════════════════════════════════════════════════════════
// ThumbPose
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ThumbPose {
    /// Fully out to the side.
    Extended,
    /// Folded across the palm.
    Tucked,
    /// Tip touching the index fingertip.
    Pinch,
    /// Partway between tucked (0.0) and extended (1.0).
    Reach(f32),
}

// ════════════════════════════════════════════════════════════════════════════
// SyntheticHand
// ════════════════════════════════════════════════════════════════════════════

/// A posable hand.  Builder-style: start from a named pose and adjust.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticHand {
    /// Curl per finger (index..pinky): 0.0 = straight, 1.0 = fully curled.
    curls:  [f32; 4],
    thumb:  ThumbPose,
    /// Image-space wrist position.
    origin: Landmark,
    scale:  f32,
    /// In-plane rotation (radians) about the wrist.
    roll:   f32,
}

impl SyntheticHand {
    fn posed(curls: [f32; 4], thumb: ThumbPose) -> Self {
        SyntheticHand {
            curls,
            thumb,
            origin: Landmark::new(0.5, 0.8, 0.0),
            scale:  1.0,
            roll:   0.0,
        }
    }

    pub fn open() -> Self { Self::open_amount(1.0) }

    /// All fingers uniformly between fist (0.0) and open (1.0).
    pub fn open_amount(amount: f32) -> Self {
        let a = sanitize(amount, 1.0).clamp(0.0, 1.0);
        Self::posed([1.0 - a; 4], ThumbPose::Reach(a))
    }

    pub fn fist() -> Self { Self::posed([1.0; 4], ThumbPose::Tucked) }

    pub fn v_sign() -> Self { Self::posed([0.0, 0.0, 1.0, 1.0], ThumbPose::Tucked) }

    pub fn finger_heart() -> Self { Self::posed([1.0; 4], ThumbPose::Pinch) }

    pub fn with_curl(mut self, finger: Finger, curl: f32) -> Self {
        self.curls[finger_slot(finger)] = sanitize(curl, 0.0).clamp(0.0, 1.0);
        self
    }

    pub fn with_thumb(mut self, thumb: ThumbPose) -> Self {
        self.thumb = thumb;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = sanitize(scale, 1.0);
        self
    }

    pub fn with_roll(mut self, radians: f32) -> Self {
        self.roll = sanitize(radians, 0.0);
        self
    }

    pub fn with_origin(mut self, x: f32, y: f32) -> Self {
        self.origin = Landmark::new(sanitize(x, 0.5), sanitize(y, 0.8), 0.0);
        self
    }

    pub fn curl(&self, finger: Finger) -> f32 { self.curls[finger_slot(finger)] }
    pub fn thumb(&self) -> ThumbPose { self.thumb }

    /// The 21 points in image space.
    pub fn landmarks(&self) -> [Landmark; LANDMARK_COUNT] {
        let local = self.local_points();
        let (s, c) = self.roll.sin_cos();
        let mut out = [Landmark::default(); LANDMARK_COUNT];
        for (dst, p) in out.iter_mut().zip(local.iter()) {
            // Local +y is "up" the hand; image y grows downward.
            let x =  p.x * self.scale;
            let y = -p.y * self.scale;
            *dst = Landmark::new(
                self.origin.x + x * c - y * s,
                self.origin.y + x * s + y * c,
                self.origin.z + p.z * self.scale,
            );
        }
        out
    }

    pub fn frame(&self) -> HandFrame {
        HandFrame::from_array(self.landmarks())
    }

    fn local_points(&self) -> [Landmark; LANDMARK_COUNT] {
        let mut pts = [Landmark::default(); LANDMARK_COUNT];
        pts[WRIST] = Landmark::default();

        for finger in Finger::ALL {
            let slot  = finger_slot(finger);
            let knuck = lm(KNUCKLES[slot]);
            let [l1, l2, l3] = PHALANGES[slot];
            let straight = [
                offset(knuck, [0.0, l1, 0.0]),
                offset(knuck, [0.0, l1 + l2, 0.0]),
                offset(knuck, [0.0, l1 + l2 + l3, 0.0]),
            ];
            let curl = self.curls[slot];
            pts[finger.mcp()] = knuck;
            for (j, joint) in straight.iter().enumerate() {
                pts[finger.mcp() + 1 + j] = joint.lerp(&offset(knuck, CURLED[j]), curl);
            }
        }

        let thumb = match self.thumb {
            ThumbPose::Extended => thumb_reach(1.0),
            ThumbPose::Tucked   => thumb_reach(0.0),
            ThumbPose::Reach(a) => thumb_reach(sanitize(a, 0.0).clamp(0.0, 1.0)),
            ThumbPose::Pinch    => {
                let tip = offset(pts[Finger::Index.tip()], PINCH_OFFSET);
                let mcp = Landmark::new(-0.050, 0.050, -0.005);
                [lm(THUMB_TUCKED[0]), mcp, mcp.lerp(&tip, 0.5), tip]
            }
        };
        pts[THUMB_CMC] = thumb[0];
        pts[THUMB_MCP] = thumb[1];
        pts[THUMB_IP]  = thumb[2];
        pts[THUMB_TIP] = thumb[3];
        pts
    }
}

fn thumb_reach(a: f32) -> [Landmark; 4] {
    let mut out = [Landmark::default(); 4];
    for (j, dst) in out.iter_mut().enumerate() {
        *dst = lm(THUMB_TUCKED[j]).lerp(&lm(THUMB_OUT[j]), a);
    }
    out
}

fn finger_slot(finger: Finger) -> usize {
    match finger {
        Finger::Index  => 0,
        Finger::Middle => 1,
        Finger::Ring   => 2,
        Finger::Pinky  => 3,
    }
}

fn sanitize(v: f32, fallback: f32) -> f32 {
    if v.is_finite() { v } else { fallback }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{INDEX_TIP, MIDDLE_MCP, MIDDLE_TIP};

    #[test]
    fn palm_size_scales() {
        let f = SyntheticHand::open().frame();
        assert!((f.distance(MIDDLE_MCP, WRIST) - 0.10).abs() < 1e-5);
        let f = SyntheticHand::open().with_scale(2.0).frame();
        assert!((f.distance(MIDDLE_MCP, WRIST) - 0.20).abs() < 1e-5);
    }

    #[test]
    fn fingers_point_up_in_image() {
        let f = SyntheticHand::open().frame();
        assert!(f.point(MIDDLE_TIP).y < f.wrist().y);
        assert!((f.wrist().x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn pinch_puts_thumb_on_index() {
        let f = SyntheticHand::finger_heart().frame();
        assert!(f.distance(THUMB_TIP, INDEX_TIP) < 0.02);
    }

    #[test]
    fn roll_preserves_distances() {
        let a = SyntheticHand::v_sign().frame();
        let b = SyntheticHand::v_sign().with_roll(1.1).with_origin(0.3, 0.6).frame();
        for i in 0..LANDMARK_COUNT {
            assert!((a.distance(i, WRIST) - b.distance(i, WRIST)).abs() < 1e-5);
        }
    }

    #[test]
    fn curl_is_clamped() {
        let h = SyntheticHand::open().with_curl(Finger::Ring, 3.0).with_curl(Finger::Index, f32::NAN);
        assert_eq!(h.curl(Finger::Ring), 1.0);
        assert_eq!(h.curl(Finger::Index), 0.0);
    }
}
