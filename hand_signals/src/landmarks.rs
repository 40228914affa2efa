//! Hand landmark data model.
//!
//! A detected hand is exactly [`LANDMARK_COUNT`] points in normalized,
//! image-relative coordinates, numbered by the usual 21-point anatomical
//! layout (0 = wrist, 4/8/12/16/20 = fingertips thumb → pinky).

use serde::Deserialize;
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// Anatomical indices
// ════════════════════════════════════════════════════════════════════════════

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST:      usize = 0;
pub const THUMB_CMC:  usize = 1;
pub const THUMB_MCP:  usize = 2;
pub const THUMB_IP:   usize = 3;
pub const THUMB_TIP:  usize = 4;
pub const INDEX_MCP:  usize = 5;
pub const INDEX_PIP:  usize = 6;
pub const INDEX_DIP:  usize = 7;
pub const INDEX_TIP:  usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP:   usize = 13;
pub const RING_PIP:   usize = 14;
pub const RING_DIP:   usize = 15;
pub const RING_TIP:   usize = 16;
pub const PINKY_MCP:  usize = 17;
pub const PINKY_PIP:  usize = 18;
pub const PINKY_DIP:  usize = 19;
pub const PINKY_TIP:  usize = 20;

/// Fingertip indices, thumb first.
pub const FINGERTIPS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];

/// The four non-thumb fingers, each with a tip and a PIP joint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    pub fn tip(self) -> usize {
        match self {
            Finger::Index  => INDEX_TIP,
            Finger::Middle => MIDDLE_TIP,
            Finger::Ring   => RING_TIP,
            Finger::Pinky  => PINKY_TIP,
        }
    }

    pub fn pip(self) -> usize {
        match self {
            Finger::Index  => INDEX_PIP,
            Finger::Middle => MIDDLE_PIP,
            Finger::Ring   => RING_PIP,
            Finger::Pinky  => PINKY_PIP,
        }
    }

    pub fn mcp(self) -> usize {
        match self {
            Finger::Index  => INDEX_MCP,
            Finger::Middle => MIDDLE_MCP,
            Finger::Ring   => RING_MCP,
            Finger::Pinky  => PINKY_MCP,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Landmark
// ════════════════════════════════════════════════════════════════════════════

/// One tracked point.  Units are image-relative, not world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }

    /// Euclidean distance in landmark space.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx*dx + dy*dy + dz*dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Linear interpolation; `t` = 0.0 → `self`, `t` = 1.0 → `other`.
    pub fn lerp(&self, other: &Landmark, t: f32) -> Landmark {
        Landmark {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HandFrame
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LandmarkError {
    #[error("expected 21 landmarks, got {0}")]
    WrongCount(usize),
    #[error("landmark {index} has a non-finite coordinate")]
    NonFinite { index: usize },
}

/// One frame's worth of landmarks for a single detected hand.
///
/// Only constructible through [`HandFrame::new`], so every instance is
/// guaranteed to hold exactly 21 finite points and indexing by the
/// anatomical constants can never go out of bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct HandFrame {
    points: [Landmark; LANDMARK_COUNT],
}

impl HandFrame {
    pub fn new(points: &[Landmark]) -> Result<Self, LandmarkError> {
        let points: [Landmark; LANDMARK_COUNT] = points
            .try_into()
            .map_err(|_| LandmarkError::WrongCount(points.len()))?;
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(LandmarkError::NonFinite { index });
        }
        Ok(HandFrame { points })
    }

    /// For in-crate producers that build finite points by construction.
    pub(crate) fn from_array(points: [Landmark; LANDMARK_COUNT]) -> Self {
        debug_assert!(points.iter().all(Landmark::is_finite));
        HandFrame { points }
    }

    pub fn point(&self, index: usize) -> &Landmark { &self.points[index] }
    pub fn points(&self) -> &[Landmark] { &self.points }
    pub fn wrist(&self) -> &Landmark { &self.points[WRIST] }

    /// Distance between two landmarks by anatomical index.
    pub fn distance(&self, a: usize, b: usize) -> f32 {
        self.points[a].distance(&self.points[b])
    }

    /// Apply `f` to every point.  Used by the simulator to place a pose
    /// in image space and by tests to check orientation invariance.
    pub fn map(&self, mut f: impl FnMut(&Landmark) -> Landmark) -> HandFrame {
        let mut points = self.points;
        for p in points.iter_mut() {
            *p = f(p);
        }
        HandFrame { points }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
