//! Application state store shared by the gesture pipeline, the renderer and
//! the UI.
//!
//! One writer per field:
//!
//! | Field | Writer |
//! |---|---|
//! | `hand_openness`, `is_v_sign`, `is_finger_heart` | gesture pipeline, via [`AppState::apply_gestures`] |
//! | `particle_color`, `particle_pattern`, `is_fullscreen` | UI, via the `set_*` / `toggle_*` methods |
//!
//! Everyone else reads.  Each effective change bumps [`AppState::revision`]
//! and is queued as a [`StateChange`] for observers to drain.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::pipeline::FrameUpdate;

// ════════════════════════════════════════════════════════════════════════════
// ParticlePattern
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ParticlePattern {
    #[default]
    Sphere,
    Cube,
    Torus,
    Galaxy,
}

impl ParticlePattern {
    pub const ALL: [ParticlePattern; 4] = [
        ParticlePattern::Sphere,
        ParticlePattern::Cube,
        ParticlePattern::Torus,
        ParticlePattern::Galaxy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParticlePattern::Sphere => "sphere",
            ParticlePattern::Cube   => "cube",
            ParticlePattern::Torus  => "torus",
            ParticlePattern::Galaxy => "galaxy",
        }
    }

    /// Next pattern in selector order, wrapping.
    pub fn next(self) -> Self {
        let i = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for ParticlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseStateError {
    #[error("unknown pattern {0:?} (expected sphere, cube, torus or galaxy)")]
    Pattern(String),
    #[error("invalid hex color {0:?} (expected #rrggbb or #rgb)")]
    Color(String),
}

impl FromStr for ParticlePattern {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStateError::Pattern(s.to_string()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HexColor
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self { HexColor { r, g, b } }

    /// Packed opaque ARGB (0xFFRRGGBB), the framebuffer format.
    pub fn argb(self) -> u32 {
        0xFF000000 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Channels as 0.0–1.0 floats.
    pub fn to_f32(self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }
}

impl Default for HexColor {
    fn default() -> Self { HexColor::new(0x00, 0xFF, 0xFF) }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for HexColor {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseStateError::Color(s.to_string());
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(err());
        }
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map_err(|_| err());
        let byte   = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        match hex.len() {
            6 => Ok(HexColor::new(byte(0)?, byte(2)?, byte(4)?)),
            3 => Ok(HexColor::new(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17)),
            _ => Err(err()),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// StateChange
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum StateChange {
    Openness(f32),
    VSign(bool),
    FingerHeart(bool),
    Color(HexColor),
    Pattern(ParticlePattern),
    Fullscreen(bool),
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct AppState {
    // ── gesture-owned ─────────────────────────────────────────────────────
    hand_openness:    f32,
    is_v_sign:        bool,
    is_finger_heart:  bool,

    // ── UI-owned ──────────────────────────────────────────────────────────
    particle_color:   HexColor,
    particle_pattern: ParticlePattern,
    is_fullscreen:    bool,

    // ── observation ───────────────────────────────────────────────────────
    revision: u64,
    changes:  Vec<StateChange>,
}

impl Default for AppState {
    fn default() -> Self {
        AppState {
            hand_openness:    1.0,
            is_v_sign:        false,
            is_finger_heart:  false,
            particle_color:   HexColor::default(),
            particle_pattern: ParticlePattern::default(),
            is_fullscreen:    false,
            revision:         0,
            changes:          Vec::new(),
        }
    }
}

impl AppState {
    pub fn new(color: HexColor, pattern: ParticlePattern) -> Self {
        AppState {
            particle_color:   color,
            particle_pattern: pattern,
            ..AppState::default()
        }
    }

    // ── readers ───────────────────────────────────────────────────────────

    pub fn hand_openness(&self)    -> f32             { self.hand_openness }
    pub fn is_v_sign(&self)        -> bool            { self.is_v_sign }
    pub fn is_finger_heart(&self)  -> bool            { self.is_finger_heart }
    pub fn particle_color(&self)   -> HexColor        { self.particle_color }
    pub fn particle_pattern(&self) -> ParticlePattern { self.particle_pattern }
    pub fn is_fullscreen(&self)    -> bool            { self.is_fullscreen }
    pub fn revision(&self)         -> u64             { self.revision }

    /// Take the queued changes since the last drain.
    pub fn drain_changes(&mut self) -> Vec<StateChange> {
        std::mem::take(&mut self.changes)
    }

    // ── gesture writer ────────────────────────────────────────────────────

    /// Apply one tick of the gesture pipeline.  Absent fields are kept.
    pub fn apply_gestures(&mut self, update: &FrameUpdate) {
        if let Some(o) = update.openness {
            let o = if o.is_finite() { o.clamp(0.0, 1.0) } else { self.hand_openness };
            if o != self.hand_openness {
                self.hand_openness = o;
                self.record(StateChange::Openness(o));
            }
        }
        if let Some(v) = update.v_sign {
            if v != self.is_v_sign {
                self.is_v_sign = v;
                self.record(StateChange::VSign(v));
            }
        }
        if let Some(h) = update.finger_heart {
            if h != self.is_finger_heart {
                self.is_finger_heart = h;
                self.record(StateChange::FingerHeart(h));
            }
        }
    }

    // ── UI writers ────────────────────────────────────────────────────────

    pub fn set_particle_color(&mut self, color: HexColor) {
        if color != self.particle_color {
            self.particle_color = color;
            self.record(StateChange::Color(color));
        }
    }

    pub fn set_particle_pattern(&mut self, pattern: ParticlePattern) {
        if pattern != self.particle_pattern {
            self.particle_pattern = pattern;
            self.record(StateChange::Pattern(pattern));
        }
    }

    pub fn toggle_fullscreen(&mut self) {
        self.is_fullscreen = !self.is_fullscreen;
        self.record(StateChange::Fullscreen(self.is_fullscreen));
    }

    fn record(&mut self, change: StateChange) {
        self.revision += 1;
        self.changes.push(change);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
