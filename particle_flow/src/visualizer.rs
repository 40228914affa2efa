//! Software-rendered visualizer using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ PARTICLEFLOW                                    [FULLSCREEN] │
//! │ finger heart: OFF   v sign: ON                               │
//! │                                                              │
//! │ ┌ gesture control 85% ┐        . ·  ·.                       │
//! │ │█████████████░░░░    │      ·  ┌──────────┐ ·               │
//! │ ├ pattern ────────────┤     ·   │ I LOVE U │  ·              │
//! │ │ 1 2 3 4             │      ·  └──────────┘·                │
//! │ ├ color ──────────────┤        ·  . ·  ·                     │
//! │ │ ■ #00ffff           │                                      │
//! │ └─────────────────────┘                                      │
//! │ status line                                                  │
//! │ key legend                                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Particles are blended additively so dense regions glow.
//!
//! The mouse works the panel like the keyboard does: click a pattern cell,
//! the colour row or the fullscreen button.  Dragging anywhere else orbits
//! the camera; the scroll wheel zooms.

use std::f32::consts::TAU;
use std::sync::mpsc::Sender;
use std::time::Duration;

use hand_signals::{AppState, ParticlePattern};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Scale, Window, WindowOptions};
use tracing::info;

use crate::app::{AppError, UiAction};
use crate::particles::{ParticleField, Sprite};
use crate::source::{SimInput, SimPose};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:       usize = 1200;
pub const WIN_H:       usize = 720;
const TITLE:           &str  = "ParticleFlow - Gesture-Controlled 3D System";
const BG_COLOR:        u32   = 0xFF050505;
const PANEL_BG:        u32   = 0xFF14161C;
const PANEL_EDGE:      u32   = 0xFF2A2E38;
const TEXT:            u32   = 0xFFEEEEEE;
const TEXT_DIM:        u32   = 0xFF777777;
const ACCENT:          u32   = 0xFF22D3EE;  // cyan
const HEART_ON:        u32   = 0xFFF472B6;  // pink
const PANEL_X:         usize = 16;
const PANEL_Y:         usize = 84;
const PANEL_W:         usize = 260;
const PANEL_H:         usize = 200;
const BUTTON_W:        usize = 150;
const BUTTON_H:        usize = 28;
/// Each sprite contributes this fraction of its colour per covered pixel.
const SPRITE_GAIN:     f32   = 0.18;
const MAX_RADIUS:      f32   = 6.0;
const OPENNESS_STEP:   f32   = 0.05;

// ════════════════════════════════════════════════════════════════════════════
// Canvas — the framebuffer and its drawing primitives
// ════════════════════════════════════════════════════════════════════════════

pub struct Canvas {
    buf:    Vec<u32>,
    width:  usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Canvas { buf: vec![BG_COLOR; width * height], width, height }
    }

    pub fn width(&self)  -> usize  { self.width }
    pub fn height(&self) -> usize  { self.height }
    pub fn pixels(&self) -> &[u32] { &self.buf }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.buf[y * self.width + x])
    }

    pub fn clear(&mut self, color: u32) { self.buf.fill(color); }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.buf[y * self.width + x] = color;
        }
    }

    /// Additive blend of a linear RGB contribution, saturating at white.
    fn add_pixel(&mut self, x: usize, y: usize, rgb: [f32; 3], weight: f32) {
        if x >= self.width || y >= self.height { return; }
        let idx = y * self.width + x;
        let old = self.buf[idx];
        let add = |shift: u32, c: f32| {
            let cur = (old >> shift) & 0xFF;
            let inc = (c.max(0.0) * weight * 255.0) as u32;
            (cur + inc).min(0xFF) << shift
        };
        self.buf[idx] = 0xFF000000 | add(16, rgb[0]) | add(8, rgb[1]) | add(0, rgb[2]);
    }

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y + h).min(self.height) {
            for col in x..(x + w).min(self.width) {
                self.buf[row * self.width + col] = color;
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..x + w {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y + h - 1, color);
        }
        for row in y..y + h {
            self.set_pixel(x, row, color);
            self.set_pixel(x + w - 1, row, color);
        }
    }

    /// Soft round particle: full weight inside 60% of the radius, fading to
    /// zero at the edge.
    pub fn draw_sprite(&mut self, s: &Sprite) {
        let r = (s.size * 0.5).clamp(0.5, MAX_RADIUS);
        if s.x + r < 0.0 || s.y + r < 0.0 { return; }
        let (x0, x1) = ((s.x - r).floor().max(0.0) as usize, (s.x + r).ceil() as usize);
        let (y0, y1) = ((s.y - r).floor().max(0.0) as usize, (s.y + r).ceil() as usize);
        for y in y0..=y1.min(self.height.saturating_sub(1)) {
            for x in x0..=x1.min(self.width.saturating_sub(1)) {
                let dx = x as f32 + 0.5 - s.x;
                let dy = y as f32 + 0.5 - s.y;
                let d  = (dx * dx + dy * dy).sqrt() / (2.0 * r);
                if d > 0.5 { continue; }
                let alpha = 1.0 - smoothstep(0.3, 0.5, d);
                self.add_pixel(x, y, s.color, alpha * SPRITE_GAIN);
            }
        }
    }

    /// Bitmap text, `scale`× the 3×5 glyph size.
    pub fn draw_text(&mut self, text: &str, x: usize, y: usize, scale: usize, color: u32) {
        let scale = scale.max(1);
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx >= self.width { break; }
        }
    }
}

pub fn text_width(text: &str, scale: usize) -> usize {
    (text.chars().count() * 4 * scale.max(1)).saturating_sub(scale.max(1))
}

fn smoothstep(e0: f32, e1: f32, x: f32) -> f32 {
    let t = ((x - e0) / (e1 - e0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

// ════════════════════════════════════════════════════════════════════════════
// Clickable regions
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Rect {
    x: usize,
    y: usize,
    w: usize,
    h: usize,
}

impl Rect {
    fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x as f32 && py >= self.y as f32
            && px < (self.x + self.w) as f32 && py < (self.y + self.h) as f32
    }
}

const INNER_X: usize = PANEL_X + 12;
const INNER_W: usize = PANEL_W - 24;

fn panel() -> Rect { Rect { x: PANEL_X, y: PANEL_Y, w: PANEL_W, h: PANEL_H } }

fn pattern_cell(i: usize) -> Rect {
    let cell = INNER_W / ParticlePattern::ALL.len();
    Rect { x: INNER_X + i * cell, y: PANEL_Y + 90, w: cell - 4, h: 36 }
}

/// Swatch plus hex label; a click steps to the next preset.
fn color_row() -> Rect { Rect { x: INNER_X, y: PANEL_Y + 160, w: INNER_W, h: 24 } }

fn fullscreen_button(width: usize) -> Rect {
    Rect { x: width.saturating_sub(BUTTON_W + 16), y: 16, w: BUTTON_W, h: BUTTON_H }
}

/// The action behind a click at `(x, y)` on a canvas `width` wide.
pub fn hit_test(x: f32, y: f32, width: usize) -> Option<UiAction> {
    if fullscreen_button(width).contains(x, y) {
        return Some(UiAction::ToggleFullscreen);
    }
    if color_row().contains(x, y) {
        return Some(UiAction::CycleColor);
    }
    ParticlePattern::ALL
        .iter()
        .enumerate()
        .find(|(i, _)| pattern_cell(*i).contains(x, y))
        .map(|(_, &p)| UiAction::SelectPattern(p))
}

/// Left-button tracking: a press on a control clicks it once, a press
/// anywhere else outside the panel starts a camera drag.
#[derive(Debug, Default)]
pub struct Pointer {
    down: bool,
    /// Last position of an active drag.
    drag: Option<(f32, f32)>,
}

impl Pointer {
    /// Feed one frame of mouse state; `pos` is `None` outside the window.
    pub fn update(&mut self, pos: Option<(f32, f32)>, down: bool, width: usize, height: usize) -> Option<UiAction> {
        let pressed = down && !self.down;
        self.down = down;
        if !down {
            self.drag = None;
            return None;
        }
        let (x, y) = pos?;
        if pressed {
            if let Some(action) = hit_test(x, y, width) {
                return Some(action);
            }
            if !panel().contains(x, y) {
                self.drag = Some((x, y));
            }
            return None;
        }
        let (lx, ly) = self.drag?;
        self.drag = Some((x, y));
        let (dx, dy) = (x - lx, y - ly);
        if dx == 0.0 && dy == 0.0 { return None; }
        // A drag the full window height turns the camera once around.
        let h = height.max(1) as f32;
        Some(UiAction::Orbit { yaw: -TAU * dx / h, pitch: TAU * dy / h })
    }

    pub fn is_dragging(&self) -> bool { self.drag.is_some() }
}

// ════════════════════════════════════════════════════════════════════════════
// Overlay
// ════════════════════════════════════════════════════════════════════════════

fn on_off(on: bool) -> &'static str { if on { "ON" } else { "OFF" } }

/// Draw the UI overlay for `state` on top of whatever is in `canvas`.
pub fn draw_overlay(canvas: &mut Canvas, state: &AppState, status: &str) {
    // ── Header ────────────────────────────────────────────────────────────
    canvas.draw_text("PARTICLE", 16, 16, 4, TEXT);
    canvas.draw_text("FLOW", 16 + text_width("PARTICLE ", 4), 16, 4, ACCENT);
    canvas.draw_text("GESTURE-CONTROLLED 3D SYSTEM", 16, 42, 2, TEXT_DIM);

    let heart = format!("FINGER HEART: {}", on_off(state.is_finger_heart()));
    let v     = format!("V SIGN: {}", on_off(state.is_v_sign()));
    canvas.draw_text(&heart, 16, 62, 2, if state.is_finger_heart() { HEART_ON } else { TEXT_DIM });
    canvas.draw_text(&v, 16 + text_width(&heart, 2) + 24, 62, 2,
                     if state.is_v_sign() { ACCENT } else { TEXT_DIM });

    let button = fullscreen_button(canvas.width());
    let label  = if state.is_fullscreen() { "EXIT FULLSCREEN" } else { "FULLSCREEN" };
    canvas.fill_rect(button.x, button.y, button.w, button.h, PANEL_BG);
    canvas.draw_border(button.x, button.y, button.w, button.h, PANEL_EDGE);
    canvas.draw_text(label, button.x + (button.w - text_width(label, 2)) / 2, button.y + 9, 2, TEXT);

    // ── Control panel ─────────────────────────────────────────────────────
    let p = panel();
    canvas.fill_rect(p.x, p.y, p.w, p.h, PANEL_BG);
    canvas.draw_border(p.x, p.y, p.w, p.h, PANEL_EDGE);

    let (ix, iw) = (INNER_X, INNER_W);

    let pct = format!("{}%", (state.hand_openness() * 100.0).round() as u32);
    canvas.draw_text("GESTURE CONTROL", ix, PANEL_Y + 12, 2, TEXT);
    canvas.draw_text(&pct, ix + iw - text_width(&pct, 2), PANEL_Y + 12, 2, ACCENT);
    canvas.fill_rect(ix, PANEL_Y + 32, iw, 8, PANEL_EDGE);
    let filled = (iw as f32 * state.hand_openness().clamp(0.0, 1.0)) as usize;
    canvas.fill_rect(ix, PANEL_Y + 32, filled, 8, ACCENT);
    canvas.draw_text("OPEN/CLOSE HAND TO EXPAND", ix, PANEL_Y + 48, 1, TEXT_DIM);

    canvas.draw_text("PATTERN", ix, PANEL_Y + 70, 2, TEXT);
    for (i, pattern) in ParticlePattern::ALL.iter().enumerate() {
        let Rect { x, y, w, h } = pattern_cell(i);
        let selected = *pattern == state.particle_pattern();
        if selected { canvas.fill_rect(x, y, w, h, PANEL_EDGE); }
        canvas.draw_border(x, y, w, h, if selected { ACCENT } else { PANEL_EDGE });
        canvas.draw_text(&(i + 1).to_string(), x + 6, y + 6, 2, if selected { ACCENT } else { TEXT_DIM });
        canvas.draw_text(pattern.name(), x + 6, y + 24, 1, if selected { TEXT } else { TEXT_DIM });
    }

    canvas.draw_text("COLOR", ix, PANEL_Y + 140, 2, TEXT);
    let color = state.particle_color();
    let row = color_row();
    canvas.fill_rect(row.x, row.y, row.h, row.h, color.argb());
    canvas.draw_border(row.x, row.y, row.h, row.h, TEXT);
    canvas.draw_text(&color.to_string(), row.x + 36, row.y + 6, 2, TEXT);

    // ── V-sign banner ─────────────────────────────────────────────────────
    if state.is_v_sign() {
        draw_banner(canvas, "I LOVE U");
    }

    // ── Status + legend ───────────────────────────────────────────────────
    let sy = canvas.height().saturating_sub(40);
    canvas.draw_text(status, 16, sy, 2, TEXT);
    canvas.draw_text(
        "1-4=PATTERN  C=COLOR  F=FULLSCREEN  Q=QUIT  DRAG=ORBIT  SCROLL=ZOOM   SIM: O=OPEN K=FIST V=V-SIGN H=HEART N=NO HAND UP/DOWN=OPENNESS",
        16, sy + 20, 1, TEXT_DIM,
    );
}

fn draw_banner(canvas: &mut Canvas, text: &str) {
    let scale = 5;
    let tw = text_width(text, scale);
    let (bw, bh) = (tw + 48, 5 * scale + 32);
    let bx = canvas.width().saturating_sub(bw) / 2;
    let by = canvas.height().saturating_sub(bh) / 2;
    canvas.fill_rect(bx, by, bw, bh, PANEL_BG);
    canvas.draw_border(bx, by, bw, bh, PANEL_EDGE);
    canvas.draw_text(text, bx + 24, by + 16, scale, TEXT);
}

// ════════════════════════════════════════════════════════════════════════════
// Visualizer
// ════════════════════════════════════════════════════════════════════════════

pub struct Visualizer {
    window:     Window,
    canvas:     Canvas,
    sprites:    Vec<Sprite>,
    pointer:    Pointer,
    /// Keyboard hand simulation, when that source is active.
    sim_tx:     Option<Sender<SimInput>>,
    fullscreen: bool,
}

fn open_window(fullscreen: bool) -> Result<Window, AppError> {
    let opts = if fullscreen {
        WindowOptions {
            borderless: true,
            topmost:    true,
            scale:      Scale::FitScreen,
            ..WindowOptions::default()
        }
    } else {
        WindowOptions { resize: false, ..WindowOptions::default() }
    };
    let mut window = Window::new(TITLE, WIN_W, WIN_H, opts)
        .map_err(|e| AppError::Window(e.to_string()))?;
    if fullscreen { window.set_position(0, 0); }
    window.limit_update_rate(Some(Duration::from_millis(16))); // ~60fps
    Ok(window)
}

impl Visualizer {
    pub fn new(sim_tx: Option<Sender<SimInput>>, fullscreen: bool) -> Result<Self, AppError> {
        Ok(Visualizer {
            window:  open_window(fullscreen)?,
            canvas:  Canvas::new(WIN_W, WIN_H),
            sprites: Vec::new(),
            pointer: Pointer::default(),
            sim_tx,
            fullscreen,
        })
    }

    pub fn is_open(&self) -> bool { self.window.is_open() }

    /// Re-create the window to match `fullscreen`.  No-op when it already does.
    pub fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), AppError> {
        if fullscreen == self.fullscreen { return Ok(()); }
        self.window     = open_window(fullscreen)?;
        self.fullscreen = fullscreen;
        info!(fullscreen, "window re-created");
        Ok(())
    }

    /// Poll keyboard and mouse input.  UI keys, clicks, drags and scrolls
    /// come back as actions; simulation keys go straight to the simulated hand.
    pub fn poll_input(&mut self) -> Vec<UiAction> {
        let mut actions = Vec::new();
        if !self.window.is_open() {
            actions.push(UiAction::Quit);
            return actions;
        }

        // Keys that trigger on first press only
        let one_shot = |k: Key| self.window.is_key_pressed(k, KeyRepeat::No);
        // Keys that repeat while held
        let held     = |k: Key| self.window.is_key_pressed(k, KeyRepeat::Yes);

        if one_shot(Key::Q) || one_shot(Key::Escape) { actions.push(UiAction::Quit); }
        for (key, pattern) in [Key::Key1, Key::Key2, Key::Key3, Key::Key4]
            .into_iter()
            .zip(ParticlePattern::ALL)
        {
            if one_shot(key) { actions.push(UiAction::SelectPattern(pattern)); }
        }
        if one_shot(Key::C) { actions.push(UiAction::CycleColor); }
        if one_shot(Key::F) { actions.push(UiAction::ToggleFullscreen); }

        let pos  = self.window.get_mouse_pos(MouseMode::Discard);
        let down = self.window.get_mouse_down(MouseButton::Left);
        if let Some(action) = self.pointer.update(pos, down, self.canvas.width(), self.canvas.height()) {
            actions.push(action);
        }
        if let Some((_, dy)) = self.window.get_scroll_wheel() {
            if dy != 0.0 { actions.push(UiAction::Zoom(dy)); }
        }

        let mut sim = Vec::new();
        if one_shot(Key::O) { sim.push(SimInput::Pose(SimPose::Open)); }
        if one_shot(Key::K) { sim.push(SimInput::Pose(SimPose::Fist)); }
        if one_shot(Key::V) { sim.push(SimInput::Pose(SimPose::VSign)); }
        if one_shot(Key::H) { sim.push(SimInput::Pose(SimPose::FingerHeart)); }
        if one_shot(Key::N) { sim.push(SimInput::HideHand); }
        if held(Key::Up)    { sim.push(SimInput::AdjustOpenness(OPENNESS_STEP)); }
        if held(Key::Down)  { sim.push(SimInput::AdjustOpenness(-OPENNESS_STEP)); }

        if let Some(tx) = &self.sim_tx {
            for input in sim {
                let _ = tx.send(input);
            }
        }
        actions
    }

    /// Render one frame.
    pub fn render(&mut self, state: &AppState, field: &ParticleField, status: &str) -> Result<(), AppError> {
        self.canvas.clear(BG_COLOR);

        field.project(self.canvas.width(), self.canvas.height(), &mut self.sprites);
        for s in &self.sprites {
            self.canvas.draw_sprite(s);
        }
        draw_overlay(&mut self.canvas, state, status);

        self.window
            .update_with_buffer(self.canvas.pixels(), self.canvas.width(), self.canvas.height())
            .map_err(|e| AppError::Window(e.to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '#' => [0b101, 0b111, 0b101, 0b111, 0b101],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
