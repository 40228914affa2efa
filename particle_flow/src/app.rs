//! Top-level application loop.
//!
//! [`App`] owns the [`AppState`] store and the [`ParticleField`].  Each frame
//! it applies UI actions (the store's UI writers) and tracker events (the
//! store's gesture writer), drains the store's change log into the status
//! line, and advances the particle field.  Camera drags and scrolls go to
//! the field directly; they are view state, not store state.  [`run`] wires it to a window and
//! a tracker thread.

use std::sync::mpsc::{self, Sender};
use std::time::Instant;

use clap::ValueEnum;
use hand_signals::{AppState, HexColor, ParticlePattern, StateChange};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::particles::{ParticleField, PARTICLE_COUNT};
use crate::source::{HelperLandmarkSource, LandmarkSource, SimInput, SimLandmarkSource, SourceError};
use crate::tracker::{Tracker, TrackerConfig, TrackerEvent};
use crate::visualizer::Visualizer;

// ════════════════════════════════════════════════════════════════════════════
// Errors
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum AppError {
    #[error("window: {0}")]
    Window(String),
    #[error("configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("could not start tracker thread: {0}")]
    Thread(#[from] std::io::Error),
}

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Where hand landmarks come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    /// Keyboard-driven synthetic hand.
    #[default]
    Sim,
    /// External detector process speaking JSON lines.
    Helper,
    /// LeapMotion controller (needs the `leap` feature).
    Leap,
}

/// Configuration for the full application.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub source:         SourceKind,
    /// Program and arguments of the detector process for [`SourceKind::Helper`].
    pub helper_cmd:     Vec<String>,
    /// Hands scored below this by the helper are ignored.
    pub min_score:      f32,
    pub tracker:        TrackerConfig,
    pub particle_count: usize,
    pub color:          HexColor,
    pub pattern:        ParticlePattern,
    pub fullscreen:     bool,
    /// Fixed particle layout seed; `None` for a fresh layout each run.
    pub seed:           Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            source:         SourceKind::Sim,
            helper_cmd:     Vec::new(),
            min_score:      0.5,
            tracker:        TrackerConfig::default(),
            particle_count: PARTICLE_COUNT,
            color:          HexColor::default(),
            pattern:        ParticlePattern::default(),
            fullscreen:     false,
            seed:           None,
        }
    }
}

/// Colours stepped through by the `C` key.
pub const COLOR_PRESETS: [HexColor; 6] = [
    HexColor::new(0x00, 0xFF, 0xFF),
    HexColor::new(0xFF, 0x4F, 0xD8),
    HexColor::new(0xFF, 0xD7, 0x00),
    HexColor::new(0x7C, 0xFF, 0x6B),
    HexColor::new(0x9B, 0x6B, 0xFF),
    HexColor::new(0xFF, 0xFF, 0xFF),
];

/// The preset after `current`; the first preset for a custom colour.
pub fn next_color(current: HexColor) -> HexColor {
    match COLOR_PRESETS.iter().position(|&c| c == current) {
        Some(i) => COLOR_PRESETS[(i + 1) % COLOR_PRESETS.len()],
        None    => COLOR_PRESETS[0],
    }
}

// ════════════════════════════════════════════════════════════════════════════
// UI actions / tracking status
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UiAction {
    SelectPattern(ParticlePattern),
    CycleColor,
    ToggleFullscreen,
    /// Swing the camera around the cloud, in radians.
    Orbit { yaw: f32, pitch: f32 },
    /// Scroll-wheel steps; positive moves closer.
    Zoom(f32),
    Quit,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tracking {
    Starting,
    Active { source: String },
    /// Source failed to open; the app runs on default signals.
    Unavailable { reason: String },
    Stopped,
}

// ════════════════════════════════════════════════════════════════════════════
// App
// ════════════════════════════════════════════════════════════════════════════

pub struct App {
    state:    AppState,
    field:    ParticleField,
    tracking: Tracking,
    status:   String,
    quit:     bool,
}

impl App {
    pub fn new(cfg: &AppConfig) -> Self {
        let mut state = AppState::new(cfg.color, cfg.pattern);
        if cfg.fullscreen {
            state.toggle_fullscreen();
            state.drain_changes();
        }
        let field = ParticleField::new(cfg.particle_count, cfg.seed, &state);
        App {
            state,
            field,
            tracking: Tracking::Starting,
            status:   "Starting gesture tracking".to_string(),
            quit:     false,
        }
    }

    // ── UI writer ─────────────────────────────────────────────────────────

    pub fn handle_ui(&mut self, action: UiAction) {
        match action {
            UiAction::SelectPattern(p) => self.state.set_particle_pattern(p),
            UiAction::CycleColor => {
                let next = next_color(self.state.particle_color());
                self.state.set_particle_color(next);
            }
            UiAction::ToggleFullscreen => self.state.toggle_fullscreen(),
            UiAction::Orbit { yaw, pitch } => self.field.orbit(yaw, pitch),
            UiAction::Zoom(steps) => self.field.zoom(steps),
            UiAction::Quit => self.quit = true,
        }
    }

    // ── gesture writer ────────────────────────────────────────────────────

    pub fn handle_tracker(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Ready { source } => {
                self.status   = format!("Tracking hands via {source}");
                self.tracking = Tracking::Active { source };
            }
            TrackerEvent::InitFailed { source, reason } => {
                error!(%source, %reason, "gesture tracking unavailable; running without it");
                self.status   = format!("Gesture tracking unavailable: {reason}");
                self.tracking = Tracking::Unavailable { reason };
            }
            TrackerEvent::Update(update) => self.state.apply_gestures(&update),
            TrackerEvent::Stopped => {
                if matches!(self.tracking, Tracking::Active { .. }) {
                    self.status   = "Gesture tracking stopped".to_string();
                    self.tracking = Tracking::Stopped;
                }
            }
        }
    }

    // ── Per-frame tick ────────────────────────────────────────────────────

    pub fn tick(&mut self, dt: f32) {
        for change in self.state.drain_changes() {
            debug!(?change, revision = self.state.revision(), "state changed");
            if let Some(msg) = describe(&change) {
                self.status = msg;
            }
        }
        self.field.sync(&self.state);
        self.field.tick(self.state.hand_openness(), dt);
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn state(&self)       -> &AppState      { &self.state }
    pub fn field(&self)       -> &ParticleField { &self.field }
    pub fn tracking(&self)    -> &Tracking      { &self.tracking }
    pub fn status(&self)      -> &str           { &self.status }
    pub fn should_quit(&self) -> bool           { self.quit }
}

/// Status-line text for a change; openness moves every frame and is shown
/// by the bar instead.
fn describe(change: &StateChange) -> Option<String> {
    let on = |b: bool| if b { "on" } else { "off" };
    match change {
        StateChange::Openness(_)    => None,
        StateChange::VSign(v)       => Some(format!("V sign {}", on(*v))),
        StateChange::FingerHeart(h) => Some(format!("Finger heart {}", on(*h))),
        StateChange::Color(c)       => Some(format!("Color {c}")),
        StateChange::Pattern(p)     => Some(format!("Pattern {p}")),
        StateChange::Fullscreen(f)  => Some(format!("Fullscreen {}", on(*f))),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Source selection
// ════════════════════════════════════════════════════════════════════════════

/// Build the configured landmark source.  The simulation source also
/// returns the sender the visualizer feeds keyboard poses into.
pub fn build_source(cfg: &AppConfig) -> Result<(Box<dyn LandmarkSource>, Option<Sender<SimInput>>), AppError> {
    match cfg.source {
        SourceKind::Sim => {
            let (tx, rx) = mpsc::channel();
            Ok((Box::new(SimLandmarkSource::new(rx)), Some(tx)))
        }
        SourceKind::Helper => {
            if cfg.helper_cmd.is_empty() {
                return Err(AppError::Config("--source helper needs a detector command after --".to_string()));
            }
            Ok((Box::new(HelperLandmarkSource::new(&cfg.helper_cmd, cfg.min_score)?), None))
        }
        #[cfg(feature = "leap")]
        SourceKind::Leap => Ok((Box::new(crate::source::LeapLandmarkSource::new()), None)),
        #[cfg(not(feature = "leap"))]
        SourceKind::Leap => Err(AppError::Config(
            "LeapMotion support not compiled in; rebuild with --features leap".to_string(),
        )),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run() — the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application until the window closes or `Q` is pressed.
///
/// Gesture tracking failing to start is not an error here: the window keeps
/// running with default signals and says so in the status line.
pub fn run(cfg: AppConfig) -> Result<(), AppError> {
    let (source, sim_tx) = build_source(&cfg)?;

    let mut app = App::new(&cfg);
    let mut vis = Visualizer::new(sim_tx, app.state().is_fullscreen())?;
    let tracker = Tracker::spawn(source, cfg.tracker)?;
    info!(particles = cfg.particle_count, "visualizer open");

    let mut last = Instant::now();
    while vis.is_open() && !app.should_quit() {
        // 1. Window input → UI writers
        for action in vis.poll_input() {
            app.handle_ui(action);
        }
        vis.set_fullscreen(app.state().is_fullscreen())?;

        // 2. Tracker events → gesture writer
        for event in tracker.events() {
            app.handle_tracker(event);
        }

        // 3. Animate + draw
        let now = Instant::now();
        app.tick(now.duration_since(last).as_secs_f32());
        last = now;
        vis.render(app.state(), app.field(), app.status())?;
    }

    info!("shutting down");
    tracker.stop();
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
