//! # hand_signals
//!
//! Stable, debounced gesture signals from a noisy stream of 21-point hand
//! landmarks.
//!
//! ## Data flow
//!
//! ```text
//! landmark source ─► HandFrame ─► classify ─► debounce ─► AppState
//!   (0 or 1 hand)    (21 pts)     (pure)      (3 frames)   (store)
//! ```
//!
//! ## Signals
//!
//! | Signal | Kind | Debounced |
//! |---|---|---|
//! | openness | 0.0 (fist) – 1.0 (open) | no |
//! | V-sign | index + middle up, ring + pinky down | yes |
//! | finger-heart | thumb tip on index tip, other fingers down | yes |
//!
//! A frame with no hand leaves every signal where it was.
//!
//! ## Quick start
//!
//! ```rust
//! use hand_signals::{AppState, GesturePipeline, SyntheticHand};
//!
//! let mut state    = AppState::default();
//! let mut pipeline = GesturePipeline::default();
//!
//! let v = SyntheticHand::v_sign().frame();
//! for _ in 0..3 {
//!     state.apply_gestures(&pipeline.process(Some(&v)));
//! }
//! assert!(state.is_v_sign());
//! ```

pub mod landmarks;
pub mod classifier;
pub mod debounce;
pub mod pipeline;
pub mod state;
pub mod synthetic;

pub use classifier::{classify, ClassifierConfig, GestureSignals};
pub use debounce::{Debounce, DebounceBank, Signal, DEFAULT_THRESHOLD};
pub use landmarks::{Finger, HandFrame, Landmark, LandmarkError, LANDMARK_COUNT};
pub use pipeline::{FrameUpdate, GesturePipeline};
pub use state::{AppState, HexColor, ParseStateError, ParticlePattern, StateChange};
pub use synthetic::{SyntheticHand, ThumbPose};
