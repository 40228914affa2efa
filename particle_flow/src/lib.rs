//! # particle_flow
//!
//! A hand-gesture controlled particle field.  Hand landmarks from a webcam
//! detector, a LeapMotion controller or the keyboard simulator are turned
//! into debounced gesture signals by [`hand_signals`] and drive a
//! software-rendered cloud of 15 000 particles.
//!
//! ## Gesture → effect mapping
//!
//! | Gesture | Effect |
//! |---|---|
//! | Open / close hand | Cloud expands (open) or contracts (fist) |
//! | V-sign (index + middle up) | "I LOVE U" banner |
//! | Finger heart (thumb on index tip) | Cloud reforms as a heart until released |
//! | No hand in view | Everything holds its last state |
//!
//! ## Threads
//!
//! ```text
//! tracker thread:  source.detect ─► HandFrame ─► GesturePipeline ─┐
//!                                                                 │ mpsc
//! main thread:     keys, mouse ─► UI writers ─► AppState ◄────────┘
//!                                                 │
//!                                    ParticleField + overlay ─► minifb
//! ```
//!
//! ## Feature flags
//!
//! * (default): simulation and helper-process sources.
//! * `leap`: **Hardware mode**: polls a real LeapMotion controller via LeapC.
//!
//! ### Keyboard
//!
//! | Key | Action |
//! |---|---|
//! | `1`–`4` | Sphere / cube / torus / galaxy |
//! | `C` | Next colour preset |
//! | `F` | Toggle fullscreen |
//! | `Q` / `Esc` | Quit |
//! | `O` `K` `V` `H` | Simulated open hand / fist / V-sign / finger heart |
//! | `N` | Simulated hand leaves view |
//! | `Up` / `Down` | Simulated openness ± 5% |
//!
//! ### Mouse
//!
//! | Input | Action |
//! |---|---|
//! | Click pattern cell / colour row | Select pattern / next colour preset |
//! | Click FULLSCREEN | Toggle fullscreen |
//! | Drag in the scene | Orbit the camera |
//! | Scroll | Zoom |

pub mod source;
pub mod tracker;
pub mod particles;
pub mod visualizer;
pub mod app;
