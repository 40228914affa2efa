//! Landmark sources: simulation, an external detector process, and
//! LeapMotion hardware.
//!
//! The public interface is the [`LandmarkSource`] trait.  The tracker
//! doesn't need to know whether landmarks came from a webcam model, a Leap
//! controller, or the keyboard simulator.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use hand_signals::{Landmark, SyntheticHand};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

// ════════════════════════════════════════════════════════════════════════════
// SourceError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum SourceError {
    /// Model, camera or device unavailable.  Fatal to gesture tracking only.
    #[error("initialization failed: {0}")]
    Init(String),
    /// One frame could not be processed.  The tracker skips the frame.
    #[error("inference failed: {0}")]
    Inference(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ════════════════════════════════════════════════════════════════════════════
// LandmarkSource trait — unified interface for hw, helper and sim
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver at most one hand's landmarks per frame.
///
/// The tracker calls `open` once, then `detect` once per tick, and `close`
/// exactly once after a successful `open`, whichever way the loop exits.
pub trait LandmarkSource: Send {
    fn name(&self) -> &str;

    /// Acquire camera / device / model.
    fn open(&mut self) -> Result<(), SourceError>;

    /// Landmarks for the hand visible at `timestamp_ms`, or `None` if no hand
    /// is visible.  The point count is not checked here.
    fn detect(&mut self, timestamp_ms: u64) -> Result<Option<Vec<Landmark>>, SourceError>;

    /// Release everything acquired by `open`.
    fn close(&mut self);

    /// A handle that makes a `detect` blocked on its device return promptly
    /// when called from another thread.  Sources whose `detect` cannot block
    /// indefinitely return `None`.
    fn interrupter(&self) -> Option<Interrupt> { None }
}

/// See [`LandmarkSource::interrupter`].
pub type Interrupt = Box<dyn Fn() + Send + Sync>;

// ════════════════════════════════════════════════════════════════════════════
// SimLandmarkSource — keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Hand pose requested from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimPose {
    Open,
    Fist,
    VSign,
    FingerHeart,
}

/// Raw input event from the simulation window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    Pose(SimPose),
    /// Take the hand out of view.
    HideHand,
    /// Nudge openness of the open-hand pose by this amount.
    AdjustOpenness(f32),
}

/// Landmark source driven by [`SimInput`] events (from the visualizer's
/// window).  Synthesises a slowly wobbling hand so the classifier sees
/// moving input just as it would from a camera.
pub struct SimLandmarkSource {
    rx:       Receiver<SimInput>,
    pose:     SimPose,
    openness: f32,
    visible:  bool,
}

impl SimLandmarkSource {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimLandmarkSource {
            rx,
            pose:     SimPose::Open,
            openness: 1.0,
            visible:  true,
        }
    }

    fn apply(&mut self, input: SimInput) {
        match input {
            SimInput::Pose(p) => {
                self.pose    = p;
                self.visible = true;
                match p {
                    SimPose::Open => self.openness = 1.0,
                    SimPose::Fist => self.openness = 0.0,
                    _ => {}
                }
            }
            SimInput::HideHand => self.visible = false,
            SimInput::AdjustOpenness(d) => {
                self.pose     = SimPose::Open;
                self.visible  = true;
                self.openness = (self.openness + d).clamp(0.0, 1.0);
            }
        }
    }

    fn hand(&self, timestamp_ms: u64) -> SyntheticHand {
        let t = timestamp_ms as f32 / 1000.0;
        let base = match self.pose {
            SimPose::Open        => SyntheticHand::open_amount(self.openness),
            SimPose::Fist        => SyntheticHand::fist(),
            SimPose::VSign       => SyntheticHand::v_sign(),
            SimPose::FingerHeart => SyntheticHand::finger_heart(),
        };
        base.with_roll(0.15 * (t * 0.9).sin())
            .with_origin(0.5 + 0.03 * (t * 0.6).sin(), 0.8 + 0.02 * (t * 0.8).cos())
            .with_scale(1.5 + 0.1 * (t * 0.4).sin())
    }
}

impl LandmarkSource for SimLandmarkSource {
    fn name(&self) -> &str { "simulation" }

    fn open(&mut self) -> Result<(), SourceError> { Ok(()) }

    fn detect(&mut self, timestamp_ms: u64) -> Result<Option<Vec<Landmark>>, SourceError> {
        // A closed window just freezes the current pose.
        while let Ok(input) = self.rx.try_recv() {
            self.apply(input);
        }
        if !self.visible { return Ok(None); }
        Ok(Some(self.hand(timestamp_ms).landmarks().to_vec()))
    }

    fn close(&mut self) {}
}

// ════════════════════════════════════════════════════════════════════════════
// HelperLandmarkSource — external detector process
// ════════════════════════════════════════════════════════════════════════════

/// Landmark source backed by an external detector process (for example a
/// MediaPipe hand-landmarker script) that owns the camera.
///
/// # Protocol
///
/// * Helper prints `READY` once camera and model are up.
/// * Per frame we write the timestamp in milliseconds as one line on stdin.
/// * Helper answers with one JSON line:
///   `{"hands":[{"score":0.97,"landmarks":[{"x":..,"y":..,"z":..}, …]}],"error":null}`
pub struct HelperLandmarkSource {
    program:   String,
    args:      Vec<String>,
    min_score: f32,
    /// Shared with [`Interrupt`] handles so another thread can kill it.
    child:     Arc<Mutex<Option<Child>>>,
    stdin:     Option<ChildStdin>,
    stdout:    Option<BufReader<ChildStdout>>,
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default = "full_score")]
    score:     f32,
    landmarks: Vec<Landmark>,
}

#[derive(Deserialize, Debug)]
struct DetectionJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

fn full_score() -> f32 { 1.0 }

/// How long a helper gets to exit on its own after its stdin closes.
const EXIT_GRACE: Duration = Duration::from_millis(200);

impl HelperLandmarkSource {
    /// `command` is the program followed by its arguments.
    pub fn new(command: &[String], min_score: f32) -> Result<Self, SourceError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SourceError::Init("empty helper command".to_string()))?;
        Ok(HelperLandmarkSource {
            program:   program.clone(),
            args:      args.to_vec(),
            min_score: min_score.clamp(0.0, 1.0),
            child:     Arc::new(Mutex::new(None)),
            stdin:     None,
            stdout:    None,
        })
    }

    fn handshake(&mut self) -> Result<(), SourceError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SourceError::Init(format!("cannot start {}: {}", self.program, e)))?;

        self.stdin  = child.stdin.take();
        self.stdout = child.stdout.take().map(BufReader::new);
        *self.child.lock().unwrap_or_else(PoisonError::into_inner) = Some(child);

        let reader = self.stdout.as_mut()
            .ok_or_else(|| SourceError::Init("helper stdout unavailable".to_string()))?;
        let mut ready = String::new();
        reader.read_line(&mut ready)
            .map_err(|e| SourceError::Init(format!("helper handshake: {}", e)))?;
        if ready.trim() != "READY" {
            return Err(SourceError::Init(format!(
                "helper did not signal ready, got {:?}", ready.trim()
            )));
        }
        Ok(())
    }
}

/// Parse one helper response line.
fn parse_detection(line: &str, min_score: f32) -> Result<Option<Vec<Landmark>>, SourceError> {
    let result: DetectionJson = serde_json::from_str(line)
        .map_err(|e| SourceError::Inference(format!("bad helper response: {}", e)))?;
    if let Some(err) = result.error {
        return Err(SourceError::Inference(err));
    }
    Ok(result.hands
        .into_iter()
        .find(|h| h.score >= min_score)
        .map(|h| h.landmarks))
}

impl LandmarkSource for HelperLandmarkSource {
    fn name(&self) -> &str { &self.program }

    fn open(&mut self) -> Result<(), SourceError> {
        info!(program = %self.program, "starting landmark helper");
        let result = self.handshake();
        if result.is_err() {
            self.close();
        }
        result
    }

    fn detect(&mut self, timestamp_ms: u64) -> Result<Option<Vec<Landmark>>, SourceError> {
        let (Some(stdin), Some(stdout)) = (self.stdin.as_mut(), self.stdout.as_mut()) else {
            return Err(SourceError::Inference("helper not running".to_string()));
        };
        writeln!(stdin, "{}", timestamp_ms)?;
        stdin.flush()?;

        let mut line = String::new();
        if stdout.read_line(&mut line)? == 0 {
            return Err(SourceError::Inference("helper closed its output".to_string()));
        }
        parse_detection(&line, self.min_score)
    }

    fn close(&mut self) {
        // EOF on stdin asks the helper to exit; it is killed after EXIT_GRACE.
        self.stdin  = None;
        self.stdout = None;
        let child = self.child.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(mut child) = child {
            let deadline = Instant::now() + EXIT_GRACE;
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(10)),
                    _ => {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                }
            }
            info!(program = %self.program, "landmark helper stopped");
        }
    }

    fn interrupter(&self) -> Option<Interrupt> {
        let child = Arc::clone(&self.child);
        Some(Box::new(move || {
            // Killing the process closes its stdout, so a pending read sees EOF.
            if let Some(c) = child.lock().unwrap_or_else(PoisonError::into_inner).as_mut() {
                let _ = c.kill();
            }
        }))
    }
}

impl Drop for HelperLandmarkSource {
    fn drop(&mut self) {
        self.close();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LeapLandmarkSource — real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Millimetres per normalized landmark unit.  A ~180 mm hand comes out
/// around 0.2 units across, comparable to a webcam hand at arm's length.
#[cfg(feature = "leap")]
const LEAP_MM_PER_UNIT: f32 = 900.0;

/// Landmark source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
/// Bone joints of the first tracked hand are mapped onto the 21-point
/// layout: wrist from the arm, then per digit the CMC/MCP, PIP, DIP and tip.
#[cfg(feature = "leap")]
pub struct LeapLandmarkSource {
    connection: Option<leaprs::Connection>,
}

#[cfg(feature = "leap")]
impl LeapLandmarkSource {
    pub fn new() -> Self { LeapLandmarkSource { connection: None } }
}

#[cfg(feature = "leap")]
impl Default for LeapLandmarkSource {
    fn default() -> Self { Self::new() }
}

#[cfg(feature = "leap")]
fn from_mm(x: f32, y: f32, z: f32) -> Landmark {
    // Leap y points up; image y points down.
    Landmark::new(x / LEAP_MM_PER_UNIT, -y / LEAP_MM_PER_UNIT, z / LEAP_MM_PER_UNIT)
}

#[cfg(feature = "leap")]
macro_rules! joint {
    ($v:expr) => {{
        let v = $v;
        from_mm(v.x, v.y, v.z)
    }};
}

#[cfg(feature = "leap")]
impl LandmarkSource for LeapLandmarkSource {
    fn name(&self) -> &str { "leapmotion" }

    fn open(&mut self) -> Result<(), SourceError> {
        use leaprs::*;
        let mut connection = Connection::create(ConnectionConfig::default())
            .map_err(|e| SourceError::Init(format!("LeapC connection: {:?}", e)))?;
        connection.open()
            .map_err(|e| SourceError::Init(format!("LeapMotion device: {:?}", e)))?;
        self.connection = Some(connection);
        Ok(())
    }

    fn detect(&mut self, _timestamp_ms: u64) -> Result<Option<Vec<Landmark>>, SourceError> {
        use leaprs::*;
        let Some(connection) = self.connection.as_mut() else {
            return Err(SourceError::Inference("LeapC connection not open".to_string()));
        };
        let msg = match connection.poll(10) {
            Ok(m)  => m,
            Err(_) => return Ok(None),
        };
        let Event::Tracking(frame) = msg.event() else { return Ok(None) };
        let Some(hand) = frame.hands().next() else { return Ok(None) };

        let mut points = Vec::with_capacity(hand_signals::LANDMARK_COUNT);
        points.push(joint!(hand.arm().next_joint()));
        for (i, digit) in hand.digits().enumerate() {
            // The thumb's metacarpal has zero length in LeapC, so its chain
            // starts at the proximal bone.
            if i == 0 {
                points.push(joint!(digit.proximal().prev_joint()));
            } else {
                points.push(joint!(digit.metacarpal().next_joint()));
            }
            points.push(joint!(digit.intermediate().prev_joint()));
            points.push(joint!(digit.distal().prev_joint()));
            points.push(joint!(digit.distal().next_joint()));
        }
        Ok(Some(points))
    }

    fn close(&mut self) {
        if self.connection.take().is_some() {
            info!("LeapC connection closed");
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use hand_signals::{classify, ClassifierConfig, HandFrame};
    use std::sync::mpsc;

    fn sim() -> (mpsc::Sender<SimInput>, SimLandmarkSource) {
        let (tx, rx) = mpsc::channel();
        (tx, SimLandmarkSource::new(rx))
    }

    fn classify_points(points: &[Landmark]) -> hand_signals::GestureSignals {
        classify(&HandFrame::new(points).unwrap(), &ClassifierConfig::default())
    }

    #[test]
    fn sim_starts_with_open_hand() {
        let (_tx, mut src) = sim();
        let pts = src.detect(0).unwrap().unwrap();
        assert_eq!(pts.len(), 21);
        assert!(classify_points(&pts).openness > 0.7);
    }

    #[test]
    fn sim_pose_keys_drive_classification() {
        let (tx, mut src) = sim();
        tx.send(SimInput::Pose(SimPose::VSign)).unwrap();
        let s = classify_points(&src.detect(500).unwrap().unwrap());
        assert!(s.v_sign);

        tx.send(SimInput::Pose(SimPose::FingerHeart)).unwrap();
        let s = classify_points(&src.detect(1200).unwrap().unwrap());
        assert!(s.finger_heart);

        tx.send(SimInput::Pose(SimPose::Fist)).unwrap();
        let s = classify_points(&src.detect(2500).unwrap().unwrap());
        assert_eq!(s.openness, 0.0);
    }

    #[test]
    fn sim_hide_hand_yields_none() {
        let (tx, mut src) = sim();
        tx.send(SimInput::HideHand).unwrap();
        assert!(src.detect(0).unwrap().is_none());
        tx.send(SimInput::AdjustOpenness(-0.5)).unwrap();
        assert!(src.detect(16).unwrap().is_some());
    }

    #[test]
    fn sim_openness_adjust_is_clamped() {
        let (tx, mut src) = sim();
        for _ in 0..5 {
            tx.send(SimInput::AdjustOpenness(0.5)).unwrap();
        }
        src.detect(0).unwrap();
        assert_eq!(src.openness, 1.0);
        tx.send(SimInput::AdjustOpenness(-0.25)).unwrap();
        src.detect(0).unwrap();
        assert!((src.openness - 0.75).abs() < 1e-6);
    }

    #[test]
    fn sim_survives_disconnected_window() {
        let (tx, mut src) = sim();
        drop(tx);
        assert!(src.detect(0).unwrap().is_some());
    }

    #[test]
    fn parse_first_confident_hand() {
        let pts: Vec<String> = (0..21)
            .map(|i| format!(r#"{{"x":{},"y":0.5,"z":0.0}}"#, i as f32 / 100.0))
            .collect();
        let line = format!(
            r#"{{"hands":[{{"score":0.2,"landmarks":[]}},{{"score":0.9,"landmarks":[{}]}}]}}"#,
            pts.join(",")
        );
        let hand = parse_detection(&line, 0.5).unwrap().unwrap();
        assert_eq!(hand.len(), 21);
        assert!((hand[20].x - 0.2).abs() < 1e-6);
    }

    #[test]
    fn parse_empty_and_low_score() {
        assert!(parse_detection(r#"{"hands":[]}"#, 0.5).unwrap().is_none());
        assert!(parse_detection(r#"{"hands":[{"score":0.1,"landmarks":[]}]}"#, 0.5)
            .unwrap().is_none());
    }

    #[test]
    fn parse_passes_short_sets_through() {
        // Validation happens in the tracker, not here.
        let line = r#"{"hands":[{"landmarks":[{"x":0.1,"y":0.2,"z":0.0}]}]}"#;
        assert_eq!(parse_detection(line, 0.5).unwrap().unwrap().len(), 1);
    }

    #[test]
    fn parse_reports_errors() {
        assert!(matches!(
            parse_detection(r#"{"hands":[],"error":"camera busy"}"#, 0.5),
            Err(SourceError::Inference(m)) if m == "camera busy"
        ));
        assert!(matches!(parse_detection("not json", 0.5), Err(SourceError::Inference(_))));
    }

    #[test]
    fn helper_requires_a_command() {
        assert!(matches!(HelperLandmarkSource::new(&[], 0.5), Err(SourceError::Init(_))));
    }

    #[test]
    fn helper_missing_program_fails_init() {
        let cmd = vec!["/definitely/not/a/landmark-helper".to_string()];
        let mut src = HelperLandmarkSource::new(&cmd, 0.5).unwrap();
        assert!(matches!(src.open(), Err(SourceError::Init(_))));
        assert!(src.child.lock().unwrap().is_none());
    }

    // ── helper process round trips (POSIX shell) ──────────────────────────

    #[cfg(unix)]
    fn sh(script: &str) -> HelperLandmarkSource {
        let cmd = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        HelperLandmarkSource::new(&cmd, 0.5).unwrap()
    }

    #[cfg(unix)]
    fn helper_pid(src: &HelperLandmarkSource) -> Option<u32> {
        src.child.lock().unwrap().as_ref().map(|c| c.id())
    }

    #[cfg(unix)]
    fn process_alive(pid: u32) -> bool {
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Answers each timestamp line with one hand whose first x is the timestamp.
    #[cfg(unix)]
    const ECHO_HELPER: &str = r#"echo READY; while read ts; do echo "{\"hands\":[{\"score\":0.9,\"landmarks\":[{\"x\":$ts,\"y\":0.5,\"z\":0}]}]}"; done"#;

    #[cfg(unix)]
    #[test]
    fn helper_round_trip_per_frame() {
        let mut src = sh(ECHO_HELPER);
        src.open().unwrap();
        let first = src.detect(42).unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].x, 42.0);
        let second = src.detect(43).unwrap().unwrap();
        assert_eq!(second[0].x, 43.0);
        src.close();
        assert!(helper_pid(&src).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn helper_without_ready_fails_init() {
        let mut src = sh("echo HELLO; exec sleep 30");
        match src.open() {
            Err(SourceError::Init(m)) => assert!(m.contains("HELLO"), "{m}"),
            other => panic!("expected init failure, got {other:?}"),
        }
        // A failed open leaves nothing running.
        assert!(helper_pid(&src).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn helper_closing_output_is_inference_error() {
        let mut src = sh("echo READY; read ts; exit 0");
        src.open().unwrap();
        assert!(matches!(src.detect(1), Err(SourceError::Inference(m)) if m.contains("closed")));
        src.close();
    }

    #[cfg(unix)]
    #[test]
    fn close_kills_and_reaps_a_stubborn_helper() {
        let mut src = sh("echo READY; exec sleep 30");
        src.open().unwrap();
        let pid = helper_pid(&src).unwrap();
        assert!(process_alive(pid));

        let started = Instant::now();
        src.close();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(helper_pid(&src).is_none());
        assert!(!process_alive(pid));
    }

    #[cfg(unix)]
    #[test]
    fn close_lets_a_polite_helper_exit() {
        let mut src = sh(ECHO_HELPER);
        src.open().unwrap();
        let started = Instant::now();
        src.close();
        assert!(started.elapsed() < EXIT_GRACE + Duration::from_secs(1));
        assert!(helper_pid(&src).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn interrupter_unblocks_pending_detect() {
        let mut src = sh("echo READY; exec sleep 30");
        src.open().unwrap();
        let interrupt = src.interrupter().unwrap();
        let killer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            interrupt();
        });

        let started = Instant::now();
        assert!(src.detect(0).is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
        killer.join().unwrap();
        src.close();
    }

    #[test]
    fn sim_has_no_interrupter() {
        let (_tx, src) = sim();
        assert!(src.interrupter().is_none());
    }
}
