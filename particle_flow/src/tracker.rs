//! The gesture tick loop, run on its own thread.
//!
//! Each tick: check for cancellation → `detect` → validate → classify →
//! debounce → send the committed [`FrameUpdate`] to the app.  The thread
//! owns the landmark source and the [`GesturePipeline`] exclusively; the
//! app owns [`hand_signals::AppState`] and applies updates on its own loop,
//! so there is exactly one writer for every gesture field.
//!
//! Failures never cross into the app as errors:
//!
//! * `open` fails → one [`TrackerEvent::InitFailed`], the loop never starts.
//! * `detect` fails → logged, the frame counts as "no hand".
//! * wrong landmark count / non-finite points → logged, "no hand".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryIter};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hand_signals::{ClassifierConfig, FrameUpdate, GesturePipeline, HandFrame, DEFAULT_THRESHOLD};
use tracing::{error, info, warn};

use crate::source::{Interrupt, LandmarkSource};

// ════════════════════════════════════════════════════════════════════════════
// TrackerConfig / TrackerEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    pub classifier:     ClassifierConfig,
    /// Consecutive frames before a boolean gesture commits.
    pub threshold:      u32,
    /// Target tick period; a tick that runs long is not made up.
    pub frame_interval: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            classifier:     ClassifierConfig::default(),
            threshold:      DEFAULT_THRESHOLD,
            frame_interval: Duration::from_millis(16),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TrackerEvent {
    /// Source opened; ticks are running.
    Ready { source: String },
    /// Source could not be opened; gesture tracking is off for this run.
    InitFailed { source: String, reason: String },
    /// Non-empty result of one tick.
    Update(FrameUpdate),
    /// Loop exited and the source was closed.
    Stopped,
}

// ════════════════════════════════════════════════════════════════════════════
// Tracker handle
// ════════════════════════════════════════════════════════════════════════════

/// Handle to the tracker thread.  Dropping it cancels the loop and waits
/// for the source to be closed.  A `detect` blocked inside the source is
/// broken with the source's [`Interrupt`], if it has one.
pub struct Tracker {
    rx:        Receiver<TrackerEvent>,
    cancel:    Arc<AtomicBool>,
    interrupt: Option<Interrupt>,
    handle:    Option<JoinHandle<()>>,
}

impl Tracker {
    pub fn spawn(source: Box<dyn LandmarkSource>, cfg: TrackerConfig) -> std::io::Result<Tracker> {
        let (tx, rx) = mpsc::channel();
        let cancel   = Arc::new(AtomicBool::new(false));
        let flag     = Arc::clone(&cancel);
        let interrupt = source.interrupter();
        let handle = thread::Builder::new()
            .name("gesture-tracker".to_string())
            .spawn(move || {
                let mut source = source;
                run_loop(source.as_mut(), cfg, &flag, &tx);
                let _ = tx.send(TrackerEvent::Stopped);
            })?;
        Ok(Tracker { rx, cancel, interrupt, handle: Some(handle) })
    }

    /// Events received since the last call, without blocking.
    pub fn events(&self) -> TryIter<'_, TrackerEvent> { self.rx.try_iter() }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<TrackerEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Cancel the loop and wait for the source to close.
    pub fn stop(mut self) { self.shutdown(); }

    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if let Some(interrupt) = &self.interrupt {
                interrupt();
            }
            if handle.join().is_err() {
                error!("gesture tracker thread panicked");
            }
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) { self.shutdown(); }
}

// ════════════════════════════════════════════════════════════════════════════
// Loop
// ════════════════════════════════════════════════════════════════════════════

/// Closes the source when the loop scope ends, however it ends.
struct OpenSource<'a> {
    source: &'a mut dyn LandmarkSource,
}

impl Drop for OpenSource<'_> {
    fn drop(&mut self) {
        self.source.close();
        info!(source = self.source.name(), "landmark source closed");
    }
}

fn run_loop(
    source: &mut dyn LandmarkSource,
    cfg:    TrackerConfig,
    cancel: &AtomicBool,
    tx:     &Sender<TrackerEvent>,
) {
    let name = source.name().to_string();

    if let Err(e) = source.open() {
        warn!(source = %name, error = %e, "landmark source failed to open");
        let _ = tx.send(TrackerEvent::InitFailed { source: name, reason: e.to_string() });
        return;
    }
    let guard = OpenSource { source };
    info!(source = %name, "gesture tracking started");
    if tx.send(TrackerEvent::Ready { source: name }).is_err() {
        return;
    }

    let mut pipeline = GesturePipeline::new(cfg.classifier, cfg.threshold);
    let started = Instant::now();

    while !cancel.load(Ordering::Acquire) {
        let tick = Instant::now();
        let timestamp_ms = started.elapsed().as_millis() as u64;

        let frame = match guard.source.detect(timestamp_ms) {
            Ok(Some(points)) => match HandFrame::new(&points) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!(error = %e, "malformed landmark set; treating as no hand");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "frame skipped");
                None
            }
        };

        let update = pipeline.process(frame.as_ref());
        if !update.is_empty() && tx.send(TrackerEvent::Update(update)).is_err() {
            break; // app went away
        }

        if let Some(rest) = cfg.frame_interval.checked_sub(tick.elapsed()) {
            thread::sleep(rest);
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceError;
    use hand_signals::{Landmark, SyntheticHand};
    use std::collections::VecDeque;
    use std::sync::{Condvar, Mutex};

    type Step = Result<Option<Vec<Landmark>>, String>;

    #[derive(Default)]
    struct Log {
        opened:  usize,
        detects: usize,
        closed:  usize,
    }

    struct Scripted {
        fail_open: bool,
        script:    VecDeque<Step>,
        log:       Arc<Mutex<Log>>,
    }

    impl LandmarkSource for Scripted {
        fn name(&self) -> &str { "scripted" }

        fn open(&mut self) -> Result<(), SourceError> {
            self.log.lock().unwrap().opened += 1;
            if self.fail_open {
                Err(SourceError::Init("no camera".to_string()))
            } else {
                Ok(())
            }
        }

        fn detect(&mut self, _ts: u64) -> Result<Option<Vec<Landmark>>, SourceError> {
            self.log.lock().unwrap().detects += 1;
            match self.script.pop_front() {
                Some(Ok(p))  => Ok(p),
                Some(Err(m)) => Err(SourceError::Inference(m)),
                None         => Ok(None),
            }
        }

        fn close(&mut self) { self.log.lock().unwrap().closed += 1; }
    }

    fn spawn(fail_open: bool, script: Vec<Step>) -> (Tracker, Arc<Mutex<Log>>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let src = Scripted { fail_open, script: script.into(), log: Arc::clone(&log) };
        let cfg = TrackerConfig { frame_interval: Duration::from_millis(1), ..TrackerConfig::default() };
        (Tracker::spawn(Box::new(src), cfg).unwrap(), log)
    }

    fn v() -> Step { Ok(Some(SyntheticHand::v_sign().landmarks().to_vec())) }

    fn next(t: &Tracker) -> TrackerEvent {
        t.recv_timeout(Duration::from_secs(5)).expect("tracker event")
    }

    fn updates(t: &Tracker, n: usize) -> Vec<FrameUpdate> {
        let mut out = Vec::new();
        while out.len() < n {
            if let TrackerEvent::Update(u) = next(t) { out.push(u); }
        }
        out
    }

    #[test]
    fn init_failure_is_reported_and_nothing_runs() {
        let (t, log) = spawn(true, vec![v()]);
        assert!(matches!(next(&t), TrackerEvent::InitFailed { reason, .. } if reason.contains("no camera")));
        assert_eq!(next(&t), TrackerEvent::Stopped);
        let log = log.lock().unwrap();
        assert_eq!(log.opened, 1);
        assert_eq!(log.detects, 0);
        assert_eq!(log.closed, 0);
    }

    #[test]
    fn v_sign_commits_through_the_thread() {
        let (t, _log) = spawn(false, vec![v(), v(), v()]);
        assert_eq!(next(&t), TrackerEvent::Ready { source: "scripted".to_string() });
        let ups = updates(&t, 3);
        assert_eq!(ups[0].v_sign, None);
        assert_eq!(ups[1].v_sign, None);
        assert_eq!(ups[2].v_sign, Some(true));
        assert!(ups.iter().all(|u| u.openness.is_some()));
    }

    #[test]
    fn inference_error_skips_frame_and_continues() {
        let (t, _log) = spawn(false, vec![v(), Err("gpu hiccup".to_string()), v(), v()]);
        let ups = updates(&t, 3);
        assert_eq!(ups[2].v_sign, Some(true));
    }

    #[test]
    fn short_landmark_set_is_no_detection() {
        let short = Ok(Some(vec![Landmark::new(0.5, 0.5, 0.0); 12]));
        let (t, _log) = spawn(false, vec![v(), short, v(), v()]);
        let ups = updates(&t, 3);
        assert_eq!(ups[2].v_sign, Some(true));
    }

    #[test]
    fn stop_closes_source_once() {
        let (t, log) = spawn(false, vec![]);
        assert!(matches!(next(&t), TrackerEvent::Ready { .. }));
        t.stop();
        let log = log.lock().unwrap();
        assert_eq!(log.opened, 1);
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn drop_closes_source() {
        let (t, log) = spawn(false, vec![]);
        assert!(matches!(next(&t), TrackerEvent::Ready { .. }));
        drop(t);
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    /// `detect` parks until its interrupter fires, like a helper that never answers.
    struct Stuck {
        released: Arc<(Mutex<bool>, Condvar)>,
        log:      Arc<Mutex<Log>>,
    }

    impl LandmarkSource for Stuck {
        fn name(&self) -> &str { "stuck" }

        fn open(&mut self) -> Result<(), SourceError> { Ok(()) }

        fn detect(&mut self, _ts: u64) -> Result<Option<Vec<Landmark>>, SourceError> {
            self.log.lock().unwrap().detects += 1;
            let (lock, cv) = &*self.released;
            let mut released = lock.lock().unwrap();
            while !*released {
                released = cv.wait(released).unwrap();
            }
            Err(SourceError::Inference("interrupted".to_string()))
        }

        fn close(&mut self) { self.log.lock().unwrap().closed += 1; }

        fn interrupter(&self) -> Option<Interrupt> {
            let released = Arc::clone(&self.released);
            Some(Box::new(move || {
                let (lock, cv) = &*released;
                *lock.lock().unwrap() = true;
                cv.notify_all();
            }))
        }
    }

    #[test]
    fn stop_interrupts_blocked_detect() {
        let log = Arc::new(Mutex::new(Log::default()));
        let src = Stuck { released: Arc::new((Mutex::new(false), Condvar::new())), log: Arc::clone(&log) };
        let t = Tracker::spawn(Box::new(src), TrackerConfig::default()).unwrap();
        assert!(matches!(next(&t), TrackerEvent::Ready { .. }));
        while log.lock().unwrap().detects == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let started = Instant::now();
        t.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(log.lock().unwrap().closed, 1);
    }

    #[cfg(unix)]
    #[test]
    fn stop_does_not_wait_for_a_silent_helper() {
        use crate::source::HelperLandmarkSource;

        let cmd: Vec<String> = ["sh", "-c", "echo READY; exec sleep 30"].iter().map(|s| s.to_string()).collect();
        let src = HelperLandmarkSource::new(&cmd, 0.5).unwrap();
        let t = Tracker::spawn(Box::new(src), TrackerConfig::default()).unwrap();
        assert!(matches!(next(&t), TrackerEvent::Ready { .. }));
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        t.stop();
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
