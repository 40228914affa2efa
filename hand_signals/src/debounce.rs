//! Frame-count debouncing for boolean gesture signals.
//!
//! A new value is committed only once it has been seen on `threshold`
//! consecutive frames.  The commit fires exactly once, on the frame the
//! count first reaches the threshold; holding the value longer emits
//! nothing further.

pub const DEFAULT_THRESHOLD: u32 = 3;

// ════════════════════════════════════════════════════════════════════════════
// Debounce
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Debounce {
    last_value:         bool,
    consecutive_frames: u32,
    threshold:          u32,
}

impl Debounce {
    /// `threshold` below 1 is raised to 1.
    pub fn new(threshold: u32) -> Self {
        Debounce {
            last_value:         false,
            consecutive_frames: 0,
            threshold:          threshold.max(1),
        }
    }

    /// Feed one frame's value.  Returns `Some(value)` on the frame it is
    /// committed.
    pub fn update(&mut self, value: bool) -> Option<bool> {
        if value == self.last_value {
            self.consecutive_frames = self.consecutive_frames.saturating_add(1);
        } else {
            self.last_value = value;
            self.consecutive_frames = 1;
        }
        (self.consecutive_frames == self.threshold).then_some(value)
    }

    pub fn last_value(&self) -> bool { self.last_value }
    pub fn consecutive_frames(&self) -> u32 { self.consecutive_frames }
    pub fn threshold(&self) -> u32 { self.threshold }
}

impl Default for Debounce {
    fn default() -> Self { Debounce::new(DEFAULT_THRESHOLD) }
}

// ════════════════════════════════════════════════════════════════════════════
// DebounceBank — one counter per boolean signal
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    VSign,
    FingerHeart,
}

impl Signal {
    pub const ALL: [Signal; 2] = [Signal::VSign, Signal::FingerHeart];

    pub fn name(self) -> &'static str {
        match self {
            Signal::VSign       => "v-sign",
            Signal::FingerHeart => "finger-heart",
        }
    }

    fn slot(self) -> usize {
        match self {
            Signal::VSign       => 0,
            Signal::FingerHeart => 1,
        }
    }
}

/// Fixed set of counters, built once and reused every frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebounceBank {
    counters: [Debounce; 2],
}

impl DebounceBank {
    pub fn new(threshold: u32) -> Self {
        DebounceBank { counters: [Debounce::new(threshold); 2] }
    }

    pub fn update(&mut self, signal: Signal, value: bool) -> Option<bool> {
        self.counters[signal.slot()].update(value)
    }

    pub fn counter(&self, signal: Signal) -> &Debounce {
        &self.counters[signal.slot()]
    }
}

impl Default for DebounceBank {
    fn default() -> Self { DebounceBank::new(DEFAULT_THRESHOLD) }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(d: &mut Debounce, seq: &[bool]) -> Vec<(usize, bool)> {
        seq.iter()
            .enumerate()
            .filter_map(|(i, &v)| d.update(v).map(|c| (i, c)))
            .collect()
    }

    #[test]
    fn commits_once_at_threshold() {
        let mut d = Debounce::new(3);
        let commits = feed(&mut d, &[false, false, true, true, true, false]);
        assert_eq!(commits, vec![(4, true)]);
        assert_eq!(d.last_value(), false);
        assert_eq!(d.consecutive_frames(), 1);
    }

    #[test]
    fn initial_false_run_commits_false() {
        let mut d = Debounce::new(3);
        assert_eq!(feed(&mut d, &[false, false, false, false]), vec![(2, false)]);
    }

    #[test]
    fn holding_does_not_recommit() {
        let mut d = Debounce::new(3);
        let commits = feed(&mut d, &[true; 50]);
        assert_eq!(commits, vec![(2, true)]);
    }

    #[test]
    fn flicker_never_commits() {
        let mut d = Debounce::new(3);
        let seq: Vec<bool> = (0..40).map(|i| i % 3 == 0).collect();
        // runs: T F F T F F ... → true never reaches 3, false never reaches 3
        assert!(feed(&mut d, &seq).is_empty());
    }

    #[test]
    fn threshold_one_commits_every_change() {
        let mut d = Debounce::new(1);
        let commits = feed(&mut d, &[true, true, false, true]);
        assert_eq!(commits, vec![(0, true), (2, false), (3, true)]);
    }

    #[test]
    fn zero_threshold_is_raised() {
        assert_eq!(Debounce::new(0).threshold(), 1);
    }

    #[test]
    fn counter_saturates() {
        let mut d = Debounce { last_value: true, consecutive_frames: u32::MAX - 1, threshold: 3 };
        assert_eq!(d.update(true), None);
        assert_eq!(d.update(true), None);
        assert_eq!(d.consecutive_frames(), u32::MAX);
    }

    #[test]
    fn bank_counters_are_independent() {
        let mut bank = DebounceBank::new(3);
        for _ in 0..2 {
            assert_eq!(bank.update(Signal::VSign, true), None);
        }
        assert_eq!(bank.update(Signal::FingerHeart, true), None);
        assert_eq!(bank.update(Signal::VSign, true), Some(true));
        assert_eq!(bank.counter(Signal::FingerHeart).consecutive_frames(), 1);
        assert_eq!(bank.counter(Signal::VSign).consecutive_frames(), 3);
    }
}
