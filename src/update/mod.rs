//! Update-decision state
//!
//! The CGC SRAM is double-buffered, so a full refresh has to be committed on
//! two consecutive frames before both banks agree. [`ConvergenceCounter`]
//! counts the restores still owed; [`UpdateCounters`] pairs the global counter
//! with the CGC one and applies the arming rules.

use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

/// Restores needed for both SRAM banks to converge
pub const MAX_RESET_CNT: u32 = 2;

/// Saturating countdown of pending restores
#[derive(Debug, Default)]
pub struct ConvergenceCounter(AtomicU32);

impl ConvergenceCounter {
    /// Counter at zero
    pub const fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    /// Set the counter to `value`
    pub fn arm(&self, value: u32) {
        self.0.store(value, Ordering::SeqCst);
    }

    /// Replace `current` with `value`, leaving any other count untouched.
    ///
    /// Returns whether the swap happened.
    pub fn arm_if(&self, current: u32, value: u32) -> bool {
        self.0
            .compare_exchange(current, value, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Arm to `value` only when nothing is pending
    pub fn arm_if_zero(&self, value: u32) -> bool {
        self.arm_if(0, value)
    }

    /// Consume one pending restore; false when none was pending
    pub fn tick(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok()
    }

    /// Current count
    pub fn value(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Which counter a reset targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetTarget {
    /// Whole-pipe restore counter
    Global,
    /// CGC SRAM refresh counter
    Cgc,
}

/// How hard to arm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetKind {
    /// Both banks need a refresh
    Full,
    /// At least one more refresh, keeping a higher pending count
    Opt,
}

/// Restore counters of one pipe
#[derive(Debug, Default)]
pub struct UpdateCounters {
    global: ConvergenceCounter,
    cgc: ConvergenceCounter,
    sram_retention: bool,
}

impl UpdateCounters {
    /// Both counters at zero
    pub fn new(sram_retention: bool) -> Self {
        Self {
            global: ConvergenceCounter::new(),
            cgc: ConvergenceCounter::new(),
            sram_retention,
        }
    }

    /// Arm a counter.
    ///
    /// `Global/Opt` asks for one restore if none is pending. `Cgc/Opt` tops a
    /// single pending refresh up to both banks, as the SRAM indicator is lost
    /// on power down.
    pub fn reset(&self, target: ResetTarget, kind: ResetKind) {
        match (target, kind) {
            (ResetTarget::Global, ResetKind::Opt) => {
                self.global.arm_if_zero(1);
            }
            (ResetTarget::Cgc, ResetKind::Opt) => {
                self.cgc.arm_if(1, MAX_RESET_CNT);
            }
            (ResetTarget::Global, ResetKind::Full) => self.global.arm(MAX_RESET_CNT),
            (ResetTarget::Cgc, ResetKind::Full) => self.cgc.arm(MAX_RESET_CNT),
        }
        debug!("{} updates required", self.global.value());
    }

    /// Consume one global restore if pending
    pub fn update_required(&self) -> bool {
        self.global.tick()
    }

    /// Whether this restore has to reload the CGC SRAM
    pub fn cgc_update_required(&self) -> bool {
        !self.sram_retention || self.cgc.tick()
    }

    /// Pending global restores
    pub fn pending(&self) -> u32 {
        self.global.value()
    }

    /// Pending CGC refreshes
    pub fn cgc_pending(&self) -> u32 {
        self.cgc.value()
    }

    /// Whether the CGC SRAM keeps its content across power states
    pub fn sram_retention(&self) -> bool {
        self.sram_retention
    }
}

/// Rectangle size in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

/// Per-commit input from the display pipe
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameState {
    /// Adjusted mode size
    pub mode: Size,
    /// Partial update region size
    pub partial_region: Size,
    /// Whether this frame uses partial update
    pub partial: bool,
    /// Input bits per component
    pub in_bpc: u32,
    /// Output bits per component
    pub out_bpc: u32,
    /// Active color mode
    pub color_mode: u32,
    /// Active render intent
    pub render_intent: u32,
    /// Colormode DMA buffer descriptor, zero or negative when absent
    pub dqe_fd: i64,
    /// Panel dimming state, reported on the debug surface
    pub dimming: bool,
    /// Colormode snapshot handed over by `prepare`
    #[serde(skip)]
    pub colormode: Option<std::sync::Arc<Vec<u8>>>,
}

impl FrameState {
    /// Full-frame state of `width` x `height` at the given bit depths
    pub fn new(width: u32, height: u32, in_bpc: u32, out_bpc: u32) -> Self {
        Self {
            mode: Size { width, height },
            in_bpc,
            out_bpc,
            ..Self::default()
        }
    }

    /// Frame size the DQE processes
    pub fn active_size(&self, pipe_partial: bool) -> Size {
        if pipe_partial && self.partial {
            self.partial_region
        } else {
            self.mode
        }
    }
}

/// Last frame geometry and bit depths programmed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Processed width
    pub width: u32,
    /// Processed height
    pub height: u32,
    /// Input bits per component
    pub in_bpc: u32,
    /// Output bits per component
    pub out_bpc: u32,
}

impl DisplayConfig {
    /// Whether size and input depth are known
    pub fn is_complete(&self) -> bool {
        self.in_bpc != 0 && self.width != 0 && self.height != 0
    }

    /// Take over the frame's geometry; true when anything changed
    pub fn check(&mut self, frame: &FrameState, pipe_partial: bool) -> bool {
        let size = frame.active_size(pipe_partial);
        let next = DisplayConfig {
            width: size.width,
            height: size.height,
            in_bpc: frame.in_bpc,
            out_bpc: frame.out_bpc,
        };
        if *self == next {
            return false;
        }
        *self = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_tick_saturates_at_zero() {
        let counter = ConvergenceCounter::new();
        assert!(!counter.tick());
        counter.arm(2);
        assert!(counter.tick());
        assert!(counter.tick());
        assert!(!counter.tick());
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_arm_if() {
        let counter = ConvergenceCounter::new();
        assert!(counter.arm_if_zero(1));
        assert!(!counter.arm_if_zero(5));
        assert_eq!(counter.value(), 1);
        assert!(counter.arm_if(1, 2));
        assert_eq!(counter.value(), 2);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(2, 2)]
    fn test_global_opt_keeps_higher(#[case] pending: u32, #[case] expected: u32) {
        let counters = UpdateCounters::new(false);
        counters.global.arm(pending);
        counters.reset(ResetTarget::Global, ResetKind::Opt);
        assert_eq!(counters.pending(), expected);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 2)]
    #[case(2, 2)]
    fn test_cgc_opt_tops_up_single(#[case] pending: u32, #[case] expected: u32) {
        let counters = UpdateCounters::new(true);
        counters.cgc.arm(pending);
        counters.reset(ResetTarget::Cgc, ResetKind::Opt);
        assert_eq!(counters.cgc_pending(), expected);
    }

    #[test]
    fn test_full_converges_in_two() {
        let counters = UpdateCounters::new(false);
        counters.reset(ResetTarget::Global, ResetKind::Full);
        let restores = (0..5).filter(|_| counters.update_required()).count();
        assert_eq!(restores, 2);
    }

    #[test]
    fn test_cgc_without_retention_always_reloads() {
        let counters = UpdateCounters::new(false);
        assert!(counters.cgc_update_required());
        assert!(counters.cgc_update_required());

        let counters = UpdateCounters::new(true);
        assert!(!counters.cgc_update_required());
        counters.reset(ResetTarget::Cgc, ResetKind::Full);
        assert!(counters.cgc_update_required());
        assert!(counters.cgc_update_required());
        assert!(!counters.cgc_update_required());
    }

    #[test]
    fn test_config_check() {
        let mut cfg = DisplayConfig::default();
        assert!(!cfg.is_complete());
        let frame = FrameState::new(1080, 2400, 10, 8);
        assert!(cfg.check(&frame, false));
        assert!(!cfg.check(&frame, false));
        assert!(cfg.is_complete());
        assert_eq!((cfg.width, cfg.height), (1080, 2400));
    }

    #[test]
    fn test_partial_needs_pipe_and_frame() {
        let mut frame = FrameState::new(1080, 2400, 10, 8);
        frame.partial = true;
        frame.partial_region = Size { width: 1080, height: 600 };
        assert_eq!(frame.active_size(false), frame.mode);
        assert_eq!(frame.active_size(true).height, 600);

        let mut cfg = DisplayConfig::default();
        cfg.check(&frame, false);
        assert!(cfg.check(&frame, true));
        assert_eq!(cfg.height, 600);
    }
}
