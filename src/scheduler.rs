//! Coalesces Screen mutations into periodic snapshot deliveries.
//!
//! Grounded in `TEmulation`'s bulk-update machinery
//! (`examples/original_source/include/TEmuVt102.h`/`TEmulation.h`): the same
//! `bulk_nlcnt`/`bulk_incnt`/`bulk_timer` three-threshold shape, renamed to
//! plain field names since this crate has no macro-generated Qt timer to
//! hang a `bulk_` prefix off of. A flush is driven by whichever of three
//! conditions trips first: enough newlines, enough raw bytes, or enough
//! elapsed time since the last flush while mutations are still pending.

use std::time::{Duration, Instant};

use crate::cell::Cell;
use crate::emulation::Emulation;

/// Newline threshold: this many `\n`s since the last flush force one now.
pub const BULK_LINES: u32 = 20;
/// Byte threshold: this many bytes fed to the parser since the last flush
/// force one now.
pub const BULK_BYTES: u32 = 20480;
/// Timer threshold: if mutations are pending and this much time has passed
/// since the last flush, flush on the next poll.
pub const BULK_MS: u64 = 40;

/// A coalesced screen update ready for the renderer.
pub struct Snapshot {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
}

/// Tracks how much unflushed output an `Emulation` has absorbed and decides
/// when it is time to hand the renderer a fresh `cooked_image()`.
pub struct BulkScheduler {
    nlcnt: u32,
    incnt: u32,
    last_flush: Option<Instant>,
    dirty: bool,
    interval: Duration,
}

impl BulkScheduler {
    pub fn new() -> Self {
        BulkScheduler {
            nlcnt: 0,
            incnt: 0,
            last_flush: None,
            dirty: false,
            interval: Duration::from_millis(BULK_MS),
        }
    }

    /// Record that `block` was just fed to the emulation. Counts newlines
    /// and raw bytes toward the two immediate-flush thresholds.
    pub fn record_block(&mut self, block: &[u8]) {
        if block.is_empty() {
            return;
        }
        self.dirty = true;
        self.incnt += block.len() as u32;
        self.nlcnt += block.iter().filter(|&&b| b == b'\n').count() as u32;
    }

    /// True if a flush is due: either threshold has tripped, or the timer
    /// has elapsed while mutations are pending.
    pub fn should_flush(&self) -> bool {
        if !self.dirty {
            return false;
        }
        if self.nlcnt >= BULK_LINES || self.incnt >= BULK_BYTES {
            return true;
        }
        match self.last_flush {
            None => true,
            Some(t) => t.elapsed() >= self.interval,
        }
    }

    /// How long until the timer threshold would trip on its own, for a
    /// caller that wants to schedule a wakeup rather than poll.
    pub fn next_timeout(&self) -> Option<Duration> {
        if !self.dirty {
            return None;
        }
        match self.last_flush {
            None => Some(Duration::ZERO),
            Some(t) => Some(self.interval.saturating_sub(t.elapsed())),
        }
    }

    /// If a flush is due, take a snapshot of the emulation's active screen
    /// and reset the counters. Returns `None` if nothing is pending.
    pub fn poll(&mut self, emulation: &Emulation) -> Option<Snapshot> {
        if !self.should_flush() {
            return None;
        }
        let snapshot = Snapshot {
            rows: emulation.rows(),
            cols: emulation.cols(),
            cells: emulation.cooked_image(),
        };
        self.nlcnt = 0;
        self.incnt = 0;
        self.dirty = false;
        self.last_flush = Some(Instant::now());
        Some(snapshot)
    }
}

impl Default for BulkScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emulation() -> Emulation {
        Emulation::new(24, 80, Some(0))
    }

    #[test]
    fn no_flush_without_pending_mutations() {
        let sched = BulkScheduler::new();
        assert!(!sched.should_flush());
    }

    #[test]
    fn newline_threshold_triggers_flush() {
        let mut sched = BulkScheduler::new();
        let block = vec![b'\n'; BULK_LINES as usize];
        sched.record_block(&block);
        assert!(sched.should_flush());
    }

    #[test]
    fn byte_threshold_triggers_flush() {
        let mut sched = BulkScheduler::new();
        let block = vec![b'x'; BULK_BYTES as usize];
        sched.record_block(&block);
        assert!(sched.should_flush());
    }

    #[test]
    fn small_block_waits_for_timer() {
        let mut sched = BulkScheduler::new();
        sched.record_block(b"hi");
        assert!(sched.should_flush(), "first block always flushes immediately");
        let emu = emulation();
        sched.poll(&emu).expect("initial flush");

        sched.record_block(b"hi");
        assert!(!sched.should_flush(), "small block should wait for the timer");
    }

    #[test]
    fn poll_resets_counters() {
        let mut sched = BulkScheduler::new();
        let emu = emulation();
        sched.record_block(b"\n\n\n");
        let snap = sched.poll(&emu);
        assert!(snap.is_some());
        assert_eq!(snap.unwrap().cells.len(), 24 * 80);
        assert!(!sched.should_flush());
    }
}
