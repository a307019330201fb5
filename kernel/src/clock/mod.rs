//! Virtualized periodic clock.
//!
//! The hardware RTC runs at a fixed 1024 Hz and is never reprogrammed.
//! Each terminal owns a [`VirtualClock`]: a software divider that asserts a
//! one-bit `pending` flag at its own programmed frequency. `clock_read`
//! consumes edges by spinning on that flag with interrupts enabled, so a
//! descheduled process still makes progress — the hardware handler ticks
//! every terminal's divider regardless of which one is scheduled.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::config::CLOCK_TICK_HZ;
use crate::error::{KernelError, KernelResult};
use crate::terminal;

/// Default frequency armed by `clock_open`.
const DEFAULT_HZ: u32 = 2;

/// Reject anything that is not a power of two in 2..=1024 (exactly one bit
/// set, bit position 1..=10).
pub fn validate_frequency(raw: u32) -> Option<u32> {
    if (2..=CLOCK_TICK_HZ).contains(&raw) && raw.is_power_of_two() {
        Some(raw)
    } else {
        None
    }
}

/// Per-terminal software clock divider.
pub struct VirtualClock {
    active: AtomicBool,
    freq: AtomicU32,
    countdown: AtomicU32,
    pending: AtomicBool,
}

impl VirtualClock {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            freq: AtomicU32::new(0),
            countdown: AtomicU32::new(0),
            pending: AtomicBool::new(false),
        }
    }

    /// Arm the clock at the default 2 Hz.
    pub fn open(&self) {
        self.freq.store(DEFAULT_HZ, Ordering::Relaxed);
        self.countdown
            .store(CLOCK_TICK_HZ / DEFAULT_HZ, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Reprogram the virtual frequency. The frequency is left unchanged on
    /// rejection.
    pub fn set_frequency(&self, raw: u32) -> KernelResult<()> {
        let freq =
            validate_frequency(raw).ok_or(KernelError::UnsupportedFrequency { value: raw })?;
        self.freq.store(freq, Ordering::Relaxed);
        self.countdown.store(CLOCK_TICK_HZ / freq, Ordering::Relaxed);
        Ok(())
    }

    /// Disarm and reset all state.
    pub fn close(&self) {
        self.active.store(false, Ordering::Release);
        self.freq.store(0, Ordering::Relaxed);
        self.countdown.store(0, Ordering::Relaxed);
        self.pending.store(false, Ordering::Relaxed);
    }

    /// One 1024 Hz hardware tick: count down toward the next virtual edge.
    ///
    /// Sole writer of `countdown` is the hardware interrupt handler, so the
    /// load/store pair does not race.
    pub fn hw_tick(&self) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let remaining = self.countdown.load(Ordering::Relaxed);
        if remaining <= 1 {
            self.pending.store(true, Ordering::Release);
            let freq = self.freq.load(Ordering::Relaxed).max(1);
            self.countdown
                .store(CLOCK_TICK_HZ / freq, Ordering::Relaxed);
        } else {
            self.countdown.store(remaining - 1, Ordering::Relaxed);
        }
    }

    /// Consume a pending virtual edge, if one has fired.
    pub fn take_edge(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Block until the next virtual edge, then consume it.
    pub fn wait_edge(&self) {
        while !self.take_edge() {
            core::hint::spin_loop();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn frequency(&self) -> u32 {
        self.freq.load(Ordering::Relaxed)
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// File operations (installed by `open` for type-0 dentries)
// ---------------------------------------------------------------------------

/// `read`: one return per virtual edge, at exactly the programmed rate.
pub fn clock_read(_fd: usize, _buf: &mut [u8]) -> isize {
    terminal::scheduled().clock.wait_edge();
    0
}

/// `write`: reprogram the frequency from the little-endian buffer value.
pub fn clock_write(_fd: usize, buf: &[u8]) -> isize {
    if buf.is_empty() {
        return -1;
    }
    let mut raw = [0u8; 4];
    let len = buf.len().min(4);
    raw[..len].copy_from_slice(&buf[..len]);
    let value = u32::from_le_bytes(raw);
    match terminal::scheduled().clock.set_frequency(value) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// `open`: arm the scheduled terminal's clock at 2 Hz.
pub fn clock_open() -> isize {
    terminal::scheduled().clock.open();
    0
}

/// `close`: disarm.
pub fn clock_close(_fd: usize) -> isize {
    terminal::scheduled().clock.close();
    0
}

// ---------------------------------------------------------------------------
// Hardware interrupt handler
// ---------------------------------------------------------------------------

/// 1024 Hz RTC interrupt: advance every terminal's divider.
#[cfg(target_arch = "x86")]
pub extern "x86-interrupt" fn rtc_interrupt(
    _frame: crate::arch::x86::idt::InterruptStackFrame,
) {
    crate::arch::x86::rtc::ack_interrupt();
    for id in 0..crate::config::MAX_TERMINALS {
        terminal::get(id).clock.hw_tick();
    }
    crate::arch::x86::pic::send_eoi(crate::arch::x86::pic::RTC_IRQ);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_arms_at_two_hz() {
        let clock = VirtualClock::new();
        clock.open();
        assert!(clock.is_active());
        assert_eq!(clock.frequency(), 2);
    }

    #[test]
    fn frequency_validation_table() {
        for bad in [0u32, 1, 3, 5, 6, 7, 100, 255, 1000, 2048, 4096] {
            assert_eq!(validate_frequency(bad), None, "{} must be rejected", bad);
        }
        let mut freq = 2;
        while freq <= 1024 {
            assert_eq!(validate_frequency(freq), Some(freq));
            freq *= 2;
        }
    }

    #[test]
    fn rejection_leaves_frequency_unchanged() {
        let clock = VirtualClock::new();
        clock.open();
        clock.set_frequency(16).unwrap();
        assert!(clock.set_frequency(3).is_err());
        assert_eq!(clock.frequency(), 16);
    }

    #[test]
    fn edges_match_programmed_rate() {
        let clock = VirtualClock::new();
        clock.open();
        clock.set_frequency(16).unwrap();

        // Over K hardware ticks, expect K * freq / 1024 edges.
        let mut edges = 0;
        for _ in 0..1024 {
            clock.hw_tick();
            if clock.take_edge() {
                edges += 1;
            }
        }
        assert_eq!(edges, 16);
    }

    #[test]
    fn inactive_clock_never_fires() {
        let clock = VirtualClock::new();
        for _ in 0..2048 {
            clock.hw_tick();
        }
        assert!(!clock.take_edge());
    }

    #[test]
    fn close_resets_state() {
        let clock = VirtualClock::new();
        clock.open();
        clock.hw_tick();
        clock.close();
        assert!(!clock.is_active());
        assert_eq!(clock.frequency(), 0);
        assert!(!clock.take_edge());
    }

    #[test]
    fn unconsumed_edges_collapse() {
        // Oversleeping the consumer collapses edges into one pending bit.
        let clock = VirtualClock::new();
        clock.open();
        clock.set_frequency(1024).unwrap();
        for _ in 0..10 {
            clock.hw_tick();
        }
        assert!(clock.take_edge());
        assert!(!clock.take_edge());
    }
}
