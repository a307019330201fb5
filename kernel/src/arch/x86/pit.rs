//! Programmable interval timer (channel 0) — the scheduler's heartbeat.

use x86::io::outb;

use super::pic;
use crate::config::SCHED_TICK_HZ;

const PIT_CH0: u16 = 0x40;
const PIT_MODE_REG: u16 = 0x43;

/// Channel 0, lobyte/hibyte access, rate-generator mode.
const PIT_MODE: u8 = 0x34;

/// Base oscillator frequency of the 8254.
const PIT_BASE_HZ: u32 = 1_193_182;

/// Program channel 0 for the 100 Hz scheduler tick and unmask IRQ0.
///
/// The IDT gate for vector 0x20 is installed by `idt::init`; once this runs
/// and interrupts are enabled, the scheduler starts rotating.
pub fn init() {
    let reload = (PIT_BASE_HZ / SCHED_TICK_HZ) as u16;
    // SAFETY: Mode/reload writes in the sequence the 8254 datasheet
    // specifies for lobyte/hibyte access; run at boot with interrupts off.
    unsafe {
        outb(PIT_MODE_REG, PIT_MODE);
        outb(PIT_CH0, (reload & 0xFF) as u8);
        outb(PIT_CH0, (reload >> 8) as u8);
    }
    pic::enable_irq(pic::PIT_IRQ);
    log::debug!("PIT: channel 0 at {} Hz (reload {})", SCHED_TICK_HZ, reload);
}
