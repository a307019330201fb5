//! CMOS real-time clock — the hardware side of the virtual clock.
//!
//! The RTC is programmed once, at its maximum periodic rate of 1024 Hz, and
//! never reprogrammed: user-visible frequencies are synthesized in software
//! by per-terminal dividers (see [`crate::clock`]). Register C must be read
//! on every interrupt or the chip stops generating them.

use x86::io::{inb, outb};

use super::pic;

const RTC_PORT: u16 = 0x70;
const CMOS_PORT: u16 = 0x71;

/// Register selectors with the NMI-disable bit set.
const REG_A_NMI: u8 = 0x8A;
const REG_B_NMI: u8 = 0x8B;
const REG_C: u8 = 0x0C;

/// Rate-selector value for 1024 Hz in register A's low nibble.
const RATE_1024_HZ: u8 = 0x06;

/// Program periodic interrupts at 1024 Hz and unmask IRQ8.
pub fn init() {
    // SAFETY: Standard CMOS select/read/write pairs with NMI disabled while
    // a register is selected; run once at boot with interrupts off.
    unsafe {
        // Turn on periodic interrupts (register B, bit 6).
        outb(RTC_PORT, REG_B_NMI);
        let prev = inb(CMOS_PORT);
        outb(RTC_PORT, REG_B_NMI);
        outb(CMOS_PORT, prev | 0x40);

        // Select the 1024 Hz rate (register A, low nibble).
        outb(RTC_PORT, REG_A_NMI);
        let prev = inb(CMOS_PORT);
        outb(RTC_PORT, REG_A_NMI);
        outb(CMOS_PORT, (prev & 0xF0) | RATE_1024_HZ);
    }
    pic::enable_irq(pic::RTC_IRQ);
    log::debug!("RTC: periodic interrupts at 1024 Hz");
}

/// Acknowledge the pending interrupt by draining register C.
pub fn ack_interrupt() {
    // SAFETY: Selecting and reading register C is the architected way to
    // rearm the periodic interrupt; the value itself is discarded.
    unsafe {
        outb(RTC_PORT, REG_C);
        let _ = inb(CMOS_PORT);
    }
}
