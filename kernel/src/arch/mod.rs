//! Architecture layer.
//!
//! The kernel proper targets 32-bit protected-mode x86. Hardware-independent
//! subsystems also build for the host so their logic can run under the
//! standard test harness; the handful of primitives they need from this
//! layer get no-op stubs there.

#[cfg(target_arch = "x86")]
pub mod x86;

#[cfg(target_arch = "x86")]
pub use x86::*;

#[cfg(target_arch = "x86")]
#[inline]
pub fn irq_save() -> u32 {
    let flags: u32;
    // SAFETY: Reads EFLAGS and clears IF. Pairs with `irq_restore`, which
    // only re-enables interrupts if they were enabled at save time.
    unsafe {
        core::arch::asm!("pushfd", "pop {0}", "cli", out(reg) flags);
    }
    flags
}

#[cfg(target_arch = "x86")]
#[inline]
pub fn irq_restore(flags: u32) {
    const EFLAGS_IF: u32 = 1 << 9;
    if flags & EFLAGS_IF != 0 {
        // SAFETY: Interrupts were enabled when the matching `irq_save` ran;
        // the caller has finished its critical section.
        unsafe { ::x86::irq::enable() };
    }
}

/// Enable interrupts. Used by the blocking syscall paths, which spin with
/// interrupts on so the IRQ handlers they wait for can run.
#[cfg(target_arch = "x86")]
#[inline]
pub fn irq_enable() {
    // SAFETY: Single `sti`; callers are kernel paths that are about to spin
    // on per-terminal flags and hold no locks.
    unsafe { ::x86::irq::enable() };
}

/// Halt until the next interrupt.
#[cfg(target_arch = "x86")]
#[inline]
pub fn halt() {
    // SAFETY: `hlt` with interrupts enabled simply idles the CPU.
    unsafe { ::x86::halt() };
}

// ---------------------------------------------------------------------------
// Host stubs (unit tests)
// ---------------------------------------------------------------------------

#[cfg(not(target_arch = "x86"))]
#[inline]
pub fn irq_save() -> u32 {
    0
}

#[cfg(not(target_arch = "x86"))]
#[inline]
pub fn irq_restore(_flags: u32) {}

#[cfg(not(target_arch = "x86"))]
#[inline]
pub fn irq_enable() {}

#[cfg(not(target_arch = "x86"))]
#[inline]
pub fn halt() {}
