//! Synchronization primitives.
//!
//! The kernel runs on a single CPU; the only concurrency is hardware
//! interrupts preempting kernel or user code. [`IrqLock`] is therefore the
//! workhorse: a spin mutex whose critical sections also mask interrupts, so
//! an IRQ handler can never spin against an interrupted lock holder.

mod irq_lock;

pub use irq_lock::{IrqLock, IrqLockGuard};
