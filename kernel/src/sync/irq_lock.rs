//! Interrupt-masking spin lock.

use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use crate::arch;

/// A spin mutex that disables interrupts for the duration of the critical
/// section.
///
/// On a single CPU this makes the lock safe to take from both thread
/// context and IRQ handlers: a handler can only run while the lock is free,
/// because every holder has IF clear. The saved interrupt state is restored
/// when the guard drops, so nesting is fine.
///
/// Never hold a guard across a blocking spin (`terminal_read`,
/// `clock_read`) or across the scheduler context switch.
pub struct IrqLock<T> {
    inner: Mutex<T>,
}

pub struct IrqLockGuard<'a, T> {
    // Dropped before interrupts are restored (field order matters).
    guard: Option<MutexGuard<'a, T>>,
    saved_flags: u32,
}

impl<T> IrqLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn lock(&self) -> IrqLockGuard<'_, T> {
        let saved_flags = arch::irq_save();
        IrqLockGuard {
            guard: Some(self.inner.lock()),
            saved_flags,
        }
    }
}

impl<T> Deref for IrqLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.guard.as_ref().expect("guard taken")
    }
}

impl<T> DerefMut for IrqLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.guard.as_mut().expect("guard taken")
    }
}

impl<T> Drop for IrqLockGuard<'_, T> {
    fn drop(&mut self) {
        // Release the mutex before re-enabling interrupts.
        self.guard.take();
        arch::irq_restore(self.saved_flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_round_trip() {
        let lock = IrqLock::new(7u32);
        {
            let mut v = lock.lock();
            *v += 1;
        }
        assert_eq!(*lock.lock(), 8);
    }

    #[test]
    fn nested_independent_locks() {
        let a = IrqLock::new(1u32);
        let b = IrqLock::new(2u32);
        let ga = a.lock();
        let gb = b.lock();
        assert_eq!(*ga + *gb, 3);
    }
}
