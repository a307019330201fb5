//! 32-bit x86 (protected mode) support: descriptor tables, interrupt
//! controller, timers, low-level context switching, and the multiboot entry.

pub mod context;
pub mod entry;
pub mod gdt;
pub mod idt;
pub mod multiboot;
pub mod pic;
pub mod pit;
pub mod rtc;
