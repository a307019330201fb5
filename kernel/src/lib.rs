//! TriOS kernel library.
//!
//! A single-core, protected-mode x86 kernel: three text terminals over one
//! VGA frame, round-robin scheduling between them, user programs loaded
//! from a read-only file system, and a small POSIX-like syscall surface.
//!
//! Hardware-independent subsystems (file system, line discipline, virtual
//! clock, process/descriptor tables, paging entry math) also compile for
//! the host, where their unit tests run under the standard harness.

#![no_std]
#![cfg_attr(target_arch = "x86", feature(abi_x86_interrupt))]

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod print;

pub mod arch;
pub mod clock;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fs;
pub mod mm;
pub mod process;
pub mod sync;
pub mod terminal;

#[cfg(target_arch = "x86")]
pub mod log_service;
#[cfg(target_arch = "x86")]
pub mod sched;
#[cfg(target_arch = "x86")]
pub mod serial;
#[cfg(target_arch = "x86")]
pub mod syscall;
