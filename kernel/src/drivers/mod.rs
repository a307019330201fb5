//! Device drivers: the VGA text console and the PS/2 keyboard.

pub mod console;

#[cfg(target_arch = "x86")]
pub mod keyboard;
