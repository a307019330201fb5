//! Compile-time layout and rate constants shared across the kernel.
//!
//! The memory map is fixed: the kernel occupies the 4 MiB physical page at
//! 4–8 MiB, identity-mapped. Kernel stacks grow down from the top of that
//! page, one 8 KiB stack per possible process. User program images occupy
//! the 4 MiB physical pages starting at 8 MiB, one per process, and are
//! always mapped at virtual 128 MiB while their owner is scheduled.

/// Number of text terminals multiplexed over the single VGA frame.
pub const MAX_TERMINALS: usize = 3;

/// Maximum number of simultaneously live processes (PIDs 0..5).
pub const MAX_PROCESSES: usize = 6;

/// Open-file slots per process, including stdin/stdout.
pub const MAX_OPEN_FILES: usize = 8;

pub const FOUR_KB: u32 = 4 * 1024;
pub const FOUR_MB: u32 = 4 * 1024 * 1024;
pub const EIGHT_MB: u32 = 8 * 1024 * 1024;

/// Per-process kernel stack size.
pub const KERNEL_STACK_SIZE: u32 = 8 * 1024;

/// Physical (and, through the kernel video table, virtual) address of the
/// VGA text frame. The three terminal shadow pages follow it.
pub const VIDEO_MEM: u32 = 0xB8000;

/// Page-frame number of the VGA text frame (`VIDEO_MEM >> 12`).
pub const VIDEO_PAGE_FRAME: usize = 0xB8;

/// Page-directory index of the 4 MiB user program page (virtual 128 MiB).
pub const USER_PAGE_DIR_INDEX: usize = 32;

/// Page-directory index of the 4 KiB user video alias (virtual 256 MiB).
pub const USER_VIDEO_DIR_INDEX: usize = 64;

/// Bottom of the user program window.
pub const USER_SPACE_START: u32 = 128 * 1024 * 1024;

/// First byte past the user program window.
pub const USER_SPACE_END: u32 = 132 * 1024 * 1024;

/// Virtual address user video memory is exposed at by `vidmap`.
pub const USER_VIDEO_BASE: u32 = 256 * 1024 * 1024;

/// Fixed load address of a user executable inside the user page.
pub const USER_IMAGE_BASE: u32 = 0x0804_8000;

/// Initial user stack pointer (top of the user page, minus one word).
pub const USER_STACK_TOP: u32 = USER_SPACE_END - 4;

/// Executables start with this magic sequence.
pub const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];

/// Byte offset of the little-endian program entry point in the executable.
pub const ENTRY_POINT_OFFSET: usize = 24;

/// Line-buffer capacity; at most 127 characters plus the trailing newline.
pub const LINE_BUF_SIZE: usize = 128;

/// Maximum length of the argument string stored in a PCB.
pub const MAX_ARG_LEN: usize = 100;

/// Scheduler quantum source: PIT channel 0 rate.
pub const SCHED_TICK_HZ: u32 = 100;

/// Hardware periodic clock rate backing the per-terminal virtual clocks.
pub const CLOCK_TICK_HZ: u32 = 1024;

/// Command the scheduler boots on each terminal, and the one halt respawns
/// when a base shell exits.
pub const SHELL_CMD: &[u8] = b"shell";

/// The shell's prompt string. `terminal_write` re-echoes the pending line
/// buffer when it sees this exact prefix, so keystrokes typed while a
/// program was running surface once the prompt returns.
pub const SHELL_PROMPT: &[u8] = b"TriOS> ";

/// Ring-0 stack pointer loaded into the TSS for a process: the top of its
/// 8 KiB kernel stack, minus one word.
pub const fn kernel_stack_top(pid: usize) -> u32 {
    EIGHT_MB - (pid as u32) * KERNEL_STACK_SIZE - 4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_stacks_descend_from_kernel_top() {
        assert_eq!(kernel_stack_top(0), 0x7FFFFC);
        assert_eq!(kernel_stack_top(1), kernel_stack_top(0) - KERNEL_STACK_SIZE);
        // The lowest stack still sits above the 4 MiB kernel base.
        assert!(kernel_stack_top(MAX_PROCESSES - 1) - KERNEL_STACK_SIZE > FOUR_MB);
    }

    #[test]
    fn user_window_is_one_directory_entry() {
        assert_eq!(USER_SPACE_START >> 22, USER_PAGE_DIR_INDEX as u32);
        assert_eq!(USER_SPACE_END - USER_SPACE_START, FOUR_MB);
        assert_eq!(USER_VIDEO_BASE >> 22, USER_VIDEO_DIR_INDEX as u32);
    }
}
