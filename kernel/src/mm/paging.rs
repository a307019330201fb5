//! Paging manager.
//!
//! One page directory for the whole system. The kernel is a single global
//! 4 MiB supervisor page at 4–8 MiB; directory entry 32 is the 4 MiB user
//! program window at virtual 128 MiB, remapped to `(2 + pid) · 4 MiB`
//! whenever a different process is scheduled; directory entry 0 references
//! the kernel video table whose slot 0xB8 is the *writable alias* — every
//! console write in the kernel goes through virtual 0xB8000, and this slot
//! decides whether those stores land on the real VGA frame or in a
//! background terminal's shadow page. Directory entry 64 backs `vidmap`
//! with the same retargeting for user programs.
//!
//! Every mutation of a live entry ends with a full TLB flush.

use bitflags::bitflags;

bitflags! {
    /// Page directory / page table entry flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT       = 1 << 0;
        const WRITABLE      = 1 << 1;
        const USER          = 1 << 2;
        const WRITE_THROUGH = 1 << 3;
        const NO_CACHE      = 1 << 4;
        const ACCESSED      = 1 << 5;
        const DIRTY         = 1 << 6;
        /// 4 MiB page (directory entries only).
        const LARGE         = 1 << 7;
        const GLOBAL        = 1 << 8;
    }
}

/// Entry construction is pure bit math, kept separate from the live tables
/// so it can be checked on the host.
pub mod entry {
    use super::PageFlags;
    use crate::config::VIDEO_PAGE_FRAME;

    /// 4 MiB directory entry mapping the given 4 MiB physical frame.
    pub fn large_page(frame_4mb: u32, flags: PageFlags) -> u32 {
        (frame_4mb << 22) | (flags | PageFlags::LARGE).bits()
    }

    /// Directory entry referencing a 4 KiB-aligned page table.
    pub fn table_ref(table_addr: u32, flags: PageFlags) -> u32 {
        (table_addr & 0xFFFF_F000) | flags.bits()
    }

    /// Page-table entry mapping the given 4 KiB physical frame.
    pub fn small_page(frame: u32, flags: PageFlags) -> u32 {
        (frame << 12) | flags.bits()
    }

    /// The user program window entry for `pid`: physical `(2 + pid) · 4 MiB`,
    /// user-accessible, cache-disabled.
    pub fn user_prog(pid: usize, present: bool) -> u32 {
        let mut flags = PageFlags::WRITABLE | PageFlags::USER | PageFlags::NO_CACHE;
        if present {
            flags |= PageFlags::PRESENT;
        }
        large_page(2 + pid as u32, flags)
    }

    /// Page-frame number the writable video alias (or the user video page)
    /// should target: the real VGA frame when the terminal is the visible
    /// one, its shadow page otherwise.
    pub fn video_target_frame(terminal: usize, visible: usize) -> u32 {
        if terminal == visible {
            VIDEO_PAGE_FRAME as u32
        } else {
            VIDEO_PAGE_FRAME as u32 + terminal as u32 + 1
        }
    }
}

#[cfg(target_arch = "x86")]
pub use tables::{
    change_terminal_video_page, flush_tlb, init, redirect_vidmem_page, set_user_prog_page,
    set_user_video_page,
};

#[cfg(target_arch = "x86")]
mod tables {
    use core::ptr::addr_of_mut;

    use super::{entry, PageFlags};
    use crate::config::{
        FOUR_KB, MAX_TERMINALS, USER_PAGE_DIR_INDEX, USER_VIDEO_DIR_INDEX, VIDEO_MEM,
        VIDEO_PAGE_FRAME,
    };
    use crate::terminal;

    const TABLE_ENTRIES: usize = 1024;

    #[repr(C, align(4096))]
    struct PageTable([u32; TABLE_ENTRIES]);

    impl PageTable {
        const fn zeroed() -> Self {
            Self([0; TABLE_ENTRIES])
        }
    }

    // The directory and both helper tables live in kernel .bss. Every path
    // that mutates them (boot init, syscalls, the scheduler tick, the
    // keyboard echo redirect) runs with interrupts disabled, so access is
    // serialized without a lock.
    static mut PAGE_DIRECTORY: PageTable = PageTable::zeroed();
    static mut KERNEL_VIDEO_TABLE: PageTable = PageTable::zeroed();
    static mut USER_VIDEO_TABLE: PageTable = PageTable::zeroed();

    fn directory() -> &'static mut [u32; TABLE_ENTRIES] {
        // SAFETY: See the access discipline note above; callers hold IF
        // clear for the duration of the borrow.
        unsafe { &mut (*addr_of_mut!(PAGE_DIRECTORY)).0 }
    }

    fn kernel_video_table() -> &'static mut [u32; TABLE_ENTRIES] {
        // SAFETY: As for `directory`.
        unsafe { &mut (*addr_of_mut!(KERNEL_VIDEO_TABLE)).0 }
    }

    fn user_video_table() -> &'static mut [u32; TABLE_ENTRIES] {
        // SAFETY: As for `directory`.
        unsafe { &mut (*addr_of_mut!(USER_VIDEO_TABLE)).0 }
    }

    /// Build the boot page layout and turn paging on.
    pub fn init() {
        let dir = directory();

        // Every entry starts as a not-present 4 MiB identity mapping, so
        // flipping the present bit on any entry maps itself.
        for (i, slot) in dir.iter_mut().enumerate() {
            *slot = entry::large_page(i as u32, PageFlags::WRITABLE);
        }

        // Entry 1: the kernel's 4 MiB page, supervisor-only, global,
        // cache-disabled.
        dir[1] = entry::large_page(
            1,
            PageFlags::PRESENT | PageFlags::WRITABLE | PageFlags::NO_CACHE | PageFlags::GLOBAL,
        );

        // Kernel video table: identity entries, with the VGA frame and the
        // three terminal shadow pages present.
        let video = kernel_video_table();
        for (i, slot) in video.iter_mut().enumerate() {
            let mut flags = PageFlags::WRITABLE;
            if (VIDEO_PAGE_FRAME..=VIDEO_PAGE_FRAME + MAX_TERMINALS).contains(&i) {
                flags |= PageFlags::PRESENT;
            }
            *slot = entry::small_page(i as u32, flags);
        }

        // Entry 0 references the video table (4 KiB granularity).
        dir[0] = entry::table_ref(
            video.as_ptr() as u32,
            PageFlags::PRESENT | PageFlags::WRITABLE,
        );

        // User video table: slot 0 is filled in by `set_user_video_page`.
        let user_video = user_video_table();
        for slot in user_video.iter_mut() {
            *slot = 0;
        }

        let dir_addr = dir.as_ptr() as u32;
        // SAFETY: The directory is fully initialized above. Loading CR3,
        // setting CR4.PSE (4 MiB pages) and CR0.PG is the architected enable
        // sequence; the kernel and the currently executing code are identity
        // mapped, so execution continues seamlessly.
        unsafe {
            core::arch::asm!("mov cr3, {0}", in(reg) dir_addr);
            core::arch::asm!(
                "mov {tmp}, cr4",
                "or {tmp}, 0x10",
                "mov cr4, {tmp}",
                tmp = out(reg) _,
            );
            core::arch::asm!(
                "mov {tmp}, cr0",
                "or {tmp}, 0x80000000",
                "mov cr0, {tmp}",
                tmp = out(reg) _,
            );
        }
        log::info!("paging: enabled, directory at {:#010x}", dir_addr);
    }

    /// Map (or unmap) the 4 MiB user program window for `pid`.
    pub fn set_user_prog_page(pid: usize, present: bool) {
        directory()[USER_PAGE_DIR_INDEX] = entry::user_prog(pid, present);
        flush_tlb();
    }

    /// Present (or hide) the user video alias at virtual 256 MiB, aimed at
    /// the scheduled terminal's view.
    pub fn set_user_video_page(present: bool) {
        let scheduled = terminal::scheduled_id();
        let visible = terminal::visible_id();

        let mut flags = PageFlags::WRITABLE | PageFlags::USER;
        if present {
            flags |= PageFlags::PRESENT;
        }
        user_video_table()[0] =
            entry::small_page(entry::video_target_frame(scheduled, visible), flags);
        directory()[USER_VIDEO_DIR_INDEX] =
            entry::table_ref(user_video_table().as_ptr() as u32, flags);
        flush_tlb();
    }

    /// Aim the kernel writable video alias at `terminal`'s view: the real
    /// VGA frame if it is visible, its shadow page otherwise.
    pub fn redirect_vidmem_page(terminal_id: usize) {
        if terminal_id >= MAX_TERMINALS {
            return;
        }
        let visible = terminal::visible_id();
        kernel_video_table()[VIDEO_PAGE_FRAME] = entry::small_page(
            entry::video_target_frame(terminal_id, visible),
            PageFlags::PRESENT | PageFlags::WRITABLE,
        );
        flush_tlb();
    }

    /// Swap screen contents on a visible-terminal switch: the VGA frame is
    /// saved into `from`'s shadow page, then `to`'s shadow is copied onto
    /// the frame.
    ///
    /// Leaves the writable alias aimed at the real frame; the caller
    /// restores the scheduled terminal's aliasing afterwards.
    pub fn change_terminal_video_page(from: usize, to: usize) {
        if from >= MAX_TERMINALS || to >= MAX_TERMINALS {
            return;
        }

        // Aim the alias at the real frame so VIDEO_MEM addresses it.
        kernel_video_table()[VIDEO_PAGE_FRAME] = entry::small_page(
            VIDEO_PAGE_FRAME as u32,
            PageFlags::PRESENT | PageFlags::WRITABLE,
        );
        flush_tlb();

        let frame = VIDEO_MEM as *mut u8;
        let from_shadow = (VIDEO_MEM + (from as u32 + 1) * FOUR_KB) as *mut u8;
        let to_shadow = (VIDEO_MEM + (to as u32 + 1) * FOUR_KB) as *const u8;
        // SAFETY: The frame and both shadow pages are present in the kernel
        // video table and identity mapped; the ranges are disjoint 4 KiB
        // pages. Callers run with interrupts disabled.
        unsafe {
            core::ptr::copy_nonoverlapping(frame as *const u8, from_shadow, FOUR_KB as usize);
            core::ptr::copy_nonoverlapping(to_shadow, frame, FOUR_KB as usize);
        }
        flush_tlb();
    }

    /// Full TLB flush by reloading CR3.
    pub fn flush_tlb() {
        // SAFETY: Rewriting CR3 with its own value invalidates all
        // non-global TLB entries and has no other effect.
        unsafe {
            core::arch::asm!(
                "mov {tmp}, cr3",
                "mov cr3, {tmp}",
                tmp = out(reg) _,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prog_entry_maps_past_kernel() {
        // PID p lives at physical (2 + p) * 4 MiB.
        let e = entry::user_prog(0, true);
        assert_eq!(e >> 22, 2);
        let e = entry::user_prog(5, true);
        assert_eq!(e >> 22, 7);
    }

    #[test]
    fn user_prog_entry_flags() {
        let e = PageFlags::from_bits_truncate(entry::user_prog(3, true));
        assert!(e.contains(PageFlags::PRESENT));
        assert!(e.contains(PageFlags::USER));
        assert!(e.contains(PageFlags::WRITABLE));
        assert!(e.contains(PageFlags::LARGE));
        assert!(e.contains(PageFlags::NO_CACHE));

        let e = PageFlags::from_bits_truncate(entry::user_prog(3, false));
        assert!(!e.contains(PageFlags::PRESENT));
    }

    #[test]
    fn video_alias_targets() {
        // Visible terminal writes hit the real frame.
        assert_eq!(entry::video_target_frame(1, 1), 0xB8);
        // Background terminals write into their own shadows.
        assert_eq!(entry::video_target_frame(0, 1), 0xB9);
        assert_eq!(entry::video_target_frame(1, 0), 0xBA);
        assert_eq!(entry::video_target_frame(2, 0), 0xBB);
    }

    #[test]
    fn table_ref_masks_low_bits() {
        let e = entry::table_ref(0x0012_3456, PageFlags::PRESENT | PageFlags::WRITABLE);
        assert_eq!(e & 0xFFFF_F000, 0x0012_3000);
        assert_eq!(e & 0xFFF, 0x3);
    }

    #[test]
    fn identity_boot_entry_maps_itself() {
        for i in [0u32, 1, 32, 1023] {
            let e = entry::large_page(i, PageFlags::WRITABLE);
            assert_eq!(e >> 22, i);
            assert_eq!(e & 1, 0, "boot entries start not-present");
        }
    }
}
