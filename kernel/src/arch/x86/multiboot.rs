//! Multiboot header, kernel entry point, and boot-info access.
//!
//! GRUB loads the kernel at physical 4 MiB and passes the read-only
//! file-system image as the first multiboot module.

use core::arch::global_asm;

global_asm!(
    r#"
.section .multiboot, "a"
.align 4
    .long 0x1BADB002                        // magic
    .long 0x00000003                        // align modules + memory info
    .long -(0x1BADB002 + 0x00000003)        // checksum

.section .bss
.align 16
boot_stack_bottom:
    .skip 16384
boot_stack_top:

.section .text
.global _start
_start:
    lea esp, [boot_stack_top]
    xor ebp, ebp
    push ebx                                // multiboot info address
    push eax                                // multiboot magic
    call kernel_main
1:
    hlt
    jmp 1b
"#
);

/// Magic value GRUB leaves in EAX.
pub const BOOTLOADER_MAGIC: u32 = 0x2BADB002;

/// Boot information record, as laid out by the multiboot specification.
/// Only the module fields are consumed.
#[repr(C)]
pub struct BootInfo {
    flags: u32,
    mem_lower: u32,
    mem_upper: u32,
    boot_device: u32,
    cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
}

#[repr(C)]
struct Module {
    start: u32,
    end: u32,
    string: u32,
    reserved: u32,
}

/// Bit in `flags` indicating the module fields are valid.
const FLAG_MODS: u32 = 1 << 3;

/// Return the byte range of boot module `index`, if present.
///
/// # Safety
///
/// `info_addr` must be the boot-info address handed over by a multiboot
/// loader; the module list and the modules themselves must lie in mapped
/// memory (they do under the identity-mapped boot layout).
pub unsafe fn module_slice(info_addr: u32, index: usize) -> Option<&'static [u8]> {
    // SAFETY: The loader guarantees a valid BootInfo at `info_addr`.
    let info = unsafe { &*(info_addr as *const BootInfo) };
    if info.flags & FLAG_MODS == 0 || index >= info.mods_count as usize {
        return None;
    }
    // SAFETY: mods_addr points at mods_count consecutive Module records.
    let module = unsafe { &*((info.mods_addr as *const Module).add(index)) };
    if module.end <= module.start {
        return None;
    }
    let len = (module.end - module.start) as usize;
    // SAFETY: The loader placed the module at [start, end); that physical
    // range is identity-mapped.
    Some(unsafe { core::slice::from_raw_parts(module.start as *const u8, len) })
}
