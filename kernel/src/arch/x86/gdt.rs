//! Global Descriptor Table and Task State Segment.
//!
//! Flat 4 GiB segments for ring 0 and ring 3, plus a single TSS. The TSS is
//! never used for hardware task switching; only `esp0`/`ss0` matter, and
//! they are rewritten on every process switch so ring-3 → ring-0
//! transitions land on the right kernel stack.

use core::ptr::{addr_of, addr_of_mut};

use x86::{
    dtables::{lgdt, DescriptorTablePointer},
    segmentation::SegmentSelector,
    task::load_tr,
    Ring,
};

/// Segment selectors. Layout:
/// - 0x00: Null descriptor
/// - 0x08: Kernel code (ring 0)
/// - 0x10: Kernel data (ring 0)
/// - 0x18: User code (ring 3, selector 0x1B with RPL)
/// - 0x20: User data (ring 3, selector 0x23 with RPL)
/// - 0x28: TSS
pub const KERNEL_CS: u16 = 0x08;
pub const KERNEL_DS: u16 = 0x10;
pub const USER_CS: u16 = 0x18 | 3;
pub const USER_DS: u16 = 0x20 | 3;

const TSS_INDEX: u16 = 5;

/// 32-bit Task State Segment.
#[repr(C, packed)]
pub struct TaskStateSegment {
    link: u32,
    esp0: u32,
    ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldt: u32,
    iopb: u32,
}

impl TaskStateSegment {
    const fn new() -> Self {
        Self {
            link: 0,
            esp0: 0,
            ss0: KERNEL_DS as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldt: 0,
            // No I/O permission bitmap: offset points past the segment.
            iopb: (core::mem::size_of::<TaskStateSegment>() as u32) << 16,
        }
    }
}

static mut TSS: TaskStateSegment = TaskStateSegment::new();

static mut GDT: [u64; 6] = [0; 6];

/// Build a flat 4 GiB code/data descriptor.
///
/// `access` is the standard access byte (present, DPL, type); the flags
/// nibble is fixed at 0xC (4 KiB granularity, 32-bit).
const fn flat_descriptor(access: u8) -> u64 {
    0x000F_0000_0000_FFFF | ((access as u64) << 40) | (0xC << 52)
}

/// Build the TSS descriptor for the segment at `base`.
fn tss_descriptor(base: u32, limit: u32) -> u64 {
    let base = base as u64;
    let limit = limit as u64;
    (limit & 0xFFFF)
        | ((base & 0xFF_FFFF) << 16)
        | (0x89u64 << 40) // present, 32-bit available TSS
        | (((limit >> 16) & 0xF) << 48)
        | (((base >> 24) & 0xFF) << 56)
}

/// Load the GDT, reload every segment register, and load the task register.
///
/// Called once at boot with interrupts disabled.
pub fn init() {
    // SAFETY: Boot-time single-threaded initialization with interrupts
    // disabled; nothing else references GDT or TSS yet. The descriptor
    // table stays at a fixed static address for the kernel's lifetime.
    unsafe {
        let tss_base = addr_of!(TSS) as u32;
        let tss_limit = core::mem::size_of::<TaskStateSegment>() as u32 - 1;

        let gdt = &mut *addr_of_mut!(GDT);
        gdt[0] = 0;
        gdt[1] = flat_descriptor(0x9A); // kernel code
        gdt[2] = flat_descriptor(0x92); // kernel data
        gdt[3] = flat_descriptor(0xFA); // user code
        gdt[4] = flat_descriptor(0xF2); // user data
        gdt[5] = tss_descriptor(tss_base, tss_limit);

        lgdt(&DescriptorTablePointer {
            limit: (core::mem::size_of::<[u64; 6]>() - 1) as u16,
            base: addr_of!(GDT) as *const [u64; 6],
        });

        reload_segments();
        load_tr(SegmentSelector::new(TSS_INDEX, Ring::Ring0));
    }
}

/// Reload CS via a far return, then the data segment registers.
unsafe fn reload_segments() {
    let cs = u32::from(KERNEL_CS);
    let ds = u32::from(KERNEL_DS);
    // SAFETY: The selectors reference the flat descriptors installed by the
    // GDT we just loaded; the far return lands on the next instruction.
    unsafe {
        core::arch::asm!(
            "push {cs}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            "mov ds, {ds:x}",
            "mov es, {ds:x}",
            "mov fs, {ds:x}",
            "mov gs, {ds:x}",
            "mov ss, {ds:x}",
            cs = in(reg) cs,
            ds = in(reg) ds,
            tmp = out(reg) _,
        );
    }
}

/// Point the TSS ring-0 stack at `esp0`.
///
/// Called by `execute`, `halt`, and the scheduler so the next ring-3 → ring-0
/// transition lands on the owning process's kernel stack. Callers run with
/// interrupts disabled.
pub fn set_kernel_stack(esp0: u32) {
    // SAFETY: Single-CPU, interrupts disabled at every call site; the TSS is
    // only read by the CPU during privilege transitions.
    unsafe {
        (*addr_of_mut!(TSS)).esp0 = esp0;
        (*addr_of_mut!(TSS)).ss0 = KERNEL_DS as u32;
    }
}
