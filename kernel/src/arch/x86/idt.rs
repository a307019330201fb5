//! Interrupt Descriptor Table.
//!
//! Exceptions 0..19 (vector 15 is reserved by Intel and skipped) get
//! `x86-interrupt` handlers that print a one-line diagnostic and funnel the
//! offending process into `halt` with an exit status of 256. The three IRQ
//! vectors and the system-call trap point at the hand-written entry stubs
//! and the driver handlers.

use lazy_static::lazy_static;
use x86::dtables::{lidt, DescriptorTablePointer};

use super::{entry, gdt::KERNEL_CS};
use crate::process;

/// Stack layout the CPU pushes for an interrupt without privilege change.
/// The user ESP/SS words pushed on a ring transition are not modeled; no
/// handler reads past EFLAGS.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct InterruptStackFrame {
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
}

pub type HandlerFunc = extern "x86-interrupt" fn(InterruptStackFrame);
pub type HandlerFuncWithErr = extern "x86-interrupt" fn(InterruptStackFrame, u32);

/// One 8-byte gate descriptor.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
struct IdtEntry(u64);

impl IdtEntry {
    const fn missing() -> Self {
        Self(0)
    }

    /// 32-bit interrupt gate (IF cleared on entry) at `offset`, callable
    /// from `dpl`.
    fn interrupt_gate(offset: u32, dpl: u8) -> Self {
        let offset = offset as u64;
        let type_attr = (0x8E | (dpl << 5)) as u64;
        Self(
            (offset & 0xFFFF)
                | ((KERNEL_CS as u64) << 16)
                | (type_attr << 40)
                | ((offset >> 16) << 48),
        )
    }
}

#[repr(C, align(8))]
struct Idt([IdtEntry; 256]);

impl Idt {
    fn set(&mut self, vector: usize, handler: HandlerFunc, dpl: u8) {
        self.0[vector] = IdtEntry::interrupt_gate(handler as usize as u32, dpl);
    }

    fn set_with_err(&mut self, vector: usize, handler: HandlerFuncWithErr, dpl: u8) {
        self.0[vector] = IdtEntry::interrupt_gate(handler as usize as u32, dpl);
    }

    fn set_raw(&mut self, vector: usize, stub: unsafe extern "C" fn(), dpl: u8) {
        self.0[vector] = IdtEntry::interrupt_gate(stub as usize as u32, dpl);
    }
}

/// IRQ base vector after PIC remapping.
pub const IRQ_BASE: usize = 0x20;
const PIT_VECTOR: usize = IRQ_BASE;
const KEYBOARD_VECTOR: usize = IRQ_BASE + 1;
const RTC_VECTOR: usize = IRQ_BASE + 8;
const SYSCALL_VECTOR: usize = 0x80;

lazy_static! {
    static ref IDT: Idt = {
        let mut idt = Idt([IdtEntry::missing(); 256]);

        idt.set(0, divide_error, 0);
        idt.set(1, debug, 0);
        idt.set(2, non_maskable_interrupt, 0);
        idt.set(3, breakpoint, 0);
        idt.set(4, overflow, 0);
        idt.set(5, bound_range_exceeded, 0);
        idt.set(6, invalid_opcode, 0);
        idt.set(7, device_not_available, 0);
        idt.set_with_err(8, double_fault, 0);
        idt.set(9, coprocessor_segment_overrun, 0);
        idt.set_with_err(10, invalid_tss, 0);
        idt.set_with_err(11, segment_not_present, 0);
        idt.set_with_err(12, stack_segment_fault, 0);
        idt.set_with_err(13, general_protection_fault, 0);
        idt.set_with_err(14, page_fault, 0);
        // Vector 15 is reserved.
        idt.set(16, x87_floating_point, 0);
        idt.set_with_err(17, alignment_check, 0);
        idt.set(18, machine_check, 0);
        idt.set(19, simd_floating_point, 0);

        idt.set_raw(PIT_VECTOR, entry::__trios_pit_entry, 0);
        idt.set(KEYBOARD_VECTOR, crate::drivers::keyboard::keyboard_interrupt, 0);
        idt.set(RTC_VECTOR, crate::clock::rtc_interrupt, 0);

        // System calls arrive from ring 3.
        idt.set_raw(SYSCALL_VECTOR, entry::__trios_syscall_entry, 3);

        idt
    };
}

pub fn init() {
    // SAFETY: The IDT is a lazily initialized static, so the descriptor
    // table pointer stays valid for the kernel's lifetime.
    unsafe {
        lidt(&DescriptorTablePointer {
            limit: (core::mem::size_of::<Idt>() - 1) as u16,
            base: &*IDT as *const Idt,
        });
    }
}

/// Print the diagnostic and funnel the faulting process into halt.
fn fault(name: &str, frame: &InterruptStackFrame) -> ! {
    println!("EXCEPTION: {} at {:#010x}", name, frame.eip);
    process::exception_halt();
}

macro_rules! exception_handler {
    ($fn_name:ident, $name:expr) => {
        extern "x86-interrupt" fn $fn_name(frame: InterruptStackFrame) {
            fault($name, &frame);
        }
    };
}

macro_rules! exception_handler_with_err {
    ($fn_name:ident, $name:expr) => {
        extern "x86-interrupt" fn $fn_name(frame: InterruptStackFrame, error_code: u32) {
            println!("EXCEPTION: {} (error code {:#x})", $name, error_code);
            fault($name, &frame);
        }
    };
}

exception_handler!(divide_error, "Divide By Zero");
exception_handler!(debug, "Debug");
exception_handler!(non_maskable_interrupt, "Non-Maskable Interrupt");
exception_handler!(breakpoint, "Breakpoint");
exception_handler!(overflow, "Overflow");
exception_handler!(bound_range_exceeded, "Bound Range Exceeded");
exception_handler!(invalid_opcode, "Invalid Opcode");
exception_handler!(device_not_available, "Device Not Available");
exception_handler_with_err!(double_fault, "Double Fault");
exception_handler!(coprocessor_segment_overrun, "Coprocessor Segment Overrun");
exception_handler_with_err!(invalid_tss, "Invalid TSS");
exception_handler_with_err!(segment_not_present, "Segment Not Present");
exception_handler_with_err!(stack_segment_fault, "Stack Segment Fault");
exception_handler_with_err!(general_protection_fault, "General Protection");

extern "x86-interrupt" fn page_fault(frame: InterruptStackFrame, error_code: u32) {
    let fault_addr: u32;
    // SAFETY: CR2 holds the faulting linear address; reading it has no side
    // effects.
    unsafe {
        core::arch::asm!("mov {0}, cr2", out(reg) fault_addr);
    }
    println!(
        "EXCEPTION: Page Fault accessing {:#010x} (error code {:#x})",
        fault_addr, error_code
    );
    fault("Page Fault", &frame);
}

exception_handler!(x87_floating_point, "x87 Floating Point");
exception_handler_with_err!(alignment_check, "Alignment Check");
exception_handler!(machine_check, "Machine Check");
exception_handler!(simd_floating_point, "SIMD Floating Point");
