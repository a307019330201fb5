//! Low-level context transfer: the ring-3 transition that launches a user
//! program and the kernel-stack jump that delivers its exit status back.
//!
//! `jump_to_user` works like setjmp: it saves the caller's callee-saved
//! registers and stack pointer into a [`Context`], then IRETs to ring 3.
//! When the program (or one of its descendants' base-shell respawns) halts,
//! `context_return` longjmps back into that saved context with the exit
//! status as `jump_to_user`'s return value. The parent's kernel stack is
//! untouched in between: the child runs on its own kernel stack, so the
//! saved frame stays valid for the whole lifetime of the child.

use core::arch::global_asm;

use crate::process::pcb::Context;

use super::gdt::{USER_CS, USER_DS};

global_asm!(
    r#"
.global __trios_jump_to_user
__trios_jump_to_user:
    push ebx
    push esi
    push edi
    push ebp
    mov eax, [esp + 28]         // context save area
    mov [eax], esp              // Context.esp
    mov [eax + 4], ebp          // Context.ebp
    mov ecx, [esp + 20]         // program entry point
    mov edx, [esp + 24]         // user stack pointer
    mov ax, {user_ds}
    mov ds, ax
    mov es, ax
    push {user_ds}              // SS
    push edx                    // ESP
    pushfd
    pop eax
    or eax, 0x200               // IF set on entry to user mode
    push eax                    // EFLAGS
    push {user_cs}              // CS
    push ecx                    // EIP
    iretd

.global __trios_context_return
__trios_context_return:
    mov eax, [esp + 8]          // exit status
    mov ecx, [esp + 4]          // context to resume
    mov esp, [ecx]
    pop ebp
    pop edi
    pop esi
    pop ebx
    ret
"#,
    user_ds = const USER_DS,
    user_cs = const USER_CS,
);

extern "C" {
    fn __trios_jump_to_user(entry: u32, user_esp: u32, ctx: *mut Context) -> i32;
    fn __trios_context_return(ctx: *const Context, status: i32) -> !;
}

/// Drop to ring 3 at `entry` with the user stack at `user_esp`.
///
/// Returns only when a matching [`context_return`] fires, carrying the exit
/// status of the program tree launched here.
///
/// # Safety
///
/// The user program page must be mapped for the launching process, the TSS
/// ring-0 stack must point at its kernel stack, and `ctx` must stay valid
/// (and untouched) until the program halts.
pub unsafe fn jump_to_user(entry: u32, user_esp: u32, ctx: *mut Context) -> i32 {
    // SAFETY: Contract forwarded to the caller.
    unsafe { __trios_jump_to_user(entry, user_esp, ctx) }
}

/// Resume the kernel context saved by [`jump_to_user`], making it return
/// `status`. Never returns to the caller.
///
/// # Safety
///
/// `ctx` must have been filled in by `jump_to_user` on a kernel stack that
/// has not been reused since.
pub unsafe fn context_return(ctx: *const Context, status: i32) -> ! {
    // SAFETY: Contract forwarded to the caller.
    unsafe { __trios_context_return(ctx, status) }
}
