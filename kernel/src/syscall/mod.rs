//! System-call dispatch (software interrupt 0x80).
//!
//! Register convention: EAX carries the call number, EBX/ECX/EDX the
//! arguments, EAX the result. The entry stub preserves everything else.
//! Validation is uniform — descriptors must be in range and in use,
//! buffers non-null — and every failure folds to -1.

use crate::arch;
use crate::config::{
    MAX_ARG_LEN, MAX_OPEN_FILES, USER_SPACE_END, USER_SPACE_START, USER_VIDEO_BASE,
};
use crate::fs::{self, FileType};
use crate::mm::paging;
use crate::process::{
    self, exec,
    pcb::{CLOCK_OPS, DIR_OPS, FILE_OPS},
};

/// System call numbers
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Halt = 1,
    Execute = 2,
    Read = 3,
    Write = 4,
    Open = 5,
    Close = 6,
    Getargs = 7,
    Vidmap = 8,
    SetHandler = 9,
    Sigreturn = 10,
}

impl TryFrom<u32> for Syscall {
    type Error = ();

    fn try_from(raw: u32) -> Result<Self, ()> {
        match raw {
            1 => Ok(Syscall::Halt),
            2 => Ok(Syscall::Execute),
            3 => Ok(Syscall::Read),
            4 => Ok(Syscall::Write),
            5 => Ok(Syscall::Open),
            6 => Ok(Syscall::Close),
            7 => Ok(Syscall::Getargs),
            8 => Ok(Syscall::Vidmap),
            9 => Ok(Syscall::SetHandler),
            10 => Ok(Syscall::Sigreturn),
            _ => Err(()),
        }
    }
}

/// Entry point called by the INT 0x80 stub.
#[no_mangle]
pub extern "C" fn trios_syscall_dispatch(num: u32, arg1: u32, arg2: u32, arg3: u32) -> i32 {
    let Ok(syscall) = Syscall::try_from(num) else {
        return -1;
    };

    match syscall {
        Syscall::Halt => exec::halt(arg1 & 0xFF),
        Syscall::Execute => sys_execute(arg1),
        Syscall::Read => sys_read(arg1 as i32, arg2, arg3 as i32),
        Syscall::Write => sys_write(arg1 as i32, arg2, arg3 as i32),
        Syscall::Open => sys_open(arg1),
        Syscall::Close => sys_close(arg1 as i32),
        Syscall::Getargs => sys_getargs(arg1, arg2 as i32),
        Syscall::Vidmap => sys_vidmap(arg1),
        // Signal support is stubbed out: both calls always fail.
        Syscall::SetHandler | Syscall::Sigreturn => -1,
    }
}

/// Read a NUL-terminated user string of at most `max` bytes.
///
/// # Safety
///
/// `ptr` must point at caller-owned readable memory; the walk stops at the
/// terminator or `max`.
unsafe fn user_cstr<'a>(ptr: u32, max: usize) -> Option<&'a [u8]> {
    if ptr == 0 {
        return None;
    }
    let base = ptr as *const u8;
    let mut len = 0;
    // SAFETY: Per the function contract; each byte is read individually up
    // to `max`.
    while len < max && unsafe { base.add(len).read() } != 0 {
        len += 1;
    }
    if len == max {
        // Unterminated within the window.
        return None;
    }
    // SAFETY: The range [ptr, ptr+len) was just walked.
    Some(unsafe { core::slice::from_raw_parts(base, len) })
}

fn sys_execute(command_ptr: u32) -> i32 {
    // Command lines are bounded by the line buffer they were typed into.
    // SAFETY: Null-checked by user_cstr; execute parses the command before
    // any remapping happens.
    let command = unsafe { user_cstr(command_ptr, crate::config::LINE_BUF_SIZE) };
    let Some(command) = command else {
        return -1;
    };
    exec::execute(command) as i32
}

/// Validate a descriptor for I/O and fetch the registered op.
fn io_op<F>(fd: i32, pick: impl FnOnce(&crate::process::pcb::FileOps) -> F) -> Option<(usize, F)> {
    if !(0..MAX_OPEN_FILES as i32).contains(&fd) {
        return None;
    }
    let fd = fd as usize;
    process::with_current_pcb(|pcb| {
        if pcb.fd_in_use(fd) {
            Some((fd, pick(pcb.fds[fd].ops)))
        } else {
            None
        }
    })
    .flatten()
}

fn sys_read(fd: i32, buf: u32, nbytes: i32) -> i32 {
    // `read` is the blocking entry: let the timer, keyboard and clock
    // interrupts through while we wait.
    arch::irq_enable();

    if buf == 0 || nbytes < 0 {
        return -1;
    }
    let Some((fd, read)) = io_op(fd, |ops| ops.read) else {
        return -1;
    };
    // SAFETY: Non-null, length-checked; the op writes at most nbytes.
    let slice = unsafe { core::slice::from_raw_parts_mut(buf as *mut u8, nbytes as usize) };
    read(fd, slice) as i32
}

fn sys_write(fd: i32, buf: u32, nbytes: i32) -> i32 {
    if buf == 0 || nbytes < 0 {
        return -1;
    }
    let Some((fd, write)) = io_op(fd, |ops| ops.write) else {
        return -1;
    };
    // SAFETY: Non-null, length-checked; the op only reads the slice.
    let slice = unsafe { core::slice::from_raw_parts(buf as *const u8, nbytes as usize) };
    write(fd, slice) as i32
}

fn sys_open(name_ptr: u32) -> i32 {
    // SAFETY: Null-checked by user_cstr; names longer than the dentry
    // field are rejected by the lookup anyway.
    let name = unsafe { user_cstr(name_ptr, fs::NAME_LEN + 1) };
    let Some(name) = name else {
        return -1;
    };
    let Some(filesystem) = fs::get() else {
        return -1;
    };
    let Some(dentry) = filesystem.dentry_by_name(name) else {
        return -1;
    };
    let Some(file_type) = dentry.file_type() else {
        return -1;
    };

    let allocated = process::with_current_pcb_mut(|pcb| {
        let fd = pcb.alloc_fd()?;
        let slot = &mut pcb.fds[fd];
        match file_type {
            FileType::Clock => slot.ops = &CLOCK_OPS,
            FileType::Directory => slot.ops = &DIR_OPS,
            FileType::Regular => {
                slot.ops = &FILE_OPS;
                slot.inode = dentry.inode;
            }
        }
        Some(fd)
    })
    .flatten();

    let Some(fd) = allocated else {
        return -1;
    };
    // Opening the clock device arms the virtual clock at its default rate.
    if file_type == FileType::Clock {
        let _ = crate::clock::clock_open();
    }
    fd as i32
}

fn sys_close(fd: i32) -> i32 {
    // stdin/stdout are not closable.
    if !(2..MAX_OPEN_FILES as i32).contains(&fd) {
        return -1;
    }
    let fd = fd as usize;
    let close = process::with_current_pcb_mut(|pcb| {
        if !pcb.fd_in_use(fd) {
            return None;
        }
        let close = pcb.fds[fd].ops.close;
        pcb.fds[fd] = crate::process::FileDescriptor::closed();
        Some(close)
    })
    .flatten();

    match close {
        Some(close) => close(fd) as i32,
        None => -1,
    }
}

fn sys_getargs(buf: u32, nbytes: i32) -> i32 {
    // The caller must provide room for the full argument field.
    if buf == 0 || nbytes < MAX_ARG_LEN as i32 {
        return -1;
    }
    let copied = process::with_current_pcb(|pcb| {
        if pcb.args.is_empty() {
            return false;
        }
        // SAFETY: Null-checked and at least MAX_ARG_LEN bytes per the guard
        // above; the padded field is exactly MAX_ARG_LEN bytes.
        let dst = unsafe { core::slice::from_raw_parts_mut(buf as *mut u8, MAX_ARG_LEN) };
        dst.copy_from_slice(pcb.args.padded());
        true
    });
    match copied {
        Some(true) => 0,
        _ => -1,
    }
}

fn sys_vidmap(screen_start: u32) -> i32 {
    // The pointer itself must sit inside the user page.
    if !(USER_SPACE_START..=USER_SPACE_END - 4).contains(&screen_start) {
        return -1;
    }
    let _ = process::with_current_pcb_mut(|pcb| pcb.vidmap = true);
    paging::set_user_video_page(true);
    // SAFETY: Range-checked against the mapped user window above.
    unsafe {
        (screen_start as *mut u32).write(USER_VIDEO_BASE);
    }
    0
}
