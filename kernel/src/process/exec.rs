//! The execute/halt lifecycle.
//!
//! `execute` loads a program into the (freshly remapped) user page, builds
//! its PCB, and IRETs to ring 3. It returns only when the program tree it
//! launched halts: `halt` tears the child down, restores the parent's
//! mappings and kernel stack, and longjmps into the context `execute`
//! saved, delivering the exit status as `execute`'s return value.

use crate::arch::x86::{context, gdt};
use crate::config::{
    kernel_stack_top, ELF_MAGIC, ENTRY_POINT_OFFSET, MAX_OPEN_FILES, SHELL_CMD, USER_IMAGE_BASE,
    USER_SPACE_END, USER_STACK_TOP,
};
use crate::fs;
use crate::mm::paging;
use crate::process::{self, pcb::Pcb, table};
use crate::terminal;

/// Spawn a program from a command line and wait for it to halt.
///
/// Returns the child's exit status: 0..255 from a voluntary halt, 256 when
/// a processor exception killed it, -1 if the command could not be
/// launched (unknown name, bad magic, no free PID).
pub fn execute(command: &[u8]) -> isize {
    let Some((name, args)) = process::parse_command(command) else {
        return -1;
    };
    let Some(filesystem) = fs::get() else {
        return -1;
    };
    let Some(dentry) = filesystem.dentry_by_name(name) else {
        return -1;
    };

    let term = terminal::scheduled();
    let Some(next_pid) = table::with_table(|t| t.first_free_pid()) else {
        return -1;
    };

    // Map the new process's user page and pull the whole file into it.
    paging::set_user_prog_page(next_pid, true);

    let image_len = (USER_SPACE_END - USER_IMAGE_BASE) as usize;
    // SAFETY: The 4 MiB user window was just mapped for next_pid;
    // USER_IMAGE_BASE..USER_SPACE_END lies inside it and nothing else
    // references that physical page yet.
    let image =
        unsafe { core::slice::from_raw_parts_mut(USER_IMAGE_BASE as *mut u8, image_len) };
    let loaded = filesystem.read_data(dentry.inode as usize, 0, image);

    // Executable check: magic header plus enough bytes for the entry point.
    if loaded < ENTRY_POINT_OFFSET + 4 || image[..4] != ELF_MAGIC {
        rewind_user_page(next_pid);
        return -1;
    }
    let entry_bytes: [u8; 4] = match image[ENTRY_POINT_OFFSET..ENTRY_POINT_OFFSET + 4].try_into()
    {
        Ok(bytes) => bytes,
        Err(_) => {
            rewind_user_page(next_pid);
            return -1;
        }
    };
    let entry_point = u32::from_le_bytes(entry_bytes);

    // Base shells (the first process of each terminal) are their own
    // parents; everything else chains to the terminal's previous process.
    let parent_pid = if next_pid <= 2 {
        next_pid
    } else {
        match term.last_assigned_pid() {
            Some(pid) => pid,
            None => next_pid,
        }
    };

    let pcb = Pcb::new(next_pid, parent_pid, args);
    if table::with_table(|t| t.insert(pcb)).is_err() {
        rewind_user_page(next_pid);
        return -1;
    }
    term.set_last_assigned_pid(Some(next_pid));
    term.set_active_pid(Some(next_pid));

    // Ring-0 stack for the new process's kernel entries.
    gdt::set_kernel_stack(kernel_stack_top(next_pid));

    log::debug!(
        "execute: pid {} parent {} entry {:#010x}",
        next_pid,
        parent_pid,
        entry_point
    );

    // The save area must outlive the child; it lives in the table slot,
    // whose address is stable until `halt` frees the PID.
    let ctx = table::with_table(|t| {
        t.get_mut(next_pid)
            .map(|p| &mut p.parent_context as *mut process::Context)
    });
    let Some(ctx) = ctx else {
        return -1;
    };

    // SAFETY: User page mapped, TSS esp0 set, and `ctx` points into the
    // live table slot for next_pid, which stays allocated until halt runs.
    let status = unsafe { context::jump_to_user(entry_point, USER_STACK_TOP, ctx) };
    status as isize
}

/// Undo a failed load: unmap the would-be process's page and restore the
/// previous process's mapping.
fn rewind_user_page(next_pid: usize) {
    paging::set_user_prog_page(next_pid, false);
    if let Some(prev) = terminal::scheduled().last_assigned_pid() {
        paging::set_user_prog_page(prev, true);
    }
}

/// Tear down the current process and deliver `status` to its parent.
///
/// Base shells cannot exit: a fresh shell is executed in their place. For
/// everything else the parent's user page, ring-0 stack, vidmap state and
/// active-PCB role are restored before the longjmp back into `execute`.
pub fn halt(status: u32) -> ! {
    let term = terminal::scheduled();
    let Some(pid) = term.active_pid() else {
        panic!("halt with no active process on terminal {}", term.id);
    };

    // Close descriptors 2..7. The ops are collected under the lock and
    // invoked outside it (clock_close touches terminal state).
    let mut to_close: [Option<(usize, fn(usize) -> isize)>; MAX_OPEN_FILES] =
        [None; MAX_OPEN_FILES];
    table::with_table(|t| {
        if let Some(pcb) = t.get(pid) {
            for fd in 2..MAX_OPEN_FILES {
                if pcb.fds[fd].in_use {
                    to_close[fd] = Some((fd, pcb.fds[fd].ops.close));
                }
            }
        }
    });
    for (fd, close) in to_close.into_iter().flatten() {
        let _ = close(fd);
    }

    let Some(pcb) = table::with_table(|t| t.remove(pid)) else {
        panic!("halt: pid {} missing from the process table", pid);
    };
    term.set_last_assigned_pid(Some(pcb.parent_pid));

    // A terminal is never left without a shell.
    if pcb.is_base_shell() {
        log::info!("terminal {}: base shell exited, respawning", term.id);
        let _ = execute(SHELL_CMD);
        panic!("terminal {}: unable to respawn base shell", term.id);
    }

    // Hand the terminal back to the parent.
    paging::set_user_prog_page(pcb.parent_pid, true);
    gdt::set_kernel_stack(kernel_stack_top(pcb.parent_pid));
    let parent_vidmap =
        table::with_table(|t| t.get(pcb.parent_pid).map(|p| p.vidmap)).unwrap_or(false);
    if parent_vidmap {
        paging::set_user_video_page(true);
    }
    term.set_active_pid(Some(pcb.parent_pid));

    // A processor exception overrides the voluntary status.
    let status = if process::take_exception_flag() {
        256
    } else {
        (status & 0xFF) as i32
    };

    log::debug!("halt: pid {} -> parent {} status {}", pid, pcb.parent_pid, status);

    let parent_context = pcb.parent_context;
    // SAFETY: parent_context was saved by the execute invocation that
    // spawned `pid`; the parent's kernel stack is untouched since (the
    // child ran on its own stack), so the longjmp target is intact.
    unsafe { context::context_return(&parent_context, status) }
}
