//! Round-robin scheduler, driven exclusively by the 100 Hz PIT tick.
//!
//! The entry stub (`__trios_pit_entry`) snapshots the outgoing context as
//! a register frame on the current kernel stack and passes its address
//! here; whatever frame pointer this function returns is the context the
//! stub resumes. A "context switch" is therefore just bookkeeping: store
//! the outgoing frame pointer in the outgoing PCB, look up the incoming
//! one, and hand it back.
//!
//! The first three ticks bootstrap the terminals instead: each gets its
//! base shell via `execute`, which IRETs straight into user mode and never
//! returns here. The keyboard IRQ is deliberately left masked until the
//! third bootstrap so terminal switching cannot race shell bootup.

use crate::arch::x86::{gdt, pic};
use crate::config::{kernel_stack_top, MAX_TERMINALS, SHELL_CMD};
use crate::drivers::keyboard;
use crate::mm::paging;
use crate::process::table;
use crate::terminal;

/// PIT tick body. `frame_esp` is the outgoing context's register frame;
/// the return value is the frame to resume.
#[no_mangle]
pub extern "C" fn trios_scheduler_tick(frame_esp: u32) -> u32 {
    // EOI first: the incoming context leaves this handler by `iretd`
    // without passing back through here, and the next tick must be
    // deliverable to it.
    pic::send_eoi(pic::PIT_IRQ);

    let scheduled = terminal::scheduled_id();
    let term = terminal::get(scheduled);

    // Bootstrap: give this terminal its base shell. `execute` does not
    // return (it IRETs to ring 3); the frame we abandon here is rebuilt
    // with current state on the next tick that finds this terminal.
    if term.active_pid().is_none() && terminal::shell_count() < MAX_TERMINALS {
        terminal::inc_shell_count();
        term.set_last_assigned_pid(Some(scheduled));

        // Put the bootup text on the terminal being booted.
        terminal::switch_visible(scheduled);

        if terminal::shell_count() == MAX_TERMINALS {
            keyboard::init();
        }

        println!("terminal {} booting...", scheduled);
        log::info!("terminal {}: starting base shell", scheduled);
        let status = crate::process::exec::execute(SHELL_CMD);

        // Reached only if the shell image is missing or unloadable.
        log::error!(
            "terminal {}: base shell failed to start ({})",
            scheduled,
            status
        );
        return frame_esp;
    }

    // Save the outgoing context every tick; this is also what gives a
    // freshly booted shell its first valid resume point.
    if let Some(pid) = term.active_pid() {
        table::set_kernel_esp(pid, frame_esp);
    }

    // Round-robin advance.
    let incoming_id = (scheduled + 1) % MAX_TERMINALS;
    terminal::set_scheduled(incoming_id);
    let incoming = terminal::get(incoming_id);

    // Not booted yet: stay in the current context; the next tick will
    // bootstrap it.
    let Some(incoming_pid) = incoming.active_pid() else {
        return frame_esp;
    };

    // Retarget the user page, both video aliases, and the ring-0 stack for
    // the incoming process.
    paging::set_user_video_page(true);
    paging::set_user_prog_page(incoming_pid, true);
    paging::redirect_vidmem_page(incoming_id);
    gdt::set_kernel_stack(kernel_stack_top(incoming_pid));

    match table::kernel_esp(incoming_pid) {
        Some(esp) if esp != 0 => esp,
        // The incoming process has never been preempted; keep running the
        // outgoing context until it has a resumable frame.
        _ => frame_esp,
    }
}
