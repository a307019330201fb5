//! Terminal table and line discipline.
//!
//! Three terminal records multiplex one screen. The *visible* terminal is
//! the one the user sees (and types into); the *scheduled* terminal is the
//! one whose process currently owns the CPU. Keyboard input always lands in
//! the visible terminal's line buffer; `terminal_read`/`terminal_write`
//! always operate on the scheduled terminal, whose writes the paging
//! manager steers to the real frame or its shadow page.

mod line;

use core::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

pub use line::LineBuffer;

use crate::clock::VirtualClock;
use crate::config::{MAX_TERMINALS, SHELL_PROMPT};
use crate::drivers::console::{self, Cursor};
use crate::sync::IrqLock;

pub struct Terminal {
    pub id: usize,
    line: IrqLock<LineBuffer>,
    cursor: IrqLock<Cursor>,
    enter_pressed: AtomicBool,
    in_read: AtomicBool,
    /// PID of this terminal's currently scheduled process; -1 if none.
    active_pid: AtomicI32,
    /// Most recently assigned PID; restored to the parent's on halt.
    last_assigned_pid: AtomicI32,
    pub clock: VirtualClock,
}

impl Terminal {
    const fn new(id: usize) -> Self {
        Self {
            id,
            line: IrqLock::new(LineBuffer::new()),
            cursor: IrqLock::new(Cursor::new()),
            enter_pressed: AtomicBool::new(false),
            in_read: AtomicBool::new(false),
            active_pid: AtomicI32::new(-1),
            last_assigned_pid: AtomicI32::new(-1),
            clock: VirtualClock::new(),
        }
    }

    pub fn active_pid(&self) -> Option<usize> {
        match self.active_pid.load(Ordering::Acquire) {
            pid if pid >= 0 => Some(pid as usize),
            _ => None,
        }
    }

    pub fn set_active_pid(&self, pid: Option<usize>) {
        let raw = pid.map_or(-1, |p| p as i32);
        self.active_pid.store(raw, Ordering::Release);
    }

    pub fn last_assigned_pid(&self) -> Option<usize> {
        match self.last_assigned_pid.load(Ordering::Acquire) {
            pid if pid >= 0 => Some(pid as usize),
            _ => None,
        }
    }

    pub fn set_last_assigned_pid(&self, pid: Option<usize>) {
        let raw = pid.map_or(-1, |p| p as i32);
        self.last_assigned_pid.store(raw, Ordering::Release);
    }

    /// A terminal is booted once its base shell has been assigned a PID.
    pub fn is_booted(&self) -> bool {
        self.last_assigned_pid().is_some()
    }
}

static TERMINALS: [Terminal; MAX_TERMINALS] =
    [Terminal::new(0), Terminal::new(1), Terminal::new(2)];

static SCHEDULED: AtomicUsize = AtomicUsize::new(0);
static VISIBLE: AtomicUsize = AtomicUsize::new(0);
static SHELL_COUNT: AtomicUsize = AtomicUsize::new(0);

pub fn init() {
    SCHEDULED.store(0, Ordering::Release);
    VISIBLE.store(0, Ordering::Release);
    SHELL_COUNT.store(0, Ordering::Release);
    for terminal in &TERMINALS {
        terminal.set_active_pid(None);
        terminal.set_last_assigned_pid(None);
        terminal.clock.close();
        terminal.line.lock().clear();
        terminal.enter_pressed.store(false, Ordering::Release);
        terminal.in_read.store(false, Ordering::Release);
        *terminal.cursor.lock() = Cursor::new();
    }
}

pub fn get(id: usize) -> &'static Terminal {
    &TERMINALS[id]
}

pub fn scheduled_id() -> usize {
    SCHEDULED.load(Ordering::Acquire)
}

pub fn visible_id() -> usize {
    VISIBLE.load(Ordering::Acquire)
}

pub fn scheduled() -> &'static Terminal {
    get(scheduled_id())
}

pub fn visible() -> &'static Terminal {
    get(visible_id())
}

pub fn set_scheduled(id: usize) {
    SCHEDULED.store(id, Ordering::Release);
}

pub fn shell_count() -> usize {
    SHELL_COUNT.load(Ordering::Acquire)
}

pub fn inc_shell_count() {
    SHELL_COUNT.fetch_add(1, Ordering::AcqRel);
}

// ---------------------------------------------------------------------------
// Keyboard side (visible terminal)
// ---------------------------------------------------------------------------

/// Feed one decoded byte from the keyboard into the visible terminal.
///
/// Buffering always happens; echo only while that terminal is inside
/// `terminal_read`. Enter outside a read is dropped entirely, so a stray
/// newline cannot satisfy a read that has not started yet.
pub fn line_input(byte: u8) {
    let term = visible();
    let echo_allowed = term.in_read.load(Ordering::Acquire);

    match byte {
        0x08 | 0x7F => {
            if term.line.lock().backspace() && echo_allowed {
                echo_visible(&[0x08]);
            }
        }
        b'\n' | b'\r' => {
            if !echo_allowed {
                return;
            }
            term.line.lock().push_newline();
            term.enter_pressed.store(true, Ordering::Release);
            echo_visible(b"\n");
        }
        b'\t' => {
            let spaces = term.line.lock().push_tab();
            if echo_allowed {
                for _ in 0..spaces {
                    echo_visible(b" ");
                }
            }
        }
        0x20..=0x7E => {
            if term.line.lock().push(byte) && echo_allowed {
                echo_visible(&[byte]);
            }
        }
        _ => {}
    }
}

/// Ctrl+L: blank the visible terminal and re-echo its pending line.
pub fn clear_visible() {
    let term = visible();
    let mut snapshot = [0u8; crate::config::LINE_BUF_SIZE];
    let len = {
        let line = term.line.lock();
        let bytes = line.bytes();
        snapshot[..bytes.len()].copy_from_slice(bytes);
        bytes.len()
    };

    with_visible_frame(|cursor| {
        console::clear(cursor);
        if term.in_read.load(Ordering::Acquire) {
            console::put_bytes(cursor, &snapshot[..len]);
        }
    });
}

/// Echo bytes onto the visible terminal's screen (the real VGA frame).
fn echo_visible(bytes: &[u8]) {
    with_visible_frame(|cursor| console::put_bytes(cursor, bytes));
}

/// Run `f` with the writable alias aimed at the real VGA frame and the
/// visible terminal's cursor, then restore the scheduled terminal's
/// aliasing.
///
/// Runs in keyboard-IRQ context with interrupts off, so it cannot
/// interleave with the scheduler's own alias retargeting.
#[cfg(target_arch = "x86")]
fn with_visible_frame(f: impl FnOnce(&mut Cursor)) {
    use crate::mm::paging;

    let vis = visible_id();
    let sched = scheduled_id();
    let term = get(vis);
    let mut cursor = term.cursor.lock();

    if vis != sched {
        paging::redirect_vidmem_page(vis);
    }
    f(&mut cursor);
    if vis != sched {
        paging::redirect_vidmem_page(sched);
    }
    console::set_hw_cursor(&cursor);
}

#[cfg(not(target_arch = "x86"))]
fn with_visible_frame(f: impl FnOnce(&mut Cursor)) {
    let mut cursor = visible().cursor.lock();
    f(&mut cursor);
}

/// Make terminal `to` visible: swap the VGA frame with its shadow page and
/// restore its cursor. No-op if it is already visible or out of range.
#[cfg(target_arch = "x86")]
pub fn switch_visible(to: usize) {
    use crate::mm::paging;

    if to >= MAX_TERMINALS || to == visible_id() {
        return;
    }
    let from = visible_id();

    paging::change_terminal_video_page(from, to);
    VISIBLE.store(to, Ordering::Release);
    // The alias was parked on the real frame for the copy; aim it back at
    // the scheduled terminal's view under the new visibility.
    paging::redirect_vidmem_page(scheduled_id());

    let cursor = get(to).cursor.lock();
    console::set_hw_cursor(&cursor);
}

#[cfg(not(target_arch = "x86"))]
pub fn switch_visible(to: usize) {
    if to < MAX_TERMINALS {
        VISIBLE.store(to, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Process side (scheduled terminal)
// ---------------------------------------------------------------------------

/// stdin read: block until the user finishes a line on this terminal, then
/// hand it over (including the trailing newline).
pub fn terminal_read(_fd: usize, buf: &mut [u8]) -> isize {
    if buf.is_empty() {
        return 0;
    }
    let term = scheduled();
    term.line.lock().set_read_limit(buf.len());
    term.in_read.store(true, Ordering::Release);

    // Spin with interrupts enabled; the keyboard IRQ sets the flag. The
    // scheduler keeps rotating underneath us, so typing into another
    // terminal still works while this process waits.
    while !term.enter_pressed.load(Ordering::Acquire) {
        core::hint::spin_loop();
    }
    term.enter_pressed.store(false, Ordering::Release);
    term.in_read.store(false, Ordering::Release);

    term.line.lock().take_line(buf) as isize
}

/// stdout write: render through the writable alias onto this terminal's
/// view. Returns the full byte count.
pub fn terminal_write(_fd: usize, buf: &[u8]) -> isize {
    write_bytes_scheduled(buf);

    // When the shell prompt reappears, surface whatever the user typed
    // while the previous program was running.
    if shell_count() == MAX_TERMINALS
        && buf.len() >= SHELL_PROMPT.len()
        && &buf[..SHELL_PROMPT.len()] == SHELL_PROMPT
    {
        let term = scheduled();
        let mut pending = [0u8; crate::config::LINE_BUF_SIZE];
        let len = {
            let line = term.line.lock();
            let bytes = line.bytes();
            pending[..bytes.len()].copy_from_slice(bytes);
            bytes.len()
        };
        if len > 0 {
            write_bytes_scheduled(&pending[..len]);
        }
    }

    buf.len() as isize
}

/// Write bytes to the scheduled terminal's view through the writable
/// alias. The hardware cursor follows only when that view is on screen.
pub fn write_bytes_scheduled(bytes: &[u8]) {
    let term = scheduled();
    let mut cursor = term.cursor.lock();
    console::put_bytes(&mut cursor, bytes);
    if scheduled_id() == visible_id() {
        console::set_hw_cursor(&cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The statics are process-wide; tests that touch them serialize on this
    // lock to keep the harness deterministic.
    use std::sync::Mutex;
    static TEST_GUARD: Mutex<()> = Mutex::new(());

    #[test]
    fn switch_visible_bounds() {
        let _guard = TEST_GUARD.lock().unwrap();
        init();
        switch_visible(7);
        assert_eq!(visible_id(), 0);
        switch_visible(2);
        assert_eq!(visible_id(), 2);
        init();
    }

    #[test]
    fn enter_outside_read_is_dropped() {
        let _guard = TEST_GUARD.lock().unwrap();
        init();
        line_input(b'h');
        line_input(b'i');
        line_input(b'\n');
        let term = visible();
        assert!(!term.enter_pressed.load(Ordering::Acquire));
        assert_eq!(term.line.lock().bytes(), b"hi");
        init();
    }

    #[test]
    fn enter_inside_read_finishes_line() {
        let _guard = TEST_GUARD.lock().unwrap();
        init();
        let term = visible();
        term.in_read.store(true, Ordering::Release);
        line_input(b'l');
        line_input(b's');
        line_input(b'\n');
        assert!(term.enter_pressed.load(Ordering::Acquire));

        let mut buf = [0u8; 16];
        let n = term.line.lock().take_line(&mut buf);
        assert_eq!(&buf[..n], b"ls\n");
        term.in_read.store(false, Ordering::Release);
        init();
    }

    #[test]
    fn booted_tracking_follows_last_assigned() {
        let _guard = TEST_GUARD.lock().unwrap();
        init();
        let term = get(1);
        assert!(!term.is_booted());
        term.set_last_assigned_pid(Some(1));
        assert!(term.is_booted());
        init();
    }
}
