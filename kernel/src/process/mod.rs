//! Process management: PCBs, the PID table, and the execute/halt
//! lifecycle.

pub mod pcb;
pub mod table;

#[cfg(target_arch = "x86")]
pub mod exec;

use core::sync::atomic::{AtomicBool, Ordering};

use crate::config::MAX_ARG_LEN;
use crate::terminal;

pub use pcb::{ArgBuffer, Context, FileDescriptor, FileOps, Pcb};

/// Set when a processor exception kills the running process; `halt` folds
/// it into the 256 exit status.
static EXCEPTION_PENDING: AtomicBool = AtomicBool::new(false);

pub fn raise_exception_flag() {
    EXCEPTION_PENDING.store(true, Ordering::Release);
}

pub fn take_exception_flag() -> bool {
    EXCEPTION_PENDING.swap(false, Ordering::AcqRel)
}

/// Exception funnel: mark the death as exceptional and halt the current
/// process. The parent sees 256.
#[cfg(target_arch = "x86")]
pub fn exception_halt() -> ! {
    raise_exception_flag();
    exec::halt(255)
}

/// PID of the process currently executing (the scheduled terminal's active
/// process).
pub fn current_pid() -> Option<usize> {
    terminal::scheduled().active_pid()
}

/// Run `f` against the current process's PCB.
pub fn with_current_pcb<R>(f: impl FnOnce(&Pcb) -> R) -> Option<R> {
    let pid = current_pid()?;
    table::with_table(|t| t.get(pid).map(f))
}

pub fn with_current_pcb_mut<R>(f: impl FnOnce(&mut Pcb) -> R) -> Option<R> {
    let pid = current_pid()?;
    table::with_table(|t| t.get_mut(pid).map(f))
}

/// Split a command line into the executable name and the argument string.
///
/// Leading spaces are stripped; the name ends at the first interior space;
/// the argument starts at the next non-space byte and runs to the end,
/// truncated to 100 bytes. An empty name yields `None`.
pub fn parse_command(command: &[u8]) -> Option<(&[u8], ArgBuffer)> {
    let start = command.iter().position(|&b| b != b' ')?;
    let rest = &command[start..];
    let name_end = rest
        .iter()
        .position(|&b| b == b' ' || b == 0)
        .unwrap_or(rest.len());
    if name_end == 0 {
        return None;
    }
    let name = &rest[..name_end];

    let tail = &rest[name_end..];
    let tail = match tail.iter().position(|&b| b != b' ') {
        Some(i) => &tail[i..],
        None => &[],
    };
    let arg_end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
    let args = ArgBuffer::from_slice(&tail[..arg_end.min(MAX_ARG_LEN)]);

    Some((name, args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_command() {
        let (name, args) = parse_command(b"shell").unwrap();
        assert_eq!(name, b"shell");
        assert!(args.is_empty());
    }

    #[test]
    fn leading_spaces_stripped() {
        let (name, args) = parse_command(b"   ls").unwrap();
        assert_eq!(name, b"ls");
        assert!(args.is_empty());
    }

    #[test]
    fn argument_split_and_interior_spaces_kept() {
        let (name, args) = parse_command(b"cat   frame0.txt").unwrap();
        assert_eq!(name, b"cat");
        assert_eq!(args.as_bytes(), b"frame0.txt");

        let (name, args) = parse_command(b"grep a b c").unwrap();
        assert_eq!(name, b"grep");
        assert_eq!(args.as_bytes(), b"a b c");
    }

    #[test]
    fn empty_and_space_only_commands_rejected() {
        assert!(parse_command(b"").is_none());
        assert!(parse_command(b"     ").is_none());
    }

    #[test]
    fn argument_truncated_at_100_bytes() {
        let mut cmd = std::vec::Vec::new();
        cmd.extend_from_slice(b"prog ");
        cmd.extend_from_slice(&[b'x'; 150]);
        let (_, args) = parse_command(&cmd).unwrap();
        assert_eq!(args.as_bytes().len(), 100);
    }
}
