//! Process control block and the file-descriptor model.
//!
//! Each open file slot carries a dispatch record of four function
//! contracts; `open` picks the record by file type, so `read`/`write` on a
//! descriptor never need to know what is behind it. Slots 0 and 1 are
//! reserved for stdin and stdout, wired to the terminal driver with the
//! unsupported directions failing.

use crate::clock;
use crate::config::{MAX_ARG_LEN, MAX_OPEN_FILES};
use crate::fs;
use crate::terminal;

/// Saved kernel stack context for the halt-to-execute return path. The
/// callee-saved registers live on the stack frame `esp` points into.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    pub esp: u32,
    pub ebp: u32,
}

impl Context {
    pub const fn zeroed() -> Self {
        Self { esp: 0, ebp: 0 }
    }
}

/// Operation-dispatch record installed into a file-descriptor slot.
pub struct FileOps {
    pub read: fn(fd: usize, buf: &mut [u8]) -> isize,
    pub write: fn(fd: usize, buf: &[u8]) -> isize,
    pub open: fn() -> isize,
    pub close: fn(fd: usize) -> isize,
}

fn unsupported_read(_fd: usize, _buf: &mut [u8]) -> isize {
    -1
}

fn unsupported_write(_fd: usize, _buf: &[u8]) -> isize {
    -1
}

fn unsupported_open() -> isize {
    -1
}

fn unsupported_close(_fd: usize) -> isize {
    -1
}

/// Every direction fails; installed in free slots.
pub static BAD_OPS: FileOps = FileOps {
    read: unsupported_read,
    write: unsupported_write,
    open: unsupported_open,
    close: unsupported_close,
};

/// stdin: reads come from the terminal line discipline, writes fail.
pub static STDIN_OPS: FileOps = FileOps {
    read: terminal::terminal_read,
    write: unsupported_write,
    open: unsupported_open,
    close: unsupported_close,
};

/// stdout: writes go to the terminal, reads fail.
pub static STDOUT_OPS: FileOps = FileOps {
    read: unsupported_read,
    write: terminal::terminal_write,
    open: unsupported_open,
    close: unsupported_close,
};

/// Type 0 dentries: the virtualized periodic clock.
pub static CLOCK_OPS: FileOps = FileOps {
    read: clock::clock_read,
    write: clock::clock_write,
    open: clock::clock_open,
    close: clock::clock_close,
};

/// Type 1 dentries: the directory.
pub static DIR_OPS: FileOps = FileOps {
    read: fs::dir_read,
    write: fs::dir_write,
    open: fs::dir_open,
    close: fs::dir_close,
};

/// Type 2 dentries: regular files.
pub static FILE_OPS: FileOps = FileOps {
    read: fs::file_read,
    write: fs::file_write,
    open: fs::file_open,
    close: fs::file_close,
};

/// One slot of the per-process file array.
#[derive(Clone, Copy)]
pub struct FileDescriptor {
    pub ops: &'static FileOps,
    /// Inode number; only meaningful for regular files.
    pub inode: u32,
    /// Byte offset for files, dentry index for directories.
    pub file_pos: u32,
    pub in_use: bool,
}

impl FileDescriptor {
    pub const fn closed() -> Self {
        Self {
            ops: &BAD_OPS,
            inode: 0,
            file_pos: 0,
            in_use: false,
        }
    }
}

/// Fixed-size argument string captured at `execute` time.
#[derive(Clone, Copy)]
pub struct ArgBuffer {
    bytes: [u8; MAX_ARG_LEN],
    len: usize,
}

impl ArgBuffer {
    pub const fn empty() -> Self {
        Self {
            bytes: [0; MAX_ARG_LEN],
            len: 0,
        }
    }

    /// Copy (and silently truncate) the argument bytes.
    pub fn from_slice(src: &[u8]) -> Self {
        let mut args = Self::empty();
        let len = src.len().min(MAX_ARG_LEN);
        args.bytes[..len].copy_from_slice(&src[..len]);
        args.len = len;
        args
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The full zero-padded backing store, as `getargs` hands it out.
    pub fn padded(&self) -> &[u8; MAX_ARG_LEN] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Process control block.
pub struct Pcb {
    pub pid: usize,
    /// Base shells are their own parents.
    pub parent_pid: usize,
    pub fds: [FileDescriptor; MAX_OPEN_FILES],
    /// The process has an active `vidmap` mapping.
    pub vidmap: bool,
    pub args: ArgBuffer,
    /// Where `halt` delivers this process's exit status: the parent kernel
    /// context saved by `execute`.
    pub parent_context: Context,
    /// Resume point for the scheduler: the stack pointer of this process's
    /// last timer-interrupt frame.
    pub kernel_esp: u32,
}

impl Pcb {
    /// Fresh PCB with stdin/stdout active and every other slot closed.
    pub fn new(pid: usize, parent_pid: usize, args: ArgBuffer) -> Self {
        let mut fds = [FileDescriptor::closed(); MAX_OPEN_FILES];
        fds[0] = FileDescriptor {
            ops: &STDIN_OPS,
            inode: 0,
            file_pos: 0,
            in_use: true,
        };
        fds[1] = FileDescriptor {
            ops: &STDOUT_OPS,
            inode: 0,
            file_pos: 0,
            in_use: true,
        };
        Self {
            pid,
            parent_pid,
            fds,
            vidmap: false,
            args,
            parent_context: Context::zeroed(),
            kernel_esp: 0,
        }
    }

    pub fn is_base_shell(&self) -> bool {
        self.parent_pid == self.pid
    }

    /// Claim the first free slot in 2..7.
    pub fn alloc_fd(&mut self) -> Option<usize> {
        for (i, slot) in self.fds.iter_mut().enumerate().skip(2) {
            if !slot.in_use {
                *slot = FileDescriptor {
                    ops: &BAD_OPS,
                    inode: 0,
                    file_pos: 0,
                    in_use: true,
                };
                return Some(i);
            }
        }
        None
    }

    pub fn fd_in_use(&self, fd: usize) -> bool {
        fd < MAX_OPEN_FILES && self.fds[fd].in_use
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pcb_has_stdio_only() {
        let pcb = Pcb::new(3, 1, ArgBuffer::empty());
        assert!(pcb.fd_in_use(0));
        assert!(pcb.fd_in_use(1));
        for fd in 2..MAX_OPEN_FILES {
            assert!(!pcb.fd_in_use(fd));
        }
        assert!(!pcb.is_base_shell());
        assert!(Pcb::new(0, 0, ArgBuffer::empty()).is_base_shell());
    }

    #[test]
    fn fd_allocation_fills_then_fails() {
        let mut pcb = Pcb::new(3, 1, ArgBuffer::empty());
        for expected in 2..MAX_OPEN_FILES {
            assert_eq!(pcb.alloc_fd(), Some(expected));
        }
        assert_eq!(pcb.alloc_fd(), None);
    }

    #[test]
    fn stdin_rejects_writes_stdout_rejects_reads() {
        let pcb = Pcb::new(0, 0, ArgBuffer::empty());
        let mut buf = [0u8; 4];
        assert_eq!((pcb.fds[1].ops.read)(1, &mut buf), -1);
        assert_eq!((pcb.fds[0].ops.write)(0, b"hi"), -1);
    }

    #[test]
    fn arg_buffer_truncates() {
        let args = ArgBuffer::from_slice(&[b'a'; 200]);
        assert_eq!(args.as_bytes().len(), MAX_ARG_LEN);
        assert_eq!(args.padded().len(), MAX_ARG_LEN);
        assert!(ArgBuffer::empty().is_empty());
    }
}
