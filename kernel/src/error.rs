//! Kernel error types.
//!
//! Every fallible internal API returns [`KernelResult`]; the system-call
//! boundary folds all of these into the architectural `-1` return value.

use core::fmt;

/// Main kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// A caller-supplied value is out of range or malformed.
    InvalidArgument { name: &'static str },
    /// A required buffer pointer was null.
    NullBuffer,
    /// File descriptor out of range or not in use.
    BadFileDescriptor { fd: usize },
    /// Named object does not exist.
    NotFound { resource: &'static str },
    /// A fixed-size kernel table is full.
    ResourceExhausted { resource: &'static str },
    /// The file loaded by `execute` does not carry the executable magic.
    NotExecutable,
    /// Virtual clock frequency is not a power of two in 2..=1024.
    UnsupportedFrequency { value: u32 },
    /// Operation is not available on this object (e.g. writing a read-only
    /// file, closing stdin).
    NotSupported { operation: &'static str },
}

/// Result type alias using KernelError
pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::InvalidArgument { name } => {
                write!(f, "invalid argument: {}", name)
            }
            KernelError::NullBuffer => write!(f, "null buffer"),
            KernelError::BadFileDescriptor { fd } => {
                write!(f, "bad file descriptor {}", fd)
            }
            KernelError::NotFound { resource } => write!(f, "{} not found", resource),
            KernelError::ResourceExhausted { resource } => {
                write!(f, "out of {}", resource)
            }
            KernelError::NotExecutable => write!(f, "not an executable"),
            KernelError::UnsupportedFrequency { value } => {
                write!(f, "unsupported clock frequency {}", value)
            }
            KernelError::NotSupported { operation } => {
                write!(f, "operation not supported: {}", operation)
            }
        }
    }
}

/// Fold a kernel result into the syscall ABI: the value on success, -1 on
/// any error.
pub fn as_retval(result: KernelResult<isize>) -> isize {
    match result {
        Ok(value) => value,
        Err(_) => -1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_fold_to_minus_one() {
        assert_eq!(as_retval(Ok(42)), 42);
        assert_eq!(as_retval(Err(KernelError::NullBuffer)), -1);
        assert_eq!(
            as_retval(Err(KernelError::BadFileDescriptor { fd: 9 })),
            -1
        );
    }
}
