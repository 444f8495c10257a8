//! System Call Error Codes
//!
//! Every failure on the read/write path is reported to user space as a
//! small negative integer matching the Linux errno of the same name.

use core::fmt;

/// System call error codes
#[repr(i64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    /// Bad file descriptor
    Ebadf = -9,
    /// Out of kernel memory (staging allocation failed)
    Enomem = -12,
    /// Bad address (invalid pointer)
    Efault = -14,
    /// Invalid argument
    Einval = -22,
    /// No space left on the backing store
    Enospc = -28,
    /// Unsupported per-call flags
    Eopnotsupp = -95,
}

impl SyscallError {
    /// The value placed in the return register for this error.
    #[inline]
    pub const fn errno(self) -> i64 {
        self as i64
    }
}

impl fmt::Display for SyscallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ebadf => write!(f, "bad file descriptor"),
            Self::Enomem => write!(f, "out of memory"),
            Self::Efault => write!(f, "bad address"),
            Self::Einval => write!(f, "invalid argument"),
            Self::Enospc => write!(f, "no space left on device"),
            Self::Eopnotsupp => write!(f, "operation not supported"),
        }
    }
}

/// Flatten a handler result into the syscall return register value.
///
/// Byte counts are bounded by `MAX_RW_COUNT` before they get here, so the
/// conversion to `i64` never wraps.
#[inline]
pub fn into_ret(result: Result<usize, SyscallError>) -> i64 {
    match result {
        Ok(n) => n as i64,
        Err(e) => e.errno(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errno_values() {
        assert_eq!(SyscallError::Ebadf.errno(), -9);
        assert_eq!(SyscallError::Efault.errno(), -14);
        assert_eq!(SyscallError::Enomem.errno(), -12);
        assert_eq!(SyscallError::Enospc.errno(), -28);
        assert_eq!(SyscallError::Eopnotsupp.errno(), -95);
    }

    #[test]
    fn test_into_ret() {
        assert_eq!(into_ret(Ok(5)), 5);
        assert_eq!(into_ret(Err(SyscallError::Einval)), -22);
    }
}
