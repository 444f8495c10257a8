//! System Call Input Validation
//!
//! Every user-supplied address goes through this module before the kernel
//! touches it.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: deny by default
//! - Prevent common vulnerabilities:
//!   - Buffer overflows (bounds checking)
//!   - TOCTOU races (copy to kernel space, never work on user memory in place)
//!   - Null pointer dereference (explicit checks)

use core::fmt;

use super::error::SyscallError;

/// A user-space virtual address.
///
/// Kept distinct from kernel pointers so a user address can never be
/// dereferenced without going through [`UserSpace`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct UserPtr(usize);

impl UserPtr {
    /// The null user address.
    pub const NULL: Self = Self(0);

    /// Wrap a raw address taken from a syscall argument register.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for UserPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserPtr({:#018x})", self.0)
    }
}

/// The window of virtual memory the calling process may hand to the kernel.
///
/// In a full system this is derived from the process's VMA list; here the
/// embedding kernel supplies one contiguous window per process.
#[derive(Debug, Clone, Copy)]
pub struct UserSpace {
    start: usize,
    end: usize,
}

impl UserSpace {
    /// Describe a user window `[start, end)`.
    ///
    /// # Safety
    /// Every byte in `[start, end)` must be mapped, readable and writable
    /// from kernel mode for as long as this value is used, and must not
    /// overlap memory the kernel holds references into.
    pub const unsafe fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Validate a user range of `len` bytes starting at `ptr`.
    ///
    /// # Security Checks
    /// 1. Zero-length ranges are always valid (and never dereferenced)
    /// 2. Pointer is not null
    /// 3. Pointer is within the user window
    /// 4. Pointer + length doesn't overflow
    /// 5. End address is within the user window
    pub fn validate_range(&self, ptr: UserPtr, len: usize) -> Result<(), SyscallError> {
        if len == 0 {
            return Ok(());
        }

        if ptr.is_null() {
            return Err(SyscallError::Efault);
        }

        let addr = ptr.as_usize();
        if addr < self.start || addr >= self.end {
            return Err(SyscallError::Efault);
        }

        let end = addr.checked_add(len).ok_or(SyscallError::Efault)?;
        if end > self.end {
            return Err(SyscallError::Efault);
        }

        Ok(())
    }

    /// Copy `dst.len()` bytes from user memory at `src` into `dst`.
    pub fn copy_from_user(&self, dst: &mut [u8], src: UserPtr) -> Result<(), SyscallError> {
        self.validate_range(src, dst.len())?;
        if dst.is_empty() {
            return Ok(());
        }

        // SAFETY:
        // - The source range was validated to lie inside the user window,
        //   which the constructor's contract guarantees is mapped
        // - `dst` is a kernel slice and cannot overlap the user window
        unsafe {
            core::ptr::copy_nonoverlapping(
                src.as_usize() as *const u8,
                dst.as_mut_ptr(),
                dst.len(),
            );
        }
        Ok(())
    }

    /// Copy `src` into user memory at `dst`.
    pub fn copy_to_user(&self, dst: UserPtr, src: &[u8]) -> Result<(), SyscallError> {
        self.validate_range(dst, src.len())?;
        if src.is_empty() {
            return Ok(());
        }

        // SAFETY: Same as copy_from_user, with the user range as destination.
        unsafe {
            core::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_usize() as *mut u8, src.len());
        }
        Ok(())
    }
}
