//! File Descriptor Resolution
//!
//! Turns a descriptor number into a live file handle for the duration of
//! one syscall.
//!
//! # Design
//! - The descriptor table itself belongs to the process subsystem and is
//!   reached only through [`DescriptorTable`]
//! - [`FileRef`] is an RAII guard: the handle goes back to the table when
//!   the guard drops, so every exit path releases it exactly once
//! - [`FileHandle`] is neither `Clone` nor `Copy`, and `release` consumes
//!   it, so a handle cannot be released twice or used after release

use core::fmt;
use core::mem::ManuallyDrop;

use log::debug;

use super::error::SyscallError;

/// A descriptor number as passed in by user space.
pub type RawFd = i32;

/// An opaque reference to an open file, issued by a [`DescriptorTable`].
///
/// The token's meaning is private to the table that issued it.
pub struct FileHandle {
    token: u64,
}

impl FileHandle {
    /// Wrap a table-specific token.
    ///
    /// Only descriptor table implementations should call this.
    #[inline]
    pub const fn from_raw(token: u64) -> Self {
        Self { token }
    }

    /// Get the table-specific token.
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.token
    }
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileHandle({:#x})", self.token)
    }
}

/// Contract with the per-process descriptor table.
///
/// Implementations are expected to be internally synchronized.
pub trait DescriptorTable {
    /// Take a reference on the file open at `fd`, or `None` if `fd` is not
    /// an open descriptor.
    fn acquire(&self, fd: RawFd) -> Option<FileHandle>;

    /// Drop a reference taken by [`DescriptorTable::acquire`].
    fn release(&self, file: FileHandle);
}

/// A file handle borrowed from a descriptor table for one syscall.
pub struct FileRef<'t, T: DescriptorTable + ?Sized> {
    table: &'t T,
    file: ManuallyDrop<FileHandle>,
}

impl<'t, T: DescriptorTable + ?Sized> FileRef<'t, T> {
    /// The borrowed handle.
    #[inline]
    pub fn handle(&self) -> &FileHandle {
        &self.file
    }
}

impl<T: DescriptorTable + ?Sized> Drop for FileRef<'_, T> {
    fn drop(&mut self) {
        // SAFETY: drop() runs once and `file` is not touched afterwards.
        let file = unsafe { ManuallyDrop::take(&mut self.file) };
        self.table.release(file);
    }
}

impl<T: DescriptorTable + ?Sized> fmt::Debug for FileRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileRef").field(&*self.file).finish()
    }
}

/// Resolve `fd` against `table`.
///
/// # Errors
/// * `Ebadf` - `fd` is not an open descriptor
pub fn resolve<T: DescriptorTable + ?Sized>(
    table: &T,
    fd: RawFd,
) -> Result<FileRef<'_, T>, SyscallError> {
    match table.acquire(fd) {
        Some(file) => Ok(FileRef {
            table,
            file: ManuallyDrop::new(file),
        }),
        None => {
            debug!("resolve: fd {} is not open", fd);
            Err(SyscallError::Ebadf)
        }
    }
}

/// Narrow an unsigned-long descriptor argument to a [`RawFd`].
///
/// Values that do not fit are never valid descriptors.
pub fn narrow_fd(fd: u64) -> Result<RawFd, SyscallError> {
    RawFd::try_from(fd).map_err(|_| SyscallError::Ebadf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SlotTable;

    #[test]
    fn test_resolve_unknown_fd() {
        let table = SlotTable::new();
        assert_eq!(resolve(&table, 7).unwrap_err(), SyscallError::Ebadf);
        assert_eq!(resolve(&table, -1).unwrap_err(), SyscallError::Ebadf);
        assert_eq!(table.acquires(), 0);
    }

    #[test]
    fn test_guard_releases_once() {
        let table = SlotTable::new();
        table.open(3);
        {
            let file = resolve(&table, 3).expect("resolve");
            assert_eq!(table.outstanding(), 1);
            assert_eq!(file.handle().as_raw(), 3);
        }
        assert_eq!(table.outstanding(), 0);
        assert_eq!(table.acquires(), 1);
        assert_eq!(table.releases(), 1);
    }

    #[test]
    fn test_narrow_fd() {
        assert_eq!(narrow_fd(3), Ok(3));
        assert_eq!(narrow_fd(u64::MAX), Err(SyscallError::Ebadf));
        assert_eq!(narrow_fd(1 << 40), Err(SyscallError::Ebadf));
    }
}
