//! File I/O System Calls
//!
//! The processor-side entry path for `read`, `write`, `readv` and `writev`.
//! Handlers validate and marshal; the data itself goes to a [`FileOps`]
//! backend.
//!
//! # Security Model
//! - All parameters are validated before use
//! - User memory is copied into kernel staging buffers before the kernel
//!   looks at it, and never read twice
//! - Invalid inputs return errors, never panic
//! - Every acquired descriptor and staging buffer is released on every path
//!
//! [`FileOps`]: crate::fs::FileOps

mod error;
mod fd;
mod iovec;
mod read_write;
mod uaccess;
mod validate;

pub use error::SyscallError;
pub use fd::{resolve, DescriptorTable, FileHandle, FileRef, RawFd};
pub use iovec::{
    fetch_iovecs, gather_from_user, scatter_to_user, stage_for_user, IoVec, PartialTransfer,
    RwFlags, Staged, TransferResult, IOVEC_SIZE,
};
pub use read_write::{sys_read, sys_readv, sys_write, sys_writev, IoContext};
pub use uaccess::{copy_in, copy_out};
pub use validate::{UserPtr, UserSpace};

/// Compile-time bounds on what a single call may ask of the kernel.
pub mod limits {
    /// Page size (4 KiB)
    pub const PAGE_SIZE: usize = 4096;

    /// Maximum number of elements in one `iovec` array.
    pub const UIO_MAXIOV: usize = 1024;

    /// Largest byte count a single transfer may request.
    pub const MAX_RW_COUNT: usize = (i32::MAX as usize) & !(PAGE_SIZE - 1);
}
