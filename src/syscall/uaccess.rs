//! Buffer Marshaling Across the User/Kernel Boundary
//!
//! The only two functions in the read/write path that move bytes between
//! user memory and kernel memory. Everything else works on staging buffers.

use log::debug;

use super::error::SyscallError;
use super::validate::{UserPtr, UserSpace};
use crate::mm::{StagingArena, StagingBuffer};

/// Copy `len` bytes from user memory into a freshly allocated staging buffer.
///
/// The buffer is sized to exactly `len` bytes. If the copy faults, the
/// buffer is released before the error is returned.
///
/// # Errors
/// * `Enomem` - the staging arena cannot hold `len` bytes
/// * `Efault` - the user range is invalid
pub fn copy_in<'a>(
    user: &UserSpace,
    arena: &'a StagingArena,
    src: UserPtr,
    len: usize,
) -> Result<StagingBuffer<'a>, SyscallError> {
    let mut buf = arena.alloc_or_err(len)?;
    if let Err(e) = user.copy_from_user(&mut buf, src) {
        debug!("copy_in: fault at {:?} (len {})", src, len);
        return Err(e);
    }
    Ok(buf)
}

/// Copy kernel data out to user memory at `dst`.
///
/// # Errors
/// * `Efault` - the user range is invalid
pub fn copy_out(user: &UserSpace, dst: UserPtr, data: &[u8]) -> Result<(), SyscallError> {
    user.copy_to_user(dst, data).map_err(|e| {
        debug!("copy_out: fault at {:?} (len {})", dst, data.len());
        e
    })
}
