//! Scatter-Gather Vector Aggregation
//!
//! Expands a user-supplied `iovec` array into kernel staging buffers for
//! `writev`, and distributes backend data back over the array for `readv`.
//!
//! # Processing Rules
//! - The vector count is checked against [`UIO_MAXIOV`] before anything
//!   sized by it is allocated
//! - The descriptor array is copied into the kernel in one bounded transfer
//!   and decoded from that copy; user memory is never re-read
//! - Elements are handled strictly in array order, each with its own
//!   exactly-sized staging buffer
//! - On the first failing element, processing stops, every buffer staged so
//!   far is released, and the byte total of the fully completed elements
//!   before it is reported alongside the error

use alloc::vec::Vec;
use core::mem::size_of;

use bitflags::bitflags;
use log::debug;

use super::error::SyscallError;
use super::limits::{MAX_RW_COUNT, UIO_MAXIOV};
use super::uaccess::{copy_in, copy_out};
use super::validate::{UserPtr, UserSpace};
use crate::mm::{StagingArena, StagingBuffer};

/// One element of a scatter-gather list, laid out as user space passes it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoVec {
    /// Start of the user buffer.
    pub base: UserPtr,
    /// Length of the user buffer in bytes.
    pub len: usize,
}

/// Size of one encoded [`IoVec`] in user memory.
pub const IOVEC_SIZE: usize = size_of::<IoVec>();

const WORD: usize = size_of::<usize>();

impl IoVec {
    pub const fn new(base: UserPtr, len: usize) -> Self {
        Self { base, len }
    }

    /// Decode one element from its native in-memory representation.
    ///
    /// The source is a byte slice, so no alignment is assumed.
    fn decode(raw: &[u8; IOVEC_SIZE]) -> Self {
        let mut base = [0u8; WORD];
        let mut len = [0u8; WORD];
        base.copy_from_slice(&raw[..WORD]);
        len.copy_from_slice(&raw[WORD..]);
        Self {
            base: UserPtr::new(usize::from_ne_bytes(base)),
            len: usize::from_ne_bytes(len),
        }
    }
}

bitflags! {
    /// Per-call modifiers for vectored transfers, handed through to the
    /// file backend.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RwFlags: u32 {
        /// High priority request, poll if possible.
        const HIPRI = 0x0000_0001;
        /// Per-I/O O_DSYNC.
        const DSYNC = 0x0000_0002;
        /// Per-I/O O_SYNC.
        const SYNC = 0x0000_0004;
        /// Fail with EAGAIN rather than block.
        const NOWAIT = 0x0000_0008;
        /// Per-I/O O_APPEND.
        const APPEND = 0x0000_0010;
    }
}

impl RwFlags {
    /// Parse flags supplied by user space, rejecting unknown bits.
    pub fn from_user(bits: u32) -> Result<Self, SyscallError> {
        Self::from_bits(bits).ok_or(SyscallError::Eopnotsupp)
    }
}

/// Progress made by a vector transfer before it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialTransfer {
    /// Bytes belonging to elements that completed before the failing one.
    pub completed: usize,
    /// Why the failing element could not be processed.
    pub error: SyscallError,
}

impl PartialTransfer {
    const fn at(completed: usize, error: SyscallError) -> Self {
        Self { completed, error }
    }
}

/// Outcome of a vector transfer step.
pub type TransferResult<T> = Result<T, PartialTransfer>;

/// Segments staged from user memory, in array order.
#[derive(Debug)]
pub struct Staged<'a> {
    /// Sum of all segment lengths.
    pub bytes: usize,
    /// One exactly-sized buffer per vector element.
    pub segments: Vec<StagingBuffer<'a>>,
}

/// Copy a user `iovec` array of `vlen` elements into kernel memory.
///
/// # Errors
/// * `Einval` - `vlen` exceeds [`UIO_MAXIOV`], or the element lengths sum
///   past [`MAX_RW_COUNT`]
/// * `Enomem` - no room to stage the array
/// * `Efault` - the array itself is not readable
pub fn fetch_iovecs(
    user: &UserSpace,
    arena: &StagingArena,
    vec: UserPtr,
    vlen: usize,
) -> Result<Vec<IoVec>, SyscallError> {
    if vlen > UIO_MAXIOV {
        debug!("iovec: vlen {} exceeds limit {}", vlen, UIO_MAXIOV);
        return Err(SyscallError::Einval);
    }
    if vlen == 0 {
        return Ok(Vec::new());
    }

    // vlen is bounded above, so this cannot overflow.
    let raw = copy_in(user, arena, vec, vlen * IOVEC_SIZE)?;

    let mut iovecs = Vec::new();
    iovecs
        .try_reserve_exact(vlen)
        .map_err(|_| SyscallError::Enomem)?;

    let mut total = 0usize;
    for chunk in raw.chunks_exact(IOVEC_SIZE) {
        let iov = match chunk.try_into() {
            Ok(encoded) => IoVec::decode(encoded),
            Err(_) => return Err(SyscallError::Efault),
        };
        total = match total.checked_add(iov.len) {
            Some(t) if t <= MAX_RW_COUNT => t,
            _ => {
                debug!("iovec: total length exceeds {}", MAX_RW_COUNT);
                return Err(SyscallError::Einval);
            }
        };
        iovecs.push(iov);
    }

    Ok(iovecs)
}

/// Copy every element's user data into its own staging buffer (`writev`).
///
/// Elements after the first failure are never touched.
pub fn gather_from_user<'a>(
    user: &UserSpace,
    arena: &'a StagingArena,
    iovecs: &[IoVec],
) -> TransferResult<Staged<'a>> {
    let mut segments = Vec::new();
    segments
        .try_reserve_exact(iovecs.len())
        .map_err(|_| PartialTransfer::at(0, SyscallError::Enomem))?;

    let mut bytes = 0;
    for (i, iov) in iovecs.iter().enumerate() {
        match copy_in(user, arena, iov.base, iov.len) {
            Ok(buf) => {
                bytes += iov.len;
                segments.push(buf);
            }
            Err(error) => {
                debug!("iovec: element {} failed after {} bytes: {}", i, bytes, error);
                return Err(PartialTransfer::at(bytes, error));
            }
        }
    }

    Ok(Staged { bytes, segments })
}

/// Validate every element as a destination and allocate its staging
/// buffer (`readv`).
///
/// Elements after the first failure are never touched.
pub fn stage_for_user<'a>(
    user: &UserSpace,
    arena: &'a StagingArena,
    iovecs: &[IoVec],
) -> TransferResult<Staged<'a>> {
    let mut segments = Vec::new();
    segments
        .try_reserve_exact(iovecs.len())
        .map_err(|_| PartialTransfer::at(0, SyscallError::Enomem))?;

    let mut bytes = 0;
    for (i, iov) in iovecs.iter().enumerate() {
        let staged = user
            .validate_range(iov.base, iov.len)
            .and_then(|()| arena.alloc_or_err(iov.len));
        match staged {
            Ok(buf) => {
                bytes += iov.len;
                segments.push(buf);
            }
            Err(error) => {
                debug!("iovec: element {} failed after {} bytes: {}", i, bytes, error);
                return Err(PartialTransfer::at(bytes, error));
            }
        }
    }

    Ok(Staged { bytes, segments })
}

/// Copy the first `filled` bytes held in `segments` out to the matching
/// user buffers, in order.
///
/// Returns the number of bytes delivered.
pub fn scatter_to_user(
    user: &UserSpace,
    iovecs: &[IoVec],
    segments: &[StagingBuffer<'_>],
    filled: usize,
) -> TransferResult<usize> {
    let mut remaining = filled;
    let mut done = 0;

    for (iov, seg) in iovecs.iter().zip(segments) {
        if remaining == 0 {
            break;
        }
        let n = seg.len().min(remaining);
        copy_out(user, iov.base, &seg[..n]).map_err(|error| PartialTransfer::at(done, error))?;
        done += n;
        remaining -= n;
    }

    Ok(done)
}
