//! read / write / readv / writev
//!
//! Each handler runs the same sequence: resolve the descriptor, marshal
//! user data through staging buffers, dispatch to the file backend,
//! release, return. Resources are held by RAII guards declared in
//! acquisition order (descriptor first, buffers after), so every return
//! path, early or not, releases buffers before the descriptor.
//!
//! # Security
//! - The descriptor is resolved before any user memory is touched
//! - Byte counts and vector lengths are bounded before anything sized by
//!   them is allocated
//! - Backend byte counts are clamped to what was offered

use log::{trace, warn};

use super::error::{into_ret, SyscallError};
use super::fd::{narrow_fd, resolve, DescriptorTable, RawFd};
use super::iovec::{fetch_iovecs, gather_from_user, scatter_to_user, stage_for_user, RwFlags};
use super::limits::MAX_RW_COUNT;
use super::uaccess::{copy_in, copy_out};
use super::validate::{UserPtr, UserSpace};
use crate::fs::FileOps;
use crate::mm::StagingArena;

/// Everything a read/write handler needs from the rest of the kernel.
#[derive(Clone, Copy)]
pub struct IoContext<'a> {
    /// Descriptor table of the calling process.
    pub table: &'a dyn DescriptorTable,
    /// Backend that performs the transfer.
    pub ops: &'a dyn FileOps,
    /// Address window of the calling process.
    pub user: &'a UserSpace,
    /// Arena staging buffers come from.
    pub staging: &'a StagingArena,
}

impl<'a> IoContext<'a> {
    pub fn new(
        table: &'a dyn DescriptorTable,
        ops: &'a dyn FileOps,
        user: &'a UserSpace,
        staging: &'a StagingArena,
    ) -> Self {
        Self {
            table,
            ops,
            user,
            staging,
        }
    }
}

/// Read system call
///
/// Reads up to `count` bytes from `fd` into the user buffer at `buf`.
///
/// # Returns
/// Number of bytes read (0 at end of file), or a negative error code
pub fn sys_read(ctx: &IoContext<'_>, fd: RawFd, buf: usize, count: usize) -> i64 {
    trace!("read(fd: {}, buf: {:#x}, count: {})", fd, buf, count);
    into_ret(do_read(ctx, fd, UserPtr::new(buf), count))
}

/// Write system call
///
/// Writes `count` bytes from the user buffer at `buf` to `fd`.
///
/// # Returns
/// Number of bytes accepted by the backend, or a negative error code
pub fn sys_write(ctx: &IoContext<'_>, fd: RawFd, buf: usize, count: usize) -> i64 {
    trace!("write(fd: {}, buf: {:#x}, count: {})", fd, buf, count);
    into_ret(do_write(ctx, fd, UserPtr::new(buf), count))
}

/// Vectored read system call
pub fn sys_readv(ctx: &IoContext<'_>, fd: u64, vec: usize, vlen: u64) -> i64 {
    trace!("readv(fd: {}, vec: {:#x}, vlen: {})", fd, vec, vlen);
    into_ret(do_readv(ctx, fd, UserPtr::new(vec), vlen, 0))
}

/// Vectored write system call
pub fn sys_writev(ctx: &IoContext<'_>, fd: u64, vec: usize, vlen: u64) -> i64 {
    trace!("writev(fd: {}, vec: {:#x}, vlen: {})", fd, vec, vlen);
    into_ret(do_writev(ctx, fd, UserPtr::new(vec), vlen, 0))
}

fn do_read(
    ctx: &IoContext<'_>,
    fd: RawFd,
    buf: UserPtr,
    count: usize,
) -> Result<usize, SyscallError> {
    let file = resolve(ctx.table, fd)?;
    check_count(count)?;

    // Refuse a bad destination before the backend produces anything.
    ctx.user.validate_range(buf, count)?;

    // A read may come up short, so stage only what the arena can hold.
    // Zero-length reads still reach the backend.
    let mut staged = ctx.staging.alloc_up_to(count).ok_or(SyscallError::Enomem)?;
    let offered = staged.len();

    let n = ctx.ops.read(file.handle(), &mut staged, RwFlags::empty())?;
    let n = clamp_reported("read", n, offered);
    copy_out(ctx.user, buf, &staged[..n])?;
    Ok(n)
}

fn do_write(
    ctx: &IoContext<'_>,
    fd: RawFd,
    buf: UserPtr,
    count: usize,
) -> Result<usize, SyscallError> {
    let file = resolve(ctx.table, fd)?;
    check_count(count)?;
    if count == 0 {
        return Ok(0);
    }

    let staged = copy_in(ctx.user, ctx.staging, buf, count)?;
    let n = ctx.ops.write(file.handle(), &staged, RwFlags::empty())?;
    Ok(clamp_reported("write", n, count))
}

fn do_readv(
    ctx: &IoContext<'_>,
    fd: u64,
    vec: UserPtr,
    vlen: u64,
    flags: u32,
) -> Result<usize, SyscallError> {
    let file = resolve(ctx.table, narrow_fd(fd)?)?;
    let flags = RwFlags::from_user(flags)?;
    let iovecs = fetch_iovecs(ctx.user, ctx.staging, vec, narrow_vlen(vlen)?)?;

    let mut staged = stage_for_user(ctx.user, ctx.staging, &iovecs).map_err(|p| p.error)?;
    if staged.bytes == 0 {
        return Ok(0);
    }

    let filled = ctx.ops.read_vectored(file.handle(), &mut staged.segments, flags)?;
    let filled = clamp_reported("readv", filled, staged.bytes);
    scatter_to_user(ctx.user, &iovecs, &staged.segments, filled).map_err(|p| p.error)
}

fn do_writev(
    ctx: &IoContext<'_>,
    fd: u64,
    vec: UserPtr,
    vlen: u64,
    flags: u32,
) -> Result<usize, SyscallError> {
    let file = resolve(ctx.table, narrow_fd(fd)?)?;
    let flags = RwFlags::from_user(flags)?;
    let iovecs = fetch_iovecs(ctx.user, ctx.staging, vec, narrow_vlen(vlen)?)?;

    let staged = gather_from_user(ctx.user, ctx.staging, &iovecs).map_err(|p| p.error)?;
    if staged.bytes == 0 {
        return Ok(0);
    }

    let n = ctx.ops.write_vectored(file.handle(), &staged.segments, flags)?;
    Ok(clamp_reported("writev", n, staged.bytes))
}

#[inline]
fn check_count(count: usize) -> Result<(), SyscallError> {
    if count > MAX_RW_COUNT {
        return Err(SyscallError::Einval);
    }
    Ok(())
}

/// Anything that does not fit a usize is over UIO_MAXIOV anyway.
#[inline]
fn narrow_vlen(vlen: u64) -> Result<usize, SyscallError> {
    usize::try_from(vlen).map_err(|_| SyscallError::Einval)
}

fn clamp_reported(op: &str, reported: usize, offered: usize) -> usize {
    if reported > offered {
        warn!("{}: backend reported {} bytes for a {} byte transfer", op, reported, offered);
        return offered;
    }
    reported
}
