//! Staging Memory for User/Kernel Transfers
//!
//! Data crossing the user/kernel boundary is copied into kernel-owned
//! staging buffers before anything else looks at it. Each buffer is sized
//! to the request it serves and is never shared between requests. Reads,
//! which may come up short anyway, are staged at most as large as the
//! arena can hold.
//!
//! # Design
//! - A dedicated arena managed by `linked_list_allocator`, so a flood of
//!   large requests exhausts the arena and fails with `Enomem` instead of
//!   starving the general kernel heap
//! - `StagingBuffer` is an RAII guard: dropping it releases the allocation,
//!   which covers every early return in the syscall handlers
//!
//! # Security Properties
//! - Buffers are zeroed on allocation, so uninitialized heap contents are
//!   never observable
//! - Buffers are scrubbed with volatile writes before release, so user
//!   payloads do not linger in freed memory

use core::alloc::Layout;
use core::fmt;
use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};
use core::sync::atomic::{compiler_fence, Ordering};

use linked_list_allocator::Heap;
use log::debug;
use spin::Mutex;

use crate::syscall::SyscallError;

/// A bounded heap that hands out staging buffers.
pub struct StagingArena {
    heap: Mutex<Heap>,
}

impl StagingArena {
    /// Create an arena with no backing memory. Every allocation fails until
    /// [`StagingArena::init`] is called.
    pub const fn empty() -> Self {
        Self {
            heap: Mutex::new(Heap::empty()),
        }
    }

    /// Hand the arena its backing memory.
    ///
    /// Only the first call has any effect.
    pub fn init(&self, mem: &'static mut [MaybeUninit<u8>]) {
        let mut heap = self.heap.lock();
        if heap.size() != 0 {
            return;
        }
        heap.init_from_slice(mem);
    }

    /// Total bytes managed by the arena.
    pub fn size(&self) -> usize {
        self.heap.lock().size()
    }

    /// Bytes currently held by live staging buffers (including allocator
    /// rounding).
    pub fn used(&self) -> usize {
        self.heap.lock().used()
    }

    /// Bytes still available.
    pub fn free(&self) -> usize {
        self.heap.lock().free()
    }

    /// Allocate a zeroed buffer of exactly `len` bytes.
    ///
    /// Returns `None` if the arena cannot satisfy the request. A zero-length
    /// request always succeeds and consumes nothing.
    pub fn alloc(&self, len: usize) -> Option<StagingBuffer<'_>> {
        if len == 0 {
            return Some(StagingBuffer {
                arena: self,
                ptr: NonNull::dangling(),
                len: 0,
            });
        }

        let layout = Layout::from_size_align(len, 1).ok()?;
        let ptr = self.heap.lock().allocate_first_fit(layout).ok()?;

        // SAFETY: The allocation is fresh, `len` bytes long and exclusively ours.
        unsafe {
            ptr::write_bytes(ptr.as_ptr(), 0, len);
        }

        Some(StagingBuffer {
            arena: self,
            ptr,
            len,
        })
    }

    /// Allocate a buffer, returning `Enomem` on failure.
    pub fn alloc_or_err(&self, len: usize) -> Result<StagingBuffer<'_>, SyscallError> {
        self.alloc(len).ok_or_else(|| {
            debug!("staging: cannot allocate {} bytes ({} free)", len, self.free());
            SyscallError::Enomem
        })
    }

    /// Allocate a zeroed buffer of at most `len` bytes, shrinking the
    /// request until the arena can serve it.
    ///
    /// Used where a short transfer is acceptable. Returns `None` only if not
    /// even one byte is available; a zero-length request always succeeds.
    pub fn alloc_up_to(&self, len: usize) -> Option<StagingBuffer<'_>> {
        if len == 0 {
            return self.alloc(0);
        }

        // free() counts allocator rounding, so a request of that size can
        // still miss; halve until it fits.
        let mut want = len.min(self.free());
        while want > 0 {
            if let Some(buf) = self.alloc(want) {
                return Some(buf);
            }
            want /= 2;
        }
        debug!("staging: arena exhausted ({} of {} bytes used)", self.used(), self.size());
        None
    }

    /// Return a buffer's memory to the arena.
    ///
    /// # Safety
    /// `ptr` must come from `alloc(len)` on this arena and must not be used
    /// afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, len: usize) {
        // SAFETY: `len` was accepted by Layout::from_size_align in alloc().
        let layout = unsafe { Layout::from_size_align_unchecked(len, 1) };
        // SAFETY: Caller guarantees ptr/layout match a live allocation.
        unsafe { self.heap.lock().deallocate(ptr, layout) };
    }
}

impl fmt::Debug for StagingArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heap = self.heap.lock();
        f.debug_struct("StagingArena")
            .field("size", &heap.size())
            .field("used", &heap.used())
            .finish()
    }
}

/// Kernel-owned memory holding one transfer's worth of user data.
///
/// Released back to its arena on drop.
pub struct StagingBuffer<'a> {
    arena: &'a StagingArena,
    ptr: NonNull<u8>,
    len: usize,
}

impl StagingBuffer<'_> {
    /// Size of the buffer in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Deref for StagingBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: ptr is valid for len initialized bytes (zeroed in alloc), or
        // dangling with len 0.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for StagingBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: As for deref; &mut self gives exclusive access.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl fmt::Debug for StagingBuffer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingBuffer").field("len", &self.len).finish()
    }
}

impl Drop for StagingBuffer<'_> {
    fn drop(&mut self) {
        if self.len == 0 {
            return;
        }
        scrub(self);
        // SAFETY: ptr/len came from alloc() on this arena and the buffer is
        // going away.
        unsafe { self.arena.release(self.ptr, self.len) };
    }
}

/// Overwrite a buffer with zeros in a way the compiler cannot elide.
fn scrub(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        // SAFETY: `byte` is a valid, exclusive reference.
        unsafe { ptr::write_volatile(byte, 0) };
    }
    compiler_fence(Ordering::SeqCst);
}
