//! Test fixtures: a fake user address space, a slot-based descriptor
//! table, a recording backend and leaked arenas.

use core::mem::MaybeUninit;
use core::ptr;

use spin::Mutex;

use crate::fs::FileOps;
use crate::mm::{StagingArena, StagingBuffer};
use crate::syscall::{
    DescriptorTable, FileHandle, IoVec, RawFd, RwFlags, SyscallError, UserPtr, UserSpace,
    IOVEC_SIZE,
};

/// A staging arena backed by leaked heap memory.
pub fn leak_arena(size: usize) -> &'static StagingArena {
    let mem = Box::leak(vec![MaybeUninit::<u8>::uninit(); size].into_boxed_slice());
    let arena = Box::leak(Box::new(StagingArena::empty()));
    arena.init(mem);
    arena
}

/// A block of host memory standing in for a process's address space.
///
/// Only accessed through raw pointers so the code under test can write to
/// it while the fixture is alive.
pub struct FakeUserMem {
    base: *mut u8,
    len: usize,
}

impl FakeUserMem {
    pub fn new(len: usize) -> Self {
        let mem = vec![0u8; len].into_boxed_slice();
        Self {
            base: Box::into_raw(mem) as *mut u8,
            len,
        }
    }

    pub fn space(&self) -> UserSpace {
        let start = self.base as usize;
        // SAFETY: [base, base + len) is a live allocation owned by self.
        unsafe { UserSpace::new(start, start + self.len) }
    }

    pub fn addr(&self, offset: usize) -> UserPtr {
        UserPtr::new(self.base as usize + offset)
    }

    pub fn poke(&self, offset: usize, data: &[u8]) {
        assert!(offset + data.len() <= self.len);
        // SAFETY: Range checked against the allocation above.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), self.base.add(offset), data.len()) };
    }

    pub fn peek(&self, offset: usize, len: usize) -> Vec<u8> {
        assert!(offset + len <= self.len);
        let mut out = vec![0u8; len];
        // SAFETY: Range checked against the allocation above.
        unsafe { ptr::copy_nonoverlapping(self.base.add(offset), out.as_mut_ptr(), len) };
        out
    }

    /// Encode an `iovec` array at `offset` the way user space lays it out.
    pub fn poke_iovecs(&self, offset: usize, iovecs: &[IoVec]) {
        let word = core::mem::size_of::<usize>();
        for (i, iov) in iovecs.iter().enumerate() {
            let at = offset + i * IOVEC_SIZE;
            self.poke(at, &iov.base.as_usize().to_ne_bytes());
            self.poke(at + word, &iov.len.to_ne_bytes());
        }
    }
}

impl Drop for FakeUserMem {
    fn drop(&mut self) {
        // SAFETY: base/len came from Box::into_raw in new().
        unsafe { drop(Box::from_raw(ptr::slice_from_raw_parts_mut(self.base, self.len))) };
    }
}

/// Number of slots in a [`SlotTable`].
pub const TABLE_SIZE: usize = 64;

struct SlotTableInner {
    open: [bool; TABLE_SIZE],
    refs: [u32; TABLE_SIZE],
    acquires: usize,
    releases: usize,
}

/// Fixed-size descriptor table that counts references and catches double
/// release.
pub struct SlotTable {
    inner: Mutex<SlotTableInner>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotTableInner {
                open: [false; TABLE_SIZE],
                refs: [0; TABLE_SIZE],
                acquires: 0,
                releases: 0,
            }),
        }
    }

    pub fn open(&self, fd: usize) {
        self.inner.lock().open[fd] = true;
    }

    pub fn acquires(&self) -> usize {
        self.inner.lock().acquires
    }

    pub fn releases(&self) -> usize {
        self.inner.lock().releases
    }

    /// References currently held across all slots.
    pub fn outstanding(&self) -> u32 {
        self.inner.lock().refs.iter().sum()
    }
}

impl DescriptorTable for SlotTable {
    fn acquire(&self, fd: RawFd) -> Option<FileHandle> {
        let slot = usize::try_from(fd).ok().filter(|&s| s < TABLE_SIZE)?;
        let mut inner = self.inner.lock();
        if !inner.open[slot] {
            return None;
        }
        inner.refs[slot] += 1;
        inner.acquires += 1;
        Some(FileHandle::from_raw(slot as u64))
    }

    fn release(&self, file: FileHandle) {
        let slot = file.as_raw() as usize;
        let mut inner = self.inner.lock();
        assert!(inner.refs[slot] > 0, "double release of slot {}", slot);
        inner.refs[slot] -= 1;
        inner.releases += 1;
    }
}

/// Backend that records what it was given.
pub struct RecordingOps {
    calls: Mutex<usize>,
    written: Mutex<Vec<u8>>,
    segment_lens: Mutex<Vec<usize>>,
    last_flags: Mutex<Option<RwFlags>>,
    fail_with: Option<SyscallError>,
    report: Option<usize>,
    source: Option<Vec<u8>>,
}

impl RecordingOps {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(0),
            written: Mutex::new(Vec::new()),
            segment_lens: Mutex::new(Vec::new()),
            last_flags: Mutex::new(None),
            fail_with: None,
            report: None,
            source: None,
        }
    }

    /// Every call fails with `error`.
    pub fn failing(error: SyscallError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::new()
        }
    }

    /// Writes claim `n` bytes regardless of what was offered.
    pub fn reporting(self, n: usize) -> Self {
        Self {
            report: Some(n),
            ..self
        }
    }

    /// Reads are served from `data`.
    pub fn with_source(self, data: &[u8]) -> Self {
        Self {
            source: Some(data.to_vec()),
            ..self
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    pub fn segment_lens(&self) -> Vec<usize> {
        self.segment_lens.lock().clone()
    }

    pub fn last_flags(&self) -> Option<RwFlags> {
        *self.last_flags.lock()
    }

    fn enter(&self, flags: RwFlags) -> Result<(), SyscallError> {
        *self.calls.lock() += 1;
        *self.last_flags.lock() = Some(flags);
        match self.fail_with {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl FileOps for RecordingOps {
    fn write(
        &self,
        _file: &FileHandle,
        data: &[u8],
        flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        self.enter(flags)?;
        self.written.lock().extend_from_slice(data);
        Ok(self.report.unwrap_or(data.len()))
    }

    fn write_vectored(
        &self,
        _file: &FileHandle,
        segments: &[StagingBuffer<'_>],
        flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        self.enter(flags)?;
        let mut total = 0;
        for seg in segments {
            self.written.lock().extend_from_slice(seg);
            self.segment_lens.lock().push(seg.len());
            total += seg.len();
        }
        Ok(self.report.unwrap_or(total))
    }

    fn read(
        &self,
        _file: &FileHandle,
        buf: &mut [u8],
        flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        self.enter(flags)?;
        let source = self.source.as_deref().ok_or(SyscallError::Efault)?;
        let n = source.len().min(buf.len());
        buf[..n].copy_from_slice(&source[..n]);
        Ok(n)
    }

    fn read_vectored(
        &self,
        _file: &FileHandle,
        segments: &mut [StagingBuffer<'_>],
        flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        self.enter(flags)?;
        let mut rest = self.source.as_deref().ok_or(SyscallError::Efault)?;
        let mut total = 0;
        for seg in segments.iter_mut() {
            let n = rest.len().min(seg.len());
            seg[..n].copy_from_slice(&rest[..n]);
            rest = &rest[n..];
            total += n;
        }
        Ok(total)
    }
}
