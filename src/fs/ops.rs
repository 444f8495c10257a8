//! File Operations Backend Contract
//!
//! The syscall handlers never perform I/O themselves. Once data has been
//! staged in kernel memory it is handed to a [`FileOps`] implementation,
//! which may serve it locally or forward it to a remote storage component.

use alloc::string::String;

use log::{debug, info};

use crate::mm::StagingBuffer;
use crate::syscall::{FileHandle, RwFlags, SyscallError};

/// Backend that performs the actual data transfer for an open file.
///
/// Byte counts returned by a backend must not exceed what it was offered;
/// the handlers clamp and log if they do.
pub trait FileOps {
    /// Accept `data` for `file`, returning how many bytes were taken.
    fn write(
        &self,
        file: &FileHandle,
        data: &[u8],
        flags: RwFlags,
    ) -> Result<usize, SyscallError>;

    /// Accept a staged scatter-gather list as one logical transfer.
    ///
    /// The default submits segments in order and stops at the first short
    /// write. An error after some bytes were taken reports those bytes.
    fn write_vectored(
        &self,
        file: &FileHandle,
        segments: &[StagingBuffer<'_>],
        flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        let mut total = 0;
        for seg in segments.iter().filter(|s| !s.is_empty()) {
            let n = match self.write(file, seg, flags) {
                Ok(n) => n,
                Err(e) if total > 0 => {
                    debug!("write_vectored: dropping {} after {} bytes", e, total);
                    break;
                }
                Err(e) => return Err(e),
            };
            total += n;
            if n < seg.len() {
                break;
            }
        }
        Ok(total)
    }

    /// Fill `buf` with data from `file`, returning how many bytes were
    /// produced (0 at end of file).
    ///
    /// The default has no data path and reports `Efault`.
    fn read(
        &self,
        file: &FileHandle,
        buf: &mut [u8],
        flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        let _ = (file, buf, flags);
        Err(SyscallError::Efault)
    }

    /// Fill staged segments in order as one logical transfer.
    ///
    /// The default reads segment by segment and stops at the first short
    /// read.
    fn read_vectored(
        &self,
        file: &FileHandle,
        segments: &mut [StagingBuffer<'_>],
        flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        let mut total = 0;
        for seg in segments.iter_mut().filter(|s| !s.is_empty()) {
            let want = seg.len();
            let n = match self.read(file, seg, flags) {
                Ok(n) => n,
                Err(e) if total > 0 => {
                    debug!("read_vectored: dropping {} after {} bytes", e, total);
                    break;
                }
                Err(e) => return Err(e),
            };
            total += n;
            if n < want {
                break;
            }
        }
        Ok(total)
    }
}

/// The processor-side backend used until a storage component is attached.
///
/// Writes are accepted in full and echoed to the kernel log; there is no
/// read path, so reads fault.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FileOps for LogSink {
    fn write(
        &self,
        file: &FileHandle,
        data: &[u8],
        _flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        info!("{:?}: [{}]", file, String::from_utf8_lossy(data));
        Ok(data.len())
    }

    fn write_vectored(
        &self,
        file: &FileHandle,
        segments: &[StagingBuffer<'_>],
        _flags: RwFlags,
    ) -> Result<usize, SyscallError> {
        info!("{:?}: {} segments", file, segments.len());
        let mut total = 0;
        for (i, seg) in segments.iter().enumerate() {
            info!("  vec[{}]: {}", i, String::from_utf8_lossy(seg));
            total += seg.len();
        }
        Ok(total)
    }
}
