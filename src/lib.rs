//! PantherOS - Processor-Side File I/O Path
//!
//! The system-call entry path for `read`, `write`, `readv` and `writev` on
//! a processor component of a disaggregated kernel. Requests are
//! validated, user data is marshaled across the trust boundary into
//! exactly-sized staging buffers, and the result is handed to a file
//! backend that may live on a remote storage component.
//!
//! # Components
//! - `mm`: staging arena and RAII staging buffers
//! - `syscall`: validation, user access, vector aggregation, descriptor
//!   resolution and the four handlers
//! - `fs`: the backend contract and the logging backend
//!
//! # Integration
//! The embedding kernel supplies the descriptor table, the backend, the
//! caller's address window and the staging arena through
//! [`syscall::IoContext`], and installs a `log` logger for diagnostics.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod fs;
pub mod mm;
pub mod syscall;

#[cfg(test)]
mod testing;
