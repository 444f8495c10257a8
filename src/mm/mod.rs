//! Memory management for the syscall path
//!
//! Provides:
//! - Staging buffers for user/kernel transfers
//!
//! # Security Principles
//! - All allocations are bounds-checked
//! - Memory initialization is guaranteed
//! - Unsafe code is minimal and audited

mod staging;

pub use staging::{StagingArena, StagingBuffer};
