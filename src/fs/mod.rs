//! File Operations Layer
//!
//! Where staged data leaves the syscall path. The processor component has
//! no local storage; a real deployment plugs in a backend that ships the
//! transfer to a remote storage component.

mod ops;

pub use ops::{FileOps, LogSink};
