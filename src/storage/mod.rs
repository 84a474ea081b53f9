//! Filesystem abstraction for opening input files.
//!
//! The engine only needs two operations from its environment: open a file
//! for random-access reading, and query a file's size. Keeping these behind
//! a trait lets tests substitute fixtures and keeps the session independent
//! of where files actually live.

mod local;

pub use local::LocalFilesystem;

use std::io::{Read, Seek};

use crate::error::StorageError;

/// A readable, seekable byte source.
pub trait RandomAccess: Read + Seek + Send {}

impl<T: Read + Seek + Send> RandomAccess for T {}

impl std::fmt::Debug for dyn RandomAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn RandomAccess")
    }
}

/// Access to the files named in a session's file list.
pub trait Filesystem: Send + Sync {
    /// Open a file for random-access reading.
    fn open(&self, path: &str) -> Result<Box<dyn RandomAccess>, StorageError>;

    /// Size of the file in bytes.
    fn file_size(&self, path: &str) -> Result<u64, StorageError>;
}
