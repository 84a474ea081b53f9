//! Sleet: resumable record streaming over ordered file sets.
//!
//! This crate handles:
//! - Reading an ordered list of files as one linear sequence of records
//! - Line, fixed-length, framed and columnar-batch decoding strategies
//! - Transparent zlib/gzip/zstd decompression of byte-oriented formats
//! - Suspending iteration and resuming it exactly via a small
//!   serializable checkpoint
//! - Flattening columnar rows into self-describing binary or structured
//!   feature records
//!
//! The entry point is [`ReaderSession`]: construct it with a file list, a
//! [`FormatConfig`] and a [`Filesystem`], call
//! [`produce_next`](ReaderSession::produce_next) until it returns `None`,
//! and use [`save`](ReaderSession::save) /
//! [`restore`](ReaderSession::restore) against a checkpoint store to
//! suspend and resume.

pub mod checkpoint;
pub mod config;
pub mod decoder;
pub mod encode;
pub mod error;
pub mod scan;
pub mod session;
pub mod storage;
pub mod stream;

// Re-export commonly used items.
pub use checkpoint::{Cursor, JsonStateFile, MemoryState, SavedPosition, StateReader, StateWriter};
pub use config::{
    ColumnarConfig, CompressionFormat, FixedLengthConfig, FormatConfig, FramedConfig, LineConfig,
    RowEncoding,
};
pub use error::SessionError;
pub use scan::{BatchScan, FileSplit, IpcScanFactory, ScanFactory};
pub use session::ReaderSession;
pub use storage::{Filesystem, LocalFilesystem};
