//! Error types for the sleet record streaming engine.

use snafu::prelude::*;

/// Errors detected while validating session configuration.
///
/// All of these are fatal and surface at session construction, before any
/// file is opened.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// The session was given no input files.
    #[snafu(display("File list must not be empty"))]
    EmptyFileList,

    /// Fixed-length format with a zero record length.
    #[snafu(display("`record_bytes` must be > 0"))]
    ZeroRecordBytes,

    /// Columnar format with a zero batch size.
    #[snafu(display("`batch_size` must be > 0"))]
    ZeroBatchSize,
}

/// Errors from the filesystem abstraction.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// The file does not exist.
    #[snafu(display("File not found: {path}"))]
    NotFound { path: String },

    /// Any other I/O failure while opening or stat-ing a file.
    #[snafu(display("I/O error on {path}: {source}"))]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl StorageError {
    /// Check if this error represents a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Errors from the stream adapter (decompression + buffered reads).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StreamError {
    /// A read from the decoded stream failed.
    #[snafu(display("Read error at decoded offset {offset}: {source}"))]
    Read {
        offset: u64,
        source: std::io::Error,
    },

    /// The stream ended before a full record could be read.
    #[snafu(display(
        "Short read at decoded offset {offset}: expected {expected} bytes, got {actual}"
    ))]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// Seek target is behind the current position.
    ///
    /// Streams only support forward repositioning; restore paths reopen the
    /// file and skip forward from offset zero.
    #[snafu(display("Cannot seek backward from {from} to {to}"))]
    BackwardSeek { from: u64, to: u64 },

    /// Seek target lies past the end of the decoded stream.
    #[snafu(display("Seek to {target} is past end of stream (stream ends at {end})"))]
    SeekPastEnd { target: u64, end: u64 },
}

/// Errors produced while decoding records from an open file.
///
/// End-of-data is *not* an error: decoders signal it as `Ok(None)`.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DecodeError {
    /// Underlying stream failure.
    #[snafu(display("Stream error in {path}: {source}"))]
    Stream { path: String, source: StreamError },

    /// Fixed-length layout validation failed for a file.
    #[snafu(display(
        "Excluding the header ({header_bytes} bytes) and footer ({footer_bytes} bytes), \
         input file \"{path}\" has body length {body_bytes} bytes, which is not an exact \
         multiple of the record length ({record_bytes} bytes)"
    ))]
    RecordLayout {
        path: String,
        header_bytes: u64,
        footer_bytes: u64,
        body_bytes: u64,
        record_bytes: u64,
    },

    /// The file is smaller than its declared header plus footer.
    #[snafu(display(
        "Input file \"{path}\" is {file_size} bytes, smaller than header ({header_bytes}) \
         plus footer ({footer_bytes})"
    ))]
    FileTooSmall {
        path: String,
        file_size: u64,
        header_bytes: u64,
        footer_bytes: u64,
    },

    /// A frame checksum did not match its payload.
    #[snafu(display(
        "Corrupt frame in {path} at offset {offset}: crc mismatch (stored {stored:#010x}, \
         computed {computed:#010x})"
    ))]
    FrameChecksum {
        path: String,
        offset: u64,
        stored: u32,
        computed: u32,
    },

    /// The stream ended inside a frame header or payload.
    #[snafu(display("Truncated frame in {path} at offset {offset}"))]
    FrameTruncated { path: String, offset: u64 },

    /// Columnar scan failure.
    #[snafu(display("Scan error in {path}: {source}"))]
    Scan { path: String, source: ScanError },

    /// Row encoding failure.
    #[snafu(display("Failed to encode row from {path}: {source}"))]
    Encode { path: String, source: RecordError },

    /// A seek was attempted with a position of the wrong kind.
    #[snafu(display("Position kind does not match the decoder in {path}"))]
    PositionKind { path: String },
}

/// Errors from the columnar scan engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ScanError {
    /// Failed to open the file backing a split.
    #[snafu(display("Failed to open {path}: {source}"))]
    Open {
        path: String,
        source: std::io::Error,
    },

    /// The columnar reader reported an error.
    #[snafu(display("Batch read failed in {path}: {message}"))]
    BatchRead { path: String, message: String },
}

/// Errors while encoding or decoding flattened row records.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RecordError {
    /// The record ended before the declared layout was fully walked.
    #[snafu(display("Truncated record: needed {needed} more bytes at offset {offset}"))]
    Truncated { offset: usize, needed: usize },

    /// Unknown column type tag.
    #[snafu(display("Unknown column tag {tag:#010x} at offset {offset}"))]
    UnknownTag { tag: u32, offset: usize },

    /// A column payload has the wrong width for its declared tag.
    #[snafu(display("Column tagged {tag:?} has payload length {len}, expected {expected}"))]
    PayloadWidth {
        tag: crate::encode::ColumnTag,
        len: u64,
        expected: u64,
    },

    /// Failed to serialize a feature record.
    #[snafu(display("Failed to serialize feature record: {source}"))]
    Serialize { source: serde_json::Error },
}

/// Errors from the checkpoint store.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CheckpointError {
    /// A scalar expected in the checkpoint is missing.
    #[snafu(display("Checkpoint is missing key \"{name}\""))]
    MissingKey { name: String },

    /// A stored scalar cannot be interpreted.
    #[snafu(display("Checkpoint key \"{name}\" has invalid value {value}"))]
    InvalidValue { name: String, value: i64 },

    /// The restored file index does not fit the session's file list.
    #[snafu(display("Checkpoint file index {index} is out of range for {file_count} files"))]
    IndexOutOfRange { index: i64, file_count: usize },

    /// Failed to read or write the backing state file.
    #[snafu(display("Checkpoint store I/O error on {path}: {source}"))]
    StoreIo {
        path: String,
        source: std::io::Error,
    },

    /// Failed to serialize checkpoint state.
    #[snafu(display("Failed to serialize checkpoint state: {source}"))]
    StateSerialize { source: serde_json::Error },
}

/// Top-level session errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },

    /// Storage error.
    #[snafu(display("Storage error: {source}"))]
    Storage { source: StorageError },

    /// Decode error.
    #[snafu(display("Decode error: {source}"))]
    Decode { source: DecodeError },

    /// Checkpoint error.
    #[snafu(display("Checkpoint error: {source}"))]
    Checkpoint { source: CheckpointError },

    /// The session attempted to open a file index past the file list.
    #[snafu(display("File index {index} >= file count {file_count}"))]
    FileIndexOutOfRange { index: usize, file_count: usize },

    /// The session lock was poisoned by a panic in another thread.
    #[snafu(display("Session lock poisoned"))]
    LockPoisoned,
}

impl SessionError {
    /// Check if this error represents a "not found" condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            SessionError::Storage { source } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<ConfigError> for SessionError {
    fn from(source: ConfigError) -> Self {
        SessionError::Config { source }
    }
}

impl From<StorageError> for SessionError {
    fn from(source: StorageError) -> Self {
        SessionError::Storage { source }
    }
}

impl From<DecodeError> for SessionError {
    fn from(source: DecodeError) -> Self {
        SessionError::Decode { source }
    }
}

impl From<CheckpointError> for SessionError {
    fn from(source: CheckpointError) -> Self {
        SessionError::Checkpoint { source }
    }
}
