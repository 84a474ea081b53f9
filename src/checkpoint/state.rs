//! Cursor state captured by save and reapplied by restore.
//!
//! The cursor is the only object serialized on save: the index of the file
//! currently being read, plus an optional format-specific position inside
//! it. Absence of the position is itself meaningful: it distinguishes "no
//! file open" (not yet started, or just crossed a file boundary) from
//! "positioned mid-file", and must survive a round trip exactly.

use crate::error::CheckpointError;

use super::{StateReader, StateWriter};

/// Checkpoint field holding the current file index.
pub const CURRENT_FILE_INDEX_KEY: &str = "current_file_index";
/// Checkpoint field holding a byte position in the decoded stream.
pub const CURRENT_POS_KEY: &str = "current_pos";
/// Checkpoint field holding a frame or row offset.
pub const OFFSET_KEY: &str = "offset";

/// The unit a format checkpoints its position in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    /// Byte offset in the decoded stream (line and fixed-length formats).
    Byte,
    /// Frame start offset tracked by the framed decoder.
    Frame,
    /// Global row offset within the current file (columnar format).
    Row,
}

impl PositionKind {
    /// Checkpoint field name used for this kind of position.
    pub fn key(&self) -> &'static str {
        match self {
            PositionKind::Byte => CURRENT_POS_KEY,
            PositionKind::Frame | PositionKind::Row => OFFSET_KEY,
        }
    }

    fn wrap(&self, value: u64) -> SavedPosition {
        match self {
            PositionKind::Byte => SavedPosition::Byte(value),
            PositionKind::Frame => SavedPosition::Frame(value),
            PositionKind::Row => SavedPosition::Row(value),
        }
    }
}

/// A format-specific position inside the currently open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavedPosition {
    /// Byte offset in the decoded stream.
    Byte(u64),
    /// Decoded-stream offset of the next frame start.
    Frame(u64),
    /// Rows already produced from this file.
    Row(u64),
}

impl SavedPosition {
    /// The position's unit.
    pub fn kind(&self) -> PositionKind {
        match self {
            SavedPosition::Byte(_) => PositionKind::Byte,
            SavedPosition::Frame(_) => PositionKind::Frame,
            SavedPosition::Row(_) => PositionKind::Row,
        }
    }

    /// The position's scalar value.
    pub fn value(&self) -> u64 {
        match self {
            SavedPosition::Byte(v) | SavedPosition::Frame(v) | SavedPosition::Row(v) => *v,
        }
    }
}

/// Minimal state needed to reconstruct iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Index of the file being read; equal to the file count when the
    /// sequence is exhausted.
    pub current_file_index: usize,
    /// Position inside that file, present only while a file is open.
    pub position: Option<SavedPosition>,
}

impl Cursor {
    /// Write this cursor under `prefix`.
    ///
    /// The position field is written only when a file is open; a stale
    /// position from an earlier save is removed so that absence round-trips.
    pub fn save(
        &self,
        prefix: &str,
        kind: PositionKind,
        writer: &mut dyn StateWriter,
    ) -> Result<(), CheckpointError> {
        writer.write_scalar(
            &full_name(prefix, CURRENT_FILE_INDEX_KEY),
            self.current_file_index as i64,
        )?;

        let position_name = full_name(prefix, kind.key());
        match self.position {
            Some(position) => writer.write_scalar(&position_name, position.value() as i64)?,
            None => writer.remove_scalar(&position_name)?,
        }
        Ok(())
    }

    /// Read a cursor saved under `prefix`.
    ///
    /// `file_count` bounds the restored index: the index may equal the
    /// count (terminal state) but a position is only valid for an index
    /// strictly inside the file list.
    pub fn restore(
        prefix: &str,
        kind: PositionKind,
        file_count: usize,
        reader: &dyn StateReader,
    ) -> Result<Self, CheckpointError> {
        let index_name = full_name(prefix, CURRENT_FILE_INDEX_KEY);
        let index = reader.read_scalar(&index_name)?;
        if index < 0 || index as usize > file_count {
            return Err(CheckpointError::IndexOutOfRange { index, file_count });
        }
        let current_file_index = index as usize;

        let position_name = full_name(prefix, kind.key());
        let position = if reader.contains(&position_name) {
            let value = reader.read_scalar(&position_name)?;
            if value < 0 {
                return Err(CheckpointError::InvalidValue {
                    name: position_name,
                    value,
                });
            }
            if current_file_index >= file_count {
                return Err(CheckpointError::IndexOutOfRange { index, file_count });
            }
            Some(kind.wrap(value as u64))
        } else {
            None
        };

        Ok(Self {
            current_file_index,
            position,
        })
    }
}

/// Build a hierarchical checkpoint key from an instance prefix and field.
pub fn full_name(prefix: &str, name: &str) -> String {
    format!("{prefix}::{name}")
}
