//! Format decoders: per-format state machines that turn an open file into
//! a sequence of records.
//!
//! All variants share one shape: produce the next record, report a
//! checkpointable position, and seek to a previously-saved position on a
//! freshly opened file. The set is closed (a variant is selected once at
//! session construction), so dispatch is a plain enum match.

mod columnar;
mod fixed;
mod framed;
mod line;

pub use columnar::ColumnarDecoder;
pub use fixed::FixedLengthDecoder;
pub use framed::{write_frame, FramedDecoder, FRAME_HEADER_BYTES};
pub use line::LineDecoder;

use bytes::Bytes;

use crate::checkpoint::SavedPosition;
use crate::error::DecodeError;

/// The active decoder for the file currently open.
pub enum RecordDecoder {
    Line(LineDecoder),
    FixedLength(FixedLengthDecoder),
    Framed(FramedDecoder),
    Columnar(ColumnarDecoder),
}

impl RecordDecoder {
    /// Produce the next record, or `Ok(None)` when this file is exhausted.
    pub fn next_record(&mut self) -> Result<Option<Bytes>, DecodeError> {
        match self {
            RecordDecoder::Line(d) => d.next_record(),
            RecordDecoder::FixedLength(d) => d.next_record(),
            RecordDecoder::Framed(d) => d.next_record(),
            RecordDecoder::Columnar(d) => d.next_record(),
        }
    }

    /// The position to checkpoint for the current state of this decoder.
    pub fn position(&self) -> SavedPosition {
        match self {
            RecordDecoder::Line(d) => SavedPosition::Byte(d.tell()),
            RecordDecoder::FixedLength(d) => SavedPosition::Byte(d.tell()),
            RecordDecoder::Framed(d) => SavedPosition::Frame(d.tell_offset()),
            RecordDecoder::Columnar(d) => SavedPosition::Row(d.row_offset()),
        }
    }

    /// Seek a freshly opened decoder to a saved position.
    pub fn seek(&mut self, position: SavedPosition) -> Result<(), DecodeError> {
        match (self, position) {
            (RecordDecoder::Line(d), SavedPosition::Byte(offset)) => d.seek(offset),
            (RecordDecoder::FixedLength(d), SavedPosition::Byte(offset)) => d.seek(offset),
            (RecordDecoder::Framed(d), SavedPosition::Frame(offset)) => d.seek_offset(offset),
            (RecordDecoder::Columnar(d), SavedPosition::Row(offset)) => d.seek_rows(offset),
            (decoder, _) => Err(DecodeError::PositionKind {
                path: decoder.path().to_string(),
            }),
        }
    }

    fn path(&self) -> &str {
        match self {
            RecordDecoder::Line(d) => d.path(),
            RecordDecoder::FixedLength(d) => d.path(),
            RecordDecoder::Framed(d) => d.path(),
            RecordDecoder::Columnar(d) => d.path(),
        }
    }
}
