//! Iteration session: file sequencing, record production, save/restore.
//!
//! A session owns an ordered file list and a format configuration, both
//! fixed at construction, and walks the files in order producing one
//! record at a time. All mutable state lives in one aggregate behind one
//! mutex; produce, save, restore and reset each hold the lock for their
//! full duration, so record production never overlaps checkpointing.

use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use tracing::{debug, info};

use crate::checkpoint::{Cursor, StateReader, StateWriter};
use crate::config::FormatConfig;
use crate::decoder::{
    ColumnarDecoder, FixedLengthDecoder, FramedDecoder, LineDecoder, RecordDecoder,
};
use crate::error::{ConfigError, SessionError};
use crate::scan::{FileSplit, IpcScanFactory, ScanFactory};
use crate::storage::Filesystem;

/// Mutable iteration state, guarded as a single unit.
struct SessionState {
    /// Index of the file being read; equal to the file count once the
    /// sequence is exhausted.
    current_file_index: usize,
    /// Decoder over the currently open file, if any.
    decoder: Option<RecordDecoder>,
}

/// A resumable iteration over an ordered list of files.
pub struct ReaderSession {
    filenames: Vec<String>,
    format: FormatConfig,
    fs: Arc<dyn Filesystem>,
    scan_factory: Arc<dyn ScanFactory>,
    /// Checkpoint key prefix identifying this session instance.
    prefix: String,
    state: Mutex<SessionState>,
}

impl ReaderSession {
    /// Create a session over `filenames` with the given format.
    ///
    /// The file list must be non-empty and the format configuration is
    /// validated here; both are immutable for the session's lifetime.
    pub fn new(
        filenames: Vec<String>,
        format: FormatConfig,
        fs: Arc<dyn Filesystem>,
        prefix: impl Into<String>,
    ) -> Result<Self, SessionError> {
        if filenames.is_empty() {
            return Err(ConfigError::EmptyFileList.into());
        }
        format.validate()?;

        Ok(Self {
            filenames,
            format,
            fs,
            scan_factory: Arc::new(IpcScanFactory),
            prefix: prefix.into(),
            state: Mutex::new(SessionState {
                current_file_index: 0,
                decoder: None,
            }),
        })
    }

    /// Replace the columnar scan engine (defaults to the Arrow IPC one).
    pub fn with_scan_factory(mut self, factory: Arc<dyn ScanFactory>) -> Self {
        self.scan_factory = factory;
        self
    }

    /// The session's file list.
    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    /// Produce the next record, or `Ok(None)` at end of sequence.
    ///
    /// Exhaustion of one file silently advances to the next; end of
    /// sequence is sticky. Any error other than exhaustion propagates
    /// immediately and leaves the session in need of a reset or restore.
    pub fn produce_next(&self) -> Result<Option<Bytes>, SessionError> {
        let mut state = self.lock()?;

        // Loop rather than recurse across file boundaries so a run of
        // empty files cannot grow the stack.
        loop {
            if let Some(decoder) = state.decoder.as_mut() {
                match decoder.next_record() {
                    Ok(Some(record)) => return Ok(Some(record)),
                    Ok(None) => {
                        // Current file is exhausted; close it and move on.
                        state.decoder = None;
                        state.current_file_index += 1;
                        debug!(
                            file_index = state.current_file_index,
                            file_count = self.filenames.len(),
                            "File exhausted, advancing"
                        );
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            if state.current_file_index == self.filenames.len() {
                return Ok(None);
            }

            state.decoder = Some(self.open_decoder(state.current_file_index)?);
        }
    }

    /// Write the session's cursor to `writer`.
    ///
    /// The position field is written only while a file is open; its
    /// absence (not yet started, or exactly on a file boundary) is part of
    /// the saved state.
    pub fn save(&self, writer: &mut dyn StateWriter) -> Result<(), SessionError> {
        let state = self.lock()?;
        let cursor = Cursor {
            current_file_index: state.current_file_index,
            position: state.decoder.as_ref().map(|d| d.position()),
        };
        cursor.save(&self.prefix, self.format.position_kind(), writer)?;

        debug!(
            prefix = %self.prefix,
            file_index = cursor.current_file_index,
            position = ?cursor.position,
            "Saved cursor"
        );
        Ok(())
    }

    /// Rebuild iteration state from a cursor previously written by
    /// [`save`](Self::save).
    ///
    /// Continued iteration after a restore is record-for-record identical
    /// to iteration that was never interrupted.
    pub fn restore(&self, reader: &dyn StateReader) -> Result<(), SessionError> {
        let mut state = self.lock()?;
        // Close any open file before touching the cursor.
        state.decoder = None;

        let cursor = Cursor::restore(
            &self.prefix,
            self.format.position_kind(),
            self.filenames.len(),
            reader,
        )?;
        state.current_file_index = cursor.current_file_index;

        if let Some(position) = cursor.position {
            let mut decoder = self.open_decoder(cursor.current_file_index)?;
            decoder.seek(position).map_err(SessionError::from)?;
            state.decoder = Some(decoder);
        }

        info!(
            prefix = %self.prefix,
            file_index = cursor.current_file_index,
            position = ?cursor.position,
            "Restored cursor"
        );
        Ok(())
    }

    /// Restore from `reader` if it holds a cursor for this session.
    ///
    /// Returns `Ok(false)` and leaves the session untouched when no cursor
    /// was ever saved under this prefix (the cold-start case).
    pub fn restore_if_present(&self, reader: &dyn StateReader) -> Result<bool, SessionError> {
        let index_name =
            crate::checkpoint::full_name(&self.prefix, crate::checkpoint::CURRENT_FILE_INDEX_KEY);
        if !reader.contains(&index_name) {
            debug!(prefix = %self.prefix, "No cursor found, starting fresh");
            return Ok(false);
        }
        self.restore(reader)?;
        Ok(true)
    }

    /// Close any open file and rewind to the start of the file list.
    pub fn reset(&self) -> Result<(), SessionError> {
        let mut state = self.lock()?;
        state.decoder = None;
        state.current_file_index = 0;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>, SessionError> {
        self.state.lock().map_err(|_| SessionError::LockPoisoned)
    }

    /// Open a decoder for the file at `index`.
    fn open_decoder(&self, index: usize) -> Result<RecordDecoder, SessionError> {
        if index >= self.filenames.len() {
            return Err(SessionError::FileIndexOutOfRange {
                index,
                file_count: self.filenames.len(),
            });
        }
        let path = &self.filenames[index];
        debug!(path = %path, index, "Opening file");

        let decoder = match &self.format {
            FormatConfig::Line(cfg) => {
                RecordDecoder::Line(LineDecoder::open(self.fs.open(path)?, cfg, path)?)
            }
            FormatConfig::FixedLength(cfg) => {
                let file_size = self.fs.file_size(path)?;
                RecordDecoder::FixedLength(FixedLengthDecoder::open(
                    self.fs.open(path)?,
                    file_size,
                    cfg,
                    path,
                )?)
            }
            FormatConfig::Framed(cfg) => {
                RecordDecoder::Framed(FramedDecoder::open(self.fs.open(path)?, cfg, path)?)
            }
            FormatConfig::Columnar(cfg) => {
                let length = self.fs.file_size(path)?;
                let split = FileSplit {
                    filename: path.clone(),
                    start: 0,
                    length,
                };
                RecordDecoder::Columnar(ColumnarDecoder::open(
                    self.scan_factory.as_ref(),
                    split,
                    cfg,
                )?)
            }
        };
        Ok(decoder)
    }
}
