//! Newline-delimited record decoder.

use bytes::Bytes;

use crate::config::LineConfig;
use crate::error::DecodeError;
use crate::storage::RandomAccess;
use crate::stream::StreamAdapter;

/// Decodes a file into one record per line, terminator excluded.
pub struct LineDecoder {
    path: String,
    stream: StreamAdapter,
}

impl LineDecoder {
    /// Open a decoder over `file`.
    pub fn open(
        file: Box<dyn RandomAccess>,
        config: &LineConfig,
        path: &str,
    ) -> Result<Self, DecodeError> {
        let stream = StreamAdapter::open(file, config.compression, config.buffer_size).map_err(
            |source| DecodeError::Stream {
                path: path.to_string(),
                source,
            },
        )?;
        Ok(Self {
            path: path.to_string(),
            stream,
        })
    }

    /// Read the next line.
    ///
    /// A file ending without a trailing terminator still yields its final
    /// partial line exactly once before exhaustion.
    pub fn next_record(&mut self) -> Result<Option<Bytes>, DecodeError> {
        self.stream
            .read_line()
            .map(|line| line.map(Bytes::from))
            .map_err(|source| DecodeError::Stream {
                path: self.path.clone(),
                source,
            })
    }

    /// Logical offset in the decoded stream.
    pub fn tell(&self) -> u64 {
        self.stream.tell()
    }

    /// Seek to a saved offset (fresh decoder, forward only).
    pub fn seek(&mut self, offset: u64) -> Result<(), DecodeError> {
        self.stream
            .seek(offset)
            .map_err(|source| DecodeError::Stream {
                path: self.path.clone(),
                source,
            })
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }
}
