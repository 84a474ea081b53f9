//! Length-prefixed framed record decoder.
//!
//! Frame layout, little-endian:
//!
//! ```text
//! [payload length: u64][crc32(payload): u32][payload bytes]
//! ```
//!
//! Frame boundaries are not computable by the caller (payload lengths
//! vary per frame), so the decoder itself tracks its offset, always in
//! terms of frame starts in the decoded stream.

use std::io::Write;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::config::FramedConfig;
use crate::error::{DecodeError, StreamError};
use crate::storage::RandomAccess;
use crate::stream::StreamAdapter;

/// Bytes of length prefix plus checksum before each payload.
pub const FRAME_HEADER_BYTES: u64 = 12;

/// Append one frame around `payload`.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    let mut header = BytesMut::with_capacity(FRAME_HEADER_BYTES as usize);
    header.put_u64_le(payload.len() as u64);

    let mut crc = flate2::Crc::new();
    crc.update(payload);
    header.put_u32_le(crc.sum());

    writer.write_all(&header)?;
    writer.write_all(payload)
}

/// Decodes a stream of self-delimited frames.
pub struct FramedDecoder {
    path: String,
    stream: StreamAdapter,
}

impl FramedDecoder {
    /// Open a decoder over `file`.
    pub fn open(
        file: Box<dyn RandomAccess>,
        config: &FramedConfig,
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

    /// Read the next frame's payload.
    ///
    /// A clean end of stream at a frame boundary is exhaustion; a stream
    /// that ends inside a header or payload is a truncation error, and a
    /// checksum mismatch is a corruption error. Neither yields the frame.
    pub fn next_record(&mut self) -> Result<Option<Bytes>, DecodeError> {
        let frame_start = self.stream.tell();

        let header = match self.stream.read_record_opt(FRAME_HEADER_BYTES) {
            Ok(None) => return Ok(None),
            Ok(Some(header)) => header,
            Err(StreamError::ShortRead { .. }) => {
                return Err(DecodeError::FrameTruncated {
                    path: self.path.clone(),
                    offset: frame_start,
                })
            }
            Err(source) => {
                return Err(DecodeError::Stream {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut header = &header[..];
        let length = header.get_u64_le();
        let stored = header.get_u32_le();

        let payload = match self.stream.read_record(length) {
            Ok(payload) => payload,
            Err(StreamError::ShortRead { .. }) => {
                return Err(DecodeError::FrameTruncated {
                    path: self.path.clone(),
                    offset: frame_start,
                })
            }
            Err(source) => {
                return Err(DecodeError::Stream {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut crc = flate2::Crc::new();
        crc.update(&payload);
        let computed = crc.sum();
        if computed != stored {
            return Err(DecodeError::FrameChecksum {
                path: self.path.clone(),
                offset: frame_start,
                stored,
                computed,
            });
        }

        Ok(Some(Bytes::from(payload)))
    }

    /// Decoded-stream offset of the next frame start.
    pub fn tell_offset(&self) -> u64 {
        self.stream.tell()
    }

    /// Seek to a saved frame offset (fresh decoder, forward only).
    pub fn seek_offset(&mut self, offset: u64) -> Result<(), DecodeError> {
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
