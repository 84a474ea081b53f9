//! Fixed-length record decoder.
//!
//! Files carry an optional header and footer around a body of
//! equally-sized records. The body length is validated against the record
//! length before the first read; a mismatch is fatal for the file and
//! produces no records from it.

use bytes::Bytes;

use crate::config::{CompressionFormat, FixedLengthConfig};
use crate::error::DecodeError;
use crate::storage::RandomAccess;
use crate::stream::StreamAdapter;

/// Decodes a file of fixed-length records.
impl std::fmt::Debug for FixedLengthDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedLengthDecoder")
            .field("path", &self.path)
            .field("record_bytes", &self.record_bytes)
            .field("file_pos_limit", &self.file_pos_limit)
            .finish()
    }
}

pub struct FixedLengthDecoder {
    path: String,
    stream: StreamAdapter,
    record_bytes: u64,
    /// Byte offset at which the footer begins; reads stop here.
    file_pos_limit: u64,
}

impl FixedLengthDecoder {
    /// Validate the file layout and open a decoder positioned after the
    /// header.
    pub fn open(
        file: Box<dyn RandomAccess>,
        file_size: u64,
        config: &FixedLengthConfig,
        path: &str,
    ) -> Result<Self, DecodeError> {
        let overhead = config.header_bytes + config.footer_bytes;
        if file_size < overhead {
            return Err(DecodeError::FileTooSmall {
                path: path.to_string(),
                file_size,
                header_bytes: config.header_bytes,
                footer_bytes: config.footer_bytes,
            });
        }

        let body_bytes = file_size - overhead;
        if body_bytes % config.record_bytes != 0 {
            return Err(DecodeError::RecordLayout {
                path: path.to_string(),
                header_bytes: config.header_bytes,
                footer_bytes: config.footer_bytes,
                body_bytes,
                record_bytes: config.record_bytes,
            });
        }

        let stream_err = |source| DecodeError::Stream {
            path: path.to_string(),
            source,
        };
        let mut stream = StreamAdapter::open(file, CompressionFormat::None, config.buffer_size)
            .map_err(stream_err)?;
        stream.skip(config.header_bytes).map_err(stream_err)?;

        Ok(Self {
            path: path.to_string(),
            stream,
            record_bytes: config.record_bytes,
            file_pos_limit: file_size - config.footer_bytes,
        })
    }

    /// Read the next record; exhausted once the footer is reached.
    pub fn next_record(&mut self) -> Result<Option<Bytes>, DecodeError> {
        if self.stream.tell() >= self.file_pos_limit {
            return Ok(None);
        }
        self.stream
            .read_record(self.record_bytes)
            .map(|record| Some(Bytes::from(record)))
            .map_err(|source| DecodeError::Stream {
                path: self.path.clone(),
                source,
            })
    }

    /// Current byte offset in the file.
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn config(header: u64, record: u64, footer: u64) -> FixedLengthConfig {
        FixedLengthConfig {
            header_bytes: header,
            record_bytes: record,
            footer_bytes: footer,
            buffer_size: 0,
        }
    }

    fn decoder(data: &[u8], config: &FixedLengthConfig) -> Result<FixedLengthDecoder, DecodeError> {
        FixedLengthDecoder::open(
            Box::new(Cursor::new(data.to_vec())),
            data.len() as u64,
            config,
            "records.dat",
        )
    }

    #[test]
    fn test_reads_exact_records() {
        // header "HH", three 4-byte records, footer "F".
        let data = b"HHaaaabbbbccccF";
        let mut decoder = decoder(data, &config(2, 4, 1)).unwrap();

        assert_eq!(decoder.next_record().unwrap().unwrap(), "aaaa");
        assert_eq!(decoder.next_record().unwrap().unwrap(), "bbbb");
        assert_eq!(decoder.next_record().unwrap().unwrap(), "cccc");
        assert_eq!(decoder.next_record().unwrap(), None);
        assert_eq!(decoder.next_record().unwrap(), None);
    }

    #[test]
    fn test_zero_records_is_valid() {
        let data = b"HHF";
        let mut decoder = decoder(data, &config(2, 4, 1)).unwrap();
        assert_eq!(decoder.next_record().unwrap(), None);
    }

    #[test]
    fn test_rejects_misaligned_body() {
        let data = b"HHaaaabbbF"; // body of 7 bytes, record length 4
        let err = decoder(data, &config(2, 4, 1)).unwrap_err();
        match err {
            DecodeError::RecordLayout {
                path,
                body_bytes,
                record_bytes,
                ..
            } => {
                assert_eq!(path, "records.dat");
                assert_eq!(body_bytes, 7);
                assert_eq!(record_bytes, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_file_smaller_than_overhead() {
        let err = decoder(b"x", &config(2, 4, 1)).unwrap_err();
        assert!(matches!(err, DecodeError::FileTooSmall { .. }));
    }

    #[test]
    fn test_seek_resumes_mid_file() {
        let data = b"HHaaaabbbbccccF";
        let cfg = config(2, 4, 1);

        let mut first = decoder(data, &cfg).unwrap();
        first.next_record().unwrap();
        let saved = first.tell();
        assert_eq!(saved, 6);

        let mut resumed = decoder(data, &cfg).unwrap();
        resumed.seek(saved).unwrap();
        assert_eq!(resumed.next_record().unwrap().unwrap(), "bbbb");
        assert_eq!(resumed.next_record().unwrap().unwrap(), "cccc");
        assert_eq!(resumed.next_record().unwrap(), None);
    }
}
