//! Stream adapter: one open file plus optional decompression and buffering.
//!
//! Wraps a random-access byte source in an optional decompression transform
//! (zlib, gzip or zstd) and a buffering layer, and exposes reads in the
//! units decoders need: lines, exact byte counts, and forward skips. All
//! offsets reported by [`StreamAdapter::tell`] are logical offsets in the
//! *decoded* stream, which is what checkpoints record.

use std::io::{BufRead, BufReader, ErrorKind, Read};

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::config::{effective_buffer_size, CompressionFormat};
use crate::error::StreamError;
use crate::storage::RandomAccess;

/// A buffered, optionally-decompressed view over a single open file.
///
/// The adapter owns the file handle: the decompressor and buffer layers are
/// stacked on top of it by value, so the handle cannot be released while
/// any layer still reads from it.
pub struct StreamAdapter {
    inner: Box<dyn BufRead + Send>,
    pos: u64,
}

impl StreamAdapter {
    /// Open an adapter over `file` with the given compression transform.
    ///
    /// A `buffer_size` of 0 selects the default.
    pub fn open(
        file: Box<dyn RandomAccess>,
        compression: CompressionFormat,
        buffer_size: usize,
    ) -> Result<Self, StreamError> {
        let buffer_size = effective_buffer_size(buffer_size);
        let raw = BufReader::with_capacity(buffer_size, file);

        let inner: Box<dyn BufRead + Send> = match compression {
            CompressionFormat::None => Box::new(raw),
            CompressionFormat::Zlib => {
                Box::new(BufReader::with_capacity(buffer_size, ZlibDecoder::new(raw)))
            }
            CompressionFormat::Gzip => {
                Box::new(BufReader::with_capacity(buffer_size, GzDecoder::new(raw)))
            }
            CompressionFormat::Zstd => {
                let decoder = zstd::stream::read::Decoder::with_buffer(raw)
                    .map_err(|source| StreamError::Read { offset: 0, source })?;
                Box::new(BufReader::with_capacity(buffer_size, decoder))
            }
        };

        Ok(Self { inner, pos: 0 })
    }

    /// Current logical offset in the decoded stream.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Read the next line, excluding its terminator.
    ///
    /// Returns `Ok(None)` at end of stream. A final line without a trailing
    /// terminator is still returned once. The terminator bytes count toward
    /// [`tell`](Self::tell) even though they are stripped from the result.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        let mut line = Vec::new();
        let n = self
            .inner
            .read_until(b'\n', &mut line)
            .map_err(|source| StreamError::Read {
                offset: self.pos,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        self.pos += n as u64;

        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    /// Read exactly `n` bytes.
    ///
    /// A stream that ends early produces a short-read error naming the
    /// expected and actual counts.
    pub fn read_record(&mut self, n: u64) -> Result<Vec<u8>, StreamError> {
        let start = self.pos;
        let mut buf = vec![0u8; n as usize];
        let filled = self.fill(&mut buf)?;
        if (filled as u64) < n {
            return Err(StreamError::ShortRead {
                offset: start,
                expected: n,
                actual: filled as u64,
            });
        }
        Ok(buf)
    }

    /// Read exactly `n` bytes, or `Ok(None)` on a clean end of stream.
    ///
    /// Distinguishes "no more records" (zero bytes available) from a record
    /// cut off mid-way (some bytes available, fewer than `n`).
    pub fn read_record_opt(&mut self, n: u64) -> Result<Option<Vec<u8>>, StreamError> {
        let start = self.pos;
        let mut buf = vec![0u8; n as usize];
        let filled = self.fill(&mut buf)?;
        if filled == 0 && n > 0 {
            return Ok(None);
        }
        if (filled as u64) < n {
            return Err(StreamError::ShortRead {
                offset: start,
                expected: n,
                actual: filled as u64,
            });
        }
        Ok(Some(buf))
    }

    /// Skip `n` bytes of the decoded stream.
    pub fn skip(&mut self, n: u64) -> Result<(), StreamError> {
        let start = self.pos;
        let mut remaining = n;
        let mut scratch = [0u8; 8 * 1024];
        while remaining > 0 {
            let want = remaining.min(scratch.len() as u64) as usize;
            let got = self.fill(&mut scratch[..want])?;
            if got == 0 {
                return Err(StreamError::ShortRead {
                    offset: start,
                    expected: n,
                    actual: n - remaining,
                });
            }
            remaining -= got as u64;
        }
        Ok(())
    }

    /// Reposition to a previously-saved logical offset.
    ///
    /// Only forward movement is supported; restore paths open a fresh
    /// adapter (position 0) and seek forward from there.
    pub fn seek(&mut self, offset: u64) -> Result<(), StreamError> {
        if offset < self.pos {
            return Err(StreamError::BackwardSeek {
                from: self.pos,
                to: offset,
            });
        }
        let distance = offset - self.pos;
        self.skip(distance).map_err(|e| match e {
            StreamError::ShortRead { .. } => StreamError::SeekPastEnd {
                target: offset,
                end: self.pos,
            },
            other => other,
        })
    }

    /// Fill as much of `buf` as the stream has, advancing `pos`.
    fn fill(&mut self, buf: &mut [u8]) -> Result<usize, StreamError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(k) => {
                    filled += k;
                    self.pos += k as u64;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(StreamError::Read {
                        offset: self.pos,
                        source,
                    })
                }
            }
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn adapter(data: &[u8], compression: CompressionFormat) -> StreamAdapter {
        StreamAdapter::open(Box::new(Cursor::new(data.to_vec())), compression, 64).unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_read_line_strips_terminator() {
        let mut stream = adapter(b"alpha\nbeta\r\ngamma", CompressionFormat::None);
        assert_eq!(stream.read_line().unwrap().unwrap(), b"alpha");
        assert_eq!(stream.tell(), 6);
        assert_eq!(stream.read_line().unwrap().unwrap(), b"beta");
        assert_eq!(stream.tell(), 12);
        // Final line has no terminator but is still produced.
        assert_eq!(stream.read_line().unwrap().unwrap(), b"gamma");
        assert_eq!(stream.read_line().unwrap(), None);
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_read_record_exact_and_short() {
        let mut stream = adapter(b"abcdef", CompressionFormat::None);
        assert_eq!(stream.read_record(4).unwrap(), b"abcd");
        let err = stream.read_record(4).unwrap_err();
        match err {
            StreamError::ShortRead {
                expected, actual, ..
            } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_record_opt_clean_eof() {
        let mut stream = adapter(b"abcd", CompressionFormat::None);
        assert_eq!(stream.read_record_opt(4).unwrap().unwrap(), b"abcd");
        assert_eq!(stream.read_record_opt(4).unwrap(), None);
    }

    #[test]
    fn test_seek_forward_and_backward() {
        let mut stream = adapter(b"0123456789", CompressionFormat::None);
        stream.seek(4).unwrap();
        assert_eq!(stream.read_record(2).unwrap(), b"45");
        assert!(matches!(
            stream.seek(3),
            Err(StreamError::BackwardSeek { from: 6, to: 3 })
        ));
        assert!(matches!(
            stream.seek(100),
            Err(StreamError::SeekPastEnd { target: 100, .. })
        ));
    }

    #[test]
    fn test_gzip_stream_decodes_transparently() {
        let compressed = gzip(b"one\ntwo\n");
        let mut stream = adapter(&compressed, CompressionFormat::Gzip);
        assert_eq!(stream.read_line().unwrap().unwrap(), b"one");
        assert_eq!(stream.tell(), 4);
        assert_eq!(stream.read_line().unwrap().unwrap(), b"two");
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_zlib_stream_seek_forward() {
        let compressed = zlib(b"0123456789");
        let mut stream = adapter(&compressed, CompressionFormat::Zlib);
        stream.seek(6).unwrap();
        assert_eq!(stream.read_record(4).unwrap(), b"6789");
    }

    #[test]
    fn test_zstd_stream_decodes_transparently() {
        let compressed = zstd::encode_all(&b"one\ntwo\n"[..], 3).unwrap();
        let mut stream = adapter(&compressed, CompressionFormat::Zstd);
        assert_eq!(stream.read_line().unwrap().unwrap(), b"one");
        assert_eq!(stream.read_line().unwrap().unwrap(), b"two");
        assert_eq!(stream.read_line().unwrap(), None);
    }

    #[test]
    fn test_empty_stream() {
        let mut stream = adapter(b"", CompressionFormat::None);
        assert_eq!(stream.read_line().unwrap(), None);
        assert_eq!(stream.tell(), 0);
    }
}
