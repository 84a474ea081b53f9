//! Session configuration: file formats, compression, and layout options.

use serde::{Deserialize, Serialize};

use crate::checkpoint::PositionKind;
use crate::error::ConfigError;

/// Bytes in a kibibyte.
pub const KB: usize = 1024;
/// Bytes in a mebibyte.
pub const MB: usize = 1024 * KB;

/// Default read buffer size when a config asks for `0` (= "use default").
pub const DEFAULT_BUFFER_SIZE: usize = 256 * KB;

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

fn default_batch_size() -> usize {
    32
}

/// Compression format of input files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    #[default]
    None,
    Zlib,
    Gzip,
    Zstd,
}

impl CompressionFormat {
    /// Human-readable name (for logging).
    pub fn name(&self) -> &'static str {
        match self {
            CompressionFormat::None => "none",
            CompressionFormat::Zlib => "zlib",
            CompressionFormat::Gzip => "gzip",
            CompressionFormat::Zstd => "zstd",
        }
    }
}

/// Configuration for newline-delimited text files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineConfig {
    /// Compression format of input files.
    #[serde(default)]
    pub compression: CompressionFormat,
    /// Read buffer size in bytes (0 = default).
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            compression: CompressionFormat::None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Configuration for files of fixed-length records with optional
/// header and footer regions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedLengthConfig {
    /// Bytes to skip at the start of every file.
    #[serde(default)]
    pub header_bytes: u64,
    /// Exact length of every record.
    pub record_bytes: u64,
    /// Bytes to ignore at the end of every file.
    #[serde(default)]
    pub footer_bytes: u64,
    /// Read buffer size in bytes (0 = default).
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

/// Configuration for length-prefixed framed record files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramedConfig {
    /// Compression format of input files.
    #[serde(default)]
    pub compression: CompressionFormat,
    /// Read buffer size in bytes (0 = default).
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for FramedConfig {
    fn default() -> Self {
        Self {
            compression: CompressionFormat::None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// How a columnar row is flattened into an output record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowEncoding {
    /// Structured key -> feature mapping serialized as JSON.
    #[default]
    Features,
    /// Self-describing tagged binary layout.
    Raw,
}

/// Configuration for columnar batch files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnarConfig {
    /// Rows per batch pulled from the scan engine.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Row flattening strategy.
    #[serde(default)]
    pub encoding: RowEncoding,
}

impl Default for ColumnarConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            encoding: RowEncoding::default(),
        }
    }
}

/// Per-format decoding strategy, chosen once at session construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum FormatConfig {
    /// Newline-delimited records.
    Line(LineConfig),
    /// Fixed-length records.
    #[serde(rename = "fixed")]
    FixedLength(FixedLengthConfig),
    /// Length-prefixed framed records.
    Framed(FramedConfig),
    /// Column-major batches flattened row by row.
    Columnar(ColumnarConfig),
}

impl FormatConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            FormatConfig::Line(_) | FormatConfig::Framed(_) => Ok(()),
            FormatConfig::FixedLength(cfg) => {
                if cfg.record_bytes == 0 {
                    return Err(ConfigError::ZeroRecordBytes);
                }
                Ok(())
            }
            FormatConfig::Columnar(cfg) => {
                if cfg.batch_size == 0 {
                    return Err(ConfigError::ZeroBatchSize);
                }
                Ok(())
            }
        }
    }

    /// Which position unit this format checkpoints with.
    pub(crate) fn position_kind(&self) -> PositionKind {
        match self {
            FormatConfig::Line(_) | FormatConfig::FixedLength(_) => PositionKind::Byte,
            FormatConfig::Framed(_) => PositionKind::Frame,
            FormatConfig::Columnar(_) => PositionKind::Row,
        }
    }
}

/// Resolve a configured buffer size, mapping `0` to the default.
pub(crate) fn effective_buffer_size(configured: usize) -> usize {
    if configured == 0 {
        DEFAULT_BUFFER_SIZE
    } else {
        configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_record_bytes() {
        let config = FormatConfig::FixedLength(FixedLengthConfig {
            header_bytes: 0,
            record_bytes: 0,
            footer_bytes: 0,
            buffer_size: 0,
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroRecordBytes)
        ));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = FormatConfig::Columnar(ColumnarConfig {
            batch_size: 0,
            encoding: RowEncoding::Raw,
        });
        assert!(matches!(config.validate(), Err(ConfigError::ZeroBatchSize)));
    }

    #[test]
    fn test_line_config_roundtrip() {
        let config = FormatConfig::Line(LineConfig {
            compression: CompressionFormat::Gzip,
            buffer_size: 4 * KB,
        });
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"format\":\"line\""));
        assert!(json.contains("\"compression\":\"gzip\""));

        let restored: FormatConfig = serde_json::from_str(&json).unwrap();
        match restored {
            FormatConfig::Line(cfg) => {
                assert_eq!(cfg.compression, CompressionFormat::Gzip);
                assert_eq!(cfg.buffer_size, 4 * KB);
            }
            other => panic!("unexpected format: {other:?}"),
        }
    }

    #[test]
    fn test_defaults_applied_when_fields_missing() {
        let config: FormatConfig =
            serde_json::from_str(r#"{"format":"fixed","record_bytes":16}"#).unwrap();
        match config {
            FormatConfig::FixedLength(cfg) => {
                assert_eq!(cfg.header_bytes, 0);
                assert_eq!(cfg.footer_bytes, 0);
                assert_eq!(cfg.record_bytes, 16);
                assert_eq!(cfg.buffer_size, DEFAULT_BUFFER_SIZE);
            }
            other => panic!("unexpected format: {other:?}"),
        }
    }

    #[test]
    fn test_columnar_batch_size_default() {
        let config: FormatConfig = serde_json::from_str(r#"{"format":"columnar"}"#).unwrap();
        match config {
            FormatConfig::Columnar(cfg) => {
                assert_eq!(cfg.batch_size, 32);
                assert_eq!(cfg.encoding, RowEncoding::Features);
            }
            other => panic!("unexpected format: {other:?}"),
        }
    }

    #[test]
    fn test_effective_buffer_size() {
        assert_eq!(effective_buffer_size(0), DEFAULT_BUFFER_SIZE);
        assert_eq!(effective_buffer_size(512), 512);
    }
}
