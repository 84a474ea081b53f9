//! Local filesystem backend implementation.

use std::fs::File;
use std::io::ErrorKind;

use crate::error::StorageError;

use super::{Filesystem, RandomAccess};

/// Filesystem backed by the local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    fn map_err(path: &str, source: std::io::Error) -> StorageError {
        if source.kind() == ErrorKind::NotFound {
            StorageError::NotFound {
                path: path.to_string(),
            }
        } else {
            StorageError::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

impl Filesystem for LocalFilesystem {
    fn open(&self, path: &str) -> Result<Box<dyn RandomAccess>, StorageError> {
        let file = File::open(path).map_err(|e| Self::map_err(path, e))?;
        Ok(Box::new(file))
    }

    fn file_size(&self, path: &str) -> Result<u64, StorageError> {
        let meta = std::fs::metadata(path).map_err(|e| Self::map_err(path, e))?;
        Ok(meta.len())
    }
}
