//! Columnar batch decoder.
//!
//! Pulls fixed-size batches from a scan engine and flattens them row by
//! row into records. Scan engines deliver whole batches only, with no
//! row-level seek, so restoring to row `k` replays `k / batch_size`
//! batches and, when resuming mid-batch, re-pulls the partially consumed
//! batch and holds it as current.

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use tracing::debug;

use crate::config::{ColumnarConfig, RowEncoding};
use crate::encode::{encode_row_features, encode_row_raw};
use crate::error::DecodeError;
use crate::scan::{BatchScan, FileSplit, ScanFactory};

/// Decodes a columnar file into one flattened record per row.
pub struct ColumnarDecoder {
    path: String,
    scan: Box<dyn BatchScan>,
    batch_size: usize,
    encoding: RowEncoding,
    /// Rows already produced from this file.
    row_offset: u64,
    /// Batch currently being flattened, if any.
    batch: Option<RecordBatch>,
}

impl ColumnarDecoder {
    /// Begin a scan over `split` and wrap it in a decoder.
    pub fn open(
        factory: &dyn ScanFactory,
        split: FileSplit,
        config: &ColumnarConfig,
    ) -> Result<Self, DecodeError> {
        let scan =
            factory
                .begin_scan(&split, config.batch_size)
                .map_err(|source| DecodeError::Scan {
                    path: split.filename.clone(),
                    source,
                })?;
        Ok(Self {
            path: split.filename,
            scan,
            batch_size: config.batch_size,
            encoding: config.encoding,
            row_offset: 0,
            batch: None,
        })
    }

    /// Flatten the next row into a record.
    pub fn next_record(&mut self) -> Result<Option<Bytes>, DecodeError> {
        let row_in_batch = (self.row_offset % self.batch_size as u64) as usize;
        if row_in_batch == 0 {
            self.batch = self.scan.next_batch().map_err(|source| DecodeError::Scan {
                path: self.path.clone(),
                source,
            })?;
        }

        let Some(batch) = &self.batch else {
            return Ok(None);
        };
        if row_in_batch >= batch.num_rows() {
            // The final batch was short; the file is done.
            return Ok(None);
        }

        let record = match self.encoding {
            RowEncoding::Raw => encode_row_raw(batch, row_in_batch),
            RowEncoding::Features => {
                encode_row_features(batch, row_in_batch).map_err(|source| DecodeError::Encode {
                    path: self.path.clone(),
                    source,
                })?
            }
        };
        self.row_offset += 1;
        Ok(Some(record))
    }

    /// Rows produced so far from this file.
    pub fn row_offset(&self) -> u64 {
        self.row_offset
    }

    /// Advance a freshly opened decoder to row `target`.
    ///
    /// Whole batches are pulled and discarded; when the target lies inside
    /// a batch, that batch is re-pulled and held so the next produce call
    /// continues exactly at `target`.
    pub fn seek_rows(&mut self, target: u64) -> Result<(), DecodeError> {
        let scan_err = |path: &str| {
            let path = path.to_string();
            move |source| DecodeError::Scan { path, source }
        };

        let whole_batches = target / self.batch_size as u64;
        let row_in_batch = target % self.batch_size as u64;

        for _ in 0..whole_batches {
            if self.scan.next_batch().map_err(scan_err(&self.path))?.is_none() {
                // The file has fewer rows than the checkpoint expects;
                // the next produce call reports exhaustion.
                self.batch = None;
                self.row_offset = target;
                return Ok(());
            }
        }
        if row_in_batch != 0 {
            self.batch = self.scan.next_batch().map_err(scan_err(&self.path))?;
        }

        debug!(
            path = %self.path,
            target,
            replayed_batches = whole_batches,
            "Restored columnar position"
        );
        self.row_offset = target;
        Ok(())
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{decode_row_raw, ColumnValue};
    use crate::error::ScanError;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
    use std::sync::Arc;

    /// Scan over an in-memory row range, delivering `batch_size` rows per
    /// batch with a short final batch.
    struct RangeScan {
        schema: SchemaRef,
        rows: i64,
        next_row: i64,
        batch_size: usize,
    }

    impl RangeScan {
        fn factory(rows: i64) -> RangeFactory {
            RangeFactory { rows }
        }
    }

    struct RangeFactory {
        rows: i64,
    }

    impl ScanFactory for RangeFactory {
        fn begin_scan(
            &self,
            _split: &FileSplit,
            batch_size: usize,
        ) -> Result<Box<dyn BatchScan>, ScanError> {
            Ok(Box::new(RangeScan {
                schema: Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, false)])),
                rows: self.rows,
                next_row: 0,
                batch_size,
            }))
        }
    }

    impl BatchScan for RangeScan {
        fn next_batch(&mut self) -> Result<Option<RecordBatch>, ScanError> {
            if self.next_row >= self.rows {
                return Ok(None);
            }
            let take = (self.batch_size as i64).min(self.rows - self.next_row);
            let values: Vec<i64> = (self.next_row..self.next_row + take).collect();
            self.next_row += take;
            let batch = RecordBatch::try_new(
                self.schema.clone(),
                vec![Arc::new(Int64Array::from(values))],
            )
            .map_err(|e| ScanError::BatchRead {
                path: "range".to_string(),
                message: e.to_string(),
            })?;
            Ok(Some(batch))
        }

        fn schema(&self) -> SchemaRef {
            self.schema.clone()
        }
    }

    fn split() -> FileSplit {
        FileSplit {
            filename: "range".to_string(),
            start: 0,
            length: 0,
        }
    }

    fn config(batch_size: usize) -> ColumnarConfig {
        ColumnarConfig {
            batch_size,
            encoding: RowEncoding::Raw,
        }
    }

    fn first_column(record: &[u8]) -> i64 {
        match decode_row_raw(record).unwrap().as_slice() {
            [ColumnValue::Int64(v)] => *v,
            other => panic!("unexpected columns: {other:?}"),
        }
    }

    fn drain(decoder: &mut ColumnarDecoder) -> Vec<i64> {
        let mut values = Vec::new();
        while let Some(record) = decoder.next_record().unwrap() {
            values.push(first_column(&record));
        }
        values
    }

    #[test]
    fn test_flattens_all_rows_in_order() {
        let factory = RangeScan::factory(10);
        let mut decoder = ColumnarDecoder::open(&factory, split(), &config(4)).unwrap();
        assert_eq!(drain(&mut decoder), (0..10).collect::<Vec<i64>>());
        // Exhaustion is sticky.
        assert_eq!(decoder.next_record().unwrap(), None);
    }

    #[test]
    fn test_seek_on_batch_boundary() {
        let factory = RangeScan::factory(10);
        let mut decoder = ColumnarDecoder::open(&factory, split(), &config(4)).unwrap();
        decoder.seek_rows(8).unwrap();
        assert_eq!(decoder.row_offset(), 8);
        assert_eq!(drain(&mut decoder), vec![8, 9]);
    }

    #[test]
    fn test_seek_mid_batch() {
        let factory = RangeScan::factory(10);
        let mut decoder = ColumnarDecoder::open(&factory, split(), &config(4)).unwrap();
        decoder.seek_rows(6).unwrap();
        assert_eq!(drain(&mut decoder), vec![6, 7, 8, 9]);
    }

    #[test]
    fn test_seek_into_short_final_batch() {
        let factory = RangeScan::factory(10);
        let mut decoder = ColumnarDecoder::open(&factory, split(), &config(4)).unwrap();
        decoder.seek_rows(9).unwrap();
        assert_eq!(drain(&mut decoder), vec![9]);
    }

    #[test]
    fn test_seek_to_zero_is_noop() {
        let factory = RangeScan::factory(3);
        let mut decoder = ColumnarDecoder::open(&factory, split(), &config(4)).unwrap();
        decoder.seek_rows(0).unwrap();
        assert_eq!(drain(&mut decoder), vec![0, 1, 2]);
    }

    #[test]
    fn test_seek_past_available_rows_exhausts() {
        let factory = RangeScan::factory(4);
        let mut decoder = ColumnarDecoder::open(&factory, split(), &config(4)).unwrap();
        decoder.seek_rows(12).unwrap();
        assert_eq!(decoder.next_record().unwrap(), None);
    }

    #[test]
    fn test_empty_scan_is_exhausted_immediately() {
        let factory = RangeScan::factory(0);
        let mut decoder = ColumnarDecoder::open(&factory, split(), &config(4)).unwrap();
        assert_eq!(decoder.next_record().unwrap(), None);
    }
}
