//! The lazy reader sequence of a sub-scan.
//!
//! [`ScanReaders`] is single-pass and forward-only. Each call to `next`
//! builds the reader of the next split. The sequence keeps a release slot for
//! every reader it has built, shared with the [`ManagedReader`] handed to the
//! caller, so each reader is closed exactly once: by the handle's `close`, by
//! [`ScanReaders::close`], by a later split's failure, or when the sequence
//! is dropped, whichever comes first.
//!
//! After a failure the sequence releases every open reader, returns the error
//! (with release failures attached as suppressed) and yields nothing more.

use std::{
    mem,
    sync::{Arc, Mutex, PoisonError},
};

use arrow::{datatypes::SchemaRef, record_batch::RecordBatch};
use log::warn;

use crate::{
    reader::{EmptyRecordReader, ReaderError, RecordReader},
    scan::{
        error::{ResourceError, ScanError},
        factory::ReaderFactory,
    },
};

/// Split key reported for the reader of an empty sub-scan.
pub const EMPTY_SCAN_SPLIT_KEY: &str = "<empty>";

#[derive(Debug)]
struct ReaderSlot {
    split_key: String,
    reader: Mutex<Option<Box<dyn RecordReader>>>,
}

impl ReaderSlot {
    fn new(split_key: String, reader: Box<dyn RecordReader>) -> Self {
        ReaderSlot {
            split_key,
            reader: Mutex::new(Some(reader)),
        }
    }

    fn is_open(&self) -> bool {
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Close the reader if it is still open. Later calls are no-ops.
    fn release(&self) -> Result<(), ResourceError> {
        let taken = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(mut reader) => reader.close().map_err(|source| ResourceError::Release {
                split: self.split_key.clone(),
                source,
            }),
            None => Ok(()),
        }
    }
}

/// A reader yielded by [`ScanReaders`].
///
/// Closing the handle releases the underlying reader; the scan will not
/// release it again.
#[derive(Debug)]
pub struct ManagedReader {
    slot: Arc<ReaderSlot>,
    schema: SchemaRef,
}

impl ManagedReader {
    /// Split key of the split this reader reads.
    pub fn split_key(&self) -> &str {
        &self.slot.split_key
    }

    /// Whether the underlying reader is still open.
    pub fn is_open(&self) -> bool {
        self.slot.is_open()
    }
}

impl RecordReader for ManagedReader {
    fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>, ReaderError> {
        let mut guard = self
            .slot
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(reader) => reader.next_batch(),
            None => Err(ReaderError::Released {
                split: self.slot.split_key.clone(),
            }),
        }
    }

    fn close(&mut self) -> Result<(), ReaderError> {
        let taken = self
            .slot
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(mut reader) => reader.close(),
            None => Ok(()),
        }
    }
}

enum Source<'a> {
    Empty { yielded: bool },
    Splits { factory: ReaderFactory<'a>, next: usize },
    Finished,
}

/// Lazily built readers of one sub-scan, in split order.
pub struct ScanReaders<'a> {
    source: Source<'a>,
    slots: Vec<Arc<ReaderSlot>>,
}

impl<'a> ScanReaders<'a> {
    pub(crate) fn empty() -> Self {
        ScanReaders {
            source: Source::Empty { yielded: false },
            slots: Vec::new(),
        }
    }

    pub(crate) fn new(factory: ReaderFactory<'a>) -> Self {
        ScanReaders {
            source: Source::Splits { factory, next: 0 },
            slots: Vec::new(),
        }
    }

    /// Number of readers built so far and not yet released.
    pub fn open_readers(&self) -> usize {
        self.slots.iter().filter(|s| s.is_open()).count()
    }

    /// The reader factory, while splits remain.
    pub fn factory(&self) -> Option<&ReaderFactory<'a>> {
        match &self.source {
            Source::Splits { factory, .. } => Some(factory),
            Source::Empty { .. } | Source::Finished => None,
        }
    }

    /// Release every reader that is still open and end the sequence.
    pub fn close(mut self) -> Result<(), ScanError> {
        self.source = Source::Finished;
        let failures = self.release_all();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ScanError::Release { failures })
        }
    }

    fn release_all(&mut self) -> Vec<ResourceError> {
        mem::take(&mut self.slots)
            .into_iter()
            .filter_map(|slot| slot.release().err())
            .collect()
    }

    fn register(&mut self, split_key: String, reader: Box<dyn RecordReader>) -> ManagedReader {
        let schema = reader.schema();
        let slot = Arc::new(ReaderSlot::new(split_key, reader));
        self.slots.push(Arc::clone(&slot));
        ManagedReader { slot, schema }
    }
}

impl Iterator for ScanReaders<'_> {
    type Item = Result<ManagedReader, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (split_key, outcome) = match &mut self.source {
            Source::Finished => return None,
            Source::Empty { yielded: true } => return None,
            Source::Empty { yielded } => {
                *yielded = true;
                let reader: Box<dyn RecordReader> = Box::new(EmptyRecordReader::new());
                (EMPTY_SCAN_SPLIT_KEY.to_string(), Ok(reader))
            }
            Source::Splits { factory, next } => {
                let splits = &factory.sub_scan().splits;
                let Some(split) = splits.get(*next) else {
                    self.source = Source::Finished;
                    return None;
                };
                *next += 1;
                (split.split_key.clone(), factory.construct(split))
            }
        };

        match outcome {
            Ok(reader) => Some(Ok(self.register(split_key, reader))),
            Err(error) => {
                self.source = Source::Finished;
                let suppressed = self.release_all();
                Some(Err(ScanError::for_split(split_key, error, suppressed)))
            }
        }
    }
}

impl Drop for ScanReaders<'_> {
    fn drop(&mut self) {
        for failure in self.release_all() {
            warn!("{failure}");
        }
    }
}
