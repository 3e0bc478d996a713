//! Writer side of the gin index store.
//!
//! A [`GinIndexStore`] owns the index files for one data part and builds
//! immutable segments out of the postings accumulated in memory. Row id and
//! segment id ranges are reserved through the store so concurrent indexing
//! threads never overlap; the segment id counter is written through to disk
//! on every reservation, so a crash wastes at most one id and never reuses
//! one.
//!
//! Lifecycle: `open_writable` -> accumulate / `write_segment` ... ->
//! `finalize` (exactly once on success) or `cancel` (on failure). A store
//! dropped before `finalize` discards its in-progress state like `cancel`.

use std::collections::HashMap;
use std::io::{Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::compression::CompressionLevel;
use crate::error::{GindexError, Result};
use crate::index::dictionary::{GinSegmentDictionary, TermDictionary, write_dictionary_blob};
use crate::index::postings::GinIndexPostingsBuilder;
use crate::index::segment::{
    Format, GinIndexSegment, dictionary_file_name, postings_file_name, segment_id_file_name,
    segment_metadata_file_name,
};
use crate::storage::{Storage, StorageOutput};

/// Threshold value that disables automatic segment flushing.
pub const UNLIMITED_SEGMENT_DIGESTION_THRESHOLD_BYTES: u64 = 0;

/// Configuration for gin index construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GinIndexConfig {
    /// Cumulative digested text size (bytes) after which the caller is
    /// expected to flush the current segment. 0 means unlimited: the store
    /// never asks for an auto-flush.
    pub segment_digestion_threshold_bytes: u64,

    /// Zstd level used for dictionary blobs above the compression threshold.
    pub compression_level: i32,
}

impl Default for GinIndexConfig {
    fn default() -> Self {
        GinIndexConfig {
            segment_digestion_threshold_bytes: 256 * 1024 * 1024, // 256MB
            compression_level: CompressionLevel::DEFAULT.0,
        }
    }
}

/// Container for the postings builders of the in-progress segment.
type GinIndexPostingsBuilderContainer =
    HashMap<String, GinIndexPostingsBuilder, ahash::RandomState>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterPhase {
    Open,
    Finalized,
    Cancelled,
}

/// Mutable state of the in-progress segment. Single-writer-at-a-time by
/// construction: one indexing pass per part builds one store.
#[derive(Debug)]
struct SegmentWriter {
    phase: WriterPhase,
    current_segment: GinIndexSegment,
    current_postings: GinIndexPostingsBuilderContainer,
    current_size: u64,
    metadata_stream: Option<Box<dyn StorageOutput>>,
    dict_stream: Option<Box<dyn StorageOutput>>,
    postings_stream: Option<Box<dyn StorageOutput>>,
}

impl SegmentWriter {
    /// Drop streams and in-progress state without syncing. Never fails;
    /// unflushed bytes become an unreferenced tail at worst.
    fn discard(&mut self) {
        self.metadata_stream = None;
        self.dict_stream = None;
        self.postings_stream = None;
        self.current_postings.clear();
        self.current_size = 0;
        self.phase = WriterPhase::Cancelled;
    }
}

fn writable_state(guard: &mut Option<SegmentWriter>) -> Result<&mut SegmentWriter> {
    let state = guard
        .as_mut()
        .ok_or_else(|| GindexError::index("store is not open for writing"))?;

    match state.phase {
        WriterPhase::Open => Ok(state),
        WriterPhase::Finalized => Err(GindexError::index("store is already finalized")),
        WriterPhase::Cancelled => Err(GindexError::index("store build was cancelled")),
    }
}

/// Gin index store for one column data part.
///
/// Writer-exclusive during construction; shared read access once finalized
/// (segment reads are lock-free because sealed segments never change).
pub struct GinIndexStore {
    name: String,
    storage: Arc<dyn Storage>,
    config: GinIndexConfig,
    version: Format,

    /// Next available row id, handed out in ranges, never reused.
    next_row_id: AtomicU32,

    /// Next available segment id, mirrored to the segment id file under
    /// `segment_id_lock`.
    next_segment_id: AtomicU32,
    segment_id_lock: Mutex<()>,

    /// Loaded dictionaries keyed by segment id (write-once, read-many).
    dictionaries: RwLock<HashMap<u32, Arc<GinSegmentDictionary>, ahash::RandomState>>,

    /// `None` for read-only handles.
    writer: Mutex<Option<SegmentWriter>>,
}

impl std::fmt::Debug for GinIndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GinIndexStore")
            .field("name", &self.name)
            .field("location", &self.storage.location())
            .field("version", &self.version)
            .finish()
    }
}

impl GinIndexStore {
    /// Open an existing store for reading.
    ///
    /// Fails with [`GindexError::FormatVersionMismatch`] when the stored
    /// format version is unknown, and with a storage error when the segment
    /// id file is missing.
    pub fn open(name: &str, storage: Arc<dyn Storage>) -> Result<GinIndexStore> {
        let (version, next_segment_id) = Self::read_segment_id_file(storage.as_ref(), name)?;
        let next_row_id = Self::last_segment_descriptor(storage.as_ref(), name)?
            .map(|segment| segment.next_row_id)
            .unwrap_or(1);

        Ok(GinIndexStore {
            name: name.to_string(),
            storage,
            config: GinIndexConfig::default(),
            version,
            next_row_id: AtomicU32::new(next_row_id),
            next_segment_id: AtomicU32::new(next_segment_id),
            segment_id_lock: Mutex::new(()),
            dictionaries: RwLock::new(HashMap::default()),
            writer: Mutex::new(None),
        })
    }

    /// Open a store for writing, creating its files or resuming from a
    /// previous write session for the same part.
    pub fn open_writable(
        name: &str,
        storage: Arc<dyn Storage>,
        config: GinIndexConfig,
    ) -> Result<GinIndexStore> {
        let (version, next_segment_id, next_row_id, postings_start, dict_start) =
            if Self::exists_on(storage.as_ref(), name) {
                let (version, next_segment_id) =
                    Self::read_segment_id_file(storage.as_ref(), name)?;
                let next_row_id = Self::last_segment_descriptor(storage.as_ref(), name)?
                    .map(|segment| segment.next_row_id)
                    .unwrap_or(1);
                // Appends continue at the current file ends; bytes past the
                // last recorded descriptor are unreferenced and stay that way
                let postings_start =
                    Self::existing_file_size(storage.as_ref(), &postings_file_name(name))?;
                let dict_start =
                    Self::existing_file_size(storage.as_ref(), &dictionary_file_name(name))?;
                (version, next_segment_id, next_row_id, postings_start, dict_start)
            } else {
                (Format::CURRENT, 1, 1, 0, 0)
            };

        let metadata_stream = storage.create_output_append(&segment_metadata_file_name(name))?;
        let dict_stream = storage.create_output_append(&dictionary_file_name(name))?;
        let postings_stream = storage.create_output_append(&postings_file_name(name))?;

        let store = GinIndexStore {
            name: name.to_string(),
            storage,
            config,
            version,
            next_row_id: AtomicU32::new(next_row_id),
            next_segment_id: AtomicU32::new(next_segment_id),
            segment_id_lock: Mutex::new(()),
            dictionaries: RwLock::new(HashMap::default()),
            writer: Mutex::new(Some(SegmentWriter {
                phase: WriterPhase::Open,
                current_segment: GinIndexSegment {
                    segment_id: 0,
                    next_row_id,
                    postings_start_offset: postings_start,
                    dict_start_offset: dict_start,
                },
                current_postings: HashMap::default(),
                current_size: 0,
                metadata_stream: Some(metadata_stream),
                dict_stream: Some(dict_stream),
                postings_stream: Some(postings_stream),
            })),
        };

        // Reserve the id for the first in-progress segment. This also writes
        // the segment id file, which marks the store as existing on disk.
        let segment_id = store.reserve_segment_id()?;
        if let Some(state) = store.writer.lock().as_mut() {
            state.current_segment.segment_id = segment_id;
        }

        Ok(store)
    }

    /// Check existence of a store by the presence of its segment id file.
    pub fn exists_on(storage: &dyn Storage, name: &str) -> bool {
        storage.file_exists(&segment_id_file_name(name))
    }

    pub fn exists(&self) -> bool {
        Self::exists_on(self.storage.as_ref(), &self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn version(&self) -> Format {
        self.version
    }

    /// Total number of sealed segments, derived from the metadata file so a
    /// flush interrupted before its descriptor append is never counted.
    pub fn num_segments(&self) -> Result<u32> {
        let file_name = segment_metadata_file_name(&self.name);
        if !self.storage.file_exists(&file_name) {
            return Ok(0);
        }

        let size = self.storage.file_size(&file_name)?;
        Ok((size / GinIndexSegment::ENCODED_SIZE) as u32)
    }

    /// Atomically reserve `count` consecutive row ids, returning the first.
    pub fn reserve_row_ids(&self, count: u32) -> u32 {
        self.next_row_id.fetch_add(count, Ordering::SeqCst)
    }

    /// Reserve the next segment id and persist the counter.
    pub fn reserve_segment_id(&self) -> Result<u32> {
        let _guard = self.segment_id_lock.lock();
        let segment_id = self.next_segment_id.fetch_add(1, Ordering::SeqCst);
        self.write_segment_id_file()?;
        Ok(segment_id)
    }

    /// Id of the in-progress segment, or `None` for read-only handles.
    pub fn current_segment_id(&self) -> Option<u32> {
        self.writer
            .lock()
            .as_ref()
            .map(|state| state.current_segment.segment_id)
    }

    /// Add `row_id` to the postings builder for `term`, creating the builder
    /// on first use. Idempotent per (term, row id).
    pub fn add_row_id(&self, term: &str, row_id: u32) -> Result<()> {
        let mut guard = self.writer.lock();
        let state = writable_state(&mut guard)?;

        if let Some(builder) = state.current_postings.get_mut(term) {
            if !builder.contains(row_id) {
                builder.add(row_id);
            }
        } else {
            let mut builder = GinIndexPostingsBuilder::new();
            builder.add(row_id);
            state.current_postings.insert(term.to_string(), builder);
        }

        Ok(())
    }

    /// Replace the postings builder for `term`.
    pub fn set_postings_builder(
        &self,
        term: &str,
        builder: GinIndexPostingsBuilder,
    ) -> Result<()> {
        let mut guard = self.writer.lock();
        let state = writable_state(&mut guard)?;
        state.current_postings.insert(term.to_string(), builder);
        Ok(())
    }

    /// Number of terms accumulated for the in-progress segment.
    pub fn pending_term_count(&self) -> usize {
        self.writer
            .lock()
            .as_ref()
            .map(|state| state.current_postings.len())
            .unwrap_or(0)
    }

    /// Accumulate the size of text data which has been digested.
    pub fn increment_current_size_by(&self, size: u64) -> Result<()> {
        let mut guard = self.writer.lock();
        let state = writable_state(&mut guard)?;
        state.current_size += size;
        Ok(())
    }

    /// Check if the digestion threshold has been crossed and the current
    /// segment should be written out.
    pub fn need_to_write_current_segment(&self) -> bool {
        let threshold = self.config.segment_digestion_threshold_bytes;
        if threshold == UNLIMITED_SEGMENT_DIGESTION_THRESHOLD_BYTES {
            return false;
        }

        self.writer
            .lock()
            .as_ref()
            .map(|state| state.current_size >= threshold)
            .unwrap_or(false)
    }

    /// Seal the in-progress segment: serialize its postings sorted by term,
    /// build and store the term dictionary, then append the segment
    /// descriptor. The descriptor append is the commit point; earlier bytes
    /// from an interrupted flush are left behind as an unreferenced tail.
    ///
    /// Calling with no accumulated postings is a no-op.
    pub fn write_segment(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        let state = writable_state(&mut guard)?;

        if state.current_postings.is_empty() {
            return Ok(());
        }

        self.write_segment_locked(state)
    }

    /// Flush any non-empty in-progress segment, then durably sync and close
    /// all file streams. Idempotent once finalized.
    pub fn finalize(&self) -> Result<()> {
        let mut guard = self.writer.lock();
        let Some(state) = guard.as_mut() else {
            return Ok(());
        };

        match state.phase {
            WriterPhase::Finalized => return Ok(()),
            WriterPhase::Cancelled => {
                return Err(GindexError::index("store build was cancelled"));
            }
            WriterPhase::Open => {}
        }

        if !state.current_postings.is_empty() {
            self.write_segment_locked(state)?;
        }

        for stream in [
            state.metadata_stream.take(),
            state.dict_stream.take(),
            state.postings_stream.take(),
        ]
        .iter_mut()
        .flatten()
        {
            stream.flush_and_sync()?;
            stream.close()?;
        }

        state.phase = WriterPhase::Finalized;
        Ok(())
    }

    /// Discard in-progress state and release file handles without making any
    /// partial segment visible. Used on build failure; never fails.
    pub fn cancel(&self) {
        let mut guard = self.writer.lock();
        if let Some(state) = guard.as_mut() {
            if state.phase == WriterPhase::Open {
                state.discard();
            }
        }
    }

    /// Delete all index files of the store `name` from `storage`.
    pub fn drop_store_files(storage: &dyn Storage, name: &str) -> Result<()> {
        for file_name in [
            segment_id_file_name(name),
            segment_metadata_file_name(name),
            dictionary_file_name(name),
            postings_file_name(name),
        ] {
            if storage.file_exists(&file_name) {
                storage.delete_file(&file_name)?;
            }
        }

        Ok(())
    }

    /// Look up a previously loaded segment dictionary.
    pub(crate) fn cached_dictionary(&self, segment_id: u32) -> Option<Arc<GinSegmentDictionary>> {
        self.dictionaries.read().get(&segment_id).cloned()
    }

    /// Cache a loaded segment dictionary. The first insert for a segment id
    /// wins; concurrent loaders converge on the same entry.
    pub(crate) fn cache_dictionary(
        &self,
        segment_id: u32,
        dictionary: Arc<GinSegmentDictionary>,
    ) -> Arc<GinSegmentDictionary> {
        let mut dictionaries = self.dictionaries.write();
        dictionaries.entry(segment_id).or_insert(dictionary).clone()
    }

    fn write_segment_locked(&self, state: &mut SegmentWriter) -> Result<()> {
        let SegmentWriter {
            current_segment,
            current_postings,
            current_size,
            metadata_stream,
            dict_stream,
            postings_stream,
            ..
        } = state;

        let (Some(metadata_stream), Some(dict_stream), Some(postings_stream)) = (
            metadata_stream.as_mut(),
            dict_stream.as_mut(),
            postings_stream.as_mut(),
        ) else {
            return Err(GindexError::index("store file streams are closed"));
        };

        // Sort terms for a deterministic dictionary layout
        let mut terms: Vec<&String> = current_postings.keys().collect();
        terms.sort_unstable();

        let mut term_offsets: Vec<(&str, u64)> = Vec::with_capacity(terms.len());
        let mut postings_written = 0u64;
        for term in terms {
            term_offsets.push((term.as_str(), postings_written));
            postings_written += current_postings[term].serialize(postings_stream)?;
        }

        let fst_blob = TermDictionary::build(&term_offsets)?;
        let dict_written = write_dictionary_blob(
            dict_stream,
            &fst_blob,
            CompressionLevel(self.config.compression_level),
        )?;

        postings_stream.flush()?;
        dict_stream.flush()?;

        // The descriptor append commits the segment
        current_segment.next_row_id = self.next_row_id.load(Ordering::SeqCst);
        current_segment.write_to(metadata_stream)?;
        metadata_stream.flush()?;

        // Begin accumulating the next segment
        current_segment.segment_id = self.reserve_segment_id()?;
        current_segment.postings_start_offset += postings_written;
        current_segment.dict_start_offset += dict_written;
        current_postings.clear();
        *current_size = 0;

        Ok(())
    }

    fn write_segment_id_file(&self) -> Result<()> {
        let mut output = self
            .storage
            .create_output(&segment_id_file_name(&self.name))?;
        output.write_u8(self.version.as_byte())?;
        output.write_u32::<LittleEndian>(self.next_segment_id.load(Ordering::SeqCst))?;
        output.close()?;
        Ok(())
    }

    fn read_segment_id_file(storage: &dyn Storage, name: &str) -> Result<(Format, u32)> {
        let mut input = storage.open_input(&segment_id_file_name(name))?;
        let version = Format::from_byte(input.read_u8()?)?;
        let next_segment_id = input.read_u32::<LittleEndian>()?;
        Ok((version, next_segment_id))
    }

    fn last_segment_descriptor(
        storage: &dyn Storage,
        name: &str,
    ) -> Result<Option<GinIndexSegment>> {
        let file_name = segment_metadata_file_name(name);
        if !storage.file_exists(&file_name) {
            return Ok(None);
        }

        let count = storage.file_size(&file_name)? / GinIndexSegment::ENCODED_SIZE;
        if count == 0 {
            return Ok(None);
        }

        let mut input = storage.open_input(&file_name)?;
        input.seek(SeekFrom::Start((count - 1) * GinIndexSegment::ENCODED_SIZE))?;
        Ok(Some(GinIndexSegment::read_from(&mut input)?))
    }

    fn existing_file_size(storage: &dyn Storage, file_name: &str) -> Result<u64> {
        if storage.file_exists(file_name) {
            storage.file_size(file_name)
        } else {
            Ok(0)
        }
    }
}

impl Drop for GinIndexStore {
    fn drop(&mut self) {
        // A build that never reached finalize is discarded like cancel()
        if let Some(state) = self.writer.get_mut().as_mut() {
            if state.phase == WriterPhase::Open {
                state.discard();
            }
        }
    }
}
