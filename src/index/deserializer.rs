//! Reader side of the gin index store.
//!
//! A deserializer resolves terms against every sealed segment of one store.
//! Segment descriptors are read once per store open; dictionaries load
//! lazily on first lookup and land in the store's per-segment cache, so
//! repeated lookups and other deserializers of the same store skip the
//! dictionary file. Sealed segments never change, which makes all of this
//! lock-free on the read path; at worst two readers load the same dictionary
//! redundantly and converge on one cached copy.

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use crate::error::{GindexError, Result};
use crate::index::cache::{GinPostingsCache, GinSegmentedPostingsListContainer};
use crate::index::dictionary::{GinSegmentDictionary, TermDictionary, read_dictionary_blob};
use crate::index::postings::{GinIndexPostingsBuilder, GinIndexPostingsListPtr};
use crate::index::segment::{
    GinIndexSegment, dictionary_file_name, postings_file_name, segment_metadata_file_name,
};
use crate::index::store::GinIndexStore;
use crate::storage::StorageInput;

/// Reads segments, dictionaries and postings lists of one store.
pub struct GinIndexStoreDeserializer {
    store: Arc<GinIndexStore>,
    segments: Vec<GinIndexSegment>,
    segments_loaded: bool,
    dict_stream: Option<Box<dyn StorageInput>>,
    postings_stream: Option<Box<dyn StorageInput>>,
}

impl GinIndexStoreDeserializer {
    pub fn new(store: Arc<GinIndexStore>) -> GinIndexStoreDeserializer {
        GinIndexStoreDeserializer {
            store,
            segments: Vec::new(),
            segments_loaded: false,
            dict_stream: None,
            postings_stream: None,
        }
    }

    pub fn store(&self) -> &Arc<GinIndexStore> {
        &self.store
    }

    /// Segment descriptors known to this deserializer, in on-disk order.
    pub fn segments(&self) -> &[GinIndexSegment] {
        &self.segments
    }

    /// Read all segment descriptors from the metadata file.
    ///
    /// A trailing partial record (flush interrupted mid-append) is ignored;
    /// descriptors out of segment-id order fail as corruption.
    pub fn read_segments(&mut self) -> Result<()> {
        let storage = self.store.storage();
        let file_name = segment_metadata_file_name(self.store.name());

        self.segments.clear();
        self.segments_loaded = true;

        if !storage.file_exists(&file_name) {
            return Ok(());
        }

        let count = storage.file_size(&file_name)? / GinIndexSegment::ENCODED_SIZE;
        let mut input = storage.open_input(&file_name)?;

        let mut previous_id = 0u32;
        for _ in 0..count {
            let segment = GinIndexSegment::read_from(&mut input)?;
            if segment.segment_id <= previous_id {
                return Err(GindexError::corrupt_segment(
                    segment.segment_id,
                    format!("descriptor out of order after segment {previous_id}"),
                ));
            }
            previous_id = segment.segment_id;
            self.segments.push(segment);
        }

        Ok(())
    }

    /// Load the dictionaries of all segments into the store's cache.
    pub fn read_segment_dictionaries(&mut self) -> Result<()> {
        self.ensure_segments()?;

        for segment in self.segments.clone() {
            if self.store.cached_dictionary(segment.segment_id).is_none() {
                self.load_dictionary(segment)?;
            }
        }

        Ok(())
    }

    /// Load (or fetch from cache) the dictionary of one segment.
    pub fn read_segment_dictionary(&mut self, segment_id: u32) -> Result<Arc<GinSegmentDictionary>> {
        self.ensure_segments()?;

        if let Some(dictionary) = self.store.cached_dictionary(segment_id) {
            return Ok(dictionary);
        }

        let segment = self
            .segments
            .iter()
            .find(|segment| segment.segment_id == segment_id)
            .copied()
            .ok_or_else(|| GindexError::index(format!("unknown segment id {segment_id}")))?;

        self.load_dictionary(segment)
    }

    /// Resolve `term` against every segment. Segments where the term is
    /// absent are omitted from the result.
    pub fn read_segmented_postings_lists(
        &mut self,
        term: &str,
    ) -> Result<GinSegmentedPostingsListContainer> {
        self.ensure_segments()?;

        let mut container = GinSegmentedPostingsListContainer::new();
        for segment in self.segments.clone() {
            let dictionary = match self.store.cached_dictionary(segment.segment_id) {
                Some(dictionary) => dictionary,
                None => self.load_dictionary(segment)?,
            };

            let Some(relative_offset) = dictionary.offsets.lookup(term) else {
                continue;
            };

            let postings = self.read_postings_list(&segment, relative_offset)?;
            container.insert(segment.segment_id, postings);
        }

        Ok(container)
    }

    /// Resolve every term of one tokenized query string, amortizing
    /// dictionary loads across all terms. This is the batched entry point
    /// used once per distinct query string.
    pub fn create_postings_cache_from_terms(&mut self, terms: &[String]) -> Result<GinPostingsCache> {
        let mut cache = GinPostingsCache::new();

        for term in terms {
            if cache.contains_key(term) {
                continue;
            }
            let container = self.read_segmented_postings_lists(term)?;
            cache.insert(term.clone(), container);
        }

        Ok(cache)
    }

    fn ensure_segments(&mut self) -> Result<()> {
        if !self.segments_loaded {
            self.read_segments()?;
        }
        Ok(())
    }

    fn load_dictionary(&mut self, segment: GinIndexSegment) -> Result<Arc<GinSegmentDictionary>> {
        if self.dict_stream.is_none() {
            let file_name = dictionary_file_name(self.store.name());
            self.dict_stream = Some(self.store.storage().open_input(&file_name)?);
        }
        let Some(stream) = self.dict_stream.as_mut() else {
            return Err(GindexError::index("dictionary stream unavailable"));
        };

        let file_size = stream.size()?;
        if segment.dict_start_offset >= file_size {
            return Err(GindexError::corrupt_segment(
                segment.segment_id,
                format!(
                    "dictionary offset {} beyond file size {file_size}",
                    segment.dict_start_offset
                ),
            ));
        }

        stream.seek(SeekFrom::Start(segment.dict_start_offset))?;
        let blob = read_dictionary_blob(stream, file_size - segment.dict_start_offset)
            .map_err(|e| GindexError::corrupt_segment(segment.segment_id, e.to_string()))?;
        let offsets = TermDictionary::new(blob)
            .map_err(|e| GindexError::corrupt_segment(segment.segment_id, e.to_string()))?;

        let dictionary = Arc::new(GinSegmentDictionary {
            postings_start_offset: segment.postings_start_offset,
            dict_start_offset: segment.dict_start_offset,
            offsets,
        });

        // First loader wins; others converge on the cached entry
        Ok(self.store.cache_dictionary(segment.segment_id, dictionary))
    }

    fn read_postings_list(
        &mut self,
        segment: &GinIndexSegment,
        relative_offset: u64,
    ) -> Result<GinIndexPostingsListPtr> {
        if self.postings_stream.is_none() {
            let file_name = postings_file_name(self.store.name());
            self.postings_stream = Some(self.store.storage().open_input(&file_name)?);
        }
        let Some(stream) = self.postings_stream.as_mut() else {
            return Err(GindexError::index("postings stream unavailable"));
        };

        let offset = segment.postings_start_offset + relative_offset;
        if offset >= stream.size()? {
            return Err(GindexError::corrupt_segment(
                segment.segment_id,
                format!("postings offset {offset} beyond file size"),
            ));
        }

        stream.seek(SeekFrom::Start(offset))?;
        GinIndexPostingsBuilder::deserialize(stream)
    }
}
