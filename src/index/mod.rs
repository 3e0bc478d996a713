//! Generalized inverted index ("gin") core.
//!
//! The gin index maps terms extracted from column text to the row ids that
//! contain them. One store covers one data part and is made up of immutable
//! segments; the writer side builds segments out of in-memory postings, the
//! reader side resolves terms across all segments through lazily loaded FST
//! dictionaries.

pub mod cache;
pub mod deserializer;
pub mod dictionary;
pub mod factory;
pub mod postings;
pub mod segment;
pub mod store;

// Re-export commonly used types
pub use cache::{
    GinPostingsCache, GinPostingsCachePtr, GinSegmentedPostingsListContainer,
    PostingsCacheForStore,
};
pub use deserializer::GinIndexStoreDeserializer;
pub use dictionary::{FST_SIZE_COMPRESSION_THRESHOLD, GinSegmentDictionary, TermDictionary};
pub use factory::GinIndexStoreFactory;
pub use postings::{GinIndexPostingsBuilder, GinIndexPostingsList, GinIndexPostingsListPtr};
pub use segment::{Format, GinIndexSegment, is_gin_file};
pub use store::{
    GinIndexConfig, GinIndexStore, UNLIMITED_SEGMENT_DIGESTION_THRESHOLD_BYTES,
};
