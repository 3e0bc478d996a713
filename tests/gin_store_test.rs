//! End-to-end gin index store scenarios over file storage.

use std::sync::Arc;

use tempfile::TempDir;

use gindex::analysis::{Tokenizer, UnicodeWordTokenizer};
use gindex::index::{
    GinIndexConfig, GinIndexStore, GinIndexStoreDeserializer, GinIndexStoreFactory,
    PostingsCacheForStore,
};
use gindex::storage::{FileStorage, Storage, StorageConfig};

fn file_storage(dir: &TempDir) -> Arc<dyn Storage> {
    Arc::new(FileStorage::new(dir.path(), StorageConfig::default()).unwrap())
}

/// Index one document per row: tokenize, accumulate postings, digest size,
/// and flush a segment whenever the store asks for it.
fn index_documents(store: &GinIndexStore, tokenizer: &dyn Tokenizer, documents: &[&str]) {
    for document in documents {
        let row_id = store.reserve_row_ids(1);
        for term in tokenizer.tokenize(document).unwrap() {
            store.add_row_id(&term, row_id).unwrap();
        }
        store
            .increment_current_size_by(document.len() as u64)
            .unwrap();

        if store.need_to_write_current_segment() {
            store.write_segment().unwrap();
        }
    }
}

#[test]
fn test_build_and_query_multi_segment_store() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);
    let tokenizer = UnicodeWordTokenizer::new();

    let documents = [
        "the quick brown fox",
        "jumps over the lazy dog",
        "a quick red fox",
        "the dog sleeps",
        "foxes are quick animals",
    ];

    {
        // A tiny digestion threshold forces a flush after every document
        let config = GinIndexConfig {
            segment_digestion_threshold_bytes: 8,
            ..Default::default()
        };
        let store =
            GinIndexStore::open_writable("body_idx", storage.clone(), config).unwrap();
        index_documents(&store, &tokenizer, &documents);
        store.finalize().unwrap();

        assert_eq!(store.num_segments().unwrap(), documents.len() as u32);
    }

    let store = Arc::new(GinIndexStore::open("body_idx", storage).unwrap());
    let mut deserializer = GinIndexStoreDeserializer::new(store.clone());

    // "fox" appears in rows 1 and 3, each flushed into its own segment
    let container = deserializer.read_segmented_postings_lists("fox").unwrap();
    let mut row_ids: Vec<u32> = container
        .values()
        .flat_map(|postings| postings.iter())
        .collect();
    row_ids.sort_unstable();
    assert_eq!(row_ids, vec![1, 3]);

    // "quick" appears in rows 1, 3 and 5
    let container = deserializer.read_segmented_postings_lists("quick").unwrap();
    let mut row_ids: Vec<u32> = container
        .values()
        .flat_map(|postings| postings.iter())
        .collect();
    row_ids.sort_unstable();
    assert_eq!(row_ids, vec![1, 3, 5]);

    // Tokenization is shared between write and query paths
    let query_terms = tokenizer.tokenize("Quick FOX").unwrap();
    let cache = deserializer
        .create_postings_cache_from_terms(&query_terms)
        .unwrap();
    assert_eq!(cache.len(), 2);
    assert!(!cache.get("quick").unwrap().is_empty());
    assert!(!cache.get("fox").unwrap().is_empty());
}

#[test]
fn test_single_segment_store_via_factory_and_cache() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);
    let tokenizer = UnicodeWordTokenizer::new();

    {
        let store = GinIndexStore::open_writable(
            "body_idx",
            storage.clone(),
            GinIndexConfig::default(),
        )
        .unwrap();
        index_documents(
            &store,
            &tokenizer,
            &["hello world", "hello gin index", "world of segments"],
        );
        store.finalize().unwrap();

        // Default threshold is large: everything lands in one segment
        assert_eq!(store.num_segments().unwrap(), 1);
    }

    let factory = GinIndexStoreFactory::new();
    let store = factory.get("body_idx", storage.clone()).unwrap().unwrap();

    let mut cache = PostingsCacheForStore::new(store.clone());
    let terms = tokenizer.tokenize("hello world").unwrap();
    let postings = cache.get_or_load("hello world", &terms).unwrap();

    let hello = postings.get("hello").unwrap().get(&1).unwrap();
    assert!(hello.contains(1));
    assert!(hello.contains(2));
    assert!(!hello.contains(3));

    let world = postings.get("world").unwrap().get(&1).unwrap();
    assert!(world.contains(1));
    assert!(world.contains(3));

    // The cache answers repeated range checks without further I/O
    assert!(cache.get_postings("hello world").is_some());
    assert!(cache.get_postings("other query").is_none());

    // The factory keeps handing out the same shared store
    let again = factory.get("body_idx", storage).unwrap().unwrap();
    assert!(Arc::ptr_eq(&store, &again));
}

#[test]
fn test_incremental_build_across_sessions() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);
    let tokenizer = UnicodeWordTokenizer::new();

    {
        let store = GinIndexStore::open_writable(
            "body_idx",
            storage.clone(),
            GinIndexConfig::default(),
        )
        .unwrap();
        index_documents(&store, &tokenizer, &["first session text"]);
        store.finalize().unwrap();
    }
    {
        let store = GinIndexStore::open_writable(
            "body_idx",
            storage.clone(),
            GinIndexConfig::default(),
        )
        .unwrap();
        index_documents(&store, &tokenizer, &["second session text"]);
        store.finalize().unwrap();
    }

    let store = Arc::new(GinIndexStore::open("body_idx", storage).unwrap());
    assert_eq!(store.num_segments().unwrap(), 2);

    let mut deserializer = GinIndexStoreDeserializer::new(store);

    // Row ids never restart across sessions
    let container = deserializer.read_segmented_postings_lists("text").unwrap();
    let mut row_ids: Vec<u32> = container
        .values()
        .flat_map(|postings| postings.iter())
        .collect();
    row_ids.sort_unstable();
    assert_eq!(row_ids, vec![1, 2]);

    let container = deserializer
        .read_segmented_postings_lists("second")
        .unwrap();
    let row_ids: Vec<u32> = container
        .values()
        .flat_map(|postings| postings.iter())
        .collect();
    assert_eq!(row_ids, vec![2]);
}

#[test]
fn test_cancelled_build_leaves_no_segment() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);

    {
        let store = GinIndexStore::open_writable(
            "body_idx",
            storage.clone(),
            GinIndexConfig::default(),
        )
        .unwrap();
        store.add_row_id("doomed", 1).unwrap();
        store.cancel();
    }

    let store = GinIndexStore::open("body_idx", storage).unwrap();
    assert_eq!(store.num_segments().unwrap(), 0);
}

#[test]
fn test_dropped_build_without_finalize_leaves_no_segment() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);

    {
        let store = GinIndexStore::open_writable(
            "body_idx",
            storage.clone(),
            GinIndexConfig::default(),
        )
        .unwrap();
        store.add_row_id("doomed", 1).unwrap();
        // dropped without finalize
    }

    let store = GinIndexStore::open("body_idx", storage).unwrap();
    assert_eq!(store.num_segments().unwrap(), 0);
}
