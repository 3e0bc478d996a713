//! Recovery behavior around interrupted segment flushes.
//!
//! A segment only becomes visible once its descriptor is appended to the
//! metadata file. These tests simulate a flush that died after writing
//! dictionary/postings bytes but before the descriptor append, and verify
//! that the orphaned tail is invisible, harmless, and survivable.

use std::io::Write;
use std::sync::Arc;

use tempfile::TempDir;

use gindex::error::GindexError;
use gindex::index::{GinIndexConfig, GinIndexStore, GinIndexStoreDeserializer};
use gindex::storage::{FileStorage, Storage, StorageConfig};

fn file_storage(dir: &TempDir) -> Arc<dyn Storage> {
    Arc::new(FileStorage::new(dir.path(), StorageConfig::default()).unwrap())
}

fn build_one_segment(storage: &Arc<dyn Storage>) {
    let store =
        GinIndexStore::open_writable("idx", storage.clone(), GinIndexConfig::default()).unwrap();
    let row_id = store.reserve_row_ids(1);
    store.add_row_id("fox", row_id).unwrap();
    store.finalize().unwrap();
}

/// Append garbage to the dictionary and postings files, as left behind by a
/// flush that crashed before its descriptor append.
fn append_orphaned_tail(storage: &Arc<dyn Storage>) {
    for file_name in ["idx.gin_dict", "idx.gin_post"] {
        let mut output = storage.create_output_append(file_name).unwrap();
        output.write_all(b"\xde\xad\xbe\xef orphaned tail bytes").unwrap();
        output.close().unwrap();
    }
}

#[test]
fn test_orphaned_tail_is_invisible() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);

    build_one_segment(&storage);
    append_orphaned_tail(&storage);

    let store = Arc::new(GinIndexStore::open("idx", storage).unwrap());
    assert_eq!(store.num_segments().unwrap(), 1);

    let mut deserializer = GinIndexStoreDeserializer::new(store);
    let container = deserializer.read_segmented_postings_lists("fox").unwrap();
    assert_eq!(container.len(), 1);
    assert!(container.get(&1).unwrap().contains(1));
}

#[test]
fn test_writes_continue_past_orphaned_tail() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);

    build_one_segment(&storage);
    append_orphaned_tail(&storage);

    // Resume writing: the new segment's offsets start past the tail, so the
    // tail bytes stay unreferenced between the two segments
    {
        let store =
            GinIndexStore::open_writable("idx", storage.clone(), GinIndexConfig::default())
                .unwrap();
        let row_id = store.reserve_row_ids(1);
        store.add_row_id("dog", row_id).unwrap();
        store.finalize().unwrap();
    }

    let store = Arc::new(GinIndexStore::open("idx", storage).unwrap());
    assert_eq!(store.num_segments().unwrap(), 2);

    let mut deserializer = GinIndexStoreDeserializer::new(store);

    let container = deserializer.read_segmented_postings_lists("fox").unwrap();
    assert_eq!(container.len(), 1);
    assert!(container.get(&1).unwrap().contains(1));

    let container = deserializer.read_segmented_postings_lists("dog").unwrap();
    assert_eq!(container.len(), 1);
    assert!(container.get(&2).unwrap().contains(2));
}

#[test]
fn test_partial_descriptor_record_is_ignored() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);

    build_one_segment(&storage);

    // A descriptor append that died mid-record leaves a short tail
    {
        let mut output = storage.create_output_append("idx.gin_seg").unwrap();
        output.write_all(&[0u8; 10]).unwrap();
        output.close().unwrap();
    }

    let store = Arc::new(GinIndexStore::open("idx", storage).unwrap());
    assert_eq!(store.num_segments().unwrap(), 1);

    let mut deserializer = GinIndexStoreDeserializer::new(store);
    deserializer.read_segments().unwrap();
    assert_eq!(deserializer.segments().len(), 1);
}

#[test]
fn test_unknown_format_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);

    build_one_segment(&storage);

    // Rewrite the segment id file with a bogus version byte
    {
        let mut output = storage.create_output("idx.gin_sid").unwrap();
        output.write_all(&[9u8, 2, 0, 0, 0]).unwrap();
        output.close().unwrap();
    }

    let err = GinIndexStore::open("idx", storage).unwrap_err();
    assert!(matches!(err, GindexError::FormatVersionMismatch(9)));
}

#[test]
fn test_corrupt_dictionary_is_scoped_to_its_segment() {
    let dir = TempDir::new().unwrap();
    let storage = file_storage(&dir);

    build_one_segment(&storage);

    // Overwrite the dictionary file with garbage shorter than the recorded
    // blob, so the segment's dictionary fails structural validation
    {
        let mut output = storage.create_output("idx.gin_dict").unwrap();
        output.write_all(&[0xFFu8; 4]).unwrap();
        output.close().unwrap();
    }

    let store = Arc::new(GinIndexStore::open("idx", storage).unwrap());
    let mut deserializer = GinIndexStoreDeserializer::new(store.clone());

    let err = deserializer.read_segmented_postings_lists("fox").unwrap_err();
    assert!(matches!(
        err,
        GindexError::CorruptSegment { segment_id: 1, .. }
    ));

    // The store object itself stays usable
    assert_eq!(store.num_segments().unwrap(), 1);
}
