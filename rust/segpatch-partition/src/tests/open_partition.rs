use segpatch_common::error::ErrorKind;

use crate::{
    DocScope, PatchCompression, PatchFileReader, Version,
    tests::partition_store::{PartitionStore, i32_value},
};

#[test]
fn test_open_partition_with_patches() {
    for compression in [PatchCompression::None, PatchCompression::Zstd] {
        let mut store = PartitionStore::new().with_compression(compression);
        store.add_segment(0, 100, 0);
        store.add_segment(1, 20, 0);
        store.add_segment(2, 20, 0);
        store
            .add_patch(1, DocScope::Main, "price", 0, &[(10, i32_value(42))])
            .unwrap();
        store
            .add_patch(
                2,
                DocScope::Main,
                "price",
                0,
                &[(10, i32_value(43)), (20, i32_value(7))],
            )
            .unwrap();
        store
            .add_patch(2, DocScope::Main, "price", 1, &[(3, i32_value(1))])
            .unwrap();
        store.commit_version(&Version::new(3, vec![0, 1, 2])).unwrap();

        let partition = store.open().unwrap();
        assert_eq!(partition.version().version_id, 3);
        assert_eq!(partition.segment(2).unwrap().patch_files().len(), 2);

        let groups = partition.find_patch_files("price", DocScope::Main);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].dest.base_doc_id(DocScope::Main), 100);

        let dest_doc_count = groups[0].dest.doc_count(DocScope::Main);
        let mut reader =
            PatchFileReader::open(&groups[0].files[1], Some(4), dest_doc_count).unwrap();
        assert_eq!(reader.next_record().unwrap(), (10, &43i32.to_le_bytes()[..]));
        assert_eq!(reader.next_record().unwrap(), (20, &7i32.to_le_bytes()[..]));
    }
}

#[test]
fn test_missing_patch_file_fails_open() {
    let mut store = PartitionStore::new();
    store.add_segment(0, 10, 0);
    store.add_segment(1, 10, 0);
    store
        .add_dangling_patch_meta(1, DocScope::Main, "price", 0)
        .unwrap();
    store.commit_version(&Version::new(1, vec![0, 1])).unwrap();

    let err = store.open().unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MissingPatchFile { .. }));
}

#[test]
fn test_missing_version_fails_open() {
    let store = PartitionStore::new();
    assert!(matches!(store.open().unwrap_err().kind(), ErrorKind::Io { .. }));
}
