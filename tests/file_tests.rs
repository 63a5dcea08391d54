//! Integration tests for file operations: upload, list, download, delete.

mod common;

use std::io;
use std::path::Path;

use bucket_store::services::ServiceError;
use bytes::Bytes;
use chrono::Utc;
use common::{Harness, ROOT_ADMIN, one_chunk, zero_chunks};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

/// Names of `.upload-*` temp files left in a bucket directory.
async fn stray_upload_files(dir: &Path) -> Vec<String> {
    let mut strays = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(".upload-") {
            strays.push(name);
        }
    }
    strays
}

#[tokio::test]
async fn upload_then_list_then_download() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;

    let before = Utc::now();
    let file_id = h
        .files
        .upload_file(ROOT_ADMIN, &bucket_id, "notes.txt", one_chunk(b"hello world"))
        .await
        .unwrap();
    let after = Utc::now();
    assert!(Uuid::parse_str(&file_id).is_ok());

    let listed = h.files.list_files(ROOT_ADMIN, &bucket_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].file_id, file_id);
    assert_eq!(listed[0].file_name, "notes.txt");
    assert_eq!(listed[0].created_by, ROOT_ADMIN);
    let expected_mb = 11.0 / (1024.0 * 1024.0);
    assert!((listed[0].file_size - expected_mb).abs() < 1e-12);

    // The timestamp came back through a disk round trip; full precision
    // means it still falls inside the upload window.
    assert!(
        listed[0].created_at >= before && listed[0].created_at <= after,
        "created_at {} outside [{before}, {after}]",
        listed[0].created_at
    );

    let (record, mut payload) = h
        .files
        .get_file(ROOT_ADMIN, &bucket_id, &file_id)
        .await
        .unwrap();
    assert_eq!(record.file_name, "notes.txt");
    assert_eq!(record.created_at, listed[0].created_at);
    let mut bytes = Vec::new();
    payload.read_to_end(&mut bytes).await.unwrap();
    assert_eq!(bytes, b"hello world");
}

#[tokio::test]
async fn upload_requires_write_on_the_bucket() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;
    h.admin
        .set_permission(ROOT_ADMIN, &bucket_id, "alice@corp.example", "read")
        .await
        .unwrap();

    // Read lets alice list but not upload.
    h.files
        .list_files("alice@corp.example", &bucket_id)
        .await
        .unwrap();
    let err = h
        .files
        .upload_file(
            "alice@corp.example",
            &bucket_id,
            "notes.txt",
            one_chunk(b"x"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    assert_eq!(
        err.to_string(),
        "you do not have permission to upload a file to this bucket"
    );
}

#[tokio::test]
async fn listing_requires_read_on_the_bucket() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;

    let err = h
        .files
        .list_files("stranger@corp.example", &bucket_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn size_ceiling_is_inclusive() {
    let h = Harness::with_settings(
        1,
        std::time::Duration::from_secs(2),
        std::time::Duration::from_secs(30),
    )
    .await;
    let bucket_id = h.make_bucket("bounded").await;

    // Exactly 1 MiB passes.
    let file_id = h
        .files
        .upload_file(ROOT_ADMIN, &bucket_id, "fits.bin", zero_chunks(4, 256 * 1024))
        .await
        .unwrap();
    let listed = h.files.list_files(ROOT_ADMIN, &bucket_id).await.unwrap();
    assert_eq!(listed[0].file_id, file_id);
    assert!((listed[0].file_size - 1.0).abs() < f64::EPSILON);

    // One byte over is rejected and leaves nothing behind.
    let err = h
        .files
        .upload_file(
            ROOT_ADMIN,
            &bucket_id,
            "too-big.bin",
            zero_chunks(1, 1024 * 1024 + 1),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::SizeLimitExceeded { limit_mb: 1 }));
    assert_eq!(err.to_string(), "file is too large, the limit is 1 MB");

    let dir = h.store.layout().bucket_dir(&bucket_id);
    assert!(stray_upload_files(&dir).await.is_empty());
    let listed = h.files.list_files(ROOT_ADMIN, &bucket_id).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn failed_stream_cleans_up_the_partial_upload() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("flaky").await;

    let chunks: Vec<io::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"partial")),
        Err(io::Error::new(io::ErrorKind::Other, "connection reset")),
    ];
    let err = h
        .files
        .upload_file(
            ROOT_ADMIN,
            &bucket_id,
            "doomed.bin",
            futures::stream::iter(chunks),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Internal(_)));

    let dir = h.store.layout().bucket_dir(&bucket_id);
    assert!(stray_upload_files(&dir).await.is_empty());
    assert!(h.files.list_files(ROOT_ADMIN, &bucket_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_bucket_wins_over_missing_permission() {
    let h = Harness::new().await;
    let missing = Uuid::new_v4().to_string();

    // Even an unknown caller learns the bucket does not exist; the
    // permission check only applies to buckets that are really there.
    let err = h
        .files
        .list_files("stranger@corp.example", &missing)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("bucket")));

    let err = h
        .files
        .upload_file("stranger@corp.example", &missing, "x.txt", one_chunk(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("bucket")));

    let err = h
        .files
        .get_file("stranger@corp.example", &missing, "f-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("bucket")));

    let err = h
        .files
        .delete_file("stranger@corp.example", &missing, "f-1")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("bucket")));
}

#[tokio::test]
async fn unknown_file_is_not_found() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;
    let missing = Uuid::new_v4().to_string();

    let err = h
        .files
        .get_file(ROOT_ADMIN, &bucket_id, &missing)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("file")));
    assert_eq!(err.to_string(), "file does not exist");

    let err = h
        .files
        .delete_file(ROOT_ADMIN, &bucket_id, &missing)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("file")));
}

#[tokio::test]
async fn delete_removes_index_entry_and_payload() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;
    let file_id = h
        .files
        .upload_file(ROOT_ADMIN, &bucket_id, "notes.txt", one_chunk(b"bytes"))
        .await
        .unwrap();

    h.files
        .delete_file(ROOT_ADMIN, &bucket_id, &file_id)
        .await
        .unwrap();

    assert!(h.files.list_files(ROOT_ADMIN, &bucket_id).await.unwrap().is_empty());
    let payload = h.store.layout().file_path(&bucket_id, &file_id);
    assert!(!tokio::fs::try_exists(&payload).await.unwrap());

    // A second delete reports the file as gone.
    let err = h
        .files
        .delete_file(ROOT_ADMIN, &bucket_id, &file_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("file")));
}

#[tokio::test]
async fn indexed_file_with_missing_payload_reads_as_not_found() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;
    let file_id = h
        .files
        .upload_file(ROOT_ADMIN, &bucket_id, "notes.txt", one_chunk(b"bytes"))
        .await
        .unwrap();

    tokio::fs::remove_file(h.store.layout().file_path(&bucket_id, &file_id))
        .await
        .unwrap();

    let err = h
        .files
        .get_file(ROOT_ADMIN, &bucket_id, &file_id)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound("file")));
}

#[tokio::test]
async fn upload_requires_a_file_name() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;

    let err = h
        .files
        .upload_file(ROOT_ADMIN, &bucket_id, "  ", one_chunk(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(err.to_string(), "file name is required");
}

#[tokio::test]
async fn traversal_ids_are_rejected() {
    let h = Harness::new().await;
    let bucket_id = h.make_bucket("reports").await;

    let err = h
        .files
        .get_file(ROOT_ADMIN, &bucket_id, "../secrets")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let err = h
        .files
        .list_files(ROOT_ADMIN, "..")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}
