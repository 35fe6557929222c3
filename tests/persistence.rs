//! Atomic writer behavior under real concurrency.

use std::path::Path;
use serde::{Deserialize, Serialize};
use skill_substrate::{AtomicWriter, PersistenceOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PipelineState {
    version: u32,
    leads: Vec<String>,
}

fn state(version: u32) -> PipelineState {
    PipelineState {
        version,
        leads: (0..version).map(|i| format!("lead-{}", i)).collect(),
    }
}

fn read_state(path: &Path) -> PipelineState {
    let bytes = std::fs::read(path).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_leave_a_whole_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");
    let writer = AtomicWriter::default();

    let tasks: Vec<_> = (1..=64)
        .map(|v| {
            let writer = writer.clone();
            let path = path.clone();
            tokio::spawn(async move { writer.write(&path, &state(v)) })
        })
        .collect();
    for t in futures_util::future::join_all(tasks).await {
        t.unwrap();
    }
    writer.flush(&path).await.unwrap();

    let on_disk = read_state(&path);
    assert_eq!(on_disk, state(on_disk.version));
    assert!(writer.is_idle(&path));

    let temp_files = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(temp_files, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sequential_burst_ends_with_last_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("invoices.json");
    let writer = AtomicWriter::new(PersistenceOptions {
        sync_data: false,
        ..Default::default()
    });

    for v in 1..=200 {
        writer.write(&path, &state(v % 7 + 1));
    }
    writer.write(&path, &state(42));
    writer.flush(&path).await.unwrap();

    assert_eq!(read_state(&path), state(42));
}

#[tokio::test]
async fn test_paths_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.json");
    let b = dir.path().join("b.json");
    let writer = AtomicWriter::default();

    writer.write(&a, &state(1));
    writer.write(&b, &state(2));
    writer.write(&a, &state(3));

    writer.flush(&a).await.unwrap();
    writer.flush(&b).await.unwrap();
    assert_eq!(read_state(&a), state(3));
    assert_eq!(read_state(&b), state(2));
}

#[tokio::test]
async fn test_durable_write_reports_success() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("campaigns.json");
    let writer = AtomicWriter::default();

    writer.write_durable(&path, &state(5)).await.unwrap();
    assert_eq!(read_state(&path), state(5));

    writer.write_durable(&path, &state(6)).await.unwrap();
    assert_eq!(read_state(&path), state(6));
}
