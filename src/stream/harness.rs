// SPDX-License-Identifier: GPL-3.0-only
//! End-to-end scenarios against the platform's real notification backend.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tracing::info;

use crate::device::device_for_path;
use crate::event::{CreateFlags, Event, EventFlags};
use crate::stream::EventStream;
use crate::test_helpers::{EVENT_TIMEOUT, init_test_logging};

/// Watch `path` and hand back the first delivered event. The consumer stops
/// the stream from inside its own receive loop.
fn exercise_watch(path: &Path) -> oneshot::Receiver<Event> {
    init_test_logging();
    info!(path = %path.display(), "exercise_watch");

    let dev = device_for_path(path).unwrap();
    let stream = EventStream::new([path])
        .with_latency(Duration::from_millis(1))
        .with_device(dev)
        .with_flags(CreateFlags::FILE_EVENTS);
    let mut events = stream.start().unwrap();

    let (wait_tx, wait_rx) = oneshot::channel();
    tokio::spawn(async move {
        let mut wait_tx = Some(wait_tx);
        while let Some(batch) = events.recv().await {
            // Backends may split one write into several events; prefer the write itself.
            let first = batch.iter().find(|e| is_write(e)).cloned();
            if let Some(event) = first.or_else(|| batch.into_iter().next()) {
                info!(%event, "received");
                if let Some(tx) = wait_tx.take() {
                    let _ = tx.send(event);
                }
                stream.stop();
            }
        }
    });

    wait_rx
}

async fn wait_for(wait: oneshot::Receiver<Event>) -> Event {
    tokio::time::timeout(EVENT_TIMEOUT, wait)
        .await
        .expect("Timed out waiting for event")
        .expect("Stream closed before delivering an event")
}

fn is_write(event: &Event) -> bool {
    event
        .flags()
        .intersects(EventFlags::ITEM_CREATED | EventFlags::ITEM_MODIFIED)
}

#[tokio::test]
async fn test_events_watched_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("test_basic_example.txt");
    fs::write(&file, b"").unwrap();

    let wait = exercise_watch(&file);
    fs::write(&file, b"").unwrap();

    let event = wait_for(wait).await;
    assert!(event.path().starts_with(&file));
}

#[tokio::test]
async fn test_events_existing_dir() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    let wait = exercise_watch(path);
    fs::write(path.join("example.txt"), b"").unwrap();

    let event = wait_for(wait).await;
    assert!(event.path().starts_with(path));
    assert!(is_write(&event), "{event}");
}

#[cfg(unix)]
#[tokio::test]
async fn test_events_symlink_dir() {
    let temp_dir = TempDir::new().unwrap();
    let real = temp_dir.path().join("real");
    fs::create_dir(&real).unwrap();
    let path = temp_dir.path().join("temporary");
    std::os::unix::fs::symlink(&real, &path).unwrap();

    let wait = exercise_watch(&path);
    fs::write(path.join("example.txt"), b"").unwrap();

    let event = wait_for(wait).await;
    assert!(event.path().starts_with(&path), "{event}");
    assert!(is_write(&event), "{event}");
}

#[tokio::test]
async fn test_events_temp_dir() {
    let temp_dir = tempfile::Builder::new().prefix("fsexample").tempdir().unwrap();
    let path = temp_dir.path();

    let wait = exercise_watch(path);
    fs::write(path.join("example.txt"), b"").unwrap();

    let event = wait_for(wait).await;
    assert!(event.path().ends_with("example.txt"), "{event}");
    assert!(is_write(&event), "{event}");
}

#[tokio::test]
async fn test_rewrite_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("example.txt");
    fs::write(&file, b"").unwrap();

    let wait = exercise_watch(temp_dir.path());
    fs::write(&file, b"").unwrap();

    let event = wait_for(wait).await;
    assert!(event.path().ends_with("example.txt"), "{event}");
    assert!(is_write(&event), "{event}");
}

#[tokio::test]
async fn test_ids_non_decreasing_over_session() {
    init_test_logging();
    let temp_dir = TempDir::new().unwrap();
    let stream = EventStream::new([temp_dir.path()])
        .with_latency(Duration::from_millis(1))
        .with_flags(CreateFlags::FILE_EVENTS);
    let mut events = stream.start().unwrap();

    let files: Vec<PathBuf> = (0..5)
        .map(|i| temp_dir.path().join(format!("file-{i}.txt")))
        .collect();
    for file in &files {
        fs::write(file, b"data").unwrap();
    }

    let mut seen: Vec<Event> = Vec::new();
    let collect = async {
        while let Some(batch) = events.recv().await {
            seen.extend(batch);
            if files.iter().all(|f| seen.iter().any(|e| e.path() == f)) {
                break;
            }
        }
    };
    tokio::time::timeout(EVENT_TIMEOUT, collect)
        .await
        .expect("Timed out waiting for all files");
    stream.stop();

    assert!(
        seen.windows(2).all(|w| w[0].id() <= w[1].id()
            || w[1].flags().contains(EventFlags::EVENT_IDS_WRAPPED)),
        "{seen:?}"
    );
}

#[tokio::test]
async fn test_watch_root_reports_removal() {
    init_test_logging();
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().join("root");
    fs::create_dir(&root).unwrap();

    let stream = EventStream::new([&root])
        .with_latency(Duration::from_millis(1))
        .with_flags(CreateFlags::FILE_EVENTS | CreateFlags::WATCH_ROOT);
    let mut events = stream.start().unwrap();

    fs::remove_dir(&root).unwrap();

    let found = async {
        while let Some(batch) = events.recv().await {
            if batch
                .iter()
                .any(|e| e.flags().contains(EventFlags::ROOT_CHANGED) && e.path() == root)
            {
                return true;
            }
        }
        false
    };
    let found = tokio::time::timeout(EVENT_TIMEOUT, found)
        .await
        .expect("Timed out waiting for root change");
    stream.stop();
    assert!(found);
}

#[test]
fn test_missing_root_fails_subscription() {
    let temp_dir = TempDir::new().unwrap();
    let stream = EventStream::new([temp_dir.path().join("absent")]);

    assert!(matches!(
        stream.start(),
        Err(crate::error::WatchError::Subscription { .. })
    ));
    assert!(!stream.is_running());
}
