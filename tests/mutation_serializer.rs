//! Change-sets submitted to the serializer run one at a time, in submission order.

mod common;

use common::*;
use dnsmasq_webhook::error::Error;
use dnsmasq_webhook::{ChangeApplier, Changes, MutationSerializer, Record};
use std::fs;
use std::time::Duration;

fn create(records: Vec<Record>) -> Changes {
    Changes {
        create: records,
        ..Changes::default()
    }
}

#[tokio::test]
async fn second_batch_waits_for_first_reload() {
    let (dir, store) = directory_store();
    let (reloader, mut entered) = RecordingReloader::gated(dir.path());
    let serializer = MutationSerializer::spawn(ChangeApplier::new(store, reloader.clone()));

    let first = serializer
        .submit(create(vec![a("first.example.com", &["10.0.0.1"])]))
        .unwrap();
    let second = serializer
        .submit(create(vec![a("second.example.com", &["10.0.0.2"])]))
        .unwrap();

    assert_eq!(entered.recv().await, Some(0));
    assert_eq!(serializer.pending(), 2);

    // The first batch is stuck in its reload; the second must not have started.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(file_names(dir.path()), vec!["first.example.com"]);

    reloader.release(1);
    first.await.unwrap();
    assert_eq!(entered.recv().await, Some(1));
    reloader.release(1);
    second.await.unwrap();

    assert_eq!(reloader.calls(), 2);
    assert_eq!(
        reloader.snapshots(),
        vec![
            vec!["first.example.com"],
            vec!["first.example.com", "second.example.com"],
        ]
    );
    assert_eq!(serializer.pending(), 0);
}

#[tokio::test]
async fn batches_apply_in_submission_order() {
    let (dir, store) = directory_store();
    let recording = RecordingStore::new(store);
    let reloader = RecordingReloader::new(dir.path());
    let serializer =
        MutationSerializer::spawn(ChangeApplier::new(recording.clone(), reloader.clone()));

    let pending: Vec<_> = (1..=20)
        .map(|i| {
            let ip = format!("10.0.0.{i}");
            serializer
                .submit(create(vec![a("app.example.com", &[ip.as_str()])]))
                .unwrap()
        })
        .collect();
    for p in pending {
        p.await.unwrap();
    }

    assert_eq!(reloader.calls(), 20);
    assert_eq!(recording.log().len(), 20);
    assert_eq!(
        fs::read_to_string(dir.path().join("app.example.com")).unwrap(),
        "address=/app.example.com/10.0.0.20\n"
    );
}

#[tokio::test]
async fn failed_batch_does_not_block_the_queue() {
    let (dir, store) = directory_store();
    let recording = RecordingStore::failing_on(store, "bad.example.com");
    let reloader = RecordingReloader::new(dir.path());
    let serializer = MutationSerializer::spawn(ChangeApplier::new(recording, reloader.clone()));

    let failing = serializer
        .submit(create(vec![a("bad.example.com", &["10.0.0.1"])]))
        .unwrap();
    let next = serializer
        .submit(create(vec![a("good.example.com", &["10.0.0.2"])]))
        .unwrap();

    assert!(matches!(failing.await, Err(Error::Apply { .. })));
    next.await.unwrap();
    assert_eq!(file_names(dir.path()), vec!["good.example.com"]);
    assert_eq!(reloader.calls(), 1);
}

#[tokio::test]
async fn abandoned_batch_is_still_applied() {
    let (dir, store) = directory_store();
    let reloader = RecordingReloader::new(dir.path());
    let serializer = MutationSerializer::spawn(ChangeApplier::new(store, reloader.clone()));

    drop(
        serializer
            .submit(create(vec![a("abandoned.example.com", &["10.0.0.1"])]))
            .unwrap(),
    );
    serializer
        .apply(create(vec![a("awaited.example.com", &["10.0.0.2"])]))
        .await
        .unwrap();

    assert_eq!(
        file_names(dir.path()),
        vec!["abandoned.example.com", "awaited.example.com"]
    );
    assert_eq!(reloader.calls(), 2);
}

#[tokio::test]
async fn concurrent_submitters_share_one_queue() {
    let (dir, store) = directory_store();
    let reloader = RecordingReloader::new(dir.path());
    let serializer = MutationSerializer::spawn(ChangeApplier::new(store, reloader.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let serializer = serializer.clone();
            tokio::spawn(async move {
                let name = format!("host{i}.example.com");
                serializer
                    .apply(create(vec![a(&name, &["10.0.0.1"])]))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(reloader.calls(), 8);
    assert_eq!(file_names(dir.path()).len(), 8);
    // Each reload saw exactly one more file than the one before it.
    let sizes: Vec<usize> = reloader.snapshots().iter().map(Vec::len).collect();
    assert_eq!(sizes, (1..=8).collect::<Vec<_>>());
}
