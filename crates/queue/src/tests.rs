// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use civault_core::ids::{FqMsgId, FqMsgIdGen};
use serde_json::json;
use std::collections::HashMap;

fn msg(gen: &FqMsgIdGen, at_secs: i64, topic: &str) -> FileQueueMessage {
    FileQueueMessage {
        fq_msg_id: gen.next_at(at_secs),
        broker_msg_id: format!("broker-{topic}"),
        broker_topic: topic.to_string(),
        body: json!({"topic": topic}),
        broker_extra: HashMap::new(),
        provider_name: "test-provider".to_string(),
        provider_timestamp: at_secs,
    }
}

fn fast_config() -> FileQueueConfig {
    FileQueueConfig { poll_interval: Duration::from_millis(20), optimize_list: true }
}

#[tokio::test]
async fn push_then_pop_round_trips_the_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let queue = FileQueue::open(dir.path(), fast_config()).await.unwrap();
    let gen = FqMsgIdGen::new();

    let sent = msg(&gen, 1000, "org.centos.prod.buildsys.tag");
    queue.push(&sent).await.unwrap();

    let handle = queue.tpop().await.unwrap().expect("envelope available");
    assert_eq!(handle.message().broker_topic, sent.broker_topic);
    handle.commit().await.unwrap();

    assert_eq!(queue.length().await.unwrap(), 0);
}

#[tokio::test]
async fn pop_is_fifo_across_multiple_pushes() {
    let dir = tempfile::tempdir().unwrap();
    let queue = FileQueue::open(dir.path(), fast_config()).await.unwrap();
    let gen = FqMsgIdGen::new();

    for i in 0..5 {
        queue.push(&msg(&gen, 1000, &format!("topic.{i}"))).await.unwrap();
    }

    for i in 0..5 {
        let handle = queue.tpop().await.unwrap().expect("envelope available");
        assert_eq!(handle.message().broker_topic, format!("topic.{i}"));
        handle.commit().await.unwrap();
    }
}

#[tokio::test]
async fn rollback_redelivers_at_the_head() {
    let dir = tempfile::tempdir().unwrap();
    let queue = FileQueue::open(dir.path(), fast_config()).await.unwrap();
    let gen = FqMsgIdGen::new();

    queue.push(&msg(&gen, 1000, "topic.a")).await.unwrap();
    queue.push(&msg(&gen, 1001, "topic.b")).await.unwrap();

    let first = queue.tpop().await.unwrap().expect("envelope available");
    assert_eq!(first.message().broker_topic, "topic.a");
    first.rollback().await.unwrap();

    let redelivered = queue.tpop().await.unwrap().expect("envelope available");
    assert_eq!(redelivered.message().broker_topic, "topic.a");
    redelivered.commit().await.unwrap();

    let second = queue.tpop().await.unwrap().expect("envelope available");
    assert_eq!(second.message().broker_topic, "topic.b");
    second.commit().await.unwrap();
}

#[tokio::test]
async fn committed_envelope_is_not_redelivered_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let gen = FqMsgIdGen::new();
    {
        let queue = FileQueue::open(dir.path(), fast_config()).await.unwrap();
        queue.push(&msg(&gen, 1000, "topic.a")).await.unwrap();
        let handle = queue.tpop().await.unwrap().unwrap();
        handle.commit().await.unwrap();
    }

    let reopened = FileQueue::open(dir.path(), fast_config()).await.unwrap();
    assert_eq!(reopened.length().await.unwrap(), 0);
}

#[tokio::test]
async fn stranded_in_flight_envelope_is_recovered_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let gen = FqMsgIdGen::new();
    {
        let queue = FileQueue::open(dir.path(), fast_config()).await.unwrap();
        queue.push(&msg(&gen, 1000, "topic.a")).await.unwrap();
        // Claim without ever resolving -- simulates a crash mid-transaction.
        let handle = queue.tpop().await.unwrap().unwrap();
        std::mem::forget(handle);
    }

    let reopened = FileQueue::open(dir.path(), fast_config()).await.unwrap();
    assert_eq!(reopened.length().await.unwrap(), 1);
    let handle = reopened.tpop().await.unwrap().expect("recovered envelope available");
    assert_eq!(handle.message().broker_topic, "topic.a");
    handle.commit().await.unwrap();
}

#[tokio::test]
async fn stop_unblocks_a_waiting_pop_with_none() {
    let dir = tempfile::tempdir().unwrap();
    let queue = FileQueue::open(dir.path(), fast_config()).await.unwrap();

    let waiter = queue.clone();
    let pop_task = tokio::spawn(async move { waiter.tpop().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.stop();

    let result = tokio::time::timeout(Duration::from_secs(2), pop_task).await.unwrap().unwrap();
    assert!(result.unwrap().is_none());
}

#[tokio::test]
async fn pop_without_optimize_list_still_sees_externally_written_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = FileQueueConfig { poll_interval: Duration::from_millis(20), optimize_list: false };
    let queue = FileQueue::open(dir.path(), config).await.unwrap();
    let gen = FqMsgIdGen::new();

    let sent = msg(&gen, 1000, "topic.a");
    queue.push(&sent).await.unwrap();

    let handle = queue.tpop().await.unwrap().expect("envelope available");
    assert_eq!(handle.message().broker_topic, "topic.a");
    handle.commit().await.unwrap();
}

#[test]
fn fq_msg_id_sorts_before_rollback_prefixed_names() {
    let id = FqMsgId::from_string(format!("{:020}-{:06}", 1_753_700_000i64, 0));
    let rollback_name = format!("0-rollback-{:020}-{id}.json", -1i64);
    let ordinary_name = format!("{id}.json");
    assert!(rollback_name < ordinary_name);
}
