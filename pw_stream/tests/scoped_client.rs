//! ABOUTME: Integration tests for the per-consumer stream client
//! ABOUTME: Covers auto-connect, guarded sends and teardown with a pending reconnect

mod common;

use common::{config, settle, NotifyCounter, ScriptedConnector, RECONNECT_DELAY};
use pw_stream::{ConnectionStatus, ScopedClientOptions, ScopedStreamClient};
use std::time::Duration;
use test_support::{iostat_frame, OTHER_POOL, TEST_POOL};
use tokio::time::sleep;

fn manual() -> ScopedClientOptions {
    ScopedClientOptions {
        auto_connect: false,
    }
}

#[tokio::test(start_paused = true)]
async fn test_auto_connect_opens_immediately() {
    let connector = ScriptedConnector::new();
    let client = ScopedStreamClient::new(
        config(),
        connector.clone(),
        TEST_POOL,
        ScopedClientOptions::default(),
    );
    settle().await;

    assert_eq!(connector.opened(), 1);
    assert_eq!(client.key(), TEST_POOL);
    assert_eq!(client.state().status, ConnectionStatus::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_manual_client_waits_for_connect() {
    let connector = ScriptedConnector::new();
    let client = ScopedStreamClient::new(config(), connector.clone(), TEST_POOL, manual());
    settle().await;

    assert_eq!(connector.opened(), 0);
    assert_eq!(client.state().status, ConnectionStatus::Idle);

    client.connect();
    settle().await;
    assert_eq!(connector.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_send_only_while_open() {
    let connector = ScriptedConnector::new();
    let client = ScopedStreamClient::new(
        config(),
        connector.clone(),
        TEST_POOL,
        ScopedClientOptions::default(),
    );
    settle().await;

    client.send("early");
    settle().await;
    assert_eq!(connector.next_outbound(0), None);

    connector.sink(0).opened();
    settle().await;
    client.send(r#"{"snapshot":"tank@daily"}"#);
    settle().await;
    assert_eq!(
        connector.next_outbound(0).as_deref(),
        Some(r#"{"snapshot":"tank@daily"}"#)
    );

    // not queued for delivery after a reconnect
    connector.sink(0).closed();
    settle().await;
    client.send("while closed");
    sleep(RECONNECT_DELAY + Duration::from_millis(10)).await;
    connector.sink(1).opened();
    settle().await;
    assert_eq!(connector.next_outbound(1), None);
}

#[tokio::test(start_paused = true)]
async fn test_receives_and_notifies() {
    let connector = ScriptedConnector::new();
    let client = ScopedStreamClient::new(
        config(),
        connector.clone(),
        TEST_POOL,
        ScopedClientOptions::default(),
    );
    let notified = NotifyCounter::default();
    client.subscribe(notified.callback());
    settle().await;

    connector.sink(0).opened();
    connector.sink(0).message(iostat_frame(4, 0, 0, 0));
    connector.sink(0).message("{not json");
    settle().await;

    assert_eq!(client.samples().len(), 1);
    assert_eq!(client.latest().map(|s| s.read_iops), Some(4.0));
    assert_eq!(client.metrics().frames_dropped.get(), 1);
    // connect, open, one sample
    assert_eq!(notified.get(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_clients_do_not_share_state() {
    let connector = ScriptedConnector::new();
    let first = ScopedStreamClient::new(
        config(),
        connector.clone(),
        TEST_POOL,
        ScopedClientOptions::default(),
    );
    let second = ScopedStreamClient::new(
        config(),
        connector.clone(),
        OTHER_POOL,
        ScopedClientOptions::default(),
    );
    settle().await;
    assert_eq!(connector.opened(), 2);
    assert_eq!(connector.live(), 2);

    connector.sink(0).opened();
    connector.sink(0).message(iostat_frame(1, 0, 0, 0));
    settle().await;

    assert_eq!(first.samples().len(), 1);
    assert!(second.samples().is_empty());
    assert_eq!(second.state().status, ConnectionStatus::Connecting);
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_pending_reconnect() {
    let connector = ScriptedConnector::new();
    let client = ScopedStreamClient::new(
        config(),
        connector.clone(),
        TEST_POOL,
        ScopedClientOptions::default(),
    );
    settle().await;
    connector.sink(0).opened();
    connector.sink(0).closed();
    settle().await;
    assert_eq!(client.state().status, ConnectionStatus::Closed);

    drop(client);
    sleep(RECONNECT_DELAY * 3).await;

    assert_eq!(connector.opened(), 1);
    assert_eq!(connector.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_drop_releases_open_transport() {
    let connector = ScriptedConnector::new();
    let client = ScopedStreamClient::new(
        config(),
        connector.clone(),
        TEST_POOL,
        ScopedClientOptions::default(),
    );
    settle().await;
    connector.sink(0).opened();
    settle().await;

    drop(client);
    settle().await;
    assert!(connector.released(0));
}

#[tokio::test(start_paused = true)]
async fn test_close_waits_for_driver() {
    let connector = ScriptedConnector::new();
    let client = ScopedStreamClient::new(
        config(),
        connector.clone(),
        TEST_POOL,
        ScopedClientOptions::default(),
    );
    settle().await;

    let metrics = client.metrics().clone();
    client.close().await;
    assert!(connector.released(0));
    assert_eq!(metrics.connections_opened.get(), 1);
}
