//! Relay pushing over real HTTP into a served hub

mod common;

use common::{Recorder, frames, init_tracing};
use paddock::producer::{IngestClient, ReplaySource};
use paddock::{HubConfig, HubService, MemoryStore, RelayConfig, RelayConnection, server};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[tokio::test]
async fn relay_batches_reach_subscribers_and_store() {
    init_tracing();

    let store = Arc::new(MemoryStore::new());
    let hub_config = HubConfig { flush_threshold: 10, ..HubConfig::default() };
    let hub = HubService::start(&hub_config, Arc::clone(&store));

    let recorder = Recorder::default();
    hub.handle().register(Box::new(recorder.clone())).await.expect("hub running");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, hub.state(), async move {
        let _ = stop_rx.await;
    }));

    // Every sample is read twice, as when sampling outpaces the simulator
    let samples: Vec<_> = frames(0, 25).into_iter().flat_map(|f| [f, f]).collect();
    let relay_config = RelayConfig {
        hub_url: format!("http://{addr}"),
        session_id: "e2e".into(),
        lap: Some(2),
        batch_size: 5,
        sample_interval_ms: 1,
        ..RelayConfig::default()
    };
    let relay = RelayConnection::with_parts(
        ReplaySource::from_frames(samples, false),
        IngestClient::new(&relay_config).expect("client builds"),
        &relay_config,
    );

    let relay_stats = relay.finished().await;
    assert_eq!(relay_stats.samples, 50);
    assert_eq!(relay_stats.frames, 25);
    assert_eq!(relay_stats.batches_sent, 5);
    assert_eq!(relay_stats.batches_failed, 0);

    let _ = stop_tx.send(());
    server.await.expect("server task panicked").expect("server ran");
    let report = hub.shutdown().await;
    assert_eq!(report.hub.payloads, 5);

    // Live delivery keeps the relay's lap tag
    let received = recorder.payloads();
    assert_eq!(received.len(), 5);
    assert!(received.iter().all(|p| p.session_id == "e2e" && p.lap == Some(2)));
    // Pushes run concurrently, so batches may land in any order
    let mut delivered: Vec<_> =
        received.iter().flat_map(|p| p.frames.iter().map(|f| f.packet_id)).collect();
    delivered.sort_unstable();
    assert_eq!(delivered, (0..25).collect::<Vec<_>>());

    // Persistence sees threshold batches plus the shutdown drain
    let persisted: Vec<_> = store.batches().iter().map(|b| b.len()).collect();
    assert_eq!(persisted, vec![10, 10, 5]);
    assert_eq!(report.worker.persisted, 3);
}

#[tokio::test]
async fn health_over_tcp() {
    init_tracing();
    let hub = HubService::start(&HubConfig::default(), MemoryStore::new());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, hub.state(), async move {
        let _ = stop_rx.await;
    }));

    let body = reqwest::get(format!("http://{addr}/health"))
        .await
        .expect("request succeeds")
        .text()
        .await
        .expect("body");
    assert_eq!(body, "OK");

    let _ = stop_tx.send(());
    server.await.expect("server task panicked").expect("server ran");
    hub.shutdown().await;
}
