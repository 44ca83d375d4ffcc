//! Transport client scenarios against a scripted mock peer.
//!
//! Timings are shortened so reconnect and liveness paths run in well under
//! a few seconds.

use crossbeam_channel::{Receiver, unbounded};
use serde_json::json;
use setu_link::client::{
    AckAction, ClientEvent, ClientOptions, ConnectionState, TransportClient, TransportEvent,
};
use setu_link::config::TimingConfig;
use setu_link::link::mock::{MockConnector, MockLink};
use setu_link::messages::{LogChunk, LogRequest, LogRequestType, ModeType, Outbound, TransportKind};
use setu_link::upload;
use std::io::Write;
use std::time::{Duration, Instant};

fn fast_timing() -> TimingConfig {
    TimingConfig {
        connect_interval_ms: 50,
        connect_timeout_ms: 100,
        heartbeat_interval_ms: 50,
        liveness_timeout_ms: 200,
        send_timeout_ms: 100,
        chunk_timeout_ms: 500,
        chunk_grace_ms: 1000,
        chunk_size: 4,
    }
}

fn client(connector: &MockConnector) -> (TransportClient, Receiver<TransportEvent>) {
    client_with(connector, fast_timing())
}

fn client_with(
    connector: &MockConnector,
    timing: TimingConfig,
) -> (TransportClient, Receiver<TransportEvent>) {
    let (tx, rx) = unbounded();
    let options = ClientOptions {
        kind: TransportKind::Tcp,
        device_id: "test-phone".to_string(),
        mode: ModeType::Normal,
        addresses: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
        timing,
    };
    (TransportClient::new(options, Box::new(connector.clone()), tx), rx)
}

/// Connection notifications seen within `window`, stopping early once
/// `until` has been seen
fn connections(rx: &Receiver<TransportEvent>, window: Duration, until: &[bool]) -> Vec<bool> {
    let deadline = Instant::now() + window;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        let Ok(event) = rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) else {
            break;
        };
        if let ClientEvent::Connection(connected) = event.event {
            seen.push(connected);
            if seen.ends_with(until) && !until.is_empty() {
                break;
            }
        }
    }
    seen
}

#[test]
fn test_reconnect_after_link_failure() {
    let connector = MockConnector::new();
    let first = MockLink::new();
    let second = MockLink::new();
    connector.push_link(first.clone());
    connector.push_link(second.clone());

    let (client, rx) = client(&connector);
    client.start().unwrap();
    assert_eq!(connections(&rx, Duration::from_secs(2), &[true]), vec![true]);
    assert_eq!(client.state(), ConnectionState::Connected);

    first.break_link();
    assert_eq!(
        connections(&rx, Duration::from_secs(3), &[false, true]),
        vec![false, true]
    );
    assert_eq!(client.state(), ConnectionState::Connected);
    assert!(first.is_closed());

    // Exactly one notification per transition
    assert!(connections(&rx, Duration::from_millis(300), &[]).is_empty());

    // Second connection went to the secondary address
    assert_eq!(connector.attempts(), vec!["10.0.0.1", "10.0.0.2"]);

    // Handshake and heartbeats on the new link
    std::thread::sleep(Duration::from_millis(150));
    assert!(!second.sent_of("req_name").is_empty());
    let heartbeat = second.sent_of("heartbeat");
    assert!(!heartbeat.is_empty());
    assert_eq!(heartbeat[0].data["device_id"], "test-phone");

    client.shutdown();
    assert!(second.is_closed());
}

#[test]
fn test_silent_peer_expires() {
    let connector = MockConnector::new();
    connector.push_link(MockLink::silent());

    let (client, rx) = client(&connector);
    client.start().unwrap();
    assert_eq!(
        connections(&rx, Duration::from_secs(3), &[true, false]),
        vec![true, false]
    );
    // Later attempts are refused without repeating the notification
    assert!(connections(&rx, Duration::from_millis(300), &[]).is_empty());
    assert!(connector.attempts().len() >= 2);
    client.shutdown();
}

#[test]
fn test_upload_grace_window() {
    let connector = MockConnector::new();
    let link = MockLink::silent();
    connector.push_link(link.clone());

    let (client, rx) = client(&connector);
    client.start().unwrap();
    assert_eq!(connections(&rx, Duration::from_secs(2), &[true]), vec![true]);
    client.begin_upload();

    // Silent well past the liveness timeout, but inside the grace window
    assert!(connections(&rx, Duration::from_millis(600), &[false]).is_empty());
    assert!(client.is_connected());
    assert!(!client.stop_unless_sending_chunks());

    // Once the grace window closes the silence counts
    assert_eq!(connections(&rx, Duration::from_secs(3), &[false]), vec![false]);
    assert!(link.is_closed());
    client.shutdown();
}

#[test]
fn test_late_chunk_ack_extends_grace() {
    let timing = TimingConfig {
        chunk_timeout_ms: 200,
        chunk_grace_ms: 500,
        ..fast_timing()
    };
    let connector = MockConnector::new();
    let link = MockLink::silent();
    connector.push_link(link.clone());

    let (client, rx) = client_with(&connector, timing);
    client.start().unwrap();
    assert_eq!(connections(&rx, Duration::from_secs(2), &[true]), vec![true]);

    client.begin_upload();
    let chunk = Outbound::LogChunk(LogChunk {
        kind: "data-chunk",
        chunk_index: 0,
        data: "MDEyMw==".to_string(),
        app_log_name: "app.log".to_string(),
        cabot_log_name: "cabot_2024".to_string(),
    });
    let seq = client
        .send_with(&chunk, Duration::from_millis(200), AckAction::ChunkDelivered)
        .unwrap();

    // Ack arrives after the chunk deadline has passed
    std::thread::sleep(Duration::from_millis(300));
    link.inject("ack", json!({ "seq": seq }));

    // Grace now runs from the late delivery, not from the upload start
    assert!(connections(&rx, Duration::from_millis(350), &[false]).is_empty());
    assert!(client.is_connected());

    assert_eq!(connections(&rx, Duration::from_secs(3), &[false]), vec![false]);
    client.shutdown();
}

#[test]
fn test_chunked_upload() {
    let connector = MockConnector::new();
    let link = MockLink::new();
    connector.push_link(link.clone());

    let (client, rx) = client(&connector);
    client.start().unwrap();
    assert_eq!(connections(&rx, Duration::from_secs(2), &[true]), vec![true]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(b"0123456789").unwrap();
    drop(file);

    let mut request = LogRequest::new(LogRequestType::AppLog);
    request.log_name = Some("cabot_2024".to_string());
    let queued = upload::send_log(&client, &request, &["app.log".to_string()], &[path]).unwrap();
    assert_eq!(queued, 3);

    std::thread::sleep(Duration::from_millis(200));
    let chunks = link.sent_of("log_request_chunk");
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].data["type"], "data-chunk");
    assert_eq!(chunks[0].data["data"], "MDEyMw==");
    assert_eq!(chunks[2].data["chunkIndex"], 2);
    assert_eq!(chunks[2].data["cabotLogName"], "cabot_2024");

    let manifests = link.sent_of("log_request");
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0].data["totalChunks"], 3);
    assert_eq!(manifests[0].data["appLogName"], "app.log");

    // A missing file fails the upload
    let missing = dir.path().join("missing.log");
    assert!(upload::send_log(&client, &request, &["m".to_string()], &[missing]).is_err());
    client.shutdown();
}

#[test]
fn test_version_mismatch_reported() {
    let connector = MockConnector::new();
    let link = MockLink::new();
    connector.push_link(link.clone());

    let (client, rx) = client(&connector);
    client.start().unwrap();
    assert_eq!(connections(&rx, Duration::from_secs(2), &[true]), vec![true]);

    link.inject("version", json!("19990101"));
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut checked = None;
    while let Ok(event) = rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        if let ClientEvent::VersionChecked { version, matched } = event.event {
            checked = Some((version, matched));
            break;
        }
    }
    assert_eq!(checked, Some(("19990101".to_string(), false)));
    assert_eq!(client.peer_version().as_deref(), Some("19990101"));
    client.shutdown();
}

#[test]
fn test_sends_fail_while_disconnected() {
    let connector = MockConnector::new();
    let (client, _rx) = client(&connector);
    assert!(client.send(&Outbound::Summon("lobby".into())).is_err());
    client.stop();
    assert_eq!(client.state(), ConnectionState::Disconnected);
}
