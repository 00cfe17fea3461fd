//! End-to-end sync scenarios over the in-memory broker.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use latejoin::sync::{MemoryBroker, SyncError, SyncState};
use latejoin::{
    ChannelId, DrillOutcome, ParticipantId, SessionConfig, SessionController, SessionError,
    SyncSnapshot,
};
use latejoin_testkit::fixtures::{MEMORY_ENDPOINT, SESSION_ID};
use latejoin_testkit::{fast_drill, non_utf8_payload, score_snapshot, SessionFixture};

const WAIT: Duration = Duration::from_secs(2);

/// Poll `check` until it holds or `WAIT` elapses.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[tokio::test]
async fn test_late_joiner_receives_held_snapshot() {
    let fixture = SessionFixture::new().await;
    fixture
        .authority
        .broadcast_snapshot(score_snapshot())
        .await
        .unwrap();

    fixture.peer.request_sync().await.unwrap();
    let synced = fixture.peer.wait_for_sync(WAIT).await.unwrap();

    assert_eq!(synced, Some(score_snapshot()));
    assert_eq!(fixture.peer.state(), SyncState::Synced);
    assert!(eventually(|| fixture.authority.report().requests_served == 1).await);
}

#[tokio::test]
async fn test_participant_joining_after_broadcast() {
    let fixture = SessionFixture::new().await;
    fixture
        .authority
        .broadcast_snapshot(score_snapshot())
        .await
        .unwrap();

    let late = fixture.late_joiner(3).await;
    assert_eq!(late.snapshot().await.unwrap(), None);

    late.request_sync().await.unwrap();
    assert_eq!(late.wait_for_sync(WAIT).await.unwrap(), Some(score_snapshot()));
}

#[tokio::test]
async fn test_peer_resyncs_to_newer_snapshot() {
    let fixture = SessionFixture::new().await;
    let updated = score_snapshot().with("score", 250);
    fixture
        .authority
        .broadcast_snapshot(score_snapshot())
        .await
        .unwrap();
    assert_eq!(
        fixture.peer.wait_for_sync(WAIT).await.unwrap(),
        Some(score_snapshot())
    );

    fixture.peer.request_sync().await.unwrap();
    assert_eq!(fixture.peer.state(), SyncState::AwaitingSync);
    fixture
        .authority
        .broadcast_snapshot(updated.clone())
        .await
        .unwrap();

    assert_eq!(
        fixture.peer.wait_for_sync(WAIT).await.unwrap(),
        Some(updated.clone())
    );
    assert!(fixture.peer.report().snapshots_applied >= 2);

    // The served answer to the re-request carries the newer snapshot too.
    assert!(eventually(|| fixture.authority.report().requests_served == 1).await);
    assert!(eventually(|| fixture.peer.report().snapshots_applied == 3).await);
    assert_eq!(fixture.peer.snapshot().await.unwrap(), Some(updated));
}

#[tokio::test]
async fn test_new_session_starts_without_snapshot() {
    let mut fixture = SessionFixture::new().await;
    fixture
        .authority
        .broadcast_snapshot(score_snapshot())
        .await
        .unwrap();

    fixture.authority.shutdown().await.unwrap();
    fixture.authority.connect(MEMORY_ENDPOINT).await.unwrap();
    fixture.authority.setup_channels("game_b").await.unwrap();
    assert_eq!(fixture.authority.snapshot().await.unwrap(), None);
    assert_eq!(fixture.authority.state(), SyncState::Idle);

    let mut peer = SessionController::new(Arc::new(fixture.broker.connector()), ParticipantId(2));
    peer.connect(MEMORY_ENDPOINT).await.unwrap();
    peer.setup_channels("game_b").await.unwrap();

    peer.request_sync().await.unwrap();
    let synced = peer.wait_for_sync(Duration::from_millis(300)).await.unwrap();

    assert_eq!(synced, None);
    assert!(eventually(|| fixture.authority.report().requests_unserved == 1).await);
    assert_eq!(fixture.broker.publish_count("game_b/channel255"), 0);
}

#[tokio::test]
async fn test_binary_sync_payload_degrades_to_size() {
    let fixture = SessionFixture::new().await;

    fixture
        .peer
        .dispatch(ChannelId(255), Bytes::from(non_utf8_payload(42)))
        .await
        .unwrap();

    let expected = SyncSnapshot::from_json_str(r#"{"binary_size":42}"#).unwrap();
    assert_eq!(fixture.peer.snapshot().await.unwrap(), Some(expected));
    assert_eq!(fixture.peer.state(), SyncState::Synced);
    assert_eq!(fixture.peer.report().binary_fallbacks, 1);
}

#[tokio::test]
async fn test_binary_sync_payload_over_the_wire() {
    let fixture = SessionFixture::new().await;

    fixture
        .authority
        .send_packet(ChannelId(255), non_utf8_payload(42))
        .await
        .unwrap();

    let synced = fixture.peer.wait_for_sync(WAIT).await.unwrap();
    assert_eq!(synced, Some(SyncSnapshot::binary_fallback(42)));

    // The authority never takes a binary payload as its snapshot.
    assert!(eventually(|| fixture.authority.report().decode_failures == 1).await);
    assert_eq!(fixture.authority.snapshot().await.unwrap(), None);
}

#[tokio::test]
async fn test_request_before_any_snapshot() {
    let fixture = SessionFixture::new().await;

    fixture.peer.request_sync().await.unwrap();
    let synced = fixture
        .peer
        .wait_for_sync(Duration::from_millis(200))
        .await
        .unwrap();

    assert_eq!(synced, None);
    assert_eq!(fixture.peer.state(), SyncState::AwaitingSync);
    assert!(eventually(|| fixture.authority.report().requests_unserved == 1).await);
    assert_eq!(fixture.publishes(255), 0);
}

#[tokio::test]
async fn test_malformed_json_keeps_cached_snapshot() {
    let fixture = SessionFixture::new().await;
    fixture
        .authority
        .broadcast_snapshot(score_snapshot())
        .await
        .unwrap();
    assert_eq!(
        fixture.peer.wait_for_sync(WAIT).await.unwrap(),
        Some(score_snapshot())
    );

    fixture
        .peer
        .dispatch(ChannelId(255), Bytes::from_static(b"{\"score\":"))
        .await
        .unwrap();

    assert_eq!(fixture.peer.snapshot().await.unwrap(), Some(score_snapshot()));
    assert_eq!(fixture.peer.state(), SyncState::Synced);
    assert_eq!(fixture.peer.report().decode_failures, 1);
}

#[tokio::test]
async fn test_authority_self_echo_does_not_drift() {
    let fixture = SessionFixture::new().await;
    let snapshot = score_snapshot()
        .with("ratio", 0.1 + 0.2)
        .with("timestamp", 1_736_870_400_000u64);

    fixture
        .authority
        .broadcast_snapshot(snapshot.clone())
        .await
        .unwrap();

    assert!(eventually(|| fixture.authority.report().echoes_observed == 1).await);
    assert_eq!(fixture.authority.snapshot().await.unwrap(), Some(snapshot));
    // Observing the echo never triggers another broadcast.
    assert_eq!(fixture.publishes(255), 1);
}

#[tokio::test]
async fn test_repeated_requests_are_independent() {
    let fixture = SessionFixture::new().await;
    fixture
        .authority
        .broadcast_snapshot(score_snapshot())
        .await
        .unwrap();

    for _ in 0..3 {
        fixture.peer.request_sync().await.unwrap();
    }

    assert_eq!(fixture.publishes(254), 3);
    assert!(eventually(|| fixture.authority.report().requests_served == 3).await);
    assert_eq!(fixture.publishes(255), 4);
    assert_eq!(
        fixture.authority.snapshot().await.unwrap(),
        Some(score_snapshot())
    );
}

#[tokio::test]
async fn test_role_violations_are_explicit() {
    let fixture = SessionFixture::new().await;

    assert!(matches!(
        fixture.authority.request_sync().await,
        Err(SessionError::Sync(SyncError::WrongRole { .. }))
    ));
    assert!(fixture
        .peer
        .broadcast_snapshot(score_snapshot())
        .await
        .is_err());
    assert_eq!(fixture.publishes(254), 0);
    assert_eq!(fixture.publishes(255), 0);
}

#[tokio::test]
async fn test_partial_subscribe_failure() {
    let broker = MemoryBroker::new();
    broker.deny_topic(format!("{SESSION_ID}/channel013"));
    broker.deny_topic(format!("{SESSION_ID}/channel200"));

    let mut session = SessionController::new(Arc::new(broker.connector()), ParticipantId(2));
    session.connect(MEMORY_ENDPOINT).await.unwrap();
    let report = session.setup_channels(SESSION_ID).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.subscribed.len(), 254);
    let failed: Vec<_> = report.failed.iter().map(|(channel, _)| *channel).collect();
    assert_eq!(failed, vec![ChannelId(13), ChannelId(200)]);
    assert_eq!(broker.subscriber_count(&format!("{SESSION_ID}/channel255")), 1);
}

#[tokio::test]
async fn test_connect_failure_leaves_session_unusable() {
    let broker = MemoryBroker::new();
    let mut session = SessionController::new(Arc::new(broker.connector()), ParticipantId(1));

    let err = session.connect("tcp/127.0.0.1:7447").await.unwrap_err();
    assert!(err.is_connect_failure());

    assert!(matches!(
        session.setup_channels(SESSION_ID).await,
        Err(SessionError::NotConnected)
    ));
    assert!(matches!(
        session.broadcast_snapshot(score_snapshot()).await,
        Err(SessionError::NotConnected)
    ));
    session.shutdown().await.unwrap();
}

#[cfg(not(feature = "zenoh"))]
#[test]
fn test_network_endpoint_without_zenoh() {
    let config = SessionConfig::default();
    let err = SessionController::from_config(&config).err().unwrap();
    assert!(err.is_connect_failure());
}

#[tokio::test]
async fn test_shutdown_stops_deliveries() {
    let mut fixture = SessionFixture::new().await;
    fixture.peer.shutdown().await.unwrap();
    fixture.peer.shutdown().await.unwrap();

    fixture
        .authority
        .broadcast_snapshot(score_snapshot())
        .await
        .unwrap();

    assert_eq!(
        fixture
            .broker
            .subscriber_count(&SessionFixture::topic(255)),
        1
    );
    assert_eq!(fixture.peer.snapshot().await.unwrap(), None);
    assert!(matches!(
        fixture.peer.request_sync().await,
        Err(SessionError::NotConnected)
    ));
}

#[tokio::test]
async fn test_drill_between_authority_and_peer() {
    let fixture = SessionFixture::new().await;
    let drill = fast_drill();

    let (authority, peer) = tokio::join!(
        fixture.authority.run_scenario(&drill),
        fixture.peer.run_scenario(&drill)
    );
    let authority = authority.unwrap();
    let peer = peer.unwrap();

    assert_eq!(authority.outcome, DrillOutcome::Broadcast { rebroadcasts: 0 });
    assert!(authority.sync.requests_served >= 1);

    let DrillOutcome::Synced(snapshot) = peer.outcome else {
        panic!("peer did not sync: {:?}", peer.outcome);
    };
    assert_eq!(snapshot.get("score"), Some(&100.into()));
    assert_eq!(snapshot.get("players"), Some(&2.into()));
    assert_eq!(snapshot.get("authority"), Some(&1u64.into()));
}

#[tokio::test]
async fn test_drill_from_config() {
    let config = SessionConfig {
        endpoint: "memory/drill".into(),
        participant: ParticipantId(1),
        drill: latejoin::DrillConfig {
            hold: Duration::from_millis(10),
            ..fast_drill()
        },
        ..SessionConfig::default()
    };

    let mut session = SessionController::from_config(&config).unwrap();
    session.connect(&config.endpoint).await.unwrap();
    session.setup_channels(&config.session_id).await.unwrap();

    let report = session.run_scenario(&config.drill).await.unwrap();
    assert_eq!(report.sync.broadcasts, 1);
    session.shutdown().await.unwrap();
}
