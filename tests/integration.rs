//! Integration tests for the availability session.

use lotwatch::{
    AlertConfig, AlertEvent, AlertFilter, BackendConfig, EncodedUpstream, LotId, PayloadEncoding,
    RefreshOutcome, SchedulerConfig, Session, SessionConfig, SimulatedBackend, SimulationConfig,
    Snapshot, SpotFilter, SpotId, SpotStatus, SubscriptionOutcome,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

fn manual_config() -> SessionConfig {
    SessionConfig {
        scheduler: SchedulerConfig {
            interval: Duration::from_secs(3600),
            initial_sync: false,
        },
        ..Default::default()
    }
}

fn quiet_world() -> SimulationConfig {
    SimulationConfig {
        flip_probability: 0.0,
        ..Default::default()
    }
}

// --- Realistic Workflow Tests ---

#[test]
fn test_watch_spot_until_it_frees_up() {
    let session =
        Session::simulated(manual_config(), quiet_world(), BackendConfig::default()).unwrap();
    let library = LotId::from("lot-library");

    // Spot 20 of the library is occupied in the seed set.
    let spot = SpotId::from("lot-library-spot-20");
    assert_eq!(session.store().spot(&spot).unwrap().status, SpotStatus::Occupied);

    session.select_lot(Some(&library)).unwrap();
    assert_eq!(
        session.toggle_subscription(&spot).unwrap(),
        SubscriptionOutcome::Subscribed
    );

    let alerts = session.listen(AlertConfig {
        filter: AlertFilter::subscribed_available(),
        ..Default::default()
    });

    // Someone else reports a different spot; not ours.
    session
        .report_correction(&SpotId::from("lot-library-spot-30"), SpotStatus::Available)
        .unwrap();
    // Then ours frees up.
    session
        .report_correction(&spot, SpotStatus::Available)
        .unwrap();

    match alerts.recv_timeout(Duration::from_secs(1)).unwrap() {
        AlertEvent::SpotChanged { change } => {
            assert_eq!(change.spot, spot);
            assert_eq!(change.from, SpotStatus::Occupied);
            assert_eq!(change.to, SpotStatus::Available);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(alerts.try_recv().is_err());

    // The selected lot reflects both corrections.
    assert_eq!(session.selected_lot().unwrap().available_spots, 14);

    // The correction was forwarded to the world, so a refresh keeps it.
    session.refresh_now().unwrap();
    assert_eq!(session.store().spot(&spot).unwrap().status, SpotStatus::Available);
    assert_eq!(session.selected_lot().unwrap().available_spots, 14);
    assert!(session.store().verify_counts().is_empty());
}

#[test]
fn test_background_refresh_publishes_events() {
    let config = SessionConfig {
        scheduler: SchedulerConfig {
            interval: Duration::from_millis(20),
            initial_sync: true,
        },
        ..Default::default()
    };
    let mut session = Session::simulated(
        config,
        SimulationConfig {
            flip_probability: 1.0,
            ..Default::default()
        },
        BackendConfig::default(),
    )
    .unwrap();

    let alerts = session.listen(AlertConfig {
        filter: AlertFilter::refresh(),
        ..Default::default()
    });

    let seen = session.refresh_status().attempts();
    assert!(session
        .scheduler()
        .wait_for_attempts(seen + 2, Duration::from_secs(5)));
    session.shutdown();

    let events = alerts.drain();
    assert!(events
        .iter()
        .any(|e| matches!(e, AlertEvent::Refreshed { changed, .. } if *changed == 350)));

    let status = session.refresh_status();
    assert!(status.completed >= 2);
    assert!(status.last_synced.is_some());
    assert!(status.last_error.is_none());
    assert!(session.store().verify_counts().is_empty());
}

#[test]
fn test_encoded_feed_reconciles() {
    let template = lotwatch::EntityStore::seeded(Default::default(), 0)
        .unwrap()
        .snapshot();
    let feed = Arc::new(Mutex::new(template));

    let source_feed = Arc::clone(&feed);
    let source = EncodedUpstream::new(PayloadEncoding::MessagePack, move || {
        source_feed
            .lock()
            .encode(PayloadEncoding::MessagePack)
            .map_err(|e| e.to_string())
    });

    let session = Session::start(
        manual_config(),
        Arc::new(source),
        Arc::new(SimulatedBackend::new(BackendConfig::default())),
    )
    .unwrap();

    // Free every student center spot upstream.
    {
        let mut feed = feed.lock();
        for spot in feed.spots.iter_mut() {
            if spot.lot.as_str() == "lot-student-center" {
                spot.status = SpotStatus::Available;
            }
        }
    }

    let report = match session.refresh_now().unwrap() {
        RefreshOutcome::Completed(report) => report,
        RefreshOutcome::Skipped => panic!("nothing else is refreshing"),
    };
    assert_eq!(report.changes.len(), 150 - 67);
    assert!(!report.unchanged);

    let lot = session.store().lot(&LotId::from("lot-student-center")).unwrap();
    assert_eq!(lot.available_spots, 150);

    // Same payload again: nothing to merge.
    let again = match session.refresh_now().unwrap() {
        RefreshOutcome::Completed(report) => report,
        RefreshOutcome::Skipped => panic!("nothing else is refreshing"),
    };
    assert!(again.unchanged);
    assert!(again.changes.is_empty());
}

#[test]
fn test_lot_view_filters_and_search() {
    let session =
        Session::simulated(manual_config(), quiet_world(), BackendConfig::default()).unwrap();
    let campus = LotId::from("lot-campus");

    let spots = session.store().spots_in_lot(&campus).unwrap();
    assert_eq!(SpotFilter::Available.apply(&spots).len(), 45);

    session
        .report_correction(&SpotId::from("lot-campus-spot-1"), SpotStatus::Occupied)
        .unwrap();
    let spots = session.store().spots_in_lot(&campus).unwrap();
    assert_eq!(SpotFilter::Available.apply(&spots).len(), 44);

    session.set_search_query("campus main parking spot 7");
    let hits = session.search_results();
    // Spot 7 plus 70..=79.
    assert_eq!(hits.len(), 11);
}

#[test]
fn test_snapshot_json_wire_shape() {
    let session =
        Session::simulated(manual_config(), quiet_world(), BackendConfig::default()).unwrap();
    let snapshot = session.store().snapshot();

    let bytes = snapshot.encode(PayloadEncoding::Json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["lots"][0]["available_spots"], 45);
    assert_eq!(value["spots"][0]["status"], "available");

    let decoded = Snapshot::decode(&bytes, PayloadEncoding::Json).unwrap();
    assert_eq!(decoded.spots.len(), 350);
    assert_eq!(decoded.lots[1].name, "Library Parking");
    assert_eq!(decoded.spots[0].time_limit, snapshot.spots[0].time_limit);
}
