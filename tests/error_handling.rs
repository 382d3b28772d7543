//! Error handling and edge case tests.

use lotwatch::{
    AlertConfig, AlertEvent, AlertFilter, BackendConfig, EncodedUpstream, EntityStore, LotId,
    MutationAction, MutationBackend, PayloadEncoding, SchedulerConfig, Session, SessionConfig,
    SimulationConfig, SpotId, SpotStatus, StoreConfig, SubscriptionOutcome, SyncError,
};
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

fn rejecting_backend() -> BackendConfig {
    BackendConfig {
        failure_probability: 1.0,
        ..Default::default()
    }
}

// --- Mutation Errors ---

#[test]
fn test_correction_for_unknown_spot() {
    let session =
        Session::simulated(manual_config(), SimulationConfig::default(), BackendConfig::default())
            .unwrap();
    let version = session.store().version();

    let err = session
        .report_correction(&SpotId::from("lot-campus-spot-999"), SpotStatus::Available)
        .unwrap_err();

    assert!(err.is_not_found());
    assert_eq!(session.store().version(), version);
}

#[test]
fn test_rejected_correction_leaves_store_untouched() {
    let session =
        Session::simulated(manual_config(), SimulationConfig::default(), rejecting_backend())
            .unwrap();
    let spot = SpotId::from("lot-campus-spot-1");
    let before = session.store().lot(&LotId::from("lot-campus")).unwrap();

    let err = session
        .report_correction(&spot, SpotStatus::Occupied)
        .unwrap_err();

    assert!(matches!(err, SyncError::Upstream(_)));
    assert_eq!(session.store().spot(&spot).unwrap().status, SpotStatus::Available);
    assert_eq!(session.store().lot(&before.id).unwrap(), before);
    assert!(!session.is_pending(&MutationAction::Correction(spot)));
}

#[test]
fn test_rejected_subscription_keeps_registry() {
    let session =
        Session::simulated(manual_config(), SimulationConfig::default(), rejecting_backend())
            .unwrap();
    let spot = SpotId::from("lot-library-spot-50");

    assert!(session.toggle_subscription(&spot).is_err());
    assert!(session.registry().is_empty());
}

#[test]
fn test_subscription_noops_skip_backend() {
    // Even a backend that rejects everything is never reached for no-ops.
    let session =
        Session::simulated(manual_config(), SimulationConfig::default(), rejecting_backend())
            .unwrap();
    let spot = SpotId::from("lot-library-spot-50");

    assert_eq!(
        session.gateway().set_subscription(&spot, false).unwrap(),
        SubscriptionOutcome::NotSubscribed
    );
    assert!(matches!(
        session
            .gateway()
            .set_subscription(&SpotId::from("nowhere"), true),
        Err(SyncError::SpotNotFound(_))
    ));
}

// --- Refresh Errors ---

#[test]
fn test_upstream_failure_keeps_last_state() {
    let session = Session::simulated(
        manual_config(),
        SimulationConfig {
            failure_probability: 1.0,
            ..Default::default()
        },
        BackendConfig::default(),
    )
    .unwrap();
    let alerts = session.listen(AlertConfig {
        filter: AlertFilter::refresh(),
        ..Default::default()
    });
    let before = session.store().snapshot();

    assert!(matches!(session.refresh_now(), Err(SyncError::Upstream(_))));

    assert_eq!(session.store().snapshot(), before);
    let status = session.refresh_status();
    assert_eq!(status.failed, 1);
    assert!(status.last_synced.is_none());
    assert!(status.last_error.unwrap().contains("simulated failure"));
    assert!(matches!(
        alerts.try_recv(),
        Ok(AlertEvent::RefreshFailed { .. })
    ));
}

#[test]
fn test_corrupt_payload_is_a_refresh_failure() {
    let source = EncodedUpstream::new(PayloadEncoding::Json, || Ok(b"{not json".to_vec()));
    let backend: Arc<dyn MutationBackend> =
        Arc::new(lotwatch::SimulatedBackend::new(BackendConfig::default()));
    let session = Session::start(manual_config(), Arc::new(source), backend).unwrap();

    assert!(matches!(
        session.refresh_now(),
        Err(SyncError::Deserialization(_))
    ));
    assert_eq!(session.store().spot_count(), 350);
    assert!(session.store().verify_counts().is_empty());
}

#[test]
fn test_transport_error_is_upstream_failure() {
    let source = EncodedUpstream::new(PayloadEncoding::MessagePack, || {
        Err("connection refused".to_string())
    });
    let backend: Arc<dyn MutationBackend> =
        Arc::new(lotwatch::SimulatedBackend::new(BackendConfig::default()));
    let session = Session::start(manual_config(), Arc::new(source), backend).unwrap();

    match session.refresh_now() {
        Err(SyncError::Upstream(msg)) => assert_eq!(msg, "connection refused"),
        other => panic!("expected upstream error, got {:?}", other),
    }
}

// --- Configuration Errors ---

#[test]
fn test_zero_interval_rejected() {
    let config = SessionConfig {
        scheduler: SchedulerConfig {
            interval: Duration::ZERO,
            initial_sync: false,
        },
        ..Default::default()
    };

    let result = Session::simulated(config, SimulationConfig::default(), BackendConfig::default());
    assert!(matches!(result, Err(SyncError::Validation(_))));
}

#[test]
fn test_store_rejects_orphan_spots() {
    let (lots, mut spots) = lotwatch::entities::seed::generate(0);
    spots[0].lot = LotId::from("lot-moon");

    let result = EntityStore::with_entities(StoreConfig::default(), lots, spots);
    assert!(matches!(result, Err(SyncError::LotNotFound(_))));
}

#[test]
fn test_unknown_lot_lookups() {
    let store = EntityStore::seeded(StoreConfig::default(), 0).unwrap();
    assert!(store.lot(&LotId::from("lot-moon")).is_none());
    assert!(matches!(
        store.spots_in_lot(&LotId::from("lot-moon")),
        Err(SyncError::LotNotFound(_))
    ));
}
