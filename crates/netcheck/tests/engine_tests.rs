//! End-to-end scenarios through the engine

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use netcheck::{ConfigError, Engine, InterfaceKey, PollSettings, StatusEvent};
use tokio::time::sleep;

use common::{ScriptedProber, config, settle};

const PERIOD: Duration = Duration::from_secs(5);

fn engine(prober: Arc<ScriptedProber>) -> Engine {
    let _ = tracing_subscriber::fmt::try_init();
    Engine::new(prober, PollSettings { interval: PERIOD, stop_grace: Duration::from_secs(1) })
}

#[tokio::test(start_paused = true)]
async fn test_single_router_becomes_reachable() {
    let prober = Arc::new(ScriptedProber::new());
    let mut engine = engine(prober);

    let raw = r#"{"devices":[{"name":"router1","nics":[{"name":"wan0","ip":"10.0.0.1"}]}]}"#;
    let report = engine.reload(raw).await.unwrap();
    assert_eq!(report.started, vec![InterfaceKey::new("router1", "wan0")]);

    settle().await;

    let record = engine.view().get(&InterfaceKey::new("router1", "wan0")).unwrap();
    assert!(record.reachable);
    assert!(Utc::now() - record.checked_at < chrono::Duration::seconds(5));

    engine.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_empty_configuration_starts_nothing() {
    let prober = Arc::new(ScriptedProber::new());
    let mut engine = engine(prober);
    let mut events = engine.view().subscribe();

    let report = engine.reload(r#"{"devices":[]}"#).await.unwrap();
    settle().await;

    assert!(report.is_noop());
    assert!(engine.active_keys().is_empty());
    assert!(engine.view().is_empty());
    assert!(engine.registry().is_empty());
    assert!(matches!(
        events.try_recv(),
        Ok(StatusEvent::Reloaded { devices: 0, interfaces: 0 })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_reload_leaves_pollers_running() {
    let prober = Arc::new(ScriptedProber::new());
    let mut engine = engine(prober.clone());

    engine.reload(&config(&[("router1", &[("wan0", "10.0.0.1")])])).await.unwrap();
    settle().await;
    let before = engine.active_keys();

    let err = engine.reload(r#"{"hosts":[]}"#).await.unwrap_err();
    assert!(matches!(err, ConfigError::MissingDevices));
    assert!(err.is_missing_targets());

    let bad_address = config(&[("x", &[("a", "300.1.1.1")])]);
    let err = engine.reload(&bad_address).await;
    assert!(matches!(err, Err(ConfigError::InvalidAddress { .. })));

    assert_eq!(engine.active_keys(), before);
    assert_eq!(engine.registry().len(), 1);

    sleep(PERIOD).await;
    assert_eq!(prober.calls("10.0.0.1"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_keys_are_rejected() {
    let prober = Arc::new(ScriptedProber::new());
    let mut engine = engine(prober);

    let raw = config(&[("router1", &[("wan0", "10.0.0.1"), ("wan0", "10.0.0.2")])]);
    let err = engine.reload(&raw).await.unwrap_err();

    let wan = InterfaceKey::new("router1", "wan0");
    assert!(matches!(err, ConfigError::DuplicateKey(key) if key == wan));
    assert!(engine.active_keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reload_swaps_one_interface() {
    let prober = Arc::new(ScriptedProber::new());
    let mut engine = engine(prober.clone());

    engine
        .reload(&config(&[("router1", &[("wan0", "10.0.0.1"), ("lan0", "10.0.0.2")])]))
        .await
        .unwrap();
    settle().await;

    let report = engine
        .reload(&config(&[("router1", &[("lan0", "10.0.0.2"), ("dmz0", "10.0.0.3")])]))
        .await
        .unwrap();
    settle().await;

    assert_eq!(report.stopped, vec![InterfaceKey::new("router1", "wan0")]);
    assert_eq!(report.started, vec![InterfaceKey::new("router1", "dmz0")]);
    assert_eq!(
        engine.active_keys(),
        vec![InterfaceKey::new("router1", "dmz0"), InterfaceKey::new("router1", "lan0")]
    );

    let view = engine.view();
    assert!(view.get(&InterfaceKey::new("router1", "wan0")).is_none());
    assert!(view.get(&InterfaceKey::new("router1", "dmz0")).is_some());
    assert_eq!(prober.calls("10.0.0.3"), 1);

    let wan_calls = prober.calls("10.0.0.1");
    sleep(PERIOD * 3).await;
    assert_eq!(prober.calls("10.0.0.1"), wan_calls);
    assert!(view.get(&InterfaceKey::new("router1", "wan0")).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_reload_and_updates() {
    let prober = Arc::new(ScriptedProber::new());
    let mut engine = engine(prober);
    let mut events = engine.view().subscribe();

    engine.reload(&config(&[("nas", &[("eth0", "192.168.1.10")])])).await.unwrap();
    settle().await;

    let mut reloaded = false;
    let mut updated = false;
    while let Ok(event) = events.try_recv() {
        match event {
            StatusEvent::Reloaded { devices, interfaces } => {
                assert_eq!((devices, interfaces), (1, 1));
                reloaded = true;
            }
            StatusEvent::Updated(record) => {
                assert_eq!(record.key, InterfaceKey::new("nas", "eth0"));
                updated = true;
            }
            StatusEvent::Removed(key) => panic!("unexpected removal of {key}"),
        }
    }
    assert!(reloaded && updated);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_all_probes() {
    let prober = Arc::new(ScriptedProber::new());
    let mut engine = engine(prober.clone());
    let view = engine.view();

    engine
        .reload(&config(&[("router1", &[("wan0", "10.0.0.1")]), ("nas", &[("eth0", "10.0.0.2")])]))
        .await
        .unwrap();
    settle().await;

    engine.shutdown().await;
    let calls = (prober.calls("10.0.0.1"), prober.calls("10.0.0.2"));

    sleep(PERIOD * 3).await;
    assert_eq!((prober.calls("10.0.0.1"), prober.calls("10.0.0.2")), calls);
    assert!(view.is_empty());
}
