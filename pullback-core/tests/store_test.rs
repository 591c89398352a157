//! Bar store integration: concurrent ingestion and snapshot persistence.

use chrono::{Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use pullback_core::domain::{Bar, Direction};
use pullback_core::store::{BarStore, Clock, ManualClock, StoreConfig, StoreError};

fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 15, 0)
        .unwrap()
}

fn bar(i: usize) -> Bar {
    let c = 100.0 + i as f64 * 0.01;
    Bar::new(t0() + Duration::minutes(i as i64), c, c + 0.1, c - 0.1, c, 1_000.0 + i as f64)
}

fn store_with_clock(max_len: usize) -> (BarStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 4, 0, 0).unwrap()));
    let store = BarStore::with_clock(
        StoreConfig {
            max_len,
            snapshot_path: None,
        },
        clock.clone(),
    );
    (store, clock)
}

// ── Concurrency ──────────────────────────────────────────────────────

#[test]
fn concurrent_instruments_do_not_interfere() {
    let store = Arc::new(BarStore::new(StoreConfig {
        max_len: 50,
        snapshot_path: None,
    }));
    let seen = Arc::new(AtomicUsize::new(0));
    {
        let seen = Arc::clone(&seen);
        store.register_on_bar_close(move |_, _| {
            seen.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
    }

    thread::scope(|scope| {
        for t in 0..8 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                let key = format!("INST{t}");
                for i in 0..200 {
                    store.append(&key, bar(i)).unwrap();
                }
            });
        }
    });

    assert_eq!(store.instruments().len(), 8);
    assert_eq!(store.bars_closed(), 1_600);
    assert_eq!(seen.load(Ordering::Relaxed), 1_600);
    for key in store.instruments() {
        let bars = store.get_last_n(&key, 100);
        assert_eq!(bars.len(), 50);
        assert_eq!(bars.first().unwrap().time, bar(150).time);
        assert_eq!(bars.last().unwrap().time, bar(199).time);
        assert!(bars.windows(2).all(|w| w[0].time < w[1].time));
    }
}

#[test]
fn readers_see_consistent_tails_while_writing() {
    let store = Arc::new(BarStore::new(StoreConfig {
        max_len: 30,
        snapshot_path: None,
    }));

    thread::scope(|scope| {
        let writer = Arc::clone(&store);
        scope.spawn(move || {
            for i in 0..500 {
                writer.append("A", bar(i)).unwrap();
            }
        });
        for _ in 0..4 {
            let reader = Arc::clone(&store);
            scope.spawn(move || {
                for _ in 0..200 {
                    let series = reader.series("A", 30);
                    assert!(series.len() <= 30);
                    assert_eq!(series.closes.len(), series.volumes.len());
                    assert!(series.closes.windows(2).all(|w| w[0] < w[1]));
                }
            });
        }
    });

    assert_eq!(store.len("A"), 30);
}

#[test]
fn snapshot_during_ingestion_is_consistent() {
    let store = Arc::new(BarStore::new(StoreConfig {
        max_len: 100,
        snapshot_path: None,
    }));

    thread::scope(|scope| {
        for t in 0..3 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..300 {
                    store.append(&format!("I{t}"), bar(i)).unwrap();
                }
            });
        }
        let snapper = Arc::clone(&store);
        scope.spawn(move || {
            for _ in 0..20 {
                let snap = snapper.snapshot();
                for bars in snap.bars.values() {
                    assert!(bars.len() <= 100);
                    assert!(bars.windows(2).all(|w| w[0].time < w[1].time));
                }
            }
        });
    });

    assert_eq!(store.snapshot().bar_count(), 300);
}

// ── Snapshot persistence ─────────────────────────────────────────────

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("bars.json");

    let (store, clock) = store_with_clock(100);
    for i in 0..40 {
        store.append("A", bar(i)).unwrap();
    }
    for i in 0..10 {
        store.append("B", bar(i)).unwrap();
    }
    store.mark_alert_emitted("A");
    assert!(!store.dedupe_alert("A", Direction::Long, std::time::Duration::from_secs(600)));
    store.pause_instrument("B", clock.now() + Duration::hours(1));

    let written = store.save(Some(&path)).unwrap();
    assert_eq!(written, path);
    assert!(path.exists());
    assert!(!path.with_extension("json.tmp").exists());

    let (restored, _clock) = store_with_clock(100);
    assert_eq!(restored.load(Some(&path)).unwrap(), 50);
    assert_eq!(restored.get_last_n("A", 100), store.get_last_n("A", 100));
    assert_eq!(restored.get_last_n("B", 100), store.get_last_n("B", 100));
    assert_eq!(restored.alert_state(), store.alert_state());
    assert!(!restored.can_emit_alert("B", std::time::Duration::ZERO));
}

#[test]
fn load_truncates_to_capacity_keeping_newest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bars.json");

    let (big, _) = store_with_clock(100);
    for i in 0..80 {
        big.append("A", bar(i)).unwrap();
    }
    big.save(Some(&path)).unwrap();

    let (small, _) = store_with_clock(25);
    assert_eq!(small.load(Some(&path)).unwrap(), 25);
    let bars = small.get_last_n("A", 100);
    assert_eq!(bars.len(), 25);
    assert_eq!(bars[0], bar(55));
    assert_eq!(bars[24], bar(79));
}

#[test]
fn load_replaces_existing_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bars.json");

    let (source, _) = store_with_clock(100);
    source.append("A", bar(0)).unwrap();
    source.save(Some(&path)).unwrap();

    let (target, _) = store_with_clock(100);
    target.append("Z", bar(0)).unwrap();
    target.mark_alert_emitted("Z");
    target.load(Some(&path)).unwrap();

    assert_eq!(target.instruments(), vec!["A".to_string()]);
    assert!(target.alert_state().last_alert_time.is_empty());
}

#[test]
fn failed_load_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    let corrupt = dir.path().join("corrupt.json");
    std::fs::write(&corrupt, "{ not json").unwrap();

    let (store, _) = store_with_clock(100);
    store.append("A", bar(0)).unwrap();

    assert!(matches!(store.load(Some(&missing)), Err(StoreError::SnapshotMissing { .. })));
    assert!(matches!(store.load(Some(&corrupt)), Err(StoreError::SnapshotCorrupt { .. })));
    assert_eq!(store.len("A"), 1);
}

#[test]
fn configured_path_is_used_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default.json");
    let store = BarStore::new(StoreConfig {
        max_len: 10,
        snapshot_path: Some(path.clone()),
    });
    store.append("A", bar(0)).unwrap();

    assert_eq!(store.save(None).unwrap(), path);
    let fresh = BarStore::new(StoreConfig {
        max_len: 10,
        snapshot_path: Some(path),
    });
    assert_eq!(fresh.load(None).unwrap(), 1);
}
