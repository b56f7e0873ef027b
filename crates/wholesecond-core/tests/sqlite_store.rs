//! Session service over the SQLite store.
//!
//! Each test opens its own database file in a temp directory. The
//! cross-connection test opens the same file twice, the way two CLI
//! processes would.

use std::sync::{Arc, Barrier};
use std::thread;

use chrono::{Duration, TimeZone, Utc};
use tempfile::TempDir;
use wholesecond_core::storage::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use wholesecond_core::{Database, PlayerId, SessionService, SessionSettings, SessionStore};

fn player() -> PlayerId {
    PlayerId::new("carol").unwrap()
}

fn open(dir: &TempDir) -> Database {
    Database::open_at(&dir.path().join("wholesecond.db")).unwrap()
}

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let t = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 59).unwrap() + Duration::nanoseconds(123_456_789);
    {
        let svc = SessionService::new(open(&dir), SessionSettings::default());
        svc.submit_attempt_at(&player(), 123, t).unwrap();
        svc.submit_attempt_at(&player(), 4, t).unwrap();
    }

    let svc = SessionService::new(open(&dir), SessionSettings::default());
    let state = svc.session_state(&player()).unwrap();
    assert_eq!(state.attempts_remaining, 1);
    assert_eq!(state.best_offset_ms, Some(4));
    assert_eq!(state.best_reward, 15);
    assert_eq!(state.last_attempt_at, Some(t));
    assert_eq!(state.revision, 2);

    let view = svc.current_session_attempts(&player(), 10).unwrap();
    assert_eq!(
        view.iter().map(|v| v.attempt.offset_ms).collect::<Vec<_>>(),
        vec![4, 123]
    );
    assert_eq!(view[0].attempt.created_at, t);
}

#[test]
fn reset_keeps_history() {
    let dir = TempDir::new().unwrap();
    let svc = SessionService::new(open(&dir), SessionSettings::default());
    let t = Utc::now();
    for offset in [7, 8, 9] {
        svc.submit_attempt_at(&player(), offset, t).unwrap();
    }
    svc.reset_session(&player()).unwrap();

    let state = svc.session_state(&player()).unwrap();
    assert_eq!(state.attempts_remaining, 3);
    assert_eq!(state.best_offset_ms, None);
    assert!(svc.current_session_attempts(&player(), 10).unwrap().is_empty());
    assert_eq!(svc.store().count_attempts(&player()).unwrap(), 3);
    assert!(svc.submit_attempt_at(&player(), 1, t).unwrap().is_accepted());
}

#[test]
fn schema_is_current() {
    let dir = TempDir::new().unwrap();
    open(&dir);
    let conn = rusqlite::Connection::open(dir.path().join("wholesecond.db")).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn separate_connections_cannot_double_spend() {
    let dir = TempDir::new().unwrap();
    let t = Utc::now();
    {
        let svc = SessionService::new(open(&dir), SessionSettings::new(3, 60, &[]));
        svc.submit_attempt_at(&player(), 50, t).unwrap();
        svc.submit_attempt_at(&player(), 60, t).unwrap();
    }

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            let path = dir.path().join("wholesecond.db");
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let svc = SessionService::new(
                    Database::open_at(&path).unwrap(),
                    SessionSettings::new(3, 60, &[]),
                );
                barrier.wait();
                svc.submit_attempt_at(&player(), i, t).unwrap().is_accepted()
            })
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 1);
    let db = open(&dir);
    assert_eq!(db.count_attempts(&player()).unwrap(), 3);
    assert_eq!(db.get_session_state(&player()).unwrap().unwrap().attempts_remaining, 0);
}
