//! Request ledger shared by several writers.

use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use opening_core::file_io::{LedgerLock, LockHolder, RequestLedger};
use opening_core::services::RequestStore;

const WRITERS: usize = 8;

#[test]
fn concurrent_intakes_get_distinct_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");
    RequestLedger::open(&path, "setup").unwrap();

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|n| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // One handle per writer, as separate intake processes would have
                let ledger = RequestLedger::open(&path, format!("intake-{}", n)).unwrap();
                barrier.wait();
                ledger.open_request("wall-opening", &format!("user{}@example.com", n))
            })
        })
        .collect();

    let ids: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().unwrap().unwrap())
        .collect();

    let distinct: BTreeSet<_> = ids.iter().copied().collect();
    assert_eq!(distinct, (1..=WRITERS as u64).collect());

    let snapshot = RequestLedger::open(&path, "check").unwrap().snapshot().unwrap();
    assert_eq!(snapshot.requests.len(), WRITERS);
    assert_eq!(snapshot.next_id, WRITERS as u64 + 1);
}

#[test]
fn concurrent_first_opens_create_one_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|n| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let ledger = RequestLedger::open(&path, format!("intake-{}", n))?;
                ledger.open_request("wall-opening", "a@example.com")
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    let snapshot = RequestLedger::open(&path, "check").unwrap().snapshot().unwrap();
    assert_eq!(snapshot.requests.len(), WRITERS);
}

#[test]
fn writer_waits_for_a_busy_ledger() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");
    let ledger = RequestLedger::open(&path, "intake").unwrap();

    let held = LedgerLock::acquire(&path, "maintenance", Duration::from_secs(1)).unwrap();
    let waiting = {
        let path = path.clone();
        thread::spawn(move || {
            let ledger = RequestLedger::open(&path, "queued")?;
            ledger.open_request("wall-opening", "a@example.com")
        })
    };
    thread::sleep(Duration::from_millis(100));
    drop(held);

    assert_eq!(waiting.join().unwrap().unwrap(), 1);
    assert_eq!(ledger.open_request("wall-opening", "b@example.com").unwrap(), 2);
}

#[test]
fn busy_ledger_fails_after_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");
    let ledger = RequestLedger::open(&path, "intake")
        .unwrap()
        .with_lock_timeout(Duration::from_millis(50));

    let _held = LedgerLock::acquire(&path, "maintenance", Duration::from_secs(1)).unwrap();
    let err = ledger.open_request("wall-opening", "a@example.com").unwrap_err();
    assert_eq!(err.error_code(), "FILE_LOCKED");
}

#[test]
fn crashed_writer_leaves_no_lock_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.json");
    let ledger = RequestLedger::open(&path, "intake").unwrap();

    // Holder record of a process that is gone, written just now
    let leftover = LockHolder {
        user_id: "crashed@office".to_string(),
        pid: u32::MAX,
        locked_at: chrono::Utc::now(),
    };
    let mut lock_path = path.clone().into_os_string();
    lock_path.push(".lock");
    std::fs::write(&lock_path, serde_json::to_vec(&leftover).unwrap()).unwrap();

    assert!(LedgerLock::holder(&path).is_none());
    assert_eq!(ledger.open_request("wall-opening", "a@example.com").unwrap(), 1);
}
