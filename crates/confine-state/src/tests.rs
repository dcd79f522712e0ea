//! # State and Conflict Tests
//!
//! ## Test Categories
//!
//! 1. **State Store**: keyed values, change bookkeeping, lock release
//! 2. **Conflicts**: exclusive kinds, per-snap overlap, ignored and finished changes

use crate::change::Status;
use crate::conflict::{ConflictDetector, ConflictPolicy};
use crate::error::StateError;
use crate::state::State;

// =============================================================================
// State Store Tests
// =============================================================================

#[test]
fn test_get_missing_key() {
    let state = State::new();
    let st = state.lock();
    assert_eq!(st.get::<bool>("seeded").unwrap(), None);
    assert!(!st.contains("seeded"));
}

#[test]
fn test_set_get_remove() {
    let state = State::new();
    let mut st = state.lock();
    st.set("answer", &42u32).unwrap();
    assert_eq!(st.get::<u32>("answer").unwrap(), Some(42));
    assert!(st.remove("answer"));
    assert!(!st.remove("answer"));
}

#[test]
fn test_get_wrong_type_is_serialization_error() {
    let state = State::new();
    let mut st = state.lock();
    st.set("seeded", "yes").unwrap();
    assert!(matches!(
        st.get::<bool>("seeded").unwrap_err(),
        StateError::Serialization(_)
    ));
}

#[test]
fn test_change_ids_increase() {
    let state = State::new();
    let mut st = state.lock();
    let first = st.new_change("connect", "Connect a", ["a"]);
    let second = st.new_change("disconnect", "Disconnect a", ["a"]);
    assert_eq!(first, "1");
    assert_eq!(second, "2");

    let change = st.change(&first).unwrap();
    assert_eq!(change.status, Status::Do);
    assert!(change.affects("a"));
    assert_eq!(st.changes().len(), 2);
}

#[test]
fn test_set_change_status() {
    let state = State::new();
    let mut st = state.lock();
    let id = st.new_change("connect", "Connect a", ["a"]);
    st.set_change_status(&id, Status::Done).unwrap();
    assert!(!st.change(&id).unwrap().in_flight());
    assert_eq!(st.in_flight_changes().count(), 0);

    assert!(matches!(
        st.set_change_status("99", Status::Done).unwrap_err(),
        StateError::NoSuchChange(ref id) if id == "99"
    ));
}

#[test]
fn test_prune_ready_changes() {
    let state = State::new();
    let mut st = state.lock();
    let done = st.new_change("connect", "Connect a", ["a"]);
    st.new_change("connect", "Connect b", ["b"]);
    st.set_change_status(&done, Status::Done).unwrap();

    assert_eq!(st.prune_ready_changes(0), 1);
    assert_eq!(st.changes().len(), 1);
    assert!(st.change(&done).is_none());
}

#[test]
fn test_prune_keeps_newest_ready_changes() {
    let state = State::new();
    let mut st = state.lock();
    let mut ids = Vec::new();
    for snap in ["a", "b", "c", "d"] {
        let id = st.new_change("connect", &format!("Connect {snap}"), [snap]);
        st.set_change_status(&id, Status::Done).unwrap();
        ids.push(id);
    }
    let pending = st.new_change("disconnect", "Disconnect a", ["a"]);
    let failed = st.new_change("connect", "Connect e", ["e"]);
    st.set_change_status(&failed, Status::Error).unwrap();

    assert_eq!(st.prune_ready_changes(2), 3);
    let kept: Vec<&str> = st.changes().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(kept, vec![ids[3].as_str(), pending.as_str(), failed.as_str()]);

    assert_eq!(st.prune_ready_changes(2), 0);
    assert_eq!(st.prune_ready_changes(0), 2);
    assert_eq!(st.changes().len(), 1);
    assert!(st.change(&pending).unwrap().in_flight());
}

#[test]
fn test_lock_released_after_panic() {
    let state = State::new();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut st = state.lock();
        st.set("partial", &true).unwrap();
        panic!("operation failed");
    }));
    assert!(result.is_err());

    // Would deadlock if the guard had leaked.
    let st = state.lock();
    assert_eq!(st.get::<bool>("partial").unwrap(), Some(true));
}

#[test]
fn test_memory_state_checkpoint_succeeds() {
    let state = State::new();
    let mut st = state.lock();
    st.set("k", &1).unwrap();
    st.checkpoint().unwrap();
}

// =============================================================================
// Conflict Tests
// =============================================================================

#[test]
fn test_no_changes_no_conflict() {
    let state = State::new();
    let st = state.lock();
    ConflictDetector::default()
        .check(&st, "connect", &["a"], None)
        .unwrap();
}

#[test]
fn test_remodel_blocks_everything() {
    let state = State::new();
    let mut st = state.lock();
    let id = st.new_change("remodel", "Remodel", Vec::<String>::new());

    let err = ConflictDetector::default()
        .check(&st, "connect", &["unrelated"], None)
        .unwrap_err();
    assert_eq!(
        err.message,
        "remodeling in progress, no other changes allowed until this is done"
    );
    assert_eq!(err.change_kind, "remodel");
    assert_eq!(err.change_id, Some(id));
}

#[test]
fn test_other_exclusive_kind_message() {
    let state = State::new();
    let mut st = state.lock();
    st.new_change("factory-reset", "Reset", Vec::<String>::new());

    let detector =
        ConflictDetector::new(ConflictPolicy::default().with_exclusive_kind("factory-reset"));
    let err = detector.check(&st, "connect", &[], None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "factory-reset in progress, no other changes allowed until this is done"
    );
}

#[test]
fn test_exclusive_request_waits_for_others() {
    let state = State::new();
    let mut st = state.lock();
    let id = st.new_change("connect", "Connect a", ["a"]);

    let err = ConflictDetector::default()
        .check(&st, "remodel", &[], None)
        .unwrap_err();
    assert_eq!(err.change_kind, "connect");
    assert_eq!(err.change_id, Some(id));
}

#[test]
fn test_same_snap_conflicts() {
    let state = State::new();
    let mut st = state.lock();
    let id = st.new_change("install-snap", "Install foo", ["foo"]);

    let detector = ConflictDetector::default();
    let err = detector.check(&st, "connect", &["bar", "foo"], None).unwrap_err();
    assert_eq!(err.message, "snap \"foo\" has \"install-snap\" change in progress");
    assert_eq!(err.change_id, Some(id));

    detector.check(&st, "connect", &["bar"], None).unwrap();
}

#[test]
fn test_compatible_kinds_do_not_conflict() {
    let state = State::new();
    let mut st = state.lock();
    st.new_change("auto-connect", "Auto-connect foo", ["foo"]);

    let detector = ConflictDetector::new(
        ConflictPolicy::default().with_compatible_kinds("connect", "auto-connect"),
    );
    detector.check(&st, "connect", &["foo"], None).unwrap();
    assert!(detector.policy().are_compatible("auto-connect", "connect"));
}

#[test]
fn test_ignored_change_skipped() {
    let state = State::new();
    let mut st = state.lock();
    let own = st.new_change("connect", "Connect foo", ["foo"]);

    let detector = ConflictDetector::default();
    detector.check(&st, "connect", &["foo"], Some(own.as_str())).unwrap();
    assert!(detector.check(&st, "connect", &["foo"], None).is_err());
}

#[test]
fn test_finished_changes_do_not_conflict() {
    let state = State::new();
    let mut st = state.lock();
    for status in [Status::Done, Status::Undone, Status::Error, Status::Hold] {
        let id = st.new_change("remodel", "Remodel", ["foo"]);
        st.set_change_status(&id, status).unwrap();
    }
    ConflictDetector::default()
        .check(&st, "connect", &["foo"], None)
        .unwrap();
}

#[test]
fn test_policy_from_json_defaults() {
    let policy: ConflictPolicy = serde_json::from_str("{}").unwrap();
    assert_eq!(policy, ConflictPolicy::default());
    assert!(policy.is_exclusive("remodel"));
}
