//! Session manager lifecycle against the mock backend.

mod common;

use common::{
    MOCK_BACKEND, MockBackend, READ_ONLY, collect_data, manager_with, test_settings,
    wait_for_event,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use termdeck::session::{
    CreateOrAttachParams, ResizeOutcome, SessionError, SessionEvent, SessionManager,
    SessionSettings,
};

fn params(pane: &str) -> CreateOrAttachParams {
    CreateOrAttachParams::new(pane).backend(MOCK_BACKEND)
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_concurrent_creates_share_one_attach() {
    let backend = Arc::new(MockBackend::new().with_attach_delay(Duration::from_millis(50)));
    let manager = manager_with(Arc::clone(&backend));

    let (first, second) = tokio::join!(
        manager.create_or_attach(params("p1")),
        manager.create_or_attach(params("p1")),
    );

    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(backend.attach_count(), 1);
    assert_eq!(first, second);
    assert!(first.is_new);
    assert_eq!(manager.session_count(), 1);
}

#[tokio::test]
async fn test_reattach_returns_scrollback() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();

    let created = manager.create_or_attach(params("p1")).await.unwrap();
    assert!(created.is_new);
    assert!(created.scrollback.is_empty());

    backend.send_output("p1", b"hello from p1\r\n");
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Data { .. })).await;

    let again = manager.create_or_attach(params("p1")).await.unwrap();
    assert!(!again.is_new);
    assert!(again.scrollback.contains("hello from p1"));
    assert_eq!(backend.attach_count(), 1);
}

#[tokio::test]
async fn test_reattach_applies_geometry() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));

    manager
        .create_or_attach(params("p1").size(80, 24))
        .await
        .unwrap();
    manager
        .create_or_attach(params("p1").size(120, 40))
        .await
        .unwrap();

    assert_eq!(manager.geometry("p1"), Some((120, 40)));
    let process = backend.process("p1").unwrap();
    assert_eq!(process.resizes.lock().as_slice(), &[(120, 40)]);
}

#[tokio::test]
async fn test_backend_failure_propagates_without_retry() {
    let backend = Arc::new(MockBackend::new());
    backend.fail_attach(Some("no VM provisioned"));
    let manager = manager_with(Arc::clone(&backend));

    let err = manager.create_or_attach(params("p1")).await.unwrap_err();
    assert_eq!(err, SessionError::Unavailable("no VM provisioned".into()));
    assert_eq!(backend.attach_count(), 1);
    assert!(!manager.is_alive("p1"));

    // The failed creation does not linger; a manual retry reaches the backend
    backend.fail_attach(None);
    manager.create_or_attach(params("p1")).await.unwrap();
    assert_eq!(backend.attach_count(), 2);
}

#[tokio::test]
async fn test_unknown_backend_is_unavailable() {
    let manager = manager_with(Arc::new(MockBackend::new()));
    let err = manager
        .create_or_attach(CreateOrAttachParams::new("p1").backend("nowhere"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Unavailable(_)));
}

#[tokio::test]
async fn test_explicit_zero_geometry_rejected() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let err = manager
        .create_or_attach(params("p1").size(0, 24))
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::InvalidGeometry { cols: 0, rows: 24 });
    assert_eq!(backend.attach_count(), 0);
}

#[tokio::test]
async fn test_missing_geometry_uses_defaults() {
    let manager = manager_with(Arc::new(MockBackend::new()));
    manager.create_or_attach(params("p1")).await.unwrap();
    let settings = test_settings();
    assert_eq!(
        manager.geometry("p1"),
        Some((settings.default_cols, settings.default_rows))
    );
}

// ============================================================================
// Output
// ============================================================================

#[tokio::test]
async fn test_output_order_preserved_across_batches() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();
    manager.create_or_attach(params("p1")).await.unwrap();

    let mut expected = String::new();
    for i in 0..200 {
        let chunk = format!("line {i}\r\n");
        backend.send_output("p1", chunk.as_bytes());
        expected.push_str(&chunk);
    }

    let received = collect_data(&mut events, "p1", Duration::from_millis(200)).await;
    assert_eq!(received, expected);
}

#[tokio::test]
async fn test_split_utf8_is_not_mangled() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();
    manager.create_or_attach(params("p1")).await.unwrap();

    let bytes = "grüße €".as_bytes();
    let (head, tail) = bytes.split_at(bytes.len() - 1);
    backend.send_output("p1", head);
    tokio::time::sleep(Duration::from_millis(20)).await;
    backend.send_output("p1", tail);

    let received = collect_data(&mut events, "p1", Duration::from_millis(100)).await;
    assert_eq!(received, "grüße €");
}

#[tokio::test]
async fn test_bell_raises_attention() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();
    manager.create_or_attach(params("p1")).await.unwrap();

    backend.send_output("p1", b"done\x07");
    let event = wait_for_event(&mut events, |e| {
        matches!(e, SessionEvent::Attention { .. })
    })
    .await;
    assert_eq!(event.pane_id(), "p1");
}

#[tokio::test]
async fn test_natural_exit_removes_session() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();
    manager.create_or_attach(params("p1")).await.unwrap();

    backend.send_output("p1", b"bye\r\n");
    backend.exit("p1", Some(3));

    let exit = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Exit { .. })).await;
    assert_eq!(
        exit,
        SessionEvent::Exit {
            pane_id: "p1".into(),
            code: Some(3)
        }
    );
    assert!(!manager.is_alive("p1"));
    assert_eq!(manager.session_count(), 0);

    // Killing an exited pane is a no-op
    assert!(!manager.kill("p1").await);
}

#[tokio::test]
async fn test_exit_during_creation_respawns_on_next_create() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();

    backend.exit_on_attach(true);
    let first = manager.create_or_attach(params("p1")).await.unwrap();
    assert!(first.is_new);
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Exit { .. })).await;
    assert!(!manager.is_alive("p1"));
    assert_eq!(manager.session_count(), 0);

    backend.exit_on_attach(false);
    let second = manager.create_or_attach(params("p1")).await.unwrap();
    assert!(second.is_new);
    assert_eq!(backend.attach_count(), 2);
    assert!(manager.is_alive("p1"));
}

// ============================================================================
// Operations
// ============================================================================

#[tokio::test]
async fn test_write_and_execute_command() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    manager.create_or_attach(params("p1")).await.unwrap();

    manager.write("p1", b"ls").await.unwrap();
    manager.execute_command("p1", "pwd").await.unwrap();

    let process = backend.process("p1").unwrap();
    assert_eq!(process.written.lock().as_slice(), b"lspwd\r");
}

#[tokio::test]
async fn test_write_errors_are_typed() {
    let read_only = Arc::new(MockBackend::with_capabilities("cloud", READ_ONLY));
    let manager = SessionManager::new(test_settings());
    manager.register_backend(read_only);

    let err = manager.write("ghost", b"x").await.unwrap_err();
    assert_eq!(err, SessionError::NotFound("ghost".into()));

    manager
        .create_or_attach(CreateOrAttachParams::new("p1").backend("cloud"))
        .await
        .unwrap();
    let err = manager.write("p1", b"x").await.unwrap_err();
    assert_eq!(err, SessionError::Unsupported { operation: "write" });
    let err = manager.signal("p1", "SIGINT").await.unwrap_err();
    assert_eq!(err, SessionError::Unsupported { operation: "signal" });
}

#[tokio::test]
async fn test_resize_validation() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    manager
        .create_or_attach(params("p1").size(80, 24))
        .await
        .unwrap();

    assert_eq!(manager.resize("p1", 0, 24).await, ResizeOutcome::Ignored);
    assert_eq!(manager.resize("p1", 80, 0).await, ResizeOutcome::Ignored);
    assert_eq!(manager.resize("p1", 70_000, 24).await, ResizeOutcome::Ignored);
    assert_eq!(manager.resize("ghost", 100, 30).await, ResizeOutcome::Ignored);
    assert_eq!(manager.geometry("p1"), Some((80, 24)));
    assert!(backend.process("p1").unwrap().resizes.lock().is_empty());

    assert_eq!(manager.resize("p1", 100, 30).await, ResizeOutcome::Applied);
    assert_eq!(manager.geometry("p1"), Some((100, 30)));
    assert_eq!(*backend.process("p1").unwrap().resizes.lock(), vec![(100, 30)]);
}

#[tokio::test]
async fn test_resize_on_read_only_backend_is_mirror_only() {
    let backend = Arc::new(MockBackend::with_capabilities("cloud", READ_ONLY));
    let manager = SessionManager::new(test_settings());
    manager.register_backend(backend.clone());
    manager
        .create_or_attach(CreateOrAttachParams::new("p1").backend("cloud"))
        .await
        .unwrap();

    let outcome = manager.resize("p1", 100, 30).await;
    assert_eq!(outcome, ResizeOutcome::MirrorOnly);
    assert!(!outcome.is_applied());
    assert_eq!(manager.geometry("p1"), Some((100, 30)));
    assert!(backend.process("p1").unwrap().resizes.lock().is_empty());
}

#[tokio::test]
async fn test_signal_forwarded() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    manager.create_or_attach(params("p1")).await.unwrap();
    manager.signal("p1", "SIGINT").await.unwrap();
    assert_eq!(
        backend.process("p1").unwrap().signals.lock().as_slice(),
        &["SIGINT".to_string()]
    );
}

#[tokio::test]
async fn test_detach_keeps_process_and_viewport() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    manager.create_or_attach(params("p1")).await.unwrap();

    assert!(manager.detach("p1", Some(42)));
    assert_eq!(manager.is_detached("p1"), Some(true));
    assert!(manager.is_alive("p1"));

    let again = manager.create_or_attach(params("p1")).await.unwrap();
    assert_eq!(again.viewport_y, Some(42));
    assert_eq!(manager.is_detached("p1"), Some(false));
    assert!(!manager.detach("ghost", None));
}

#[tokio::test]
async fn test_clear_scrollback() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();
    manager
        .create_or_attach(params("p1").size(40, 10))
        .await
        .unwrap();

    backend.send_output("p1", b"secret\r\n");
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Data { .. })).await;
    assert!(manager.get_history("p1").await.unwrap().contains("secret"));

    assert!(manager.clear_scrollback("p1"));
    assert_eq!(manager.get_history("p1").await.unwrap(), "");
    assert_eq!(manager.geometry("p1"), Some((40, 10)));
}

#[tokio::test]
async fn test_history_falls_back_to_backend() {
    let backend = Arc::new(MockBackend::new());
    backend.add_existing_session("old");
    let manager = manager_with(Arc::clone(&backend));

    assert_eq!(manager.get_history("old").await.unwrap(), "history of old");
    assert_eq!(
        manager.get_history("ghost").await.unwrap_err(),
        SessionError::NotFound("ghost".into())
    );
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_kill_is_idempotent() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    let mut events = manager.subscribe().unwrap();
    manager.create_or_attach(params("p1")).await.unwrap();

    assert!(manager.kill("p1").await);
    assert!(!manager.kill("p1").await);
    assert!(!manager.is_alive("p1"));
    assert!(backend.process("p1").unwrap().killed.load(Ordering::SeqCst));

    let exit = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Exit { .. })).await;
    assert_eq!(exit.pane_id(), "p1");
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(events.try_recv().is_err(), "only one exit event");
}

#[tokio::test]
async fn test_kill_flushes_pending_output() {
    let backend = Arc::new(MockBackend::new());
    let settings = SessionSettings {
        batch_interval: Duration::from_secs(60),
        ..test_settings()
    };
    let manager = SessionManager::new(settings);
    manager.register_backend(backend.clone());
    let mut events = manager.subscribe().unwrap();
    manager.create_or_attach(params("p1")).await.unwrap();

    backend.send_output("p1", b"last words");
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager.kill("p1").await;

    let data = wait_for_event(&mut events, |e| matches!(e, SessionEvent::Data { .. })).await;
    assert_eq!(
        data,
        SessionEvent::Data {
            pane_id: "p1".into(),
            data: "last words".into()
        }
    );
    wait_for_event(&mut events, |e| matches!(e, SessionEvent::Exit { .. })).await;
}

#[tokio::test]
async fn test_kill_waits_for_pending_creation() {
    let backend = Arc::new(MockBackend::new().with_attach_delay(Duration::from_millis(50)));
    let manager = manager_with(Arc::clone(&backend));

    let creating = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.create_or_attach(params("p1")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(manager.kill("p1").await);
    assert!(creating.await.unwrap().is_ok());
    assert!(!manager.is_alive("p1"));
    assert_eq!(manager.session_count(), 0);
    assert!(backend.process("p1").unwrap().killed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_kill_by_group_key() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    manager
        .create_or_attach(params("a").group_key("task-1"))
        .await
        .unwrap();
    manager
        .create_or_attach(params("b").group_key("task-1"))
        .await
        .unwrap();
    manager
        .create_or_attach(params("c").group_key("task-2"))
        .await
        .unwrap();

    let summary = manager.kill_by_group_key("task-1").await;
    assert_eq!(summary.killed, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(manager.pane_ids(), vec!["c".to_string()]);

    let none = manager.kill_by_group_key("task-9").await;
    assert_eq!(none.killed + none.failed, 0);
}

#[tokio::test]
async fn test_backend_group_applies_when_caller_gives_none() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    backend.assign_group(Some("remote-ws"));
    manager.create_or_attach(params("a")).await.unwrap();
    manager
        .create_or_attach(params("b").group_key("mine"))
        .await
        .unwrap();
    backend.assign_group(None);
    manager.create_or_attach(params("c")).await.unwrap();

    let summary = manager.kill_by_group_key("remote-ws").await;
    assert_eq!(summary.killed, 1);
    assert_eq!(manager.pane_ids(), vec!["b".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn test_cleanup_releases_sessions() {
    let backend = Arc::new(MockBackend::new());
    let manager = manager_with(Arc::clone(&backend));
    manager.create_or_attach(params("a")).await.unwrap();
    manager.create_or_attach(params("b")).await.unwrap();

    manager.cleanup().await;
    assert_eq!(manager.session_count(), 0);
    for pane in ["a", "b"] {
        let process = backend.process(pane).unwrap();
        assert!(process.released.load(Ordering::SeqCst));
        assert!(!process.killed.load(Ordering::SeqCst));
    }

    let err = manager.create_or_attach(params("c")).await.unwrap_err();
    assert_eq!(err, SessionError::Closed);
    // Safe to call again during shutdown
    manager.cleanup().await;
}

// ============================================================================
// Recovery
// ============================================================================

#[tokio::test]
async fn test_recover_reattaches_known_and_kills_orphans() {
    let backend = Arc::new(MockBackend::new());
    backend.add_existing_session("kept");
    backend.add_existing_session("orphan");
    let manager = manager_with(Arc::clone(&backend));

    let report = manager.recover(&["kept".to_string()]).await;
    assert_eq!(report.reattached, vec!["kept".to_string()]);
    assert_eq!(report.orphans_killed, vec!["mock-orphan".to_string()]);
    assert!(report.failed.is_empty());

    assert!(manager.is_alive("kept"));
    let attached = manager.create_or_attach(params("kept")).await.unwrap();
    assert!(attached.was_recovered);
    assert_eq!(backend.killed_sessions(), vec!["mock-orphan".to_string()]);
}

#[tokio::test]
async fn test_recover_keeps_orphans_when_configured() {
    let backend = Arc::new(MockBackend::new());
    backend.add_existing_session("orphan");
    let manager = SessionManager::new(SessionSettings {
        kill_orphan_sessions: false,
        ..test_settings()
    });
    manager.register_backend(backend.clone());

    let report = manager.recover(&[]).await;
    assert_eq!(report.orphans_kept, vec!["mock-orphan".to_string()]);
    assert!(backend.killed_sessions().is_empty());

    // The explicit command still kills them
    let report = manager.kill_orphans(&[]).await;
    assert_eq!(report.orphans_killed, vec!["mock-orphan".to_string()]);
}

#[tokio::test]
async fn test_recover_skips_non_recoverable_backends() {
    let backend = Arc::new(MockBackend::with_capabilities("cloud", READ_ONLY));
    backend.add_existing_session("x");
    let manager = SessionManager::new(test_settings());
    manager.register_backend(backend.clone());

    let report = manager.recover(&[]).await;
    assert!(report.orphans_killed.is_empty());
    assert!(report.reattached.is_empty());
    assert_eq!(backend.attach_count(), 0);
}
