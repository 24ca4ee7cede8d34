//! Integration tests for the plugin lifecycle: upload, activate,
//! deactivate, remove and restart.

use std::time::{Duration, Instant};

use loom_plugins::{ErrorKind, PluginError, PluginId};
use loom_test::{Fixture, TestHost, setup_test_logging};
use serde_json::json;

#[tokio::test]
async fn test_upload_registers_inactive_record() {
    setup_test_logging("loom_plugins=debug");
    let host = TestHost::new().await;

    let record = host.upload(Fixture::Echo).await;
    assert!(!record.active);
    assert_eq!(record.name, "echo");
    assert!(record.artifact.starts_with(host.artifact_dir()));
    assert!(record.artifact.exists());
    assert!(!host.registry.is_active(record.id));
    assert_eq!(host.loader().load_count(), 0);
}

#[tokio::test]
async fn test_upload_rejects_unloadable_artifact() {
    let host = TestHost::new().await;

    let err = host
        .registry
        .upload(b"not a plugin".to_vec(), "junk")
        .await
        .unwrap_err();
    assert!(matches!(err, PluginError::LoadFailed { .. }));
    assert!(host.registry.list().await.unwrap().is_empty());
    assert_eq!(std::fs::read_dir(host.artifact_dir()).map_or(0, Iterator::count), 0);
}

#[tokio::test]
async fn test_activate_adopts_self_reported_name() {
    let host = TestHost::new().await;
    let record = host.upload(Fixture::Adder).await;

    let activated = host.registry.activate(record.id).await.unwrap();
    assert!(activated.active);
    assert_eq!(activated.name, "Calculator Plugin");
    assert_eq!(activated.description, "Adds numbers");
    assert!(host.registry.is_active(record.id));
    assert_eq!(
        host.hooks().events(),
        vec!["context:Calculator Plugin", "activate:Calculator Plugin"]
    );

    let stored = host.registry.get(record.id).await.unwrap();
    assert!(stored.active);
    assert_eq!(stored.name, "Calculator Plugin");
}

#[tokio::test]
async fn test_activate_twice_is_invalid_state() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    let err = host.registry.activate(id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(host.hooks().count("activate:Echo Plugin"), 1);
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let host = TestHost::new().await;
    let id = PluginId::new();

    assert_eq!(host.registry.activate(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(host.registry.deactivate(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(host.registry.remove(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(host.registry.get(id).await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        host.registry.invoke(id, "echo", vec![json!("x")]).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_failed_activation_leaves_record_untouched() {
    let host = TestHost::new().await;
    let record = host.upload(Fixture::FailingActivate).await;

    let err = host.registry.activate(record.id).await.unwrap_err();
    assert!(matches!(err, PluginError::LoadFailed { ref message, .. } if message.contains("refusing to activate")));
    assert!(!host.registry.is_active(record.id));

    let stored = host.registry.get(record.id).await.unwrap();
    assert!(!stored.active);
    assert_eq!(stored.name, "failing-activate");
}

#[tokio::test]
async fn test_ambiguous_method_table_fails_to_load() {
    let host = TestHost::new().await;
    let record = host.upload(Fixture::OverloadClash).await;

    let err = host.registry.activate(record.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoadFailure);
    assert!(err.to_string().contains("add"));
}

#[tokio::test]
async fn test_deactivate_runs_hook_and_blocks_calls() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    let record = host.registry.deactivate(id).await.unwrap();
    assert!(!record.active);
    assert!(!host.registry.is_active(id));
    assert_eq!(host.hooks().count("deactivate:Echo Plugin"), 1);

    let err = host.registry.invoke(id, "echo", vec![json!("x")]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    let err = host.registry.deactivate(id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_failed_deactivation_save_keeps_plugin_serving() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    host.fail_saves(true);
    let err = host.registry.deactivate(id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(host.registry.is_active(id));
    assert!(host.registry.get(id).await.unwrap().active);
    assert_eq!(host.hooks().count("deactivate:Echo Plugin"), 0);
    let out = host.registry.invoke(id, "echo", vec![json!("still here")]).await.unwrap();
    assert_eq!(out, json!("still here"));

    host.fail_saves(false);
    assert!(!host.registry.deactivate(id).await.unwrap().active);
    assert!(!host.registry.get(id).await.unwrap().active);
    assert!(!host.registry.is_active(id));
    assert_eq!(host.hooks().count("deactivate:Echo Plugin"), 1);
}

#[tokio::test]
async fn test_reactivation_gets_a_fresh_instance() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;
    host.registry.deactivate(id).await.unwrap();
    host.registry.activate(id).await.unwrap();

    assert_eq!(host.loader().load_count(), 2);
    assert_eq!(host.hooks().count("activate:Echo Plugin"), 2);
    let out = host.registry.invoke(id, "echo", vec![json!("again")]).await.unwrap();
    assert_eq!(out, json!("again"));
}

#[tokio::test]
async fn test_deactivate_waits_for_in_flight_calls() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    let started = Instant::now();
    let registry = host.registry.clone();
    let call = tokio::spawn(async move { registry.invoke(id, "sleep", vec![json!(300)]).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    host.registry.deactivate(id).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(call.await.unwrap().unwrap(), json!(300));
    assert_eq!(host.hooks().count("deactivate:Echo Plugin"), 1);
}

#[tokio::test]
async fn test_remove_requires_deactivation() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;
    let artifact = host.registry.get(id).await.unwrap().artifact;

    let err = host.registry.remove(id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    host.registry.deactivate(id).await.unwrap();
    let removed = host.registry.remove(id).await.unwrap();
    assert_eq!(removed.id, id);
    assert!(!artifact.exists());
    assert_eq!(host.registry.get(id).await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_orders_by_upload() {
    let host = TestHost::new().await;
    let first = host.upload(Fixture::Echo).await;
    let second = host.upload(Fixture::Adder).await;

    let ids: Vec<_> = host.registry.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);
}

#[tokio::test]
async fn test_restart_reloads_active_plugins_only() {
    let mut host = TestHost::new().await;
    let active = host.upload_active(Fixture::Echo).await;
    let inactive = host.upload(Fixture::Adder).await.id;

    let report = host.restart().await;
    assert_eq!(report.reloaded, vec![active]);
    assert!(report.deactivated.is_empty());
    assert!(host.registry.is_active(active));
    assert!(!host.registry.is_active(inactive));

    let out = host.registry.invoke(active, "echo", vec![json!("back")]).await.unwrap();
    assert_eq!(out, json!("back"));
}

#[tokio::test]
async fn test_restart_marks_missing_artifact_inactive() {
    let mut host = TestHost::new().await;
    let healthy = host.upload_active(Fixture::Echo).await;
    let broken = host.upload_active(Fixture::Adder).await;
    let artifact = host.registry.get(broken).await.unwrap().artifact;
    std::fs::remove_file(&artifact).unwrap();

    let report = host.restart().await;
    assert_eq!(report.reloaded, vec![healthy]);
    assert_eq!(report.deactivated.len(), 1);
    assert_eq!(report.deactivated[0].0, broken);

    assert!(!host.registry.get(broken).await.unwrap().active);
    assert!(!host.registry.is_active(broken));
    assert!(host.registry.is_active(healthy));
}

#[tokio::test]
async fn test_shutdown_keeps_records_active() {
    let host = TestHost::new().await;
    let id = host.upload_active(Fixture::Echo).await;

    host.registry.shutdown().await;
    assert!(host.registry.active_ids().is_empty());
    assert!(host.registry.get(id).await.unwrap().active);
    assert_eq!(host.hooks().count("deactivate:Echo Plugin"), 1);
}
