use flowver_core::logging_facility::test_capture::init_test_capture;
use flowver_core_types::schema::{EVENT_END, EVENT_END_ERROR, EVENT_START};
use flowver_core_types::RequestContext;
use flowver_engine::{PublishOptions, VersionService, VersioningConfig};
use serde_json::json;
use tempfile::TempDir;

#[test]
fn test_operations_emit_start_and_end_once() {
    let capture = init_test_capture();
    let dir = TempDir::new().unwrap();
    let service =
        VersionService::open(&VersioningConfig::with_db_path(dir.path().join("log.db"))).unwrap();
    let ctx = RequestContext::new().with_actor("alice");

    let flow = service
        .create_artifact(&ctx, "logged", Some(&json!({"nodes": [{"id": "a"}]})))
        .unwrap();
    service
        .publish_version(&ctx, &flow.id, &PublishOptions::default())
        .unwrap();

    let events: Vec<_> = capture
        .events_for_op("publish_version")
        .into_iter()
        .filter(|e| e.field("artifact_id") == Some(flow.id.as_str()))
        .collect();
    let kinds: Vec<_> = events.iter().filter_map(|e| e.event.clone()).collect();
    assert_eq!(kinds, vec![EVENT_START.to_string(), EVENT_END.to_string()]);
    assert!(events[1].field("duration_ms").is_some());
    assert_eq!(
        events[0].field("request_id"),
        Some(ctx.request_id.to_string().as_str())
    );
}

#[test]
fn test_failed_operation_emits_end_error_with_code() {
    let capture = init_test_capture();
    let dir = TempDir::new().unwrap();
    let service =
        VersionService::open(&VersioningConfig::with_db_path(dir.path().join("log.db"))).unwrap();
    let ctx = RequestContext::new();
    let flow = service.create_artifact(&ctx, "no-draft", None).unwrap();

    service
        .publish_version(&ctx, &flow.id, &PublishOptions::default())
        .unwrap_err();

    let events: Vec<_> = capture
        .events_for_op("publish_version")
        .into_iter()
        .filter(|e| e.field("artifact_id") == Some(flow.id.as_str()))
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event.as_deref(), Some(EVENT_END_ERROR));
    assert!(events[1].field("err_code").is_some());
}
