use flowver_core::errors::ExErrorKind;
use flowver_core::model::{Channel, ExecutionOutcome, Selector};
use flowver_core_types::RequestContext;
use flowver_engine::{
    PointerKind, PublishOptions, ResolveContext, VersionService, VersioningConfig,
};
use flowver_store::active::{self, SwitchOutcome};
use flowver_store::metrics::ExecutionRecord;
use flowver_store::versions::Pagination;
use flowver_store::NoopPolicy;
use serde_json::{json, Value};
use tempfile::TempDir;

fn service() -> (TempDir, VersionService) {
    let dir = TempDir::new().unwrap();
    let config = VersioningConfig::with_db_path(dir.path().join("flowver.db"));
    let service = VersionService::open(&config).unwrap();
    (dir, service)
}

fn ctx() -> RequestContext {
    RequestContext::new().with_actor("alice")
}

fn graph(nodes: &[&str]) -> Value {
    json!({
        "nodes": nodes.iter().map(|id| json!({"id": id, "data": {"label": id}})).collect::<Vec<_>>(),
        "edges": [],
    })
}

/// Save `payload` as the draft and publish it
fn publish_draft(service: &VersionService, artifact_id: &str, payload: &Value) -> String {
    service.save_draft(&ctx(), artifact_id, payload).unwrap();
    service
        .publish_version(&ctx(), artifact_id, &PublishOptions::default())
        .unwrap()
        .into_snapshot()
        .header
        .id
}

#[test]
fn test_full_lifecycle_through_service() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "support-bot", None).unwrap();

    let v1 = publish_draft(&service, &flow.id, &graph(&["A"]));
    let artifact = service.get_artifact(&flow.id).unwrap();
    assert_eq!(artifact.version_count, 1);
    assert!(artifact.is_draft);

    service.set_active_version(&ctx(), &flow.id, &v1).unwrap();
    assert!(!service.get_artifact(&flow.id).unwrap().is_draft);

    let v2 = publish_draft(&service, &flow.id, &graph(&["A", "X"]));
    service.set_active_version(&ctx(), &flow.id, &v2).unwrap();

    let diff = service
        .compare_versions(&flow.id, &Selector::ExactId(v1.clone()), &Selector::ExactId(v2.clone()))
        .unwrap();
    assert_eq!(diff.added_nodes, vec!["X".to_string()]);
    assert!(diff.removed_nodes.is_empty());
    assert!(!diff.summary.is_empty());

    let record = service.rollback_to_version(&ctx(), &flow.id, &v1).unwrap();
    assert!(record.is_rollback);
    assert_eq!(record.previous_version_id.as_deref(), Some(v2.as_str()));
    assert_eq!(record.actor.as_deref(), Some("alice"));

    let active = service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();
    assert_eq!(active.snapshot().unwrap().id(), v1);
    assert_eq!(service.get_version_metrics(&v1).unwrap().rollback_count, 1);
    assert_eq!(service.get_artifact(&flow.id).unwrap().version_count, 2);
}

#[test]
fn test_no_stale_active_after_switch() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let ids: Vec<String> = (0..5)
        .map(|i| publish_draft(&service, &flow.id, &graph(&[&format!("n{}", i)])))
        .collect();

    for id in ids.iter().chain(ids.iter().rev()) {
        if service.get_artifact(&flow.id).unwrap().active_version_id.as_deref() == Some(id) {
            continue;
        }
        service.set_active_version(&ctx(), &flow.id, id).unwrap();
        // Warm the cache, then switch again on the next iteration
        for _ in 0..3 {
            let resolved = service
                .resolve(&flow.id, &Selector::Active, ResolveContext::ExternalTrigger)
                .unwrap();
            assert_eq!(resolved.snapshot().unwrap().id(), id);
            assert!(resolved.snapshot().unwrap().is_active());
        }
    }
    assert!(service.cache().stats().pointer_hits > 0);
}

#[test]
fn test_rollback_after_warm_cache_resolves_target() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let v1 = publish_draft(&service, &flow.id, &graph(&["A"]));
    let v2 = publish_draft(&service, &flow.id, &graph(&["A", "B"]));
    service.set_active_version(&ctx(), &flow.id, &v2).unwrap();

    for _ in 0..2 {
        let warm = service
            .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
            .unwrap();
        assert_eq!(warm.snapshot().unwrap().id(), v2);
    }

    service.rollback_to_version(&ctx(), &flow.id, &v1).unwrap();
    let after = service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();
    assert_eq!(after.snapshot().unwrap().id(), v1);
    assert!(after.snapshot().unwrap().is_active());
}

#[test]
fn test_store_switch_needs_explicit_invalidation() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let v1 = publish_draft(&service, &flow.id, &graph(&["A"]));
    let v2 = publish_draft(&service, &flow.id, &graph(&["A", "B"]));
    service.set_active_version(&ctx(), &flow.id, &v1).unwrap();
    let warm = service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();
    assert_eq!(warm.snapshot().unwrap().id(), v1);

    // Switch underneath the service, the way an external maintenance job would
    let mut conn = service.database().connect().unwrap();
    active::set_active(&mut conn, &flow.id, &v2, Some("ops")).unwrap();

    service.cache().invalidate_pointer(&flow.id, PointerKind::Active);
    service.cache().invalidate_pointer(&flow.id, PointerKind::Latest);
    let fresh = service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();
    assert_eq!(fresh.snapshot().unwrap().id(), v2);
}

#[test]
fn test_latest_tracks_publishes() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    publish_draft(&service, &flow.id, &graph(&["A"]));
    let first = service
        .resolve(&flow.id, &Selector::Latest, ResolveContext::Production)
        .unwrap();
    assert_eq!(first.snapshot().unwrap().version_number(), 1);

    publish_draft(&service, &flow.id, &graph(&["A", "B"]));
    let second = service
        .resolve(&flow.id, &Selector::Latest, ResolveContext::Production)
        .unwrap();
    assert_eq!(second.snapshot().unwrap().version_number(), 2);
}

#[test]
fn test_publish_and_activate_invalidates_active() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", Some(&graph(&["A"]))).unwrap();
    let options = PublishOptions {
        activate: true,
        ..PublishOptions::default()
    };
    let v1 = service
        .publish_version(&ctx(), &flow.id, &options)
        .unwrap()
        .into_snapshot();
    assert!(v1.is_active());
    service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();

    service.save_draft(&ctx(), &flow.id, &graph(&["A", "B"])).unwrap();
    let v2 = service
        .publish_version(&ctx(), &flow.id, &options)
        .unwrap()
        .into_snapshot();

    let active = service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();
    assert_eq!(active.snapshot().unwrap().id(), v2.id());
}

#[test]
fn test_publish_without_draft_is_invalid() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let err = service
        .publish_version(&ctx(), &flow.id, &PublishOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidVersionOperation);
    assert_eq!(err.op(), Some("publish_version"));
    assert!(err.request_id().is_some());
}

#[test]
fn test_noop_publish_policies() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let v1 = publish_draft(&service, &flow.id, &graph(&["A"]));

    let again = service
        .publish_version(&ctx(), &flow.id, &PublishOptions::default())
        .unwrap();
    assert!(!again.is_created());
    assert_eq!(again.snapshot().id(), v1);
    assert_eq!(service.get_artifact(&flow.id).unwrap().version_count, 1);

    let mut config = VersioningConfig::with_db_path(service.database().config().path.clone());
    config.publish.noop_policy = NoopPolicy::Reject;
    let strict = VersionService::open(&config).unwrap();
    let err = strict
        .publish_version(&ctx(), &flow.id, &PublishOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidVersionOperation);
}

#[test]
fn test_create_draft_from_version() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let v1 = publish_draft(&service, &flow.id, &graph(&["A"]));
    service.set_active_version(&ctx(), &flow.id, &v1).unwrap();
    publish_draft(&service, &flow.id, &graph(&["A", "B"]));

    let artifact = service.create_draft_from_version(&ctx(), &flow.id, &v1).unwrap();
    assert_eq!(artifact.draft, Some(graph(&["A"])));
    assert!(artifact.is_draft);
    assert_eq!(artifact.active_version_id.as_deref(), Some(v1.as_str()));
    assert_eq!(artifact.version_count, 2);

    let draft = service
        .resolve(&flow.id, &Selector::Draft, ResolveContext::EditorPreview)
        .unwrap();
    assert!(draft.is_draft());
    let diff = service
        .compare_versions(&flow.id, &Selector::Draft, &Selector::ExactId(v1))
        .unwrap();
    assert!(diff.is_empty());
    assert_eq!(diff.summary, "No changes detected");
}

#[test]
fn test_get_version_by_identifier() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    service.save_draft(&ctx(), &flow.id, &graph(&["A"])).unwrap();
    let options = PublishOptions {
        version_tag: Some("stable".to_string()),
        changelog: Some("first cut".to_string()),
        ..PublishOptions::default()
    };
    let v1 = service
        .publish_version(&ctx(), &flow.id, &options)
        .unwrap()
        .into_snapshot();

    let simple = v1.id().replace('-', "");
    let upper = v1.id().to_uppercase();
    let braced = format!("{{{}}}", v1.id());
    let identifiers = [
        v1.id(),
        "1",
        "v1",
        "stable",
        "latest",
        simple.as_str(),
        upper.as_str(),
        braced.as_str(),
    ];
    for identifier in identifiers {
        let found = service.get_version(&flow.id, identifier).unwrap();
        assert_eq!(found.id(), v1.id(), "identifier {}", identifier);
    }
    assert_eq!(
        service.get_version(&flow.id, "v9").unwrap_err().kind(),
        ExErrorKind::VersionNotFound
    );
    assert_eq!(
        service.get_version(&flow.id, "active").unwrap_err().kind(),
        ExErrorKind::ActiveVersionNotSet
    );
    assert_eq!(
        service.get_version(&flow.id, "draft").unwrap_err().kind(),
        ExErrorKind::InvalidVersionOperation
    );
}

#[test]
fn test_annotation_updates() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let v1 = publish_draft(&service, &flow.id, &graph(&["A"]));
    service.set_active_version(&ctx(), &flow.id, &v1).unwrap();
    service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();

    let header = service
        .update_version_annotations(&ctx(), &v1, &json!({"descriptionVersion": "Q3 launch"}))
        .unwrap();
    assert_eq!(header.description_version.as_deref(), Some("Q3 launch"));

    // The cached active snapshot was invalidated with the annotation change
    let active = service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();
    assert_eq!(
        active.snapshot().unwrap().header.description_version.as_deref(),
        Some("Q3 launch")
    );

    let err = service
        .update_version_annotations(&ctx(), &v1, &json!({"payload": {}}))
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::VersionImmutable);

    let err = service
        .update_version_annotations(&ctx(), &v1, &json!({"isActive": false}))
        .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidVersionOperation);
}

#[test]
fn test_overview_history_and_activations() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", None).unwrap();
    let v1 = publish_draft(&service, &flow.id, &graph(&["A"]));
    let v2 = publish_draft(&service, &flow.id, &graph(&["B"]));
    let v3 = publish_draft(&service, &flow.id, &graph(&["C"]));
    service.set_active_version(&ctx(), &flow.id, &v2).unwrap();
    assert_eq!(
        service.set_active_version(&ctx(), &flow.id, &v2).unwrap(),
        SwitchOutcome::AlreadyActive
    );
    service.set_active_version(&ctx(), &flow.id, &v3).unwrap();
    service.rollback_to_version(&ctx(), &flow.id, &v1).unwrap();

    service.record_execution(&ExecutionRecord::new(
        &v1,
        ExecutionOutcome::Failure,
        40,
        Some(Channel::Api),
    ));

    let overview = service.get_artifact_with_versions(&flow.id).unwrap();
    let numbers: Vec<i64> = overview.versions.iter().map(|v| v.version_number).collect();
    assert_eq!(numbers, vec![3, 2, 1]);
    assert_eq!(overview.active.as_ref().unwrap().id(), v1);
    assert_eq!(overview.versions[2].error_count, 1);
    assert_eq!(overview.artifact.draft, Some(graph(&["C"])));

    let page = service
        .get_version_history(&flow.id, Pagination { before: None, limit: 2 })
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.next_before, Some(2));
    let rest = service
        .get_version_history(&flow.id, Pagination { before: page.next_before, limit: 2 })
        .unwrap();
    assert_eq!(rest.items.len(), 1);
    assert_eq!(rest.next_before, None);

    let audit = service.list_activations(&flow.id, 10).unwrap();
    let targets: Vec<&str> = audit.iter().map(|a| a.version_id.as_str()).collect();
    assert_eq!(targets, vec![v1.as_str(), v3.as_str(), v2.as_str()]);
    assert!(audit[0].is_rollback);
}

#[test]
fn test_external_trigger_may_only_use_active() {
    let (_dir, service) = service();
    let flow = service.create_artifact(&ctx(), "flow", Some(&graph(&["A"]))).unwrap();
    for selector in [Selector::Latest, Selector::Draft, Selector::ExactNumber(1)] {
        let err = service
            .resolve(&flow.id, &selector, ResolveContext::ExternalTrigger)
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidVersionOperation);
    }
}

#[test]
fn test_record_execution_never_fails() {
    let (_dir, service) = service();
    let stored = service.record_execution(&ExecutionRecord::new(
        "no-such-version",
        ExecutionOutcome::Success,
        1,
        None,
    ));
    assert!(!stored);
}
