use std::sync::Arc;
use std::thread;

use flowver_core::model::Selector;
use flowver_core_types::RequestContext;
use flowver_engine::{PublishOptions, ResolveContext, VersionService, VersioningConfig};
use flowver_store::active::count_active_flags;
use flowver_store::versions::publish;
use flowver_store::{PublishPolicy, PublishRequest};
use serde_json::json;
use tempfile::TempDir;

fn publish_nodes(service: &VersionService, artifact_id: &str, node: &str) -> String {
    let ctx = RequestContext::new();
    service
        .save_draft(&ctx, artifact_id, &json!({"nodes": [{"id": node}]}))
        .unwrap();
    service
        .publish_version(&ctx, artifact_id, &PublishOptions::default())
        .unwrap()
        .into_snapshot()
        .header
        .id
}

#[test]
fn test_switches_and_resolves_from_many_threads() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(
        VersionService::open(&VersioningConfig::with_db_path(dir.path().join("c.db"))).unwrap(),
    );
    let flow = service
        .create_artifact(&RequestContext::new(), "busy", None)
        .unwrap();
    let ids: Vec<String> = (0..4)
        .map(|i| publish_nodes(&service, &flow.id, &format!("n{}", i)))
        .collect();
    service
        .set_active_version(&RequestContext::new(), &flow.id, &ids[0])
        .unwrap();

    let mut handles = Vec::new();
    for t in 0..4 {
        let service = service.clone();
        let artifact_id = flow.id.clone();
        let ids = ids.clone();
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                let target = &ids[(t + i) % ids.len()];
                service
                    .set_active_version(&RequestContext::new(), &artifact_id, target)
                    .unwrap();
                let resolved = service
                    .resolve(&artifact_id, &Selector::Active, ResolveContext::ExternalTrigger)
                    .unwrap();
                assert!(ids.iter().any(|id| id == resolved.snapshot().unwrap().id()));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Once writers are quiet the resolver agrees with the stored pointer
    let pointer = service.get_artifact(&flow.id).unwrap().active_version_id.unwrap();
    let resolved = service
        .resolve(&flow.id, &Selector::Active, ResolveContext::Production)
        .unwrap();
    assert_eq!(resolved.snapshot().unwrap().id(), pointer);

    let conn = service.database().connect().unwrap();
    assert_eq!(count_active_flags(&conn, &flow.id).unwrap(), 1);
}

#[test]
fn test_concurrent_publishes_number_densely() {
    let dir = TempDir::new().unwrap();
    let service = Arc::new(
        VersionService::open(&VersioningConfig::with_db_path(dir.path().join("p.db"))).unwrap(),
    );
    let flow = service
        .create_artifact(&RequestContext::new(), "race", None)
        .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let service = service.clone();
            let artifact_id = flow.id.clone();
            thread::spawn(move || {
                let mut conn = service.database().connect().unwrap();
                let payload = json!({"nodes": [{"id": format!("t{}", t)}]});
                let request = PublishRequest::new(&artifact_id, &payload, "worker");
                publish(
                    &mut conn,
                    &request,
                    &PublishPolicy {
                        max_attempts: 50,
                        ..Default::default()
                    },
                )
                .unwrap()
                .into_snapshot()
                .version_number()
            })
        })
        .collect();

    let mut numbers: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=6).collect::<Vec<_>>());
    assert_eq!(service.get_artifact(&flow.id).unwrap().version_count, 6);
}
