//! Integration tests for the collection store on a real file system.
//!
//! These tests go through `tokio::fs` and OS change notifications, so they
//! poll with generous timeouts instead of relying on exact event timing.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use courier_application::{StoreConfig, StoreEvent};
use courier_domain::persistence::{HttpMethod, RequestBody};
use courier_domain::{Environment, NodeId, SavedRequest};
use courier_infrastructure::{FsRequestStore, open_request_store};
use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio::sync::broadcast;

fn store() -> FsRequestStore {
    open_request_store(
        StoreConfig::default()
            .with_debounce(Duration::from_millis(50))
            .with_settle_window(Duration::from_secs(5)),
    )
}

fn request_yaml(name: &str, url: &str) -> String {
    format!("version: 1\nname: {name}\nmethod: GET\nurl: {url}\n")
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

async fn next_refresh(
    events: &mut broadcast::Receiver<StoreEvent>,
    wait: Duration,
) -> Option<Vec<NodeId>> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(StoreEvent::Refreshed { paths })) => return Some(paths),
            Ok(Ok(_)) => {}
            Ok(Err(_)) | Err(_) => return None,
        }
    }
}

fn write_file(path: &Path, contents: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn test_create_layout_on_disk() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let root = temp_dir.path().join("demo-api");

    let handle = store().create_collection(&root, "Demo API").await.unwrap();

    assert!(root.join("collection.yaml").is_file());
    assert!(root.join("environments").is_dir());
    let contents = std::fs::read_to_string(root.join("collection.yaml")).unwrap();
    assert!(contents.contains("name: Demo API"));
    handle.close().await;
}

#[tokio::test]
async fn test_round_trip_through_reopen() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("demo");
    let store = store();

    let handle = store.create_collection(&root, "Demo").await.unwrap();
    let folder = handle.create_folder(&NodeId::root(), "Users").await.unwrap();
    let mut request = SavedRequest::new("Create User", "{{base}}/users")
        .with_header("Content-Type", "application/json")
        .with_query("dry_run", "true")
        .with_body(RequestBody::text("name={{user}}"));
    request.method = HttpMethod::Post;
    let request_id = handle.create_request(&folder, request.clone()).await.unwrap();
    let env_id = handle
        .save_environment(Environment::new("dev").with_variable("base", "https://dev.example.com"))
        .await
        .unwrap();
    handle.close().await;

    let reopened = store.open_collection(&root).await.unwrap();
    assert!(reopened.warnings().is_empty());
    assert_eq!(reopened.collection().name, "Demo");
    assert_eq!(reopened.get_request(&request_id).unwrap(), request);
    assert_eq!(
        reopened.list_environments(),
        vec![(
            env_id,
            Environment::new("dev").with_variable("base", "https://dev.example.com")
        )]
    );
    let children = reopened.list_children(&NodeId::root()).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name(), "Users");
    reopened.close().await;
}

#[tokio::test]
async fn test_partial_load_reports_invalid_files() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("demo");
    let store = store();
    store.create_collection(&root, "Demo").await.unwrap().close().await;

    for i in 0..10 {
        write_file(
            &root.join(format!("r{i:02}.request.yaml")),
            &request_yaml(&format!("request {i}"), "https://example.com"),
        );
    }
    write_file(&root.join("broken.request.yaml"), "version: 1\nname: [unclosed\n");

    let handle = store.open_collection(&root).await.unwrap();

    assert_eq!(handle.list_requests(&NodeId::root()).unwrap().len(), 10);
    let warnings = handle.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].path, root.join("broken.request.yaml"));
    assert_eq!(handle.check_integrity().len(), 0);
    handle.close().await;
}

#[tokio::test]
async fn test_leftover_temp_file_is_ignored() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("demo");
    let store = store();
    let handle = store.create_collection(&root, "Demo").await.unwrap();
    let request_id = handle
        .create_request(&NodeId::root(), SavedRequest::new("ping", "https://a"))
        .await
        .unwrap();
    handle.close().await;

    // A crash between write and rename leaves a hidden temp file behind.
    let target = root.join("ping.request.yaml");
    let before = std::fs::read(&target).unwrap();
    write_file(
        &root.join(".ping.request.yaml.0192a3b4.tmp"),
        "version: 1\nname: ping\nurl: https://half-writ",
    );

    let handle = store.open_collection(&root).await.unwrap();
    assert!(handle.warnings().is_empty());
    assert_eq!(handle.list_requests(&NodeId::root()).unwrap().len(), 1);
    assert_eq!(handle.get_request(&request_id).unwrap().url, "https://a");
    assert_eq!(std::fs::read(&target).unwrap(), before);
    handle.close().await;
}

#[tokio::test]
async fn test_external_edit_is_picked_up() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("demo");
    let handle = store().create_collection(&root, "Demo").await.unwrap();
    let request_id = handle
        .create_request(&NodeId::root(), SavedRequest::new("ping", "https://before"))
        .await
        .unwrap();
    // Let the echo of our own write drain.
    tokio::time::sleep(Duration::from_millis(300)).await;

    write_file(
        &root.join("ping.request.yaml"),
        &request_yaml("ping", "https://after"),
    );
    assert!(
        wait_until(|| {
            handle
                .get_request(&request_id)
                .is_ok_and(|request| request.url == "https://after")
        })
        .await
    );

    write_file(
        &root.join("extra/health.request.yaml"),
        &request_yaml("health", "https://health"),
    );
    assert!(wait_until(|| handle.find_request_by_name("health").is_some()).await);

    std::fs::remove_file(root.join("ping.request.yaml")).unwrap();
    assert!(wait_until(|| handle.get_request(&request_id).is_err()).await);

    handle.close().await;
    assert!(!handle.is_watching());
}

#[tokio::test]
async fn test_burst_larger_than_event_channel_is_fully_indexed() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("demo");
    let store = open_request_store(
        StoreConfig::default()
            .with_debounce(Duration::from_millis(50))
            .with_event_capacity(1),
    );
    let handle = store.create_collection(&root, "Demo").await.unwrap();

    for i in 0..60 {
        write_file(
            &root.join(format!("bulk/r{i:02}.request.yaml")),
            &request_yaml(&format!("r{i:02}"), "https://example.com"),
        );
    }

    let bulk = NodeId::parse("bulk").unwrap();
    assert!(
        wait_until(|| handle
            .list_requests(&bulk)
            .is_ok_and(|requests| requests.len() == 60))
        .await
    );
    handle.close().await;
}

#[tokio::test]
async fn test_own_writes_do_not_refresh() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("demo");
    let handle = store().create_collection(&root, "Demo").await.unwrap();
    let mut events = handle.subscribe();

    let request_id = handle
        .create_request(&NodeId::root(), SavedRequest::new("ping", "https://a"))
        .await
        .unwrap();
    let mut request = handle.get_request(&request_id).unwrap();
    request.url = "https://b".to_string();
    handle.save_request(&request_id, request).await.unwrap();

    assert_eq!(next_refresh(&mut events, Duration::from_millis(600)).await, None);
    assert_eq!(handle.get_request(&request_id).unwrap().url, "https://b");
    handle.close().await;
}

#[tokio::test]
async fn test_resolve_against_files() {
    let temp_dir = tempdir().unwrap();
    let root = temp_dir.path().join("demo");
    let handle = store().create_collection(&root, "Demo").await.unwrap();
    write_file(
        &root.join("environments/staging.yaml"),
        "version: 1\nname: staging\nvariables:\n  - key: base\n    value: https://staging\n",
    );
    write_file(
        &root.join("me.request.yaml"),
        &request_yaml("me", "\"{{base}}/me/{{id}}\""),
    );
    assert!(wait_until(|| handle.list_environments().len() == 1).await);
    assert!(wait_until(|| handle.find_request_by_name("me").is_some()).await);

    let (env_id, _) = handle.list_environments().remove(0);
    handle.set_active_environment(Some(env_id)).unwrap();
    let (request_id, _) = handle.find_request_by_name("me").unwrap();
    let resolved = handle
        .resolved_request(
            &request_id,
            BTreeMap::from([("id".to_string(), "42".to_string())]),
        )
        .unwrap();

    assert_eq!(resolved.url, "https://staging/me/42");
    handle.close().await;
}
