//! Command implementations.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use courier_application::index::NodeKind;
use courier_application::ports::FileStore;
use courier_application::{CollectionHandle, StoreError, StoreEvent, StoreResult};
use courier_domain::{NodeId, ResolvedRequest};
use courier_infrastructure::FsRequestStore;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Creates a collection and prints where it went.
pub async fn init(store: &FsRequestStore, path: &Path, name: Option<String>) -> StoreResult<()> {
    let name = name.unwrap_or_else(|| {
        path.file_name()
            .map_or_else(|| "collection".to_string(), |n| n.to_string_lossy().into_owned())
    });
    let handle = store.create_collection(path, &name).await?;
    println!("Created collection {name:?} at {}", path.display());
    handle.close().await;
    Ok(())
}

/// Prints the tree of a collection.
pub async fn tree(store: &FsRequestStore, path: &Path) -> StoreResult<()> {
    let handle = store.open_collection(path).await?;
    let mut out = String::new();
    let _ = writeln!(out, "{}", handle.collection().name);
    render_children(&handle, &NodeId::root(), 1, &mut out)?;

    let environments = handle.list_environments();
    if !environments.is_empty() {
        let _ = writeln!(out, "environments:");
        for (id, environment) in environments {
            let _ = writeln!(out, "  {} ({id})", environment.name);
        }
    }
    print!("{out}");

    for warning in handle.warnings() {
        eprintln!("warning: {warning}");
    }
    handle.close().await;
    Ok(())
}

fn render_children<F: FileStore>(
    handle: &CollectionHandle<F>,
    folder: &NodeId,
    depth: usize,
    out: &mut String,
) -> StoreResult<()> {
    for node in handle.list_children(folder)? {
        let indent = "  ".repeat(depth);
        match &node.kind {
            NodeKind::Folder { .. } => {
                let _ = writeln!(out, "{indent}{}/", node.name());
                render_children(handle, &node.id, depth + 1, out)?;
            }
            NodeKind::Request(request) => {
                let (method, url) = (&request.method, &request.url);
                let _ = writeln!(out, "{indent}{} [{method} {url}]", node.name());
            }
            NodeKind::Root => {}
        }
    }
    Ok(())
}

/// Prints a request with its variables substituted.
pub async fn resolve(
    store: &FsRequestStore,
    path: &Path,
    request: &str,
    environment: Option<&str>,
    overrides: BTreeMap<String, String>,
) -> StoreResult<()> {
    let handle = store.open_collection(path).await?;
    let result = resolve_in(&handle, request, environment, overrides);
    handle.close().await;

    let resolved = result?;
    print!("{}", render_request(&resolved));
    Ok(())
}

fn resolve_in<F: FileStore>(
    handle: &CollectionHandle<F>,
    request: &str,
    environment: Option<&str>,
    overrides: BTreeMap<String, String>,
) -> StoreResult<ResolvedRequest> {
    if let Some(name) = environment {
        let (id, _) = handle
            .list_environments()
            .into_iter()
            .find(|(_, env)| env.name == name)
            .ok_or_else(|| StoreError::NotFound(format!("environment {name}")))?;
        handle.set_active_environment(Some(id))?;
    }

    let id = request_id(handle, request)?;
    handle.resolved_request(&id, overrides)
}

/// Finds a request by id, falling back to its display name.
fn request_id<F: FileStore>(handle: &CollectionHandle<F>, request: &str) -> StoreResult<NodeId> {
    if let Ok(id) = NodeId::parse(request)
        && handle.get_request(&id).is_ok()
    {
        return Ok(id);
    }
    handle
        .find_request_by_name(request)
        .map(|(id, _)| id)
        .ok_or_else(|| StoreError::NotFound(request.to_string()))
}

fn render_request(request: &ResolvedRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", request.method, request.url);
    for (key, value) in &request.query {
        let _ = writeln!(out, "?{key}={value}");
    }
    for (key, value) in &request.headers {
        let _ = writeln!(out, "{key}: {value}");
    }
    if let Some(body) = &request.body {
        let _ = writeln!(out, "\n{body:#?}");
    }
    out
}

/// Prints integrity issues. Returns whether the collection is clean.
pub async fn check(store: &FsRequestStore, path: &Path) -> StoreResult<bool> {
    let handle = store.open_collection(path).await?;
    let mut issues: Vec<String> = handle.warnings().iter().map(ToString::to_string).collect();
    issues.extend(handle.check_integrity());
    handle.close().await;

    if issues.is_empty() {
        println!("No issues found");
    }
    for issue in &issues {
        println!("{issue}");
    }
    Ok(issues.is_empty())
}

/// Prints change notifications until Ctrl-C.
pub async fn watch(store: &FsRequestStore, path: &Path) -> StoreResult<()> {
    let handle = store.open_collection(path).await?;
    let mut events = handle.subscribe();
    info!(root = %path.display(), "Watching for changes, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(StoreEvent::Refreshed { paths }) => {
                    for id in paths {
                        println!("changed {id}");
                    }
                    for (id, reason) in handle.stale_nodes() {
                        println!("stale {id}: {reason}");
                    }
                }
                Ok(StoreEvent::WatcherRestarted { attempt }) => {
                    println!("watcher restarted (attempt {attempt})");
                }
                Ok(StoreEvent::WatcherStopped { reason }) => {
                    println!("watcher stopped: {reason}");
                    break;
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed change notifications"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.close().await;
    Ok(())
}
