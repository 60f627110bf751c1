// watch.rs — Local bucket watcher.
//
// Watches `<root>/<bucket>` with notify. A create/modify of the configured
// key arms a settle timer; further writes push it back. When the object has
// been quiet for the settle period, one publish runs. Publishes never
// overlap: events that arrive mid-publish are picked up afterwards and, if
// the content didn't change again, end in a no-op.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;

use bp_publish::{Pipeline, PipelineOutcome};
use bp_storage::StorageEvent;

pub struct WatchOptions {
    pub settle: Duration,
    pub publish_on_start: bool,
}

pub async fn execute(
    pipeline: Arc<Pipeline>,
    bucket_dir: PathBuf,
    options: WatchOptions,
) -> Result<()> {
    std::fs::create_dir_all(&bucket_dir)
        .with_context(|| format!("creating bucket directory {}", bucket_dir.display()))?;
    let bucket_dir = bucket_dir
        .canonicalize()
        .with_context(|| format!("resolving {}", bucket_dir.display()))?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = tx.send(res);
    })
    .context("starting file watcher")?;
    watcher
        .watch(&bucket_dir, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", bucket_dir.display()))?;

    tracing::info!(dir = %bucket_dir.display(), key = pipeline.key(), "watching bucket");

    if options.publish_on_start && bucket_dir.join(pipeline.key()).is_file() {
        publish_once(&pipeline).await;
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut pending: Option<Instant> = None;

    loop {
        let due = pending;
        let settle = async move {
            match due {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down watcher");
                break;
            }
            msg = rx.recv() => match msg {
                Some(Ok(event)) => {
                    if touches_key(&event, &bucket_dir, pipeline.key()) {
                        tracing::debug!(kind = ?event.kind, "object changed; waiting to settle");
                        pending = Some(Instant::now() + options.settle);
                    }
                }
                Some(Err(e)) => tracing::warn!(error = %e, "watch error"),
                None => break,
            },
            _ = settle => {
                pending = None;
                publish_once(&pipeline).await;
            }
        }
    }

    Ok(())
}

async fn publish_once(pipeline: &Arc<Pipeline>) {
    let event = StorageEvent::new(pipeline.bucket(), pipeline.key());
    let p = Arc::clone(pipeline);
    match tokio::task::spawn_blocking(move || p.handle(&event)).await {
        Ok(Ok(PipelineOutcome::Published(commit))) if commit.created => {
            tracing::info!(commit = %commit.commit_id, "published change");
        }
        Ok(Ok(PipelineOutcome::Published(_))) => {
            tracing::info!("object unchanged since last publish");
        }
        Ok(Ok(PipelineOutcome::Ignored)) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "publish failed"),
        Err(e) => tracing::error!(error = %e, "publish task panicked"),
    }
}

fn touches_key(event: &notify::Event, bucket_dir: &Path, key: &str) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .filter_map(|path| object_key(bucket_dir, path))
            .any(|k| k == key)
}

/// Object key of `path` inside `bucket_dir`, `/`-separated.
fn object_key(bucket_dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(bucket_dir).ok()?;
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
