// handle.rs — Process one trigger document.
//
// Every object-created record in the document is handled in order, one at a
// time. Each gets a JSON result line on stdout. If any record failed, the
// invocation fails after all records have been attempted.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use bp_publish::{Pipeline, PipelineError, PipelineOutcome};
use bp_storage::{parse_events, StorageEvent};

pub async fn execute(pipeline: Pipeline, source: &str) -> Result<()> {
    let document = read_document(source)?;
    let events = parse_events(&document).context("parsing trigger document")?;
    if events.is_empty() {
        tracing::info!("trigger carried no object-created events");
        return Ok(());
    }

    let pipeline = Arc::new(pipeline);
    let mut failures = 0usize;
    for event in events {
        let p = Arc::clone(&pipeline);
        let handled = event.clone();
        let result = tokio::task::spawn_blocking(move || p.handle(&handled))
            .await
            .context("publish task panicked")?;

        println!("{}", result_line(&event, &result));
        if let Err(e) = result {
            tracing::error!(bucket = %event.bucket, key = %event.key, error = %e, "event failed");
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{} event(s) failed", failures);
    }
    Ok(())
}

fn read_document(source: &str) -> Result<String> {
    if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading trigger from stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading trigger {}", source))
    }
}

fn result_line(
    event: &StorageEvent,
    result: &Result<PipelineOutcome, PipelineError>,
) -> serde_json::Value {
    match result {
        Ok(PipelineOutcome::Ignored) => json!({
            "bucket": event.bucket,
            "key": event.key,
            "outcome": "ignored",
        }),
        Ok(PipelineOutcome::Published(commit)) => json!({
            "bucket": event.bucket,
            "key": event.key,
            "outcome": if commit.created { "published" } else { "unchanged" },
            "commit": commit,
        }),
        Err(e) => json!({
            "bucket": event.bucket,
            "key": event.key,
            "outcome": "failed",
            "kind": error_kind(e),
            "error": e.to_string(),
        }),
    }
}

fn error_kind(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::Storage(_) => "storage",
        PipelineError::Credential(_) => "credential",
        PipelineError::Publish(e) => e.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bp_publish::{CommitRef, PublishError};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reads_document_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("event.json");
        fs::write(&path, r#"{"bucket": "b", "key": "k"}"#).unwrap();
        let doc = read_document(path.to_str().unwrap()).unwrap();
        assert_eq!(parse_events(&doc).unwrap(), vec![StorageEvent::new("b", "k")]);
    }

    #[test]
    fn missing_document_is_an_error() {
        assert!(read_document("/nonexistent/event.json").is_err());
    }

    #[test]
    fn result_lines_describe_outcomes() {
        let event = StorageEvent::new("b", "report.csv");
        let commit = CommitRef {
            commit_id: "abc".to_string(),
            branch: "main".to_string(),
            created: false,
            content_sha256: "00".to_string(),
        };

        let line = result_line(&event, &Ok(PipelineOutcome::Published(commit)));
        assert_eq!(line["outcome"], "unchanged");
        assert_eq!(line["commit"]["commit_id"], "abc");

        let line = result_line(&event, &Ok(PipelineOutcome::Ignored));
        assert_eq!(line["outcome"], "ignored");

        let err = PipelineError::Publish(PublishError::PushRejected("protected".to_string()));
        let line = result_line(&event, &Err(err));
        assert_eq!(line["outcome"], "failed");
        assert_eq!(line["kind"], "push_rejected");
    }
}
