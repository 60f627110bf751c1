// event.rs — Storage-change trigger events.
//
// Two input shapes are accepted:
//
//   {"bucket": "my-source-bucket", "key": "report.xlsx"}
//
//   {"Records": [{"eventName": "ObjectCreated:Put",
//                 "s3": {"bucket": {"name": "my-source-bucket"},
//                        "object": {"key": "incoming/q3+report.xlsx"}}}]}
//
// Keys in notification records are URL-encoded with '+' for spaces. Keys in
// the bare shape are taken verbatim.

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

const DEFAULT_EVENT_NAME: &str = "ObjectCreated:Put";

/// A storage-change notification: which object in which bucket changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub bucket: String,
    pub key: String,
    #[serde(default = "default_event_name")]
    pub event_name: String,
}

fn default_event_name() -> String {
    DEFAULT_EVENT_NAME.to_string()
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            event_name: default_event_name(),
        }
    }

    /// Whether this event means the object now has (new) content.
    pub fn is_object_created(&self) -> bool {
        self.event_name.starts_with("ObjectCreated")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TriggerDocument {
    Notification {
        #[serde(rename = "Records")]
        records: Vec<NotificationRecord>,
    },
    Direct(StorageEvent),
}

#[derive(Deserialize)]
struct NotificationRecord {
    #[serde(rename = "eventName", default = "default_event_name")]
    event_name: String,
    s3: NotificationEntity,
}

#[derive(Deserialize)]
struct NotificationEntity {
    bucket: NamedBucket,
    object: NamedObject,
}

#[derive(Deserialize)]
struct NamedBucket {
    name: String,
}

#[derive(Deserialize)]
struct NamedObject {
    key: String,
}

/// Parse a trigger document into the object-created events it carries.
///
/// Records for other event kinds (deletes, restores) are dropped, so the
/// result may be empty.
pub fn parse_events(json: &str) -> Result<Vec<StorageEvent>, StorageError> {
    let document: TriggerDocument = serde_json::from_str(json)?;

    let events = match document {
        TriggerDocument::Direct(event) => vec![event],
        TriggerDocument::Notification { records } => records
            .into_iter()
            .map(|record| {
                Ok(StorageEvent {
                    bucket: record.s3.bucket.name,
                    key: decode_key(&record.s3.object.key)?,
                    event_name: record.event_name,
                })
            })
            .collect::<Result<Vec<_>, StorageError>>()?,
    };

    let total = events.len();
    let created: Vec<StorageEvent> = events
        .into_iter()
        .filter(StorageEvent::is_object_created)
        .collect();
    if created.len() < total {
        tracing::debug!(
            skipped = total - created.len(),
            "dropped non-create storage events"
        );
    }
    Ok(created)
}

fn decode_key(raw: &str) -> Result<String, StorageError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|_| StorageError::InvalidKey {
            key: raw.to_string(),
        })
}
