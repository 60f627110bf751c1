//! # bp-storage
//!
//! The storage side of bucketpush: what fired, and how to read it.
//!
//! - [`StorageEvent`]: a storage-change notification reduced to bucket,
//!   key and event name. [`parse_events`] accepts either a bare
//!   `{"bucket", "key"}` object or a full notification document with a
//!   `Records` array.
//! - [`ObjectStore`]: trait for fetching object bytes by bucket and key.
//! - [`LocalObjectStore`]: buckets as directories under a root
//!   (`<root>/<bucket>/<key>`), used by the watcher and in tests.

pub mod error;
pub mod event;
pub mod store;

pub use error::StorageError;
pub use event::{parse_events, StorageEvent};
pub use store::{LocalObjectStore, ObjectStore};
