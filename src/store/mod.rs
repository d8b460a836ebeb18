/// Content store
///
/// The store owns every document, exam and blog post. Clients see it through
/// live subscriptions that deliver the whole collection, newest first, on
/// every change, plus plain insert/update/delete writes.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryContentStore;
pub use sqlite::SqliteContentStore;

use crate::{
    error::{PanelError, PanelResult},
    models::{Collection, StoredRecord},
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::watch;

/// Stream of full snapshots for one collection
pub type SnapshotStream = BoxStream<'static, PanelResult<Vec<StoredRecord>>>;

/// Document store backend
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Open a live subscription ordered by `createdAt` descending.
    ///
    /// The current snapshot is delivered first, then a new one after every
    /// change. Dropping the stream releases the subscription.
    async fn subscribe(&self, collection: Collection) -> PanelResult<SnapshotStream>;

    /// Insert a record and return its store-assigned id
    async fn insert(&self, collection: Collection, fields: Map<String, Value>) -> PanelResult<String>;

    /// Merge `patch` into an existing record
    async fn update(&self, collection: Collection, id: &str, patch: Map<String, Value>) -> PanelResult<()>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&self, collection: Collection, id: &str) -> PanelResult<()>;
}

type SnapshotSlot = Option<Result<Arc<Vec<StoredRecord>>, String>>;

/// Fan-out of full snapshots to every subscriber of a collection.
///
/// Only the latest snapshot is kept; a slow subscriber skips intermediate
/// ones and still ends up on the newest state.
pub(crate) struct SnapshotHub {
    documents: watch::Sender<SnapshotSlot>,
    exams: watch::Sender<SnapshotSlot>,
    blogs: watch::Sender<SnapshotSlot>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self {
            documents: watch::Sender::new(None),
            exams: watch::Sender::new(None),
            blogs: watch::Sender::new(None),
        }
    }

    fn channel(&self, collection: Collection) -> &watch::Sender<SnapshotSlot> {
        match collection {
            Collection::Documents => &self.documents,
            Collection::Exams => &self.exams,
            Collection::Blogs => &self.blogs,
        }
    }

    /// Whether the latest published state is a usable snapshot
    pub fn has_snapshot(&self, collection: Collection) -> bool {
        matches!(*self.channel(collection).borrow(), Some(Ok(_)))
    }

    pub fn publish(&self, collection: Collection, records: Vec<StoredRecord>) {
        self.channel(collection)
            .send_replace(Some(Ok(Arc::new(records))));
    }

    pub fn publish_error(&self, collection: Collection, message: String) {
        self.channel(collection).send_replace(Some(Err(message)));
    }

    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.channel(collection).receiver_count()
    }

    pub fn subscribe(&self, collection: Collection) -> SnapshotStream {
        let mut rx = self.channel(collection).subscribe();
        rx.mark_changed();

        stream::unfold(rx, |mut rx| async move {
            loop {
                rx.changed().await.ok()?;
                let slot = rx.borrow_and_update().clone();
                match slot {
                    Some(Ok(records)) => return Some((Ok(records.as_ref().clone()), rx)),
                    Some(Err(message)) => {
                        return Some((Err(PanelError::Subscription(message)), rx))
                    }
                    None => continue,
                }
            }
        })
        .boxed()
    }
}

/// Newest first; ties keep the later write first
pub(crate) fn sort_newest_first(records: &mut [(u64, StoredRecord)]) {
    records.sort_by(|(seq_a, a), (seq_b, b)| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| seq_b.cmp(seq_a))
    });
}
