/// Content store sync
///
/// Keeps one live subscription per collection and mirrors each snapshot into
/// a local, typed, newest-first copy. Subscription failures mark the
/// collection stale (the last good snapshot stays readable) and the
/// subscription is re-opened with capped exponential backoff.
use crate::{
    config::SyncConfig,
    error::PanelResult,
    models::{BlogPost, Collection, Document, Entity, Exam, StoredRecord},
    store::ContentStore,
};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

/// Health of one collection's subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SyncStatus {
    /// No snapshot received yet
    Connecting,
    /// Snapshot is current
    Live,
    /// Subscription failed; the snapshot is the last good one
    Stale {
        since: DateTime<Utc>,
        error: String,
        attempt: u32,
    },
}

impl SyncStatus {
    pub fn is_stale(&self) -> bool {
        matches!(self, SyncStatus::Stale { .. })
    }
}

/// Local copy of one collection
#[derive(Debug, Clone)]
pub struct CollectionView<E> {
    pub items: Arc<Vec<E>>,
    pub status: SyncStatus,
    /// Bumped on every snapshot
    pub version: u64,
}

impl<E> Default for CollectionView<E> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            status: SyncStatus::Connecting,
            version: 0,
        }
    }
}

/// Change notification for live views
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    pub collection: Collection,
    pub version: u64,
    pub status: SyncStatus,
}

/// Resubscription backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Give up after this many consecutive failures; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: None,
        }
    }
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            max_attempts: config.retry_max_attempts,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), capped
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(2_u32.pow(exponent))
            .min(self.max_delay)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.map(|max| attempt > max).unwrap_or(false)
    }
}

/// Three live subscriptions tied to the lifetime of this value
pub struct ContentSync {
    documents: watch::Receiver<CollectionView<Document>>,
    exams: watch::Receiver<CollectionView<Exam>>,
    blogs: watch::Receiver<CollectionView<BlogPost>>,
    events: broadcast::Sender<SyncEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl ContentSync {
    /// Open one subscription per collection. Must be called inside a Tokio runtime.
    pub fn mount(store: Arc<dyn ContentStore>, retry: RetryPolicy) -> Self {
        let (events, _) = broadcast::channel(64);

        let (documents_tx, documents) = watch::channel(CollectionView::default());
        let (exams_tx, exams) = watch::channel(CollectionView::default());
        let (blogs_tx, blogs) = watch::channel(CollectionView::default());

        let tasks = vec![
            tokio::spawn(run_collection::<Document>(
                store.clone(),
                retry.clone(),
                documents_tx,
                events.clone(),
            )),
            tokio::spawn(run_collection::<Exam>(
                store.clone(),
                retry.clone(),
                exams_tx,
                events.clone(),
            )),
            tokio::spawn(run_collection::<BlogPost>(
                store,
                retry,
                blogs_tx,
                events.clone(),
            )),
        ];

        info!("Content sync mounted");

        Self {
            documents,
            exams,
            blogs,
            events,
            tasks,
        }
    }

    /// Release all subscriptions
    pub fn unmount(self) {
        info!("Content sync unmounted");
        drop(self);
    }

    pub fn documents(&self) -> Arc<Vec<Document>> {
        self.documents.borrow().items.clone()
    }

    pub fn exams(&self) -> Arc<Vec<Exam>> {
        self.exams.borrow().items.clone()
    }

    pub fn blogs(&self) -> Arc<Vec<BlogPost>> {
        self.blogs.borrow().items.clone()
    }

    pub fn document(&self, id: &str) -> Option<Document> {
        self.documents.borrow().items.iter().find(|d| d.id == id).cloned()
    }

    pub fn exam(&self, id: &str) -> Option<Exam> {
        self.exams.borrow().items.iter().find(|e| e.id == id).cloned()
    }

    pub fn blog(&self, id: &str) -> Option<BlogPost> {
        self.blogs.borrow().items.iter().find(|b| b.id == id).cloned()
    }

    pub fn status(&self, collection: Collection) -> SyncStatus {
        match collection {
            Collection::Documents => self.documents.borrow().status.clone(),
            Collection::Exams => self.exams.borrow().status.clone(),
            Collection::Blogs => self.blogs.borrow().status.clone(),
        }
    }

    pub fn version(&self, collection: Collection) -> u64 {
        match collection {
            Collection::Documents => self.documents.borrow().version,
            Collection::Exams => self.exams.borrow().version,
            Collection::Blogs => self.blogs.borrow().version,
        }
    }

    /// Whether any collection is showing stale data
    pub fn is_stale(&self) -> bool {
        Collection::ALL.iter().any(|c| self.status(*c).is_stale())
    }

    /// Change notifications for every collection
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Wait until `collection` has a snapshot newer than `after`, returning its version
    pub async fn wait_for_version(&self, collection: Collection, after: u64) -> PanelResult<u64> {
        match collection {
            Collection::Documents => wait_version(&self.documents, after).await,
            Collection::Exams => wait_version(&self.exams, after).await,
            Collection::Blogs => wait_version(&self.blogs, after).await,
        }
    }
}

impl Drop for ContentSync {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn wait_version<E>(rx: &watch::Receiver<CollectionView<E>>, after: u64) -> PanelResult<u64> {
    let mut rx = rx.clone();
    let view = rx
        .wait_for(|view| view.version > after)
        .await
        .map_err(|_| crate::error::PanelError::Subscription("Sync stopped".to_string()))?;
    Ok(view.version)
}

/// Decode a snapshot, skipping records that do not fit the entity
fn decode_snapshot<E: Entity>(records: &[StoredRecord]) -> Vec<E> {
    let mut items: Vec<E> = records
        .iter()
        .filter_map(|record| match E::from_record(record) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!("Skipping malformed {} record {}: {}", E::COLLECTION, record.id, e);
                None
            }
        })
        .collect();

    // Stable, so the store's tie order survives
    items.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    items
}

fn mark_stale<E>(
    tx: &watch::Sender<CollectionView<E>>,
    events: &broadcast::Sender<SyncEvent>,
    collection: Collection,
    message: String,
    attempt: u32,
) {
    tx.send_modify(|view| {
        let since = match &view.status {
            SyncStatus::Stale { since, .. } => *since,
            _ => Utc::now(),
        };
        view.status = SyncStatus::Stale {
            since,
            error: message,
            attempt,
        };
    });

    let view = tx.borrow();
    let _ = events.send(SyncEvent {
        collection,
        version: view.version,
        status: view.status.clone(),
    });
}

/// Subscribe, mirror snapshots, resubscribe with backoff on failure
async fn run_collection<E: Entity>(
    store: Arc<dyn ContentStore>,
    retry: RetryPolicy,
    tx: watch::Sender<CollectionView<E>>,
    events: broadcast::Sender<SyncEvent>,
) {
    let collection = E::COLLECTION;
    let mut attempt: u32 = 0;

    loop {
        let failure = match store.subscribe(collection).await {
            Ok(mut stream) => {
                debug!("Subscribed to {}", collection);
                let mut failure = "Subscription closed".to_string();

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(records) => {
                            if attempt > 0 {
                                info!("{} subscription recovered after {} attempts", collection, attempt);
                            }
                            attempt = 0;

                            let items = decode_snapshot::<E>(&records);
                            tx.send_modify(|view| {
                                view.items = Arc::new(items);
                                view.status = SyncStatus::Live;
                                view.version += 1;
                            });

                            let version = tx.borrow().version;
                            debug!("{} snapshot v{} ({} records)", collection, version, records.len());
                            let _ = events.send(SyncEvent {
                                collection,
                                version,
                                status: SyncStatus::Live,
                            });
                        }
                        Err(e) => {
                            failure = e.to_string();
                            break;
                        }
                    }
                }

                failure
            }
            Err(e) => e.to_string(),
        };

        attempt += 1;
        warn!("{} subscription failed (attempt {}): {}", collection, attempt, failure);
        mark_stale(&tx, &events, collection, failure, attempt);

        if retry.exhausted(attempt) {
            error!("Giving up on {} subscription after {} attempts", collection, attempt - 1);
            return;
        }

        tokio::time::sleep(retry.delay(attempt)).await;
    }
}
