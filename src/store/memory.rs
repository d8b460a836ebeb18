/// In-memory content store
use crate::{
    error::{PanelError, PanelResult},
    models::{Collection, StoredRecord},
    store::{sort_newest_first, ContentStore, SnapshotHub, SnapshotStream},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    next_seq: u64,
    records: HashMap<Collection, Vec<(u64, StoredRecord)>>,
}

/// Ephemeral store used for tests and `PANEL_STORE=memory` runs
pub struct MemoryContentStore {
    state: Mutex<MemoryState>,
    hub: SnapshotHub,
    fail_writes: AtomicBool,
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryContentStore {
    pub fn new() -> Self {
        let store = Self {
            state: Mutex::new(MemoryState::default()),
            hub: SnapshotHub::new(),
            fail_writes: AtomicBool::new(false),
        };
        for collection in Collection::ALL {
            store.hub.publish(collection, Vec::new());
        }
        store
    }

    /// Make every subsequent write fail with a store error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Push a subscription error to every subscriber of `collection`
    pub fn interrupt(&self, collection: Collection, message: &str) {
        self.hub.publish_error(collection, message.to_string());
    }

    /// Re-deliver the current snapshot of `collection`
    pub fn resume(&self, collection: Collection) -> PanelResult<()> {
        self.publish(collection)
    }

    /// Number of open subscriptions on `collection`
    pub fn subscriber_count(&self, collection: Collection) -> usize {
        self.hub.subscriber_count(collection)
    }

    fn lock(&self) -> PanelResult<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| PanelError::Internal("Memory store lock poisoned".to_string()))
    }

    fn check_writable(&self) -> PanelResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PanelError::Store("Store is unavailable".to_string()));
        }
        Ok(())
    }

    /// Publish under the state lock so snapshots go out in write order
    fn publish(&self, collection: Collection) -> PanelResult<()> {
        let state = self.lock()?;
        self.hub.publish(collection, snapshot_of(&state, collection));
        Ok(())
    }
}

fn snapshot_of(state: &MemoryState, collection: Collection) -> Vec<StoredRecord> {
    let mut records = state.records.get(&collection).cloned().unwrap_or_default();
    sort_newest_first(&mut records);
    records.into_iter().map(|(_, record)| record).collect()
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn subscribe(&self, collection: Collection) -> PanelResult<SnapshotStream> {
        Ok(self.hub.subscribe(collection))
    }

    async fn insert(&self, collection: Collection, fields: Map<String, Value>) -> PanelResult<String> {
        self.check_writable()?;

        let id = Uuid::new_v4().to_string();
        {
            let mut state = self.lock()?;
            let seq = state.next_seq;
            state.next_seq += 1;
            state.records.entry(collection).or_default().push((
                seq,
                StoredRecord {
                    id: id.clone(),
                    fields,
                },
            ));
        }

        self.publish(collection)?;
        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Map<String, Value>) -> PanelResult<()> {
        self.check_writable()?;

        {
            let mut state = self.lock()?;
            let record = state
                .records
                .get_mut(&collection)
                .and_then(|records| records.iter_mut().find(|(_, r)| r.id == id))
                .map(|(_, r)| r)
                .ok_or_else(|| PanelError::NotFound(format!("{} record {}", collection, id)))?;

            for (key, value) in patch {
                record.fields.insert(key, value);
            }
        }

        self.publish(collection)
    }

    async fn delete(&self, collection: Collection, id: &str) -> PanelResult<()> {
        self.check_writable()?;

        {
            let mut state = self.lock()?;
            if let Some(records) = state.records.get_mut(&collection) {
                records.retain(|(_, r)| r.id != id);
            }
        }

        self.publish(collection)
    }
}
