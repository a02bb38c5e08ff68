use std::collections::HashMap;

use tokio::sync::RwLock;

/// Content-addressed blob store with refcount-based garbage collection.
///
/// Keyed by `(hash, magic)`: `magic` is a per-delivery generation salt, so
/// two deliveries that happen to produce the same content hash never share
/// a refcount bucket unless they really are the same delivery. This is a
/// correctness primitive, not an optimization.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AttachmentKey {
    pub hash: String,
    pub magic: String,
}

struct Entry {
    data: Vec<u8>,
    refcount: u64,
}

#[derive(Default)]
pub struct AttachmentStore {
    entries: RwLock<HashMap<AttachmentKey, Entry>>,
}

impl AttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `create`: insert with refcount 1, or `$inc` by 1 if the key already
    /// exists (two messages from the same delivery referencing the same
    /// attachment id).
    pub async fn create(&self, key: AttachmentKey, data: Vec<u8>) -> u64 {
        let mut entries = self.entries.write().await;
        let entry = entries.entry(key).or_insert(Entry { data, refcount: 0 });
        entry.refcount += 1;
        entry.refcount
    }

    pub async fn get(&self, key: &AttachmentKey) -> Option<Vec<u8>> {
        self.entries.read().await.get(key).map(|e| e.data.clone())
    }

    pub async fn refcount(&self, key: &AttachmentKey) -> u64 {
        self.entries.read().await.get(key).map(|e| e.refcount).unwrap_or(0)
    }

    /// `updateMany`: apply `delta` (positive or negative) to every key's
    /// refcount, used for copy fan-out (`+1`) and cleanup (`-1`). Keys whose
    /// refcount reaches zero are left in place with refcount 0 only
    /// transiently — callers that intend a final decrement should follow up
    /// with `delete_many` so a refcount of 0 never outlives the call that
    /// produced it.
    pub async fn update_many(&self, keys: &[AttachmentKey], delta: i64) {
        let mut entries = self.entries.write().await;
        for key in keys {
            if let Some(entry) = entries.get_mut(key) {
                entry.refcount = (entry.refcount as i64 + delta).max(0) as u64;
            }
        }
    }

    /// `deleteMany`: decrement refcounts and delete records that reach zero.
    /// Best-effort: keys with no matching record are silently ignored, so
    /// this is safe to call again on orphans left by a failed `add`.
    pub async fn delete_many(&self, keys: &[AttachmentKey]) {
        let mut entries = self.entries.write().await;
        for key in keys {
            let drop_it = match entries.get_mut(key) {
                Some(entry) => {
                    entry.refcount = entry.refcount.saturating_sub(1);
                    entry.refcount == 0
                }
                None => false,
            };
            if drop_it {
                entries.remove(key);
            }
        }
    }
}
