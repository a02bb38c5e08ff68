use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::StoreError;

/// A single document behind an atomic update-and-return primitive.
///
/// This is the stand-in for "any persistent store supporting atomic
/// single-document updates with a returned post-image" that the design
/// assumes: every mutation takes an exclusive lock on exactly one document,
/// applies a closure to it, and hands back the post-image. No component ever
/// holds the lock across an `.await` of some other collection, so there is
/// no cross-document deadlock to worry about.
#[derive(Clone)]
pub struct AtomicDoc<T>(Arc<RwLock<T>>);

impl<T: Clone + Send + Sync> AtomicDoc<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    /// Read a clone of the current document.
    pub async fn get(&self) -> T {
        self.0.read().await.clone()
    }

    /// Atomically apply `f` to the document and return the post-image.
    /// `f` computes the next state from the current one without mutating it
    /// in place (mirrors the replicated-log `apply(&self, op) -> Self`
    /// idiom the mailbox index used to be built on); the document is only
    /// swapped in if `f` succeeds, so a rejected update leaves it untouched.
    pub async fn update_and_return<F, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&T) -> Result<T, E>,
    {
        let mut guard = self.0.write().await;
        let next = f(&guard)?;
        *guard = next.clone();
        Ok(next)
    }
}

/// A keyed collection of atomic documents, the unit of persistence a
/// "collection" in §6 (`users`, `mailboxes`, `messages`, `threads`, ...) maps
/// onto. Lookup and insertion are serialized by a single map lock, but the
/// contended section never includes running the caller's mutation closure —
/// that happens against the per-document lock returned by `get`/`get_or_insert`.
pub struct Collection<K, T> {
    docs: RwLock<HashMap<K, AtomicDoc<T>>>,
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Collection<K, T> {
    pub fn new() -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<AtomicDoc<T>> {
        self.docs.read().await.get(key).cloned()
    }

    pub async fn get_or_insert_with(&self, key: K, default: impl FnOnce() -> T) -> AtomicDoc<T> {
        if let Some(doc) = self.docs.read().await.get(&key) {
            return doc.clone();
        }
        let mut map = self.docs.write().await;
        map.entry(key)
            .or_insert_with(|| AtomicDoc::new(default()))
            .clone()
    }

    /// Insert a brand new document, failing if the key is already taken.
    pub async fn insert(&self, key: K, value: T) -> Result<AtomicDoc<T>, StoreError> {
        let mut map = self.docs.write().await;
        if map.contains_key(&key) {
            return Err(StoreError::Internal("document already exists".into()));
        }
        let doc = AtomicDoc::new(value);
        map.insert(key, doc.clone());
        Ok(doc)
    }

    pub async fn remove(&self, key: &K) -> Option<AtomicDoc<T>> {
        self.docs.write().await.remove(key)
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.docs.read().await.contains_key(key)
    }

    pub async fn iter_snapshot(&self) -> Vec<(K, T)>
    where
        K: 'static,
    {
        let map = self.docs.read().await;
        let mut out = Vec::with_capacity(map.len());
        for (k, v) in map.iter() {
            out.push((k.clone(), v.get().await));
        }
        out
    }
}

impl<K: Eq + Hash + Clone, T: Clone + Send + Sync> Default for Collection<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_and_return_yields_post_image() {
        let doc = AtomicDoc::new(0u32);
        let post: Result<u32, ()> = doc.update_and_return(|v| Ok(v + 1)).await;
        assert_eq!(post.unwrap(), 1);
        assert_eq!(doc.get().await, 1);
    }

    #[tokio::test]
    async fn failed_update_leaves_document_untouched() {
        let doc = AtomicDoc::new(10u32);
        let res = doc
            .update_and_return(|_| -> Result<u32, &'static str> { Err("boom") })
            .await;
        assert!(res.is_err());
        assert_eq!(doc.get().await, 10);
    }

    #[tokio::test]
    async fn collection_get_or_insert_is_idempotent() {
        let coll: Collection<String, u32> = Collection::new();
        let a = coll.get_or_insert_with("k".into(), || 1).await;
        let b = coll.get_or_insert_with("k".into(), || 2).await;
        assert_eq!(a.get().await, 1);
        assert_eq!(b.get().await, 1);
    }
}
