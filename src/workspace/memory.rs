//! In-memory workspace.

use crate::connection::BackendKind;
use crate::error::{BackendError, Result};
use crate::workspace::traits::{ReadOnlyWorkspace, Workspace};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Records grouped by collection, then id.
pub type Collections = BTreeMap<String, BTreeMap<String, Value>>;

/// In-memory workspace.
///
/// All data lives in `BTreeMap`s behind a lock; nothing touches disk.
/// Also the storage core of [`TextFileWorkspace`](super::TextFileWorkspace).
///
/// # Examples
///
/// ```
/// use workspace_factory::workspace::{MemoryWorkspace, ReadOnlyWorkspace, Workspace};
/// use serde_json::json;
///
/// let ws = MemoryWorkspace::new();
/// ws.put("tickets", "1", json!({"total": 12})).unwrap();
/// assert_eq!(ws.count("tickets").unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct MemoryWorkspace {
    data: RwLock<Collections>,
    kind: BackendKind,
}

impl MemoryWorkspace {
    /// Creates an empty workspace.
    #[must_use]
    pub fn new() -> Self {
        Self::with_collections(Collections::new(), BackendKind::FlatFile)
    }

    /// Creates a workspace holding `data`, reporting itself as `kind`.
    #[must_use]
    pub const fn with_collections(data: Collections, kind: BackendKind) -> Self {
        Self {
            data: RwLock::new(data),
            kind,
        }
    }

    /// Returns a copy of every record.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn snapshot(&self) -> Result<Collections> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.clone())
    }

    /// Applies `change` to the records under the write lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn modify<R>(&self, change: impl FnOnce(&mut Collections) -> R) -> Result<R> {
        let mut data = self.data.write().map_err(poisoned)?;
        Ok(change(&mut data))
    }

    /// Replaces every record with `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn replace(&self, data: Collections) -> Result<()> {
        *self.data.write().map_err(poisoned)? = data;
        Ok(())
    }

    /// Total number of records across all collections.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn total_count(&self) -> Result<usize> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.values().map(BTreeMap::len).sum())
    }
}

impl Default for MemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn poisoned<T>(_: PoisonError<T>) -> BackendError {
    BackendError::Database("workspace lock poisoned".to_string())
}

pub(crate) fn insert(data: &mut Collections, collection: &str, id: &str, value: Value) {
    data.entry(collection.to_string())
        .or_default()
        .insert(id.to_string(), value);
}

/// Removes a record, dropping its collection once empty.
pub(crate) fn remove(data: &mut Collections, collection: &str, id: &str) -> bool {
    let removed = data
        .get_mut(collection)
        .and_then(|c| c.remove(id))
        .is_some();
    if data.get(collection).is_some_and(BTreeMap::is_empty) {
        data.remove(collection);
    }
    removed
}

impl ReadOnlyWorkspace for MemoryWorkspace {
    fn backend(&self) -> BackendKind {
        self.kind
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(collection).and_then(|c| c.get(id)).cloned())
    }

    fn list(&self, collection: &str) -> Result<Vec<Value>> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default())
    }

    fn count(&self, collection: &str) -> Result<usize> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.get(collection).map_or(0, BTreeMap::len))
    }
}

impl Workspace for MemoryWorkspace {
    fn put(&self, collection: &str, id: &str, value: Value) -> Result<()> {
        self.modify(|data| insert(data, collection, id, value))
    }

    fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        self.modify(|data| remove(data, collection, id))
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_get() {
        let ws = MemoryWorkspace::new();
        ws.put("menu", "tea", json!({"price": 2})).unwrap();
        assert_eq!(ws.get("menu", "tea").unwrap(), Some(json!({"price": 2})));
        assert_eq!(ws.get("menu", "coffee").unwrap(), None);
        assert_eq!(ws.get("other", "tea").unwrap(), None);
    }

    #[test]
    fn test_list_ordered_by_id() {
        let ws = MemoryWorkspace::new();
        ws.put("menu", "b", json!(2)).unwrap();
        ws.put("menu", "a", json!(1)).unwrap();
        assert_eq!(ws.list("menu").unwrap(), vec![json!(1), json!(2)]);
        assert!(ws.list("empty").unwrap().is_empty());
    }

    #[test]
    fn test_delete() {
        let ws = MemoryWorkspace::new();
        ws.put("menu", "a", json!(1)).unwrap();
        assert!(ws.delete("menu", "a").unwrap());
        assert!(!ws.delete("menu", "a").unwrap());
        assert_eq!(ws.count("menu").unwrap(), 0);
        assert!(ws.snapshot().unwrap().is_empty());
    }

    #[test]
    fn test_replace() {
        let ws = MemoryWorkspace::new();
        ws.put("menu", "a", json!(1)).unwrap();

        let mut next = ws.snapshot().unwrap();
        insert(&mut next, "menu", "b", json!(2));
        assert_eq!(ws.count("menu").unwrap(), 1);

        ws.replace(next).unwrap();
        assert_eq!(ws.count("menu").unwrap(), 2);
    }

    #[test]
    fn test_total_count() {
        let ws = MemoryWorkspace::new();
        ws.put("a", "1", json!(1)).unwrap();
        ws.put("b", "1", json!(1)).unwrap();
        ws.put("b", "2", json!(1)).unwrap();
        assert_eq!(ws.total_count().unwrap(), 3);
        assert_eq!(ws.backend(), BackendKind::FlatFile);
    }
}
