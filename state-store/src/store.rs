//! The state registry
//!
//! - `StateEntry`: one key's value, writability and modification hook
//! - `StateStore`: the shared, lock-guarded map of entries plus the batch
//!   write protocol and change notifications

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{mpsc, Arc};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::callback::OnModified;
use crate::error::WriteError;
use crate::event::{ChangeEvent, ChangeOrigin};
use crate::iter::ChangeIterator;
use crate::snapshot::{self, Snapshot};
use crate::value::Value;

/// Key → new value pairs submitted in one write
///
/// Sorted, so batches commit in a deterministic order.
pub type Batch = BTreeMap<String, Value>;

// ============================================================================
// StateEntry
// ============================================================================

/// Everything the registry knows about one key
#[derive(Clone)]
pub struct StateEntry {
    value: Value,
    writable: bool,
    on_modified: Option<Arc<dyn OnModified>>,
}

impl StateEntry {
    pub fn read_only(value: Value) -> Self {
        Self {
            value,
            writable: false,
            on_modified: None,
        }
    }

    pub fn writable(value: Value, on_modified: Option<Arc<dyn OnModified>>) -> Self {
        Self {
            value,
            writable: true,
            on_modified,
        }
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

impl fmt::Debug for StateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEntry")
            .field("value", &self.value)
            .field("writable", &self.writable)
            .field("has_callback", &self.on_modified.is_some())
            .finish()
    }
}

/// Result of a successful batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Keys written, in commit order
    pub applied: Vec<String>,
}

impl BatchOutcome {
    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// A committed write waiting for its hook and change event
struct Committed {
    key: String,
    old_value: Value,
    new_value: Value,
    on_modified: Option<Arc<dyn OnModified>>,
}

// ============================================================================
// StateStore
// ============================================================================

/// Registry of published state, shared between the host and the HTTP layer
///
/// Cloning is cheap and every clone sees the same entries.
///
/// # Example
///
/// ```rust
/// use state_store::{Batch, StateStore, Value, WriteError};
///
/// let store = StateStore::new();
/// store.set_read_only("pinpad.door", "locked");
/// store.set_writable("pinpad.msg", "", |_: &str, _: &Value, new: &Value| {
///     println!("LCD: {new}");
/// });
///
/// let mut batch = Batch::new();
/// batch.insert("pinpad.door".into(), Value::from("open"));
/// assert_eq!(
///     store.apply_batch(batch),
///     Err(WriteError::NotWritable("pinpad.door".into()))
/// );
///
/// let mut batch = Batch::new();
/// batch.insert("pinpad.msg".into(), Value::from("hello"));
/// store.apply_batch(batch).unwrap();
/// assert_eq!(store.get("pinpad.msg"), Some(Value::from("hello")));
/// ```
#[derive(Clone)]
pub struct StateStore {
    entries: Arc<RwLock<HashMap<String, StateEntry>>>,

    /// Held for the whole of `apply_batch`, hooks included
    batch_gate: Arc<Mutex<()>>,

    /// Key prefixes whose changes are reported through `iter()`
    watched: Arc<RwLock<HashSet<String>>>,

    event_tx: mpsc::Sender<ChangeEvent>,
    event_rx: Arc<Mutex<mpsc::Receiver<ChangeEvent>>>,
}

impl StateStore {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel();

        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            batch_gate: Arc::new(Mutex::new(())),
            watched: Arc::new(RwLock::new(HashSet::new())),
            event_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    /// Publish a value that external clients can read but not write
    ///
    /// Replaces any existing entry for `key`, including a writable one and its
    /// hook.
    pub fn set_read_only(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.register(key.into(), StateEntry::read_only(value.into()));
    }

    /// Publish a value that external clients may overwrite
    ///
    /// `on_modified` runs after every successful external write to `key`.
    /// Replaces any existing entry for `key`.
    pub fn set_writable<C>(&self, key: impl Into<String>, value: impl Into<Value>, on_modified: C)
    where
        C: OnModified + 'static,
    {
        let hook: Arc<dyn OnModified> = Arc::new(on_modified);
        self.register(key.into(), StateEntry::writable(value.into(), Some(hook)));
    }

    /// Like [`set_writable`](Self::set_writable) without a hook
    pub fn set_writable_unobserved(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.register(key.into(), StateEntry::writable(value.into(), None));
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).map(|e| e.value.clone())
    }

    /// `None` if the key is not registered
    pub fn is_writable(&self, key: &str) -> Option<bool> {
        self.entries.read().get(key).map(StateEntry::is_writable)
    }

    /// Point-in-time copy of every entry whose key starts with `prefix`
    ///
    /// An empty prefix matches everything.
    pub fn snapshot(&self, prefix: &str) -> Snapshot {
        self.entries
            .read()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// [`snapshot`](Self::snapshot) rendered as indented JSON
    pub fn render_snapshot(&self, prefix: &str) -> Result<String, serde_json::Error> {
        snapshot::render(&self.snapshot(prefix))
    }

    /// Apply an external write, all or nothing
    ///
    /// Every key is checked first: a missing key fails with
    /// [`WriteError::KeyNotFound`], a read-only one with
    /// [`WriteError::NotWritable`], and in both cases nothing is written.
    /// Otherwise all values are replaced under one lock and then each key's
    /// hook is called with `(key, old, new)` in batch order.
    ///
    /// Concurrent batches are serialized, hooks included.
    pub fn apply_batch(&self, batch: Batch) -> Result<BatchOutcome, WriteError> {
        let _gate = self.batch_gate.lock();

        let committed = {
            let mut entries = self.entries.write();

            for key in batch.keys() {
                match entries.get(key) {
                    None => {
                        warn!(key = %key, "rejecting batch: unknown key");
                        return Err(WriteError::KeyNotFound(key.clone()));
                    }
                    Some(entry) if !entry.writable => {
                        warn!(key = %key, "rejecting batch: key is read-only");
                        return Err(WriteError::NotWritable(key.clone()));
                    }
                    Some(_) => {}
                }
            }

            let committed = batch
                .into_iter()
                .filter_map(|(key, new_value)| {
                    let entry = entries.get_mut(&key)?;
                    let old_value = std::mem::replace(&mut entry.value, new_value.clone());
                    Some(Committed {
                        key,
                        old_value,
                        new_value,
                        on_modified: entry.on_modified.clone(),
                    })
                })
                .collect::<Vec<_>>();

            // Events go out under the write lock so they stay in commit order
            for write in &committed {
                if write.old_value != write.new_value && self.is_watched(&write.key) {
                    self.emit(ChangeEvent::new(
                        write.key.clone(),
                        Some(write.old_value.clone()),
                        write.new_value.clone(),
                        ChangeOrigin::Remote,
                    ));
                }
            }

            committed
        };

        let mut outcome = BatchOutcome::default();
        for write in committed {
            debug!(key = %write.key, kind = write.new_value.kind(), "state modified externally");

            if let Some(hook) = &write.on_modified {
                hook.on_modified(&write.key, &write.old_value, &write.new_value);
            }

            outcome.applied.push(write.key);
        }

        Ok(outcome)
    }

    /// Report changes to keys starting with `prefix` through [`iter`](Self::iter)
    ///
    /// An empty prefix watches every key.
    pub fn watch(&self, prefix: impl Into<String>) {
        self.watched.write().insert(prefix.into());
    }

    pub fn unwatch(&self, prefix: &str) {
        self.watched.write().remove(prefix);
    }

    /// Whether a change to `key` would be reported
    pub fn is_watched(&self, key: &str) -> bool {
        self.watched
            .read()
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Blocking iterator over changes to watched keys
    pub fn iter(&self) -> ChangeIterator {
        ChangeIterator::new(Arc::clone(&self.event_rx))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn register(&self, key: String, entry: StateEntry) {
        let mut entries = self.entries.write();
        let new_value = self.is_watched(&key).then(|| entry.value.clone());
        let previous = entries.insert(key.clone(), entry);

        if let Some(new_value) = new_value {
            let old_value = previous.map(|e| e.value);
            if old_value.as_ref() != Some(&new_value) {
                self.emit(ChangeEvent::new(key, old_value, new_value, ChangeOrigin::Local));
            }
        }
    }

    fn emit(&self, event: ChangeEvent) {
        // The store owns a receiver, so this only fails once every clone is gone
        let _ = self.event_tx.send(event);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("entry_count", &self.len())
            .finish()
    }
}
