//! Notification hook attached to writable keys

use crate::value::Value;

/// Called after an external write has replaced a key's value
///
/// Implemented for every `Fn(&str, &Value, &Value) + Send + Sync` closure, so
/// most callers never name this trait:
///
/// ```rust
/// use state_store::{StateStore, Value};
///
/// let store = StateStore::new();
/// store.set_writable("pinpad.msg", "", |key: &str, _old: &Value, new: &Value| {
///     println!("{key} -> {new}");
/// });
/// ```
///
/// The hook runs synchronously on the thread that applied the batch, after the
/// registry lock has been released. It may read or publish state on the same
/// store but must not submit another batch.
pub trait OnModified: Send + Sync {
    fn on_modified(&self, key: &str, old_value: &Value, new_value: &Value);
}

impl<F> OnModified for F
where
    F: Fn(&str, &Value, &Value) + Send + Sync,
{
    fn on_modified(&self, key: &str, old_value: &Value, new_value: &Value) {
        self(key, old_value, new_value)
    }
}
