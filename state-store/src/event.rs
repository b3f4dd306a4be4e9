//! Change events for registry updates
//!
//! When a watched key's value changes, a `ChangeEvent` is emitted carrying the
//! key, both values and where the change came from.

use std::time::Instant;

use crate::value::Value;

/// Who changed a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// The owning application called `set_read_only` or `set_writable`
    Local,
    /// An external client wrote the key through a batch
    Remote,
}

/// A change event emitted when a watched key changes value
///
/// `old_value` is `None` when the key did not exist before.
///
/// # Example
///
/// ```rust,ignore
/// for event in store.iter() {
///     println!("{} changed to {} ({:?})", event.key, event.new_value, event.origin);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub key: String,

    pub old_value: Option<Value>,

    pub new_value: Value,

    pub origin: ChangeOrigin,

    /// When the change was committed
    pub timestamp: Instant,
}

impl ChangeEvent {
    pub fn new(
        key: impl Into<String>,
        old_value: Option<Value>,
        new_value: Value,
        origin: ChangeOrigin,
    ) -> Self {
        Self {
            key: key.into(),
            old_value,
            new_value,
            origin,
            timestamp: Instant::now(),
        }
    }
}

impl PartialEq for ChangeEvent {
    fn eq(&self, other: &Self) -> bool {
        // Timestamp not included in equality
        self.key == other.key
            && self.old_value == other.old_value
            && self.new_value == other.new_value
            && self.origin == other.origin
    }
}
