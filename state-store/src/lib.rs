//! Published state for RZLBus controllers
//!
//! A process keeps its externally visible state in a [`StateStore`]: a map
//! from string keys to [`Value`]s, where each key is either read-only for the
//! outside world or writable with an optional hook.
//!
//! # Features
//!
//! - **Capability per key**: `set_read_only` vs `set_writable`
//! - **All-or-nothing writes**: [`StateStore::apply_batch`] validates every key
//!   before touching any of them
//! - **Prefix snapshots**: consistent, sorted copies ready to render as JSON
//! - **Change events**: watch key prefixes and consume changes from a blocking
//!   iterator
//!
//! # Quick Start
//!
//! ```rust
//! use state_store::{Batch, StateStore, Value};
//!
//! let store = StateStore::new();
//! store.set_read_only("pinpad.door", "locked");
//! store.set_writable("pinpad.msg", "", |key: &str, old: &Value, new: &Value| {
//!     println!("{key}: {old:?} -> {new:?}");
//! });
//!
//! let mut batch = Batch::new();
//! batch.insert("pinpad.msg".to_string(), Value::from("hello"));
//! store.apply_batch(batch).unwrap();
//!
//! let json = store.render_snapshot("pinpad.").unwrap();
//! assert!(json.contains("hello"));
//! ```
//!
//! # Architecture
//!
//! ```text
//! StateStore
//!     │
//!     ├── entries: RwLock<HashMap<String, StateEntry>>
//!     │       │
//!     │       └── StateEntry { value, writable, on_modified }
//!     │
//!     ├── batch_gate: Mutex<()>          (one batch at a time)
//!     │
//!     ├── watched: RwLock<HashSet<prefix>>
//!     │
//!     └── event_channel: mpsc::channel<ChangeEvent>
//!             │
//!             └── ChangeIterator
//! ```

pub mod callback;
pub mod error;
pub mod event;
pub mod iter;
pub mod snapshot;
pub mod store;
pub mod value;

pub use callback::OnModified;
pub use error::WriteError;
pub use event::{ChangeEvent, ChangeOrigin};
pub use iter::{ChangeIterator, TimeoutIter, TryIter};
pub use snapshot::Snapshot;
pub use store::{Batch, BatchOutcome, StateEntry, StateStore};
pub use value::{Value, ValueError};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::callback::OnModified;
    pub use crate::error::WriteError;
    pub use crate::event::{ChangeEvent, ChangeOrigin};
    pub use crate::store::{Batch, StateStore};
    pub use crate::value::Value;
}
