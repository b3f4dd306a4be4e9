//! Rendering registry snapshots for readers

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::value::Value;

/// A point-in-time, key-sorted copy of (part of) the registry
pub type Snapshot = BTreeMap<String, Value>;

/// Indentation used for rendered snapshots
pub const INDENT: &[u8] = b" ";

/// Render a snapshot as indented JSON
///
/// Keys come out sorted, so two renders of the same snapshot are identical.
///
/// ```rust
/// use state_store::{snapshot, Snapshot, Value};
///
/// let mut snap = Snapshot::new();
/// snap.insert("door".into(), Value::from("locked"));
/// assert_eq!(snapshot::render(&snap).unwrap(), "{\n \"door\": \"locked\"\n}");
/// ```
pub fn render(snapshot: &Snapshot) -> Result<String, serde_json::Error> {
    let mut out = Vec::with_capacity(64);
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    snapshot.serialize(&mut ser)?;
    // serde_json only ever writes valid UTF-8
    String::from_utf8(out).map_err(|e| serde::ser::Error::custom(e.to_string()))
}
