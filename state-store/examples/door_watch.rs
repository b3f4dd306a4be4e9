//! Door watch - change events without any HTTP
//!
//! A "host" thread flips the door state while the main thread watches the
//! `pinpad.` prefix and prints every change. A remote-style batch write to the
//! LCD message shows up with `Remote` origin.
//!
//! Run: cargo run -p rzlbus-state-store --example door_watch

use state_store::{Batch, ChangeOrigin, StateStore, Value};
use std::thread;
use std::time::Duration;

fn main() {
    let store = StateStore::new();
    store.set_read_only("pinpad.door", "locked");
    store.set_writable("pinpad.msg", "", |_: &str, _: &Value, new: &Value| {
        println!("  (LCD now shows {new:?})");
    });
    store.set_read_only("hallway.light", false);

    store.watch("pinpad.");
    let events = store.iter();

    let host = store.clone();
    let flipper = thread::spawn(move || {
        for state in ["open", "locked", "locked", "open"] {
            host.set_read_only("pinpad.door", state);
            // not watched, never reported
            host.set_read_only("hallway.light", state == "open");
            thread::sleep(Duration::from_millis(50));
        }

        let mut batch = Batch::new();
        batch.insert("pinpad.msg".to_string(), Value::from("Welcome"));
        if let Err(e) = host.apply_batch(batch) {
            eprintln!("batch rejected: {e}");
        }
    });

    // The repeated "locked" is not a change, so three door events plus the message
    for event in events.timeout_iter(Duration::from_millis(500)) {
        let origin = match event.origin {
            ChangeOrigin::Local => "host",
            ChangeOrigin::Remote => "remote",
        };
        let old = event
            .old_value
            .as_ref()
            .map_or_else(|| "<new>".to_string(), Value::to_string);
        println!("{origin:>6}: {} {old} -> {}", event.key, event.new_value);
    }

    let _ = flipper.join();
    println!("final state:\n{}", store.render_snapshot("").unwrap_or_default());
}
