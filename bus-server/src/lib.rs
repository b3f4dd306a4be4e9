//! HTTPS endpoint for an RZLBus [`StateStore`].
//!
//! # Routes
//!
//! | route               | method | effect                                          |
//! |---------------------|--------|-------------------------------------------------|
//! | `/_/state/<prefix>` | GET    | indented JSON of every key starting with prefix |
//! | `/_/state/<prefix>` | POST   | all-or-nothing write of a flat JSON object       |
//! | `/_/reboot`         | POST   | HTTP Basic protected, runs the [`RebootHook`]    |
//!
//! Hosts can add their own routes through [`BusServerBuilder::route`] and guard
//! them with [`require_auth`].
//!
//! # Example
//!
//! ```no_run
//! use bus_server::{require_auth, BusServer, ServerConfig};
//! use state_store::{StateStore, Value};
//! use warp::Filter;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), bus_server::ServerError> {
//!     let store = StateStore::new();
//!     store.set_read_only("pinpad.door", "locked");
//!     store.set_writable("pinpad.msg", "", |_: &str, _: &Value, new: &Value| {
//!         println!("LCD: {new}");
//!     });
//!
//!     let config = ServerConfig::from_env();
//!     let lock = warp::path("lock_door")
//!         .and(require_auth(config.credentials.clone()))
//!         .map(|| "Locking the door.");
//!
//!     let server = BusServer::builder(store, config).route(lock).start().await?;
//!     // ...
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod reboot;
pub mod routes;
pub mod server;

pub use auth::{basic_credentials, require_auth, Credentials};
pub use config::ServerConfig;
pub use error::{ApiError, ConfigError, ServerError};
pub use logging::{init_logging, LoggingError, LoggingMode};
pub use reboot::{LogOnlyReboot, RebootError, RebootHook};
pub use server::{BusServer, BusServerBuilder};

// Hosts only need this crate to publish state
pub use state_store::{Batch, StateStore, Value};
