//! HTTPS listener for the bus.

use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use state_store::StateStore;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use warp::filters::BoxedFilter;
use warp::reply::{Reply, Response};
use warp::{Filter, Rejection};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::reboot::{LogOnlyReboot, RebootHook};
use crate::routes::{api, handle_rejection};

/// A running RZLBus HTTPS endpoint
///
/// Serves `/_/state/<prefix>`, `/_/reboot` and any host routes on its own tokio
/// task until [`BusServer::shutdown`] is called.
///
/// # Example
///
/// ```no_run
/// use bus_server::{BusServer, ServerConfig};
/// use state_store::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = StateStore::new();
///     store.set_read_only("pinpad.door", "locked");
///
///     let server = BusServer::builder(store, ServerConfig::from_env())
///         .start()
///         .await?;
///     println!("listening on {}", server.base_url());
///
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct BusServer {
    local_addr: SocketAddr,
    store: StateStore,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl BusServer {
    pub fn builder(store: StateStore, config: ServerConfig) -> BusServerBuilder {
        BusServerBuilder::new(store, config)
    }

    /// The address the listener is actually bound to
    ///
    /// Differs from the configured one when port 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `https://<local_addr>`
    pub fn base_url(&self) -> String {
        format!("https://{}", self.local_addr)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = self.server_handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "server task ended abnormally");
            }
        }

        info!(addr = %self.local_addr, "RZLBus server stopped");
    }
}

/// Collects everything the server needs before it starts
pub struct BusServerBuilder {
    store: StateStore,
    config: ServerConfig,
    reboot_hook: Arc<dyn RebootHook>,
    host_routes: Vec<BoxedFilter<(Response,)>>,
}

impl BusServerBuilder {
    fn new(store: StateStore, config: ServerConfig) -> Self {
        Self {
            store,
            config,
            reboot_hook: Arc::new(LogOnlyReboot),
            host_routes: Vec::new(),
        }
    }

    /// Replace the default [`LogOnlyReboot`] hook
    pub fn reboot_hook(mut self, hook: Arc<dyn RebootHook>) -> Self {
        self.reboot_hook = hook;
        self
    }

    /// Serve an extra host route next to the built-in ones
    ///
    /// Guard it with [`require_auth`](crate::auth::require_auth) to reuse the
    /// reboot credential.
    pub fn route<F, R>(mut self, filter: F) -> Self
    where
        F: Filter<Extract = (R,), Error = Rejection> + Clone + Send + Sync + 'static,
        R: Reply + Send,
    {
        self.host_routes
            .push(filter.map(|reply: R| reply.into_response()).boxed());
        self
    }

    /// The complete route tree, rejections already turned into responses
    pub fn filter(&self) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
        let builtin = api(
            self.store.clone(),
            self.config.credentials.clone(),
            Arc::clone(&self.reboot_hook),
        );

        self.host_routes
            .iter()
            .cloned()
            .fold(builtin, |routes, host| routes.or(host).unify().boxed())
            .recover(handle_rejection)
            .with(warp::trace::request())
    }

    /// Bind the TLS listener and start serving
    ///
    /// Returns once the socket is bound. The certificate and key are read up
    /// front so a missing file is reported as [`ServerError::Tls`].
    pub async fn start(self) -> Result<BusServer, ServerError> {
        let addr = self.config.listen_addr()?;
        let cert = read_pem(&self.config.cert_path)?;
        let key = read_pem(&self.config.key_path)?;

        // warp panics on bind failure; probe first so the common case is an error
        std::net::TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;

        let routes = self.filter();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (ready_tx, ready_rx) = oneshot::channel::<SocketAddr>();

        let server_handle = tokio::spawn(async move {
            let (bound, server) = warp::serve(routes)
                .tls()
                .cert(cert)
                .key(key)
                .bind_with_graceful_shutdown(addr, async move {
                    let _ = shutdown_rx.await;
                });

            let _ = ready_tx.send(bound);
            server.await;
        });

        match ready_rx.await {
            Ok(local_addr) => {
                info!(addr = %local_addr, keys = self.store.len(), "RZLBus server listening");
                Ok(BusServer {
                    local_addr,
                    store: self.store,
                    shutdown_tx: Some(shutdown_tx),
                    server_handle: Some(server_handle),
                })
            }
            Err(_) => {
                let reason = match server_handle.await {
                    Err(e) if e.is_panic() => panic_message(e.into_panic()),
                    Err(e) => e.to_string(),
                    Ok(()) => "server task exited before binding".to_string(),
                };
                Err(ServerError::StartFailed(reason))
            }
        }
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ServerError> {
    let pem = std::fs::read(path).map_err(|source| ServerError::Tls {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = pem.len(), "loaded PEM file");
    Ok(pem)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "server task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{require_auth, Credentials};
    use std::path::PathBuf;

    fn config() -> ServerConfig {
        ServerConfig::default()
            .with_listen("127.0.0.1:0")
            .with_credentials(Credentials::new("foo", "bar"))
    }

    #[tokio::test]
    async fn test_host_routes_are_served_next_to_builtin_ones() {
        let store = StateStore::new();
        store.set_read_only("pinpad.door", "locked");

        let builder = BusServer::builder(store, config())
            .route(warp::path("ping").map(|| "pong"));
        let routes = builder.filter();

        let ping = warp::test::request().path("/ping").reply(&routes).await;
        assert_eq!(ping.status(), 200);
        assert_eq!(ping.body().as_ref(), b"pong");

        let state = warp::test::request().path("/_/state/pinpad").reply(&routes).await;
        assert_eq!(state.status(), 200);
    }

    #[tokio::test]
    async fn test_guarded_host_route() {
        let builder = BusServer::builder(StateStore::new(), config()).route(
            warp::path("lock_door")
                .and(require_auth(Credentials::new("foo", "bar")))
                .map(|| "Locking the door."),
        );
        let routes = builder.filter();

        let denied = warp::test::request().path("/lock_door").reply(&routes).await;
        assert_eq!(denied.status(), 403);
        assert_eq!(denied.body().as_ref(), b"Specify user and password");

        let allowed = warp::test::request()
            .path("/lock_door")
            .header("authorization", "Basic Zm9vOmJhcg==")
            .reply(&routes)
            .await;
        assert_eq!(allowed.status(), 200);
        assert_eq!(allowed.body().as_ref(), b"Locking the door.");
    }

    #[tokio::test]
    async fn test_missing_certificate_is_reported() {
        let config = config().with_tls("/nonexistent/server.crt", "/nonexistent/server.key");
        let result = BusServer::builder(StateStore::new(), config).start().await;

        match result {
            Err(ServerError::Tls { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/server.crt"))
            }
            Err(other) => panic!("expected a TLS error, got {other}"),
            Ok(_) => panic!("server started without a certificate"),
        }
    }

    #[tokio::test]
    async fn test_invalid_listen_address_is_reported() {
        let config = config().with_listen("not an address");
        let result = BusServer::builder(StateStore::new(), config).start().await;
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_panic_message_extraction() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42u8)), "server task panicked");
    }
}
