use std::time::Duration;

use anyhow::{Context, Result};
use bus_server::logging::{init_logging_with_level, LoggingMode};
use bus_server::{require_auth, BusServer, Credentials, ServerConfig};
use clap::Parser;
use state_store::{StateStore, Value};
use tracing::{error, info};
use warp::Filter;

const DOOR_KEY: &str = "pinpad.door";
const MSG_KEY: &str = "pinpad.msg";

/// RZLBus pinpad demo
///
/// Publishes the door state and accepts LCD messages over the bus.
#[derive(Parser, Debug)]
#[command(name = "rzlbus-pinpad")]
#[command(about = "RZLBus demo host resembling the pinpad door controller")]
pub struct Args {
    /// Address to listen on, `*:port` for every interface
    #[arg(long = "rzlbus-listen", env = "RZLBUS_LISTEN", default_value = bus_server::config::DEFAULT_LISTEN)]
    pub listen: String,

    /// TLS certificate (PEM)
    #[arg(long = "rzlbus-ssl-cert", env = "RZLBUS_SSL_CERT", default_value = bus_server::config::DEFAULT_CERT_PATH)]
    pub ssl_cert: String,

    /// TLS private key (PEM)
    #[arg(long = "rzlbus-ssl-key", env = "RZLBUS_SSL_KEY", default_value = bus_server::config::DEFAULT_KEY_PATH)]
    pub ssl_key: String,

    /// Username for /_/reboot, /lock_door and /unlock_door
    #[arg(long, env = "RZLBUS_REBOOT_USER", default_value = "")]
    pub reboot_user: String,

    /// Password for /_/reboot, /lock_door and /unlock_door
    #[arg(long, env = "RZLBUS_REBOOT_PASSWORD", default_value = "", hide_env_values = true)]
    pub reboot_password: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "RZLBUS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}'. Valid levels: error, warn, info, debug, trace",
                    self.log_level
                ));
            }
        }

        bus_server::config::parse_listen_addr(&self.listen)
            .context("Invalid --rzlbus-listen")?;
        Ok(())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::default()
            .with_listen(self.listen.clone())
            .with_tls(&self.ssl_cert, &self.ssl_key)
            .with_credentials(Credentials::new(&self.reboot_user, &self.reboot_password))
    }
}

/// What the LCD would show for a new `pinpad.msg` value
fn lcd_text(value: &Value) -> Option<&str> {
    value.as_str()
}

fn publish_state(store: &StateStore) {
    store.set_read_only(DOOR_KEY, "locked");
    store.set_writable(MSG_KEY, "", |_: &str, _: &Value, new: &Value| match lcd_text(new) {
        Some(text) => info!(lcd = text, "changing the LCD message"),
        None => error!(kind = new.kind(), "the LCD message is not a string"),
    });
}

fn door_routes(
    credentials: Credentials,
) -> impl Filter<Extract = (&'static str,), Error = warp::Rejection> + Clone {
    let lock = warp::path("lock_door")
        .and(warp::path::end())
        .and(require_auth(credentials.clone()))
        .map(|| "I would lock the door now.");
    let unlock = warp::path("unlock_door")
        .and(warp::path::end())
        .and(require_auth(credentials))
        .map(|| "I would unlock the door now.");

    lock.or(unlock).unify()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;
    init_logging_with_level(LoggingMode::Development, Some(&args.log_level))
        .context("Failed to initialize logging")?;

    let config = args.server_config();
    let store = StateStore::new();
    publish_state(&store);

    let server = BusServer::builder(store.clone(), config.clone())
        .route(door_routes(config.credentials.clone()))
        .start()
        .await
        .context("Failed to start the RZLBus server")?;
    info!(url = %server.base_url(), "pinpad ready");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut open = false;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                open = !open;
                store.set_read_only(DOOR_KEY, if open { "open" } else { "locked" });
            }
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
        }
    }

    server.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use state_store::Batch;

    fn default_of(id: &str) -> Option<String> {
        Args::command()
            .get_arguments()
            .find(|arg| arg.get_id() == id)
            .and_then(|arg| arg.get_default_values().first())
            .and_then(|value| value.to_str())
            .map(str::to_string)
    }

    #[test]
    fn test_default_args_match_server_defaults() {
        // Read the declared defaults, not a parse, so RZLBUS_* in the environment can't interfere
        let defaults = ServerConfig::default();
        assert_eq!(default_of("listen"), Some(defaults.listen));
        assert_eq!(default_of("ssl_cert"), Some(defaults.cert_path.display().to_string()));
        assert_eq!(default_of("ssl_key"), Some(defaults.key_path.display().to_string()));
        assert_eq!(default_of("reboot_user"), Some(String::new()));
        assert_eq!(default_of("log_level").as_deref(), Some("info"));
    }

    #[test]
    fn test_explicit_args_validate() {
        let args = Args::try_parse_from([
            "rzlbus-pinpad",
            "--rzlbus-listen",
            "*:10443",
            "--log-level",
            "info",
        ])
        .unwrap();
        assert!(args.validate().is_ok());
        assert_eq!(args.server_config().listen_addr().unwrap().port(), 10443);
    }

    #[test]
    fn test_flags_flow_into_server_config() {
        let args = Args::try_parse_from([
            "rzlbus-pinpad",
            "--rzlbus-listen",
            "127.0.0.1:8443",
            "--rzlbus-ssl-cert",
            "/etc/pinpad/cert.pem",
            "--reboot-user",
            "foo",
            "--reboot-password",
            "bar",
        ])
        .unwrap();

        let config = args.server_config();
        assert_eq!(config.listen, "127.0.0.1:8443");
        assert_eq!(config.cert_path, std::path::PathBuf::from("/etc/pinpad/cert.pem"));
        assert_eq!(config.credentials, Credentials::new("foo", "bar"));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let bad_level = Args::try_parse_from(["rzlbus-pinpad", "--log-level", "loud"]).unwrap();
        assert!(bad_level.validate().is_err());

        let bad_listen = Args::try_parse_from(["rzlbus-pinpad", "--rzlbus-listen", "nowhere"]).unwrap();
        assert!(bad_listen.validate().is_err());
    }

    #[test]
    fn test_published_state() {
        let store = StateStore::new();
        publish_state(&store);

        assert_eq!(store.is_writable(DOOR_KEY), Some(false));
        assert_eq!(store.is_writable(MSG_KEY), Some(true));

        let mut batch = Batch::new();
        batch.insert(MSG_KEY.to_string(), Value::from(42i64));
        assert!(store.apply_batch(batch).is_ok());
        assert_eq!(lcd_text(&store.get(MSG_KEY).unwrap()), None);
    }

    #[tokio::test]
    async fn test_door_routes_require_credentials() {
        let routes = door_routes(Credentials::new("foo", "bar"));

        let unlocked = warp::test::request()
            .path("/unlock_door")
            .header("authorization", "Basic Zm9vOmJhcg==")
            .filter(&routes)
            .await;
        assert_eq!(unlocked.ok(), Some("I would unlock the door now."));

        let refused = warp::test::request().path("/lock_door").filter(&routes).await;
        assert!(refused.is_err());
    }
}
