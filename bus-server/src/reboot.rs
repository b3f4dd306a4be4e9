//! What happens after an authenticated `POST /_/reboot`
//!
//! The server only authenticates and acknowledges; restarting the device is up
//! to the host, which installs a [`RebootHook`].

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RebootError {
    #[error("Reboot failed: {0}")]
    Failed(String),
}

/// Host-provided reboot action
#[async_trait]
pub trait RebootHook: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &'static str;

    /// Start the reboot
    ///
    /// Called after the request has been authenticated. Returning an error
    /// turns the response into a 500 carrying the error text.
    async fn reboot(&self) -> Result<(), RebootError>;
}

/// Acknowledges reboot requests without doing anything
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnlyReboot;

#[async_trait]
impl RebootHook for LogOnlyReboot {
    fn name(&self) -> &'static str {
        "log-only"
    }

    async fn reboot(&self) -> Result<(), RebootError> {
        info!("reboot requested; no reboot hook installed, ignoring");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingReboot {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RebootHook for CountingReboot {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn reboot(&self) -> Result<(), RebootError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_log_only_reboot_succeeds() {
        assert_eq!(LogOnlyReboot.reboot().await, Ok(()));
        assert_eq!(LogOnlyReboot.name(), "log-only");
    }

    #[tokio::test]
    async fn test_hook_as_trait_object() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook: Arc<dyn RebootHook> = Arc::new(CountingReboot {
            calls: Arc::clone(&calls),
        });

        hook.reboot().await.unwrap();
        hook.reboot().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
