//! Shared controller manager
//!
//! Thin registration point the reconcilers attach to. The manager owns the
//! cluster client handle and the named controller futures; the enclosing
//! process drives them after bootstrap completes.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use futures::future;
use kube::Client;
use tracing::info;

/// Boxed controller future driven by [`ControllerManager::run`].
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

struct NamedController {
    name: &'static str,
    future: ControllerFuture,
}

/// Registration point shared by all gateway reconcilers.
pub struct ControllerManager {
    client: Client,
    controllers: Vec<NamedController>,
}

impl ControllerManager {
    /// Create a manager around the given cluster client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            controllers: Vec::new(),
        }
    }

    /// Client handle for reconcilers and registration callbacks.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Attach a named controller future.
    pub fn attach(&mut self, name: &'static str, future: ControllerFuture) {
        info!(controller = name, "attached controller");
        self.controllers.push(NamedController { name, future });
    }

    /// Names of attached controllers, in attachment order.
    pub fn controller_names(&self) -> Vec<&'static str> {
        self.controllers.iter().map(|c| c.name).collect()
    }

    /// Number of attached controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// True when no controller has been attached.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }

    /// Drive all attached controllers until they complete.
    ///
    /// Controller futures normally run for the process lifetime, so this
    /// returns only on shutdown.
    pub async fn run(self) {
        future::join_all(self.controllers.into_iter().map(|c| c.future)).await;
    }
}

impl fmt::Debug for ControllerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerManager")
            .field("controllers", &self.controller_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn attach_preserves_registration_order() {
        let mut manager = ControllerManager::new(test_support::client());
        assert!(manager.is_empty());

        manager.attach("gateway-class", Box::pin(async {}));
        manager.attach("gateway", Box::pin(async {}));

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.controller_names(), vec!["gateway-class", "gateway"]);
    }

    #[tokio::test]
    async fn run_drives_attached_futures() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let completed = Arc::new(AtomicUsize::new(0));
        let mut manager = ControllerManager::new(test_support::client());
        for _ in 0..3 {
            let completed = completed.clone();
            manager.attach(
                "counter",
                Box::pin(async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        manager.run().await;
        assert_eq!(completed.load(Ordering::SeqCst), 3);
    }
}
