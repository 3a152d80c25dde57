//! Accept-handler that turns inbound TCP connections into registered
//! proxies, checked against the expected-components tree (spec §3, C4).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::model::components_tree::ExpectedComponentsTree;

use super::error::ComponentError;
use super::handshake::HandshakeState;
use super::proxy::{ComponentLink, Proxy};

/// A class-specific action run once a component's intrinsics are accepted
/// and before it is handed to the scheduler, e.g. pushing detector config,
/// the RFI mask, and the birdie mask to a freshly connected DX (spec §4.2).
pub type PostHandshakeHook<L> = Arc<dyn Fn(Arc<Proxy<L>>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Registry of live proxies for one component class (e.g. all detectors),
/// keyed by the component's declared name.
pub struct ComponentManager<L: ComponentLink> {
    expected: Arc<ExpectedComponentsTree>,
    /// Base of the message-code range every proxy this manager registers
    /// belongs to (spec §3).
    class_base: u32,
    proxies: parking_lot::RwLock<HashMap<String, Arc<Proxy<L>>>>,
    post_handshake_hook: Option<PostHandshakeHook<L>>,
}

impl<L: ComponentLink + 'static> ComponentManager<L> {
    pub fn new(expected: Arc<ExpectedComponentsTree>, class_base: u32) -> Self {
        Self {
            expected,
            class_base,
            proxies: parking_lot::RwLock::new(HashMap::new()),
            post_handshake_hook: None,
        }
    }

    /// Like [`Self::new`], additionally running `hook` once a proxy's
    /// handshake completes, before it becomes visible to
    /// [`Self::ready_proxies`] callers (spec §4.2).
    pub fn with_post_handshake_hook(expected: Arc<ExpectedComponentsTree>, class_base: u32, hook: PostHandshakeHook<L>) -> Self {
        Self {
            post_handshake_hook: Some(hook),
            ..Self::new(expected, class_base)
        }
    }

    /// Registers a freshly connected component, rejecting names the
    /// expected-components tree does not recognize. Moves the proxy to
    /// `IntrinsicsPending` and issues the request-intrinsics message that
    /// starts its handshake (spec §4.2).
    pub async fn register(&self, name: &str, link: Arc<L>) -> Result<Arc<Proxy<L>>, ComponentError> {
        if !self.expected.expects(name) {
            return Err(ComponentError::ConnectionLost {
                component: name.to_string(),
            });
        }
        let proxy = Arc::new(Proxy::new(name, self.class_base, link));
        proxy.transition(HandshakeState::IntrinsicsPending)?;
        proxy.request_intrinsics().await?;
        self.proxies.write().insert(name.to_string(), proxy.clone());
        Ok(proxy)
    }

    /// Accepts `intrinsics` reported by `name`, and if accepted runs this
    /// manager's post-handshake hook before the proxy is considered ready
    /// (spec §4.2).
    pub async fn complete_handshake(&self, name: &str, expected_version: &str, intrinsics: String) -> Result<(), ComponentError> {
        let proxy = self.get(name).ok_or_else(|| ComponentError::ConnectionLost {
            component: name.to_string(),
        })?;
        proxy.accept_intrinsics_versioned(expected_version, intrinsics)?;
        if let Some(hook) = &self.post_handshake_hook {
            hook(proxy).await;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Proxy<L>>> {
        self.proxies.read().get(name).cloned()
    }

    /// Sends the straggler-eviction sequence to every named component that
    /// failed to acknowledge a watchdog-guarded fan-out: `stop`, then
    /// `shutdown`, then `resetSocket` (spec §4.6.3, S3). Unknown names are
    /// skipped; eviction is best-effort and does not fail on a send error
    /// since the component is already considered lost.
    pub async fn evict_stragglers(&self, stragglers: &[String]) {
        for name in stragglers {
            let Some(proxy) = self.get(name) else { continue };
            if let Err(err) = proxy.stop().await {
                warn!(component = %name, error = %err, "straggler stop failed");
            }
            if let Err(err) = proxy.shutdown().await {
                warn!(component = %name, error = %err, "straggler shutdown failed");
            }
            if let Err(err) = proxy.reset_socket().await {
                warn!(component = %name, error = %err, "straggler reset_socket failed");
            }
            self.deregister(name);
        }
    }

    /// All proxies currently in the `Ready` handshake state.
    pub fn ready_proxies(&self) -> Vec<Arc<Proxy<L>>> {
        self.proxies
            .read()
            .values()
            .filter(|p| p.state() == HandshakeState::Ready)
            .cloned()
            .collect()
    }

    pub fn deregister(&self, name: &str) {
        if let Some(proxy) = self.proxies.write().remove(name) {
            proxy.detach();
        }
    }

    pub fn len(&self) -> usize {
        self.proxies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Listens on `listener` and accepts component connections until
/// `shutdown` is cancelled. `identify` extracts the peer's declared name
/// and builds the `ComponentLink` for it; this is the seam a real TCP
/// handshake reader plugs into.
pub async fn accept_loop<L, F, Fut>(
    listener: TcpListener,
    manager: Arc<ComponentManager<L>>,
    shutdown: CancellationToken,
    identify: F,
) where
    L: ComponentLink + 'static,
    F: Fn(tokio::net::TcpStream) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(String, Arc<L>), ComponentError>> + Send,
{
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("component accept loop shutting down");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        match identify(stream).await {
                            Ok((name, link)) => {
                                match manager.register(&name, link).await {
                                    Ok(_) => info!(component = %name, peer = %addr, "component registered"),
                                    Err(err) => warn!(peer = %addr, error = %err, "rejected unexpected component"),
                                }
                            }
                            Err(err) => warn!(peer = %addr, error = %err, "component identification failed"),
                        }
                    }
                    Err(err) => warn!(error = %err, "accept() failed"),
                }
            }
        }
    }
}
