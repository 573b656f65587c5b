use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{
    CoordinationConfig, CoordinationSession, Result, SessionHandle, TransportError, WatchEvent,
};

/// Transport seam: turns a resolved address list into a live session.
///
/// The crate ships [`crate::MemoryConnector`]; a deployment talking to a real
/// cluster supplies its own implementation. Every session/node event for the
/// returned session must be delivered to `events` until the session is closed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        addrs: Vec<SocketAddr>,
        session_timeout: Duration,
        events: mpsc::Sender<WatchEvent>,
    ) -> Result<Box<dyn CoordinationSession>>;
}

/// Opens sessions against the configured cluster.
///
/// Host resolution happens on every `create_session` call - never cached
/// across reconnects - so cluster membership changes are picked up whenever a
/// session is replaced. All resolved addresses are offered to the connector.
pub struct SessionFactory {
    connector: Arc<dyn Connector>,
    config: CoordinationConfig,
}

impl SessionFactory {
    pub fn new(connector: Arc<dyn Connector>, config: CoordinationConfig) -> Self {
        Self { connector, config }
    }

    pub async fn create_session(
        &self,
        events: mpsc::Sender<WatchEvent>,
    ) -> Result<SessionHandle> {
        let addrs = self.resolve().await?;
        debug!(?addrs, "connecting to coordination cluster");
        let session = self
            .connector
            .connect(addrs, self.config.session_timeout(), events)
            .await?;
        Ok(SessionHandle::new(session))
    }

    async fn resolve(&self) -> Result<Vec<SocketAddr>> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        let addrs: Vec<SocketAddr> = lookup_host(&target)
            .await
            .map_err(|e| TransportError::ResolveFailed {
                host: target.clone(),
                reason: e.to_string(),
            })?
            .collect();
        if addrs.is_empty() {
            return Err(TransportError::ResolveFailed {
                host: target,
                reason: "resolution returned no addresses".to_string(),
            }
            .into());
        }
        Ok(addrs)
    }
}
