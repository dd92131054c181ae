use std::{future::Future, io, net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use crate::{
    broadcast::{BroadcastReport, broadcast_arrival},
    config::NodeConfig,
    error::{NodeError, RegistryError},
    handler::MembershipHandler,
    identity::NodeIdentity,
    join::join_cluster,
    listener::Listener,
    registry::{FileRegistry, MemoryRegistry, PeerRegistry},
};

/// A bound node that has not started serving yet.
///
/// Binding first lets a node configured with port `0` learn its real port
/// before it advertises itself to anyone.
pub struct Node {
    config: NodeConfig,
    handler: MembershipHandler,
    listener: TcpListener,
}

impl Node {
    pub async fn bind(
        config: NodeConfig,
        registry: Arc<dyn PeerRegistry>,
    ) -> Result<Self, NodeError> {
        let listener = TcpListener::bind((config.node_ip.as_str(), config.node_port))
            .await
            .map_err(|source| NodeError::Bind {
                addr: format!("{}:{}", config.node_ip, config.node_port),
                source,
            })?;
        let local = listener.local_addr().map_err(NodeError::LocalAddr)?;

        let identity = NodeIdentity::new(config.node_ip.clone(), local.port());
        let handler = MembershipHandler::new(identity, registry);

        Ok(Self {
            config,
            handler,
            listener,
        })
    }

    pub fn identity(&self) -> &NodeIdentity {
        self.handler.identity()
    }

    pub fn handler(&self) -> &MembershipHandler {
        &self.handler
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Joins the configured cluster and announces this node to every peer it learns.
    ///
    /// Returns `None` when no cluster is configured and the node starts alone.
    pub async fn bootstrap(&self) -> Result<Option<BroadcastReport>, NodeError> {
        let Some(cluster) = &self.config.cluster else {
            info!(node = %self.identity(), "starting as first node");
            return Ok(None);
        };

        let io_timeout = self.config.io_timeout;
        let peers = join_cluster(&cluster.address(), &self.handler, io_timeout).await?;
        info!(node = %self.identity(), peers = peers.len(), "joined cluster");

        let report = broadcast_arrival(&self.handler, io_timeout).await?;
        info!(
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "broadcast complete"
        );
        Ok(Some(report))
    }

    pub fn into_listener(self) -> Listener {
        Listener::new(
            self.listener,
            self.handler,
            self.config.io_timeout,
            self.config.max_connections,
        )
    }

    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        self.into_listener().run_until(shutdown).await
    }

    pub async fn serve_until_ctrl_c(self) {
        self.into_listener().run_until_ctrl_c().await
    }
}

/// File-backed registry when a path is configured, in-memory otherwise.
pub fn open_registry(config: &NodeConfig) -> Result<Arc<dyn PeerRegistry>, RegistryError> {
    let registry: Arc<dyn PeerRegistry> = match &config.registry_path {
        Some(path) => Arc::new(FileRegistry::open(path)?),
        None => Arc::new(MemoryRegistry::new()),
    };
    Ok(registry)
}
