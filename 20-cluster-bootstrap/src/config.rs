use std::{path::PathBuf, time::Duration};

pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Everything a node needs to start, passed explicitly into each component.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Address to listen on. Also the identity the node advertises.
    pub node_ip: String,
    /// Port to listen on; `0` picks an ephemeral port.
    pub node_port: u16,
    /// Existing member to join through. `None` starts a new cluster.
    pub cluster: Option<ClusterAddr>,
    /// JSON registry file. `None` keeps peers in memory.
    pub registry_path: Option<PathBuf>,
    pub io_timeout: Duration,
    /// Cap on concurrently served inbound connections.
    pub max_connections: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAddr {
    pub ip: String,
    pub port: u16,
}

impl ClusterAddr {
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

impl NodeConfig {
    pub fn new(node_ip: impl Into<String>, node_port: u16) -> Self {
        Self {
            node_ip: node_ip.into(),
            node_port,
            cluster: None,
            registry_path: None,
            io_timeout: DEFAULT_IO_TIMEOUT,
            max_connections: Some(DEFAULT_MAX_CONNECTIONS),
        }
    }

    pub fn join_via(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.cluster = Some(ClusterAddr {
            ip: ip.into(),
            port,
        });
        self
    }

    pub fn with_io_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    /// `None` serves any number of connections at once.
    pub fn with_max_connections(mut self, max_connections: Option<usize>) -> Self {
        self.max_connections = max_connections;
        self
    }
}
