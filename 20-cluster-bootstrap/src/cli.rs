use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::config::{ClusterAddr, DEFAULT_IO_TIMEOUT, DEFAULT_MAX_CONNECTIONS, NodeConfig};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Address of an active node to join through. Leave empty to start a new cluster.
    #[arg(long, alias = "clusterIp", default_value = "")]
    pub cluster_ip: String,

    /// Port of the active node to join through.
    #[arg(long, alias = "clusterPort", default_value_t = 0)]
    pub cluster_port: u16,

    /// Address this node listens on and advertises to peers.
    #[arg(long, alias = "nodeIp", default_value = "0.0.0.0")]
    pub node_ip: String,

    /// Port this node listens on. Use 0 for an ephemeral port.
    #[arg(long, alias = "nodePort", default_value_t = 8080)]
    pub node_port: u16,

    /// JSON file holding known peers. Peers are kept in memory when omitted.
    #[arg(long)]
    pub registry: Option<PathBuf>,

    /// Deadline for each network exchange, in seconds.
    #[arg(long, default_value_t = DEFAULT_IO_TIMEOUT.as_secs())]
    pub io_timeout_secs: u64,

    /// Maximum inbound connections served at once. 0 removes the limit.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,
}

impl From<Cli> for NodeConfig {
    fn from(cli: Cli) -> Self {
        let cluster = (!cli.cluster_ip.is_empty()).then(|| ClusterAddr {
            ip: cli.cluster_ip,
            port: cli.cluster_port,
        });

        NodeConfig {
            node_ip: cli.node_ip,
            node_port: cli.node_port,
            cluster,
            registry_path: cli.registry,
            io_timeout: Duration::from_secs(cli.io_timeout_secs),
            max_connections: (cli.max_connections > 0).then_some(cli.max_connections),
        }
    }
}
