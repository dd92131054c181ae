use std::fmt;

use serde::{Deserialize, Serialize};

/// The listen address a node is known by. Used as the owner key for its peer list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    ip_address: String,
    port: u16,
}

impl NodeIdentity {
    pub fn new(ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            ip_address: ip_address.into(),
            port,
        }
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Registry key under which this node's peers are stored, `"ip:port"`.
    pub fn owner_key(&self) -> String {
        self.to_string()
    }

    pub fn as_peer(&self) -> Peer {
        Peer::new(self.ip_address.clone(), self.port)
    }

    pub fn is(&self, peer: &Peer) -> bool {
        self.ip_address == peer.ip_address && self.port == peer.port
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip_address, self.port)
    }
}

/// Another node as known to the local one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Peer {
    pub ip_address: String,
    pub port: u16,
}

impl Peer {
    pub fn new(ip_address: impl Into<String>, port: u16) -> Self {
        Self {
            ip_address: ip_address.into(),
            port,
        }
    }

    /// Dialable `host:port` form.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip_address, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip_address, self.port)
    }
}
