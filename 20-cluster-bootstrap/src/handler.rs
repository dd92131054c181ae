use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    error::RegistryError,
    identity::{NodeIdentity, Peer},
    message::{Intent, MembershipMessage},
    registry::PeerRegistry,
};

/// Interprets one inbound message against the local node's registry.
///
/// Owns the node's identity and registry handle; everything that reads or
/// writes this node's peer list goes through here.
#[derive(Clone)]
pub struct MembershipHandler {
    identity: NodeIdentity,
    registry: Arc<dyn PeerRegistry>,
}

impl MembershipHandler {
    pub fn new(identity: NodeIdentity, registry: Arc<dyn PeerRegistry>) -> Self {
        Self { identity, registry }
    }

    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    pub fn peers(&self) -> Result<Vec<Peer>, RegistryError> {
        self.registry.peers(&self.identity.owner_key())
    }

    /// Stores `peer` for this node. The node itself is never stored.
    pub fn save_peer(&self, peer: &Peer) -> Result<bool, RegistryError> {
        if self.identity.is(peer) {
            return Ok(false);
        }
        self.registry.save_peer(&self.identity.owner_key(), peer)
    }

    pub fn handle(&self, message: MembershipMessage) -> Result<MembershipMessage, RegistryError> {
        match message.intent() {
            Intent::JoinRequest { origin } => self.accept_join(origin),
            Intent::Announce { origin } => self.sync_announce(origin),
            // `intent()` never yields `JoinAccepted`; replies are read by the joiner only.
            Intent::JoinAccepted { .. } | Intent::Unrecognized { .. } => {
                debug!(origin = %message.origin(), "message carries no intent; echoing");
                Ok(message)
            }
        }
    }

    fn accept_join(&self, requester: Peer) -> Result<MembershipMessage, RegistryError> {
        info!(peer = %requester, "accepting join request");

        // Snapshot before storing the requester so it is not sent its own address.
        let mut peers = self.peers()?;
        self.save_peer(&requester)?;
        peers.push(self.identity.as_peer());

        Ok(Intent::JoinAccepted {
            origin: requester,
            peers,
        }
        .into())
    }

    fn sync_announce(&self, origin: Peer) -> Result<MembershipMessage, RegistryError> {
        info!(peer = %origin, "received new peer");
        self.save_peer(&origin)?;
        Ok(Intent::Announce { origin }.into())
    }
}
