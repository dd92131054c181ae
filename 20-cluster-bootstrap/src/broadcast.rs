use std::time::Duration;

use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    error::{BroadcastError, RegistryError},
    handler::MembershipHandler,
    identity::Peer,
    message::{MembershipMessage, write_message},
};

/// Outcome of one broadcast round: one entry per peer, in the order contacted.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub delivered: Vec<Peer>,
    pub failed: Vec<(Peer, BroadcastError)>,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }
}

/// Announces this node to every peer in its registry, one connection each.
///
/// Replies are not read. A failed peer is logged and recorded; the remaining
/// peers are still contacted.
pub async fn broadcast_arrival(
    handler: &MembershipHandler,
    io_timeout: Duration,
) -> Result<BroadcastReport, RegistryError> {
    let peers = handler.peers()?;
    info!(peers = peers.len(), "broadcasting this node's info to peers");

    let announce = MembershipMessage::announce(handler.identity());
    let mut report = BroadcastReport::default();
    for peer in peers {
        match announce_to(&peer, &announce, io_timeout).await {
            Ok(()) => {
                debug!(peer = %peer, "announced");
                report.delivered.push(peer);
            }
            Err(err) => {
                warn!(peer = %peer, error = %err, "failed to announce to peer");
                report.failed.push((peer, err));
            }
        }
    }

    Ok(report)
}

async fn announce_to(
    peer: &Peer,
    announce: &MembershipMessage,
    io_timeout: Duration,
) -> Result<(), BroadcastError> {
    let exchange = async {
        let mut stream = TcpStream::connect(peer.address())
            .await
            .map_err(BroadcastError::Dial)?;
        write_message(&mut stream, announce).await?;
        if let Err(err) = stream.shutdown().await {
            debug!(peer = %peer, error = ?err, "failed to shut down announce connection");
        }
        Ok::<(), BroadcastError>(())
    };

    timeout(io_timeout, exchange)
        .await
        .map_err(|_| BroadcastError::TimedOut)?
}
