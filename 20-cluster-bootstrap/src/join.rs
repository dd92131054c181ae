use std::{future::Future, time::Duration};

use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    error::JoinError,
    handler::MembershipHandler,
    identity::Peer,
    message::{MembershipMessage, read_message, write_message},
};

/// Asks the node at `cluster` to admit this node and stores the peers it returns.
///
/// Runs once on the startup path. There is no retry: any failure here is the
/// caller's to report. Returns the peers learned from the reply, excluding the
/// local node.
pub async fn join_cluster(
    cluster: &str,
    handler: &MembershipHandler,
    io_timeout: Duration,
) -> Result<Vec<Peer>, JoinError> {
    info!(cluster, "connecting to cluster");

    let stream = within(io_timeout, cluster, TcpStream::connect(cluster))
        .await?
        .map_err(|source| JoinError::Dial {
            addr: cluster.to_string(),
            source,
        })?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let request = MembershipMessage::join_request(handler.identity());
    within(io_timeout, cluster, write_message(&mut writer, &request)).await??;

    let reply: MembershipMessage = within(io_timeout, cluster, read_message(&mut reader))
        .await??
        .ok_or_else(|| JoinError::NoReply {
            addr: cluster.to_string(),
        })?;
    info!(cluster, peers = reply.peers.len(), "cluster responded");
    if !reply.is_connected {
        warn!(cluster, "reply does not confirm the join; storing its peers anyway");
    }

    let mut discovered = Vec::with_capacity(reply.peers.len());
    for peer in reply.peers {
        if handler.identity().is(&peer) {
            continue;
        }
        handler.save_peer(&peer)?;
        discovered.push(peer);
    }

    if let Err(err) = writer.shutdown().await {
        debug!(cluster, error = ?err, "failed to shut down join connection cleanly");
    }

    Ok(discovered)
}

async fn within<F, T>(io_timeout: Duration, addr: &str, step: F) -> Result<T, JoinError>
where
    F: Future<Output = T>,
{
    timeout(io_timeout, step)
        .await
        .map_err(|_| JoinError::TimedOut {
            addr: addr.to_string(),
        })
}
