use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Result;
use tokio::{
    io::{AsyncBufRead, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    select,
    sync::{OwnedSemaphorePermit, Semaphore},
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::{
    error::CodecError,
    handler::MembershipHandler,
    message::{MembershipMessage, read_message, write_message},
};

/// Accepts inbound connections and answers one membership message on each.
pub struct Listener {
    listener: TcpListener,
    handler: Arc<MembershipHandler>,
    io_timeout: Duration,
    permits: Option<Arc<Semaphore>>,
}

impl Listener {
    pub fn new(
        listener: TcpListener,
        handler: MembershipHandler,
        io_timeout: Duration,
        max_connections: Option<usize>,
    ) -> Self {
        Self {
            listener,
            handler: Arc::new(handler),
            io_timeout,
            permits: max_connections.map(|limit| Arc::new(Semaphore::new(limit))),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves connections until `shutdown` resolves. Accept failures are logged and skipped.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let Listener {
            listener,
            handler,
            io_timeout,
            permits,
        } = self;
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("listener shutting down");
                    break;
                }
                accept_result = accept_next(&listener, permits.as_ref()) => {
                    handle_accept_result(accept_result, &handler, io_timeout);
                }
            }
        }
    }

    pub async fn run_until_ctrl_c(self) {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

type Accepted = (TcpStream, SocketAddr, Option<OwnedSemaphorePermit>);

// Waits for a free slot first so a full node stops pulling connections off the backlog.
async fn accept_next(
    listener: &TcpListener,
    permits: Option<&Arc<Semaphore>>,
) -> io::Result<Accepted> {
    let permit = match permits {
        Some(permits) => Some(
            Arc::clone(permits)
                .acquire_owned()
                .await
                .map_err(io::Error::other)?,
        ),
        None => None,
    };
    let (stream, peer) = listener.accept().await?;
    Ok((stream, peer, permit))
}

fn handle_accept_result(
    result: io::Result<Accepted>,
    handler: &Arc<MembershipHandler>,
    io_timeout: Duration,
) {
    match result {
        Ok((stream, peer, permit)) => {
            spawn_connection_handler(stream, peer, handler, io_timeout, permit)
        }
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

fn spawn_connection_handler(
    stream: TcpStream,
    peer: SocketAddr,
    handler: &Arc<MembershipHandler>,
    io_timeout: Duration,
    permit: Option<OwnedSemaphorePermit>,
) {
    let handler = Arc::clone(handler);
    tokio::spawn(async move {
        let _permit = permit;
        match timeout(io_timeout, handle_connection(stream, &handler)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(peer = %peer, error = ?err, "connection closed with error"),
            Err(_) => warn!(peer = %peer, ?io_timeout, "connection timed out"),
        }
    });
}

async fn handle_connection(stream: TcpStream, handler: &MembershipHandler) -> Result<()> {
    let peer = stream.peer_addr().ok();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let Some(message) = read_request(&mut reader).await? else {
        debug!(?peer, "connection closed before a message arrived");
        return Ok(());
    };

    let reply = handler.handle(message)?;

    // Announcers hang up without reading the reply.
    if let Err(err) = write_message(&mut writer, &reply).await {
        debug!(?peer, error = ?err, "peer left before the reply was written");
        return Ok(());
    }
    if let Err(err) = writer.shutdown().await {
        debug!(?peer, error = ?err, "failed to shut down connection cleanly");
    }

    Ok(())
}

/// Skips malformed or over-long lines until a valid message, a clean close, or a transport error.
async fn read_request<R>(reader: &mut R) -> Result<Option<MembershipMessage>, CodecError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        match read_message(reader).await {
            Err(err) if err.is_decode_failure() => {
                debug!(error = %err, "discarding malformed message");
            }
            other => return other,
        }
    }
}
