use std::io;

use thiserror::Error;

/// Failure to move one message across a stream.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("message line exceeds {limit} bytes")]
    TooLong { limit: usize },
}

impl CodecError {
    /// The bytes received were bad but the stream itself is still usable.
    pub fn is_decode_failure(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::TooLong { .. })
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry storage error: {0}")]
    Io(#[from] io::Error),

    #[error("registry file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("registry lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("failed to dial cluster node {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out talking to cluster node {addr}")]
    TimedOut { addr: String },

    #[error("cluster node {addr} closed the connection without replying")]
    NoReply { addr: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Why a single announce did not reach its peer.
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to dial peer: {0}")]
    Dial(#[source] io::Error),

    #[error("timed out announcing to peer")]
    TimedOut,

    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("listener has no local address: {0}")]
    LocalAddr(#[source] io::Error),

    #[error("join failed: {0}")]
    Join(#[from] JoinError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
