use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::CodecError,
    identity::{NodeIdentity, Peer},
};

/// Longest line accepted from a peer, excluding the newline.
pub const MAX_LINE_BYTES: usize = 1 << 20;

/// The only message exchanged between nodes.
///
/// The two flags carry the intent; see [`MembershipMessage::intent`] for how
/// they are read. A join reply keeps the requester's address and
/// `is_attempting = true`, flipping only `is_connected`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MembershipMessage {
    pub ip_address: String,
    pub port: u16,
    #[serde(default)]
    pub is_attempting: bool,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub peers: Vec<Peer>,
}

/// What a message asks of the node receiving it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// A node wants to join and needs the receiver's peer list.
    JoinRequest { origin: Peer },
    /// Reply to a join request, addressed back to the requester.
    JoinAccepted { origin: Peer, peers: Vec<Peer> },
    /// A node that has joined announces itself.
    Announce { origin: Peer },
    /// Neither flag set.
    Unrecognized { origin: Peer },
}

impl MembershipMessage {
    pub fn join_request(identity: &NodeIdentity) -> Self {
        Intent::JoinRequest {
            origin: identity.as_peer(),
        }
        .into()
    }

    pub fn announce(identity: &NodeIdentity) -> Self {
        Intent::Announce {
            origin: identity.as_peer(),
        }
        .into()
    }

    pub fn origin(&self) -> Peer {
        Peer::new(self.ip_address.clone(), self.port)
    }

    /// Classifies by flag priority: `is_attempting` wins over `is_connected`.
    ///
    /// A join reply carries both flags and therefore classifies as a
    /// [`Intent::JoinRequest`]; replies are consumed by the joiner directly and
    /// never fed back through classification.
    pub fn intent(&self) -> Intent {
        let origin = self.origin();
        if self.is_attempting {
            Intent::JoinRequest { origin }
        } else if self.is_connected {
            Intent::Announce { origin }
        } else {
            Intent::Unrecognized { origin }
        }
    }
}

impl From<Intent> for MembershipMessage {
    fn from(intent: Intent) -> Self {
        let (origin, is_attempting, is_connected, peers) = match intent {
            Intent::JoinRequest { origin } => (origin, true, false, Vec::new()),
            Intent::JoinAccepted { origin, peers } => (origin, true, true, peers),
            Intent::Announce { origin } => (origin, false, true, Vec::new()),
            Intent::Unrecognized { origin } => (origin, false, false, Vec::new()),
        };
        Self {
            ip_address: origin.ip_address,
            port: origin.port,
            is_attempting,
            is_connected,
            peers,
        }
    }
}

// Older senders encode an empty peer list as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Peer>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Peer>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads one JSON value terminated by a newline (or by end of stream).
///
/// Returns `Ok(None)` when the peer closed before sending anything. A line
/// that is not valid JSON (including invalid UTF-8) surfaces as
/// [`CodecError::Malformed`], and one longer than [`MAX_LINE_BYTES`] as
/// [`CodecError::TooLong`]. Either way the offending bytes are consumed, so a
/// caller may keep reading from the same stream.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, CodecError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    read_message_within(reader, MAX_LINE_BYTES).await
}

async fn read_message_within<R, T>(reader: &mut R, limit: usize) -> Result<Option<T>, CodecError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        // One byte past the limit tells an over-long line from one that fits exactly.
        let bytes = (&mut *reader)
            .take(limit as u64 + 1)
            .read_until(b'\n', &mut line)
            .await?;
        if bytes == 0 {
            return Ok(None);
        }

        let content = line.strip_suffix(b"\n").unwrap_or(&line[..]);
        if content.len() > limit {
            return Err(CodecError::TooLong { limit });
        }
        let content = content.strip_suffix(b"\r").unwrap_or(content);
        if content.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        return Ok(Some(serde_json::from_slice(content)?));
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
