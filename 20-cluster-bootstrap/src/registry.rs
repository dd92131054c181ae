//! Durable store mapping a node's owner key to the peers it has seen.
//!
//! Each call takes the registry's own lock for its whole duration, so every
//! call behaves as an independent transaction. Callers never hold anything
//! across calls.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use serde::{Deserialize, Serialize};

use crate::{error::RegistryError, identity::Peer};

pub trait PeerRegistry: Send + Sync {
    /// Peers stored under `owner_key`, most recently inserted first.
    fn peers(&self, owner_key: &str) -> Result<Vec<Peer>, RegistryError>;

    /// Inserts `peer` under `owner_key` unless that pair is already stored.
    /// Returns `true` when a record was written.
    fn save_peer(&self, owner_key: &str, peer: &Peer) -> Result<bool, RegistryError>;
}

/// One stored row. `id` increases with every insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRecord {
    pub id: u64,
    pub owner_key: String,
    pub ip_address: String,
    pub port: u16,
}

#[derive(Debug, Default)]
struct RecordLog {
    records: Vec<PeerRecord>,
}

impl RecordLog {
    fn peers(&self, owner_key: &str) -> Vec<Peer> {
        let mut owned: Vec<&PeerRecord> = self
            .records
            .iter()
            .filter(|record| record.owner_key == owner_key)
            .collect();
        owned.sort_by(|a, b| b.id.cmp(&a.id));
        owned
            .into_iter()
            .map(|record| Peer::new(record.ip_address.clone(), record.port))
            .collect()
    }

    fn contains(&self, owner_key: &str, peer: &Peer) -> bool {
        self.records.iter().any(|record| {
            record.owner_key == owner_key
                && record.ip_address == peer.ip_address
                && record.port == peer.port
        })
    }

    fn push(&mut self, owner_key: &str, peer: &Peer) {
        let id = self.records.iter().map(|record| record.id).max().unwrap_or(0) + 1;
        self.records.push(PeerRecord {
            id,
            owner_key: owner_key.to_string(),
            ip_address: peer.ip_address.clone(),
            port: peer.port,
        });
    }
}

fn lock(log: &Mutex<RecordLog>) -> Result<MutexGuard<'_, RecordLog>, RegistryError> {
    log.lock().map_err(|_| RegistryError::Poisoned)
}

/// Registry that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    log: Mutex<RecordLog>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PeerRegistry for MemoryRegistry {
    fn peers(&self, owner_key: &str) -> Result<Vec<Peer>, RegistryError> {
        Ok(lock(&self.log)?.peers(owner_key))
    }

    fn save_peer(&self, owner_key: &str, peer: &Peer) -> Result<bool, RegistryError> {
        let mut log = lock(&self.log)?;
        if log.contains(owner_key, peer) {
            return Ok(false);
        }
        log.push(owner_key, peer);
        Ok(true)
    }
}

/// Registry persisted as a JSON array of [`PeerRecord`]s.
///
/// The whole file is rewritten on every insert through a sibling temp file and
/// a rename, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    log: Mutex<RecordLog>,
}

impl FileRegistry {
    /// Opens `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            log: Mutex::new(RecordLog { records }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, records: &[PeerRecord]) -> Result<(), RegistryError> {
        let encoded = serde_json::to_vec_pretty(records)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&encoded)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PeerRegistry for FileRegistry {
    fn peers(&self, owner_key: &str) -> Result<Vec<Peer>, RegistryError> {
        Ok(lock(&self.log)?.peers(owner_key))
    }

    fn save_peer(&self, owner_key: &str, peer: &Peer) -> Result<bool, RegistryError> {
        let mut log = lock(&self.log)?;
        if log.contains(owner_key, peer) {
            return Ok(false);
        }

        log.push(owner_key, peer);
        if let Err(err) = self.persist(&log.records) {
            log.records.pop();
            return Err(err);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "1.2.3.4:9000";

    #[test]
    fn saving_twice_stores_one_record() {
        let registry = MemoryRegistry::new();
        let peer = Peer::new("1.2.3.4", 9001);

        assert!(registry.save_peer(OWNER, &peer).expect("first save"));
        assert!(!registry.save_peer(OWNER, &peer).expect("second save"));

        assert_eq!(registry.peers(OWNER).expect("peers"), vec![peer]);
    }

    #[test]
    fn peers_are_scoped_by_owner_and_newest_first() {
        let registry = MemoryRegistry::new();
        registry.save_peer(OWNER, &Peer::new("a", 1)).expect("save a");
        registry.save_peer(OWNER, &Peer::new("b", 2)).expect("save b");
        registry
            .save_peer("other:1", &Peer::new("c", 3))
            .expect("save c");

        assert_eq!(
            registry.peers(OWNER).expect("peers"),
            vec![Peer::new("b", 2), Peer::new("a", 1)]
        );
        assert!(registry.peers("nobody:0").expect("peers").is_empty());
    }

    #[test]
    fn file_registry_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("peers.json");

        {
            let registry = FileRegistry::open(&path).expect("open new");
            registry.save_peer(OWNER, &Peer::new("a", 1)).expect("save a");
            registry.save_peer(OWNER, &Peer::new("b", 2)).expect("save b");
        }

        let reopened = FileRegistry::open(&path).expect("reopen");
        assert_eq!(
            reopened.peers(OWNER).expect("peers"),
            vec![Peer::new("b", 2), Peer::new("a", 1)]
        );
        assert!(!reopened.save_peer(OWNER, &Peer::new("a", 1)).expect("dup"));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("peers.json");
        fs::write(&path, b"[{oops").expect("write garbage");

        assert!(matches!(
            FileRegistry::open(&path),
            Err(RegistryError::Corrupt(_))
        ));
    }
}
