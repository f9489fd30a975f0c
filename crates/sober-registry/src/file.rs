//! Single-file registry
//!
//! On-disk record:
//!
//! ```text
//! {"version":1,"checksum":"<sha256 hex of body>","body":{"history":[...],"block":{...}|null}}
//! ```
//!
//! Writes go to `<file>.tmp`, are fsynced, renamed over `<file>`, and the
//! directory is fsynced. A crash at any point leaves either the old record or
//! the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{BlockRegistry, RegistryError, RegistryResult, RegistrySnapshot};

/// Current record format version
pub const RECORD_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    body: Box<RawValue>,
}

fn checksum(body: &str) -> String {
    format!("{:x}", Sha256::digest(body.as_bytes()))
}

/// Serialize a snapshot into record bytes
pub fn encode_record(snapshot: &RegistrySnapshot) -> RegistryResult<Vec<u8>> {
    let body = serde_json::to_string(snapshot).map_err(|e| RegistryError::Serialization(e.to_string()))?;
    let envelope = Envelope {
        version: RECORD_VERSION,
        checksum: checksum(&body),
        body: RawValue::from_string(body).map_err(|e| RegistryError::Serialization(e.to_string()))?,
    };
    serde_json::to_vec(&envelope).map_err(|e| RegistryError::Serialization(e.to_string()))
}

/// Parse and verify record bytes
pub fn decode_record(bytes: &[u8]) -> RegistryResult<RegistrySnapshot> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|e| RegistryError::Corrupt(format!("envelope: {e}")))?;

    if envelope.version != RECORD_VERSION {
        return Err(RegistryError::Corrupt(format!(
            "unsupported record version {}",
            envelope.version
        )));
    }

    let body = envelope.body.get();
    if checksum(body) != envelope.checksum {
        return Err(RegistryError::Corrupt("checksum mismatch".into()));
    }

    serde_json::from_str(body).map_err(|e| RegistryError::Corrupt(format!("body: {e}")))
}

/// Registry persisted as one JSON record on disk
#[derive(Clone, Debug)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileRegistry { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl BlockRegistry for FileRegistry {
    fn load(&self) -> RegistryResult<RegistrySnapshot> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No registry record yet");
                return Ok(RegistrySnapshot::default());
            }
            Err(e) => return Err(e.into()),
        };
        decode_record(&bytes)
    }

    fn save(&self, snapshot: &RegistrySnapshot) -> RegistryResult<()> {
        let bytes = encode_record(snapshot)?;
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;

        let tmp = self.temp_path();
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        sync_dir(&dir)?;

        debug!(
            path = %self.path.display(),
            history = snapshot.history.len(),
            blocked = snapshot.block.is_some(),
            "Registry saved"
        );
        Ok(())
    }

    fn quarantine(&self) -> RegistryResult<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(format!(".corrupt-{secs}"));
        let target = self.path.with_file_name(name);

        fs::rename(&self.path, &target)?;
        warn!(from = %self.path.display(), to = %target.display(), "Registry record quarantined");
        Ok(Some(target))
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
