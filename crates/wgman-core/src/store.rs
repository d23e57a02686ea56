//! Client config store: one `<name>.conf` per client
//!
//! The store performs no existence check on write; overwrite-on-add is
//! guarded by the manager.

use crate::error::{ManagerError, ManagerResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use wgman_protocol::{ClientConfig, ClientName};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Record file extension
const RECORD_EXT: &str = "conf";

/// A client record as read back from disk
#[derive(Debug, Clone)]
pub struct StoredClient {
    /// Client name (record key)
    pub name: ClientName,
    /// Parsed record
    pub config: ClientConfig,
    /// Verbatim record text
    pub raw: String,
    /// Storage timestamp of the record
    pub created_at: Option<DateTime<Utc>>,
}

/// Directory-backed client record store
#[derive(Debug, Clone)]
pub struct ClientStore {
    dir: PathBuf,
}

impl ClientStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &ClientName) -> PathBuf {
        self.dir.join(format!("{}.{}", name, RECORD_EXT))
    }

    /// Whether a record exists for `name`
    pub fn exists(&self, name: &ClientName) -> bool {
        self.path_for(name).is_file()
    }

    /// Create or overwrite the record for `name`
    pub fn write(&self, name: &ClientName, config: &ClientConfig) -> ManagerResult<()> {
        ensure_private_dir(&self.dir)?;
        let path = self.path_for(name);
        write_file_atomic(&path, config.render().as_bytes(), 0o600)?;
        tracing::debug!(client = %name, path = %path.display(), "Wrote client record");
        Ok(())
    }

    /// Read the record for `name`
    pub fn read(&self, name: &ClientName) -> ManagerResult<StoredClient> {
        let path = self.path_for(name);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ManagerError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let config = ClientConfig::parse(&raw).map_err(|source| ManagerError::InvalidRecord {
            name: name.to_string(),
            source,
        })?;
        let created_at = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        Ok(StoredClient {
            name: name.clone(),
            config,
            raw,
            created_at,
        })
    }

    /// Delete the record for `name`
    pub fn remove(&self, name: &ClientName) -> ManagerResult<()> {
        match fs::remove_file(self.path_for(name)) {
            Ok(()) => {
                tracing::debug!(client = %name, "Removed client record");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ManagerError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All readable records, sorted by name.
    ///
    /// Files that are not `<valid-name>.conf` are ignored; unparseable
    /// records are skipped with a warning.
    pub fn list(&self) -> ManagerResult<Vec<StoredClient>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut clients = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            let Some(name) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| ClientName::parse(s).ok())
            else {
                continue;
            };
            match self.read(&name) {
                Ok(client) => clients.push(client),
                Err(ManagerError::NotFound(_)) => {}
                Err(e) => tracing::warn!(client = %name, "Skipping client record: {}", e),
            }
        }

        clients.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clients)
    }
}

/// Create `dir` (owner-only on unix) if it does not exist
pub(crate) fn ensure_private_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    #[cfg(unix)]
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

/// Per-process sequence for temporary file names
static TMP_SEQ: AtomicUsize = AtomicUsize::new(0);

/// Write via a temporary sibling and rename, so readers never see a
/// half-written file. Each call gets its own temporary name, so
/// concurrent writers never share one.
pub(crate) fn write_file_atomic(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));

    let mut opts = fs::OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;

    let written = opts.open(&tmp).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
