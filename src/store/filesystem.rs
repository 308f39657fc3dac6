//! Durable store: one flat file per key under a root directory.
//!
//! ```text
//! data/originals/
//! ├── 3f1c…9a2e          # key == file name
//! ├── 77b0…c41d
//! └── .77b0…c41d.tmp-…   # in-flight write, renamed into place when complete
//! ```
//!
//! Writes land in a hidden temporary sibling and are renamed over the
//! target, so a reader never observes a partially written value.
//!
//! ## TTL sweep
//!
//! When opened with a `ttl`, the store owns a background thread that wakes
//! every `ttl / 2`, lists the root directory and removes entries whose
//! modification time is older than `ttl`. [`Store::close`] (or dropping the
//! store) signals the thread through a channel and joins it. Closing twice
//! is harmless. The sweep only makes sense for a store in the cache role.

use super::{Store, StoreError};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace, warn};

/// Lower bound for the sweep interval so a tiny TTL never spins.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct FilesystemStoreOptions {
    pub root: PathBuf,
    /// Retention for cache use. `None` disables the sweep.
    pub ttl: Option<Duration>,
}

impl FilesystemStoreOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }
}

/// Handle to the background sweep thread.
struct Sweeper {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct FilesystemStore {
    root: PathBuf,
    ttl: Option<Duration>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl FilesystemStore {
    /// Open (creating the root directory if needed) and start the sweep
    /// thread when a TTL is configured.
    pub fn open(options: FilesystemStoreOptions) -> Result<Self, StoreError> {
        let FilesystemStoreOptions { root, ttl } = options;
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            op: "create directory",
            path: root.clone(),
            source,
        })?;

        let sweeper = match ttl {
            Some(ttl) => Some(spawn_sweeper(root.clone(), ttl)?),
            None => None,
        };
        info!(root = %root.display(), ttl = ?ttl, "opened filesystem store");

        Ok(Self {
            root,
            ttl,
            sweeper: Mutex::new(sweeper),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one sweep now. Returns the number of entries removed
    /// (always 0 without a TTL).
    pub fn sweep(&self) -> Result<usize, StoreError> {
        match self.ttl {
            Some(ttl) => sweep_expired(&self.root, ttl, SystemTime::now()).map_err(|source| {
                StoreError::Io {
                    op: "sweep",
                    path: self.root.clone(),
                    source,
                }
            }),
            None => Ok(0),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

impl Store for FilesystemStore {
    fn set(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(
            ".{key}.tmp-{}-{}",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            op: "write",
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Io {
                op: "rename",
                path,
                source,
            });
        }
        trace!(key, bytes = bytes.len(), "stored file");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                op: "read",
                path,
                source,
            }),
        }
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                op: "delete",
                path,
                source,
            }),
        }
    }

    fn close(&self) -> Result<(), StoreError> {
        if let Some(Sweeper { stop, handle }) = self.sweeper.lock().take() {
            // A send error only means the thread already exited.
            let _ = stop.send(());
            if handle.join().is_err() {
                warn!(root = %self.root.display(), "sweep thread panicked");
            }
            debug!(root = %self.root.display(), "stopped sweep thread");
        }
        Ok(())
    }
}

impl Drop for FilesystemStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Keys map straight to file names, so anything that could escape the root
/// or collide with temporary files is rejected.
fn validate_key(key: &str) -> Result<(), StoreError> {
    let reason = if key.is_empty() {
        "empty"
    } else if key.contains(['/', '\\', '\0']) {
        "contains a path separator"
    } else if key.starts_with('.') {
        "starts with '.'"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidKey {
        key: key.to_string(),
        reason,
    })
}

fn spawn_sweeper(root: PathBuf, ttl: Duration) -> Result<Sweeper, StoreError> {
    let (stop, stopped) = mpsc::channel::<()>();
    let interval = (ttl / 2).max(MIN_SWEEP_INTERVAL);
    let thread_root = root.clone();

    let handle = std::thread::Builder::new()
        .name("store-sweep".into())
        .spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        match sweep_expired(&thread_root, ttl, SystemTime::now()) {
                            Ok(0) => {}
                            Ok(removed) => {
                                debug!(root = %thread_root.display(), removed, "swept expired entries")
                            }
                            Err(e) => {
                                warn!(root = %thread_root.display(), error = %e, "sweep failed")
                            }
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            }
        })
        .map_err(|source| StoreError::Io {
            op: "spawn sweep thread for",
            path: root,
            source,
        })?;

    Ok(Sweeper { stop, handle })
}

/// Remove every regular file under `root` last modified more than `ttl`
/// before `now`. Entries that vanish or can't be inspected mid-sweep are
/// skipped.
fn sweep_expired(root: &Path, ttl: Duration, now: SystemTime) -> io::Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(root)? {
        let Ok(entry) = entry else { continue };
        let Ok(meta) = entry.metadata() else { continue };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age > ttl && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}
