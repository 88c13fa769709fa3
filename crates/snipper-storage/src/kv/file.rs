use crate::kv::memory::MemoryStore;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use snipper_core::kv::{KeyValueStore, Result};
use snipper_core::KvError;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// One line of the dump file. Values are base64 so arbitrary bytes
/// survive the JSON encoding.
#[derive(Debug, Serialize, Deserialize)]
struct DumpEntry {
    key: String,
    value: String,
}

impl DumpEntry {
    fn encode(key: &str, value: &[u8]) -> Result<String> {
        let entry = Self {
            key: key.to_string(),
            value: STANDARD.encode(value),
        };
        serde_json::to_string(&entry).map_err(|e| KvError::Encoding(e.to_string()))
    }

    fn decode(line: &str) -> std::result::Result<(String, Vec<u8>), String> {
        let entry: Self = serde_json::from_str(line).map_err(|e| e.to_string())?;
        let value = STANDARD
            .decode(entry.value.as_bytes())
            .map_err(|e| format!("value of key '{}': {e}", entry.key))?;
        Ok((entry.key, value))
    }
}

/// Outcome of replaying a dump file at start-up.
#[derive(Debug, Clone, Default)]
pub struct Replay {
    /// Number of entries applied to the cache.
    pub entries: usize,
    /// Number of lines that could not be decoded.
    pub skipped: usize,
    /// The first failure met during replay, if any.
    pub error: Option<KvError>,
}

impl Replay {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Turns a partial replay into a [`KvError::DumpLoad`] error.
    pub fn into_result(self) -> Result<usize> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.entries),
        }
    }
}

/// Key/value store backed by an append-only file.
///
/// Reads are served from an in-memory cache. Each write appends one JSON
/// line to the file and flushes it before the cache is updated, so a
/// failed write leaves the cache untouched. The writer mutex serialises
/// all writes, which also makes `set_if_absent` atomic.
#[derive(Debug)]
pub struct FileStore {
    cache: MemoryStore,
    writer: Mutex<Option<BufWriter<File>>>,
    path: PathBuf,
}

impl FileStore {
    /// Replays `path` into memory and opens it for appending.
    ///
    /// A missing file is an empty store. Undecodable lines are skipped and
    /// reported through [`Replay`] so the caller can decide whether a
    /// partial load is fatal. Failing to open the file for writing is
    /// always an error.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Replay)> {
        let path = path.as_ref().to_path_buf();
        let cache = MemoryStore::new();
        let (replay, needs_newline) = replay_into(&path, &cache);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| KvError::Io(format!("open {}: {e}", path.display())))?;
        let mut writer = BufWriter::new(file);

        // A torn final line must not swallow the next entry.
        if needs_newline {
            writer
                .write_all(b"\n")
                .and_then(|_| writer.flush())
                .map_err(|e| KvError::Io(format!("repair {}: {e}", path.display())))?;
        }

        debug!(
            path = %path.display(),
            entries = replay.entries,
            skipped = replay.skipped,
            "opened file store"
        );

        Ok((
            Self {
                cache,
                writer: Mutex::new(Some(writer)),
                path,
            },
            replay,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, writer: &mut BufWriter<File>, key: &str, value: &[u8]) -> Result<()> {
        let line = DumpEntry::encode(key, value)?;
        writer
            .write_all(line.as_bytes())
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush())
            .map_err(|e| KvError::Io(format!("append to {}: {e}", self.path.display())))
    }
}

fn replay_into(path: &Path, cache: &MemoryStore) -> (Replay, bool) {
    let mut replay = Replay::default();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return (replay, false),
        Err(e) => {
            replay.error = Some(KvError::DumpLoad(format!("open {}: {e}", path.display())));
            return (replay, false);
        }
    };

    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut line_no = 0usize;
    let mut needs_newline = false;

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                replay.error.get_or_insert(KvError::DumpLoad(format!(
                    "read {} after line {line_no}: {e}",
                    path.display()
                )));
                break;
            }
        }
        line_no += 1;
        needs_newline = !line.ends_with('\n');

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match DumpEntry::decode(trimmed) {
            Ok((key, value)) => {
                // Later lines win.
                cache.insert(key, value);
                replay.entries += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), line = line_no, error = %e, "skipping corrupt dump line");
                replay.skipped += 1;
                replay
                    .error
                    .get_or_insert(KvError::DumpLoad(format!("line {line_no}: {e}")));
            }
        }
    }

    (replay, needs_newline)
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.cache.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(KvError::Closed)?;
        self.append(writer, key, value)?;
        trace!(key = %key, "appended entry");
        self.cache.set(key, value)
    }

    fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool> {
        let mut guard = self.writer.lock();
        let writer = guard.as_mut().ok_or(KvError::Closed)?;
        if self.cache.contains(key) {
            return Ok(false);
        }
        self.append(writer, key, value)?;
        trace!(key = %key, "appended new entry");
        self.cache.set(key, value)?;
        Ok(true)
    }

    fn shutdown(&self) -> Result<()> {
        let Some(mut writer) = self.writer.lock().take() else {
            return Ok(());
        };
        writer
            .flush()
            .map_err(|e| KvError::Io(format!("flush {}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "closed file store");
        Ok(())
    }
}
