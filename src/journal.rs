//! Audit journal
//!
//! Append-only, per-channel record log of monitor, trade and order activity.
//! Each session writes into a fresh `session-N` directory under the journal
//! root, one CSV file per channel.
//!
//! `append` only encodes into memory. Rows reach disk on `flush`, which runs
//! the write on the blocking pool when called inside a tokio runtime, and on
//! `close_all`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Monitor loop channel
pub const MONITOR_CHANNEL: &str = "monitor";
/// Trade loop channel
pub const TRADE_CHANNEL: &str = "trade";
/// Order dispatcher channel
pub const ORDERS_CHANNEL: &str = "orders";

/// Destination for audit records
pub trait AuditSink: Send + Sync {
    /// Append one record to `channel`
    fn append(&self, channel: &str, record: Vec<String>);
    /// Flush buffered records of `channel`
    fn flush(&self, channel: &str);
    /// Flush and close every channel
    fn close_all(&self);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Encode one record as a CSV row, newline terminated
fn encode_row(record: &[String]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(record)
        .map_err(|e| Error::Serialization(format!("CSV record: {}", e)))?;
    writer
        .into_inner()
        .map_err(|e| Error::Serialization(format!("CSV record: {}", e)))
}

/// One channel file and its not-yet-written rows
struct ChannelFile {
    pending: Mutex<Vec<u8>>,
    file: Mutex<File>,
}

impl ChannelFile {
    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            pending: Mutex::new(Vec::new()),
            file: Mutex::new(file),
        })
    }

    fn push(&self, record: &[String]) -> Result<()> {
        let row = encode_row(record)?;
        lock(&self.pending).extend_from_slice(&row);
        Ok(())
    }

    /// Move pending rows to disk
    ///
    /// `file` is held while `pending` is drained, so concurrent flushes
    /// write rows in append order.
    fn write_out(&self) -> Result<()> {
        let mut file = lock(&self.file);
        let rows = std::mem::take(&mut *lock(&self.pending));

        if rows.is_empty() {
            return Ok(());
        }
        file.write_all(&rows)?;
        file.flush()?;
        Ok(())
    }
}

/// File-backed journal for one trading session
pub struct SessionJournal {
    session_dir: PathBuf,
    channels: Mutex<HashMap<String, Arc<ChannelFile>>>,
}

impl SessionJournal {
    /// Create the next `session-N` directory under `root`
    pub fn create(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .map_err(|e| Error::Io(format!("Failed to create {}: {}", root.display(), e)))?;

        let next = next_session_number(root)?;
        let session_dir = root.join(format!("session-{}", next));
        fs::create_dir_all(&session_dir)
            .map_err(|e| Error::Io(format!("Failed to create {}: {}", session_dir.display(), e)))?;

        info!("Audit journal session at {}", session_dir.display());

        Ok(Self {
            session_dir,
            channels: Mutex::new(HashMap::new()),
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Path of a channel's file
    pub fn channel_path(&self, channel: &str) -> PathBuf {
        self.session_dir.join(format!("{}.log", channel))
    }

    fn channel(&self, channel: &str) -> Result<Arc<ChannelFile>> {
        let mut channels = lock(&self.channels);
        if let Some(file) = channels.get(channel) {
            return Ok(file.clone());
        }

        let file = Arc::new(ChannelFile::open(&self.channel_path(channel))?);
        channels.insert(channel.to_string(), file.clone());
        Ok(file)
    }
}

/// Highest existing `session-N` + 1, or 0
fn next_session_number(root: &Path) -> Result<u64> {
    let highest = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix("session-"))
                .and_then(|n| n.parse::<u64>().ok())
        })
        .max();

    Ok(highest.map(|n| n + 1).unwrap_or(0))
}

impl AuditSink for SessionJournal {
    fn append(&self, channel: &str, record: Vec<String>) {
        if let Err(e) = self.channel(channel).and_then(|file| file.push(&record)) {
            warn!("Failed to write {} record: {}", channel, e);
        }
    }

    fn flush(&self, channel: &str) {
        let Some(file) = lock(&self.channels).get(channel).cloned() else {
            return;
        };

        let channel = channel.to_string();
        let write_out = move || {
            if let Err(e) = file.write_out() {
                warn!("Failed to flush {} journal: {}", channel, e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write_out);
            }
            Err(_) => write_out(),
        }
    }

    fn close_all(&self) {
        let channels: Vec<_> = lock(&self.channels).drain().collect();
        for (channel, file) in channels {
            if let Err(e) = file.write_out() {
                warn!("Failed to flush {} journal: {}", channel, e);
            }
        }
    }
}

/// In-memory journal, used when inspecting records directly
#[derive(Default)]
pub struct MemoryJournal {
    records: Mutex<HashMap<String, Vec<Vec<String>>>>,
    flushes: Mutex<HashMap<String, usize>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records appended to `channel`
    pub fn records(&self, channel: &str) -> Vec<Vec<String>> {
        lock(&self.records).get(channel).cloned().unwrap_or_default()
    }

    /// Times `channel` was flushed
    pub fn flush_count(&self, channel: &str) -> usize {
        lock(&self.flushes).get(channel).copied().unwrap_or(0)
    }
}

impl AuditSink for MemoryJournal {
    fn append(&self, channel: &str, record: Vec<String>) {
        lock(&self.records)
            .entry(channel.to_string())
            .or_default()
            .push(record);
    }

    fn flush(&self, channel: &str) {
        *lock(&self.flushes).entry(channel.to_string()).or_default() += 1;
    }

    fn close_all(&self) {}
}

/// Discards everything (journal disabled)
pub struct NullJournal;

impl AuditSink for NullJournal {
    fn append(&self, _channel: &str, _record: Vec<String>) {}
    fn flush(&self, _channel: &str) {}
    fn close_all(&self) {}
}
