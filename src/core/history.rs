use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::lib::{ElectronError, ElectronResult, Message, Role};

/// Number of past exchanges sent along with each new query.
pub const CONTEXT_WINDOW: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    pub user: String,
    pub assistant: String,
}

impl InteractionRecord {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Append-only exchange log backed by a JSON Lines file.
#[derive(Debug)]
pub struct InteractionHistory {
    path: PathBuf,
    file: File,
    records: Vec<InteractionRecord>,
    // The file ends mid-line, e.g. after an interrupted write or a hand edit.
    needs_newline: bool,
}

impl InteractionHistory {
    pub fn open(path: impl Into<PathBuf>) -> ElectronResult<Self> {
        let path = path.into();
        let (records, needs_newline) = read_records(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| history_error(&path, "open", e))?;
        debug!("Loaded {} interactions from '{}'", records.len(), path.display());
        Ok(Self {
            path,
            file,
            records,
            needs_newline,
        })
    }

    /// Loads `path` with a handle that rejects every write.
    #[cfg(test)]
    pub(crate) fn open_read_only(path: impl Into<PathBuf>) -> ElectronResult<Self> {
        let path = path.into();
        let (records, needs_newline) = read_records(&path)?;
        let file = OpenOptions::new()
            .read(true)
            .open(&path)
            .map_err(|e| history_error(&path, "open", e))?;
        Ok(Self {
            path,
            file,
            records,
            needs_newline,
        })
    }

    pub fn append(
        &mut self,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) -> ElectronResult<&InteractionRecord> {
        let record = InteractionRecord::new(user, assistant);
        let encoded = serde_json::to_string(&record)
            .map_err(|e| ElectronError::HistoryError(format!("Failed to encode record: {}", e)))?;
        let mut line = String::with_capacity(encoded.len() + 2);
        if self.needs_newline {
            line.push('\n');
        }
        line.push_str(&encoded);
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| history_error(&self.path, "write", e))?;
        self.needs_newline = false;
        self.records.push(record);
        Ok(&self.records[self.records.len() - 1])
    }

    pub fn all(&self) -> &[InteractionRecord] {
        &self.records
    }

    /// At most the `n` most recent records, oldest first.
    pub fn last(&self, n: usize) -> &[InteractionRecord] {
        let start = self.records.len().saturating_sub(n);
        &self.records[start..]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last `window` exchanges as alternating user/assistant messages.
    pub fn context(&self, window: usize) -> Vec<Message> {
        self.last(window)
            .iter()
            .flat_map(|record| {
                [
                    Message::new(Role::User, record.user.as_str()),
                    Message::new(Role::Assistant, record.assistant.as_str()),
                ]
            })
            .collect()
    }
}

/// Decodes every readable line; also reports whether the file lacks a final newline.
fn read_records(path: &Path) -> ElectronResult<(Vec<InteractionRecord>, bool)> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok((Vec::new(), false)),
        Err(e) => return Err(history_error(path, "read", e)),
    };
    let needs_newline = contents.last().map_or(false, |byte| *byte != b'\n');

    let mut records = Vec::new();
    for (index, line) in contents.split(|byte| *byte == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<InteractionRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                "Skipping corrupted history line {} in '{}': {}",
                index + 1,
                path.display(),
                e
            ),
        }
    }
    Ok((records, needs_newline))
}

fn history_error(path: &Path, action: &str, e: std::io::Error) -> ElectronError {
    ElectronError::HistoryError(format!("Failed to {} '{}': {}", action, path.display(), e))
}
