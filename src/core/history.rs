// Move journal kept next to the organized tree, one JSON record per executed plan.

use crate::core::executor::{move_file, AppliedMove};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No history records to restore")]
    Empty,

    #[error("Invalid history index {index}; {len} record(s) available")]
    InvalidIndex { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: String,
    pub strategy: String,
    pub moves: Vec<AppliedMove>,
}

impl HistoryRecord {
    pub fn new(strategy: impl Into<String>, moves: Vec<AppliedMove>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            strategy: strategy.into(),
            moves,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSelection {
    Latest,
    Index(usize),
    All,
}

#[derive(Debug, Default)]
pub struct RestoreSummary {
    pub records_restored: usize,
    pub files_restored: usize,
    pub skipped: Vec<PathBuf>,
}

pub struct History {
    file: PathBuf,
}

impl History {
    pub const FILE_NAME: &'static str = ".history.jsonl";

    pub fn new(root: &Path) -> Self {
        Self {
            file: root.join(Self::FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file)?;
        writeln!(out, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// All well-formed records in file order. A missing journal is empty.
    pub fn read_all(&self) -> Result<Vec<HistoryRecord>, HistoryError> {
        Ok(self
            .read_lines()?
            .into_iter()
            .filter_map(|(record, _)| record)
            .collect())
    }

    /// Reverse the selected records' moves and drop them from the journal.
    /// Files whose original location is occupied again, or that fail to move,
    /// are left where they are and listed in `skipped`.
    pub fn restore(&self, selection: RestoreSelection) -> Result<RestoreSummary, HistoryError> {
        let lines = self.read_lines()?;
        let valid: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, (record, _))| record.is_some())
            .map(|(i, _)| i)
            .collect();
        if valid.is_empty() {
            return Err(HistoryError::Empty);
        }

        let chosen: Vec<usize> = match selection {
            RestoreSelection::All => valid.clone(),
            RestoreSelection::Latest => vec![valid[valid.len() - 1]],
            RestoreSelection::Index(index) => match valid.get(index) {
                Some(&line) => vec![line],
                None => {
                    return Err(HistoryError::InvalidIndex {
                        index,
                        len: valid.len(),
                    });
                }
            },
        };

        let mut summary = RestoreSummary::default();
        // Newest first so chained moves unwind in order.
        for &line in chosen.iter().rev() {
            let Some(record) = &lines[line].0 else {
                continue;
            };
            for applied in record.moves.iter().rev() {
                if !applied.to.exists() || applied.from.exists() {
                    log::warn!(
                        "Cannot restore {} → {}; skipping",
                        applied.to.display(),
                        applied.from.display()
                    );
                    summary.skipped.push(applied.to.clone());
                    continue;
                }
                let moved = match applied.from.parent() {
                    Some(parent) => fs::create_dir_all(parent),
                    None => Ok(()),
                }
                .and_then(|()| move_file(&applied.to, &applied.from));
                match moved {
                    Ok(()) => summary.files_restored += 1,
                    Err(e) => {
                        log::warn!(
                            "Failed to restore {} → {}: {}",
                            applied.to.display(),
                            applied.from.display(),
                            e
                        );
                        summary.skipped.push(applied.to.clone());
                    }
                }
            }
            summary.records_restored += 1;
        }

        let remaining: String = lines
            .iter()
            .enumerate()
            .filter(|(i, _)| !chosen.contains(i))
            .map(|(_, (_, raw))| format!("{raw}\n"))
            .collect();
        fs::write(&self.file, remaining)?;

        log::info!(
            "Restored {} file(s) from {} record(s)",
            summary.files_restored,
            summary.records_restored
        );
        Ok(summary)
    }

    fn read_lines(&self) -> Result<Vec<(Option<HistoryRecord>, String)>, HistoryError> {
        let f = match File::open(&self.file) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = Vec::new();
        for (i, line) in BufReader::new(f).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = match serde_json::from_str::<HistoryRecord>(&line) {
                Ok(record) => Some(record),
                Err(err) => {
                    log::warn!("Skipping malformed history entry {}: {}", i, err);
                    None
                }
            };
            lines.push((record, line));
        }
        Ok(lines)
    }
}
