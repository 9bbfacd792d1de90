//! Durable per-page completion ledger enabling resumable runs.
//!
//! The ledger is the source of truth for what a previous run already
//! produced. A page's entry reaches a terminal status only after its output
//! and assets are durably on disk. The ledger write is always the last
//! step, so a crash at any earlier point causes safe reprocessing instead
//! of a silent gap.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File name of the ledger inside the output directory.
pub const LEDGER_FILE: &str = "ledger.json";

const LOCK_FILE: &str = "ledger.lock";

/// Completion status of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Not yet processed
    Pending,
    /// Processed from native text extraction
    Done,
    /// Processed from optical-recognition output; a later run in a stricter
    /// mode can selectively reprocess these pages
    OcrUsed,
}

/// Durable record of one page's completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// 1-indexed page number
    pub page: u32,

    /// Terminal status of the page
    pub status: PageStatus,

    /// Byte offset of the end of this page's appended output
    pub end_offset: u64,

    /// MD5 hash of the appended bytes, checked before the offset is trusted
    /// on resume
    pub content_hash: String,

    /// When the entry was written
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Whether the page reached a terminal status.
    pub fn is_done(&self) -> bool {
        self.status != PageStatus::Pending
    }
}

/// Exclusive-acquisition guard over the ledger's backing store.
///
/// Created with `create_new` so two processes cannot both hold it; removed
/// on drop, which covers every exit path including cancellation.
#[derive(Debug)]
struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(Error::LedgerLocked(path.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[derive(Debug, Serialize)]
struct LedgerDoc<'a> {
    header_end: u64,
    pages: BTreeMap<String, &'a LedgerEntry>,
    warnings: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_seconds: Option<f64>,
}

/// The durable per-page completion ledger. Single-writer by construction.
#[derive(Debug)]
pub struct ResumeLedger {
    path: PathBuf,
    header_end: u64,
    entries: BTreeMap<u32, LedgerEntry>,
    warnings: Vec<String>,
    duration_seconds: Option<f64>,
    _lock: LedgerLock,
}

impl ResumeLedger {
    /// Open the ledger in `dir`, acquiring the exclusive lock for the run.
    ///
    /// With `force` set, all prior entries are cleared before the run
    /// starts; otherwise existing records are loaded, treating any
    /// malformed record as pending.
    pub fn open(dir: &Path, force: bool) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let lock = LedgerLock::acquire(dir)?;

        let mut ledger = Self {
            path: dir.join(LEDGER_FILE),
            header_end: 0,
            entries: BTreeMap::new(),
            warnings: Vec::new(),
            duration_seconds: None,
            _lock: lock,
        };

        if force {
            ledger.reset()?;
        } else if ledger.path.exists() {
            ledger.load();
        }

        Ok(ledger)
    }

    /// Load entries from disk, skipping anything unreadable.
    ///
    /// Corruption is never trusted: a malformed record means the page is
    /// treated as pending and reprocessed.
    fn load(&mut self) {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Cannot read ledger {}: {}", self.path.display(), e);
                return;
            }
        };

        let doc: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!(
                    "Ledger {} is corrupt ({}); all pages will be reprocessed",
                    self.path.display(),
                    e
                );
                return;
            }
        };

        self.header_end = doc
            .get("header_end")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);

        if let Some(pages) = doc.get("pages").and_then(|v| v.as_object()) {
            for (key, value) in pages {
                match (
                    key.parse::<u32>(),
                    serde_json::from_value::<LedgerEntry>(value.clone()),
                ) {
                    (Ok(page), Ok(entry)) => {
                        self.entries.insert(page, entry);
                    }
                    _ => {
                        log::warn!(
                            "Ignoring malformed ledger record for page {}; it will be reprocessed",
                            key
                        );
                    }
                }
            }
        }
    }

    /// Whether a page already reached a terminal status.
    pub fn is_done(&self, page: u32) -> bool {
        self.entries.get(&page).is_some_and(LedgerEntry::is_done)
    }

    /// The entry for a page, if any.
    pub fn entry(&self, page: u32) -> Option<&LedgerEntry> {
        self.entries.get(&page)
    }

    /// End offset of the document header.
    pub fn header_end(&self) -> u64 {
        self.header_end
    }

    /// Record the header end offset (set once when the document is created).
    pub fn set_header_end(&mut self, offset: u64) -> Result<()> {
        self.header_end = offset;
        self.persist()
    }

    /// The last durably appended page, if any.
    pub fn last_done(&self) -> Option<&LedgerEntry> {
        self.entries.values().rev().find(|e| e.is_done())
    }

    /// End offset of the greatest done page before `page`, else the header.
    pub fn previous_end(&self, page: u32) -> u64 {
        self.entries
            .range(..page)
            .rev()
            .find(|(_, e)| e.is_done())
            .map(|(_, e)| e.end_offset)
            .unwrap_or(self.header_end)
    }

    /// Byte offset up to which the output document is durable.
    pub fn resume_offset(&self) -> u64 {
        self.last_done()
            .map(|e| e.end_offset)
            .unwrap_or(self.header_end)
    }

    /// Mark a page done. Called exactly once per page per run, strictly
    /// after the page's output and assets are durably persisted.
    pub fn mark_done(
        &mut self,
        page: u32,
        status: PageStatus,
        end_offset: u64,
        content_hash: impl Into<String>,
    ) -> Result<()> {
        if self.is_done(page) {
            return Err(Error::Other(format!(
                "page {} is already recorded as done",
                page
            )));
        }
        self.entries.insert(
            page,
            LedgerEntry {
                page,
                status,
                end_offset,
                content_hash: content_hash.into(),
                timestamp: Utc::now(),
            },
        );
        self.persist()
    }

    /// Drop a page's entry so it is reprocessed (used when its recorded
    /// output fails verification on resume).
    pub fn invalidate(&mut self, page: u32) -> Result<()> {
        self.entries.remove(&page);
        self.persist()
    }

    /// Clear all entries. Invoked by force-restart runs.
    pub fn reset(&mut self) -> Result<()> {
        self.entries.clear();
        self.warnings.clear();
        self.duration_seconds = None;
        self.header_end = 0;
        self.persist()
    }

    /// Shift all recorded offsets by `delta` after the document head was
    /// rewritten (table-of-contents insertion).
    pub fn shift_offsets(&mut self, delta: i64) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        self.header_end = self.header_end.saturating_add_signed(delta);
        for entry in self.entries.values_mut() {
            entry.end_offset = entry.end_offset.saturating_add_signed(delta);
        }
        self.persist()
    }

    /// Persist run-level outcome alongside the page records.
    pub fn record_run(&mut self, warnings: Vec<String>, duration_seconds: f64) -> Result<()> {
        self.warnings = warnings;
        self.duration_seconds = Some(duration_seconds);
        self.persist()
    }

    /// Pages recorded with `ocr_used` status, ascending.
    pub fn ocr_pages(&self) -> Vec<u32> {
        self.entries
            .values()
            .filter(|e| e.status == PageStatus::OcrUsed)
            .map(|e| e.page)
            .collect()
    }

    /// All done pages, ascending.
    pub fn done_pages(&self) -> Vec<u32> {
        self.entries
            .values()
            .filter(|e| e.is_done())
            .map(|e| e.page)
            .collect()
    }

    /// Write the ledger atomically: temp file in the same directory, synced,
    /// then renamed over the old one.
    fn persist(&self) -> Result<()> {
        let doc = LedgerDoc {
            header_end: self.header_end,
            pages: self
                .entries
                .iter()
                .map(|(page, entry)| (page.to_string(), entry))
                .collect(),
            warnings: &self.warnings,
            duration_seconds: self.duration_seconds,
        };

        let json = serde_json::to_string_pretty(&doc)?;
        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
