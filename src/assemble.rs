//! Ordered, append-only assembly of the output document.
//!
//! The assembler owns the single growing Markdown file. Pages are appended
//! strictly in document order and synced before the ledger records them; on
//! resume it verifies the last durable page's content hash and truncates
//! anything past the last durable offset, so a crash mid-append never
//! leaves duplicated or phantom output.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use crate::error::Result;
use crate::ledger::ResumeLedger;
use crate::model::DocMetadata;
use crate::render::{insert_toc, TOC_END, TOC_START};

/// File name of the assembled document inside the output directory.
pub const DOCUMENT_FILE: &str = "document.md";

/// The append-only output stream over the assembled document.
#[derive(Debug)]
pub struct Assembler {
    path: PathBuf,
    file: File,
    offset: u64,
}

impl Assembler {
    /// Open the output document, writing the header on first use and
    /// truncating any partially appended page when resuming.
    pub fn open(dir: &Path, metadata: &DocMetadata, ledger: &mut ResumeLedger) -> Result<Self> {
        let path = dir.join(DOCUMENT_FILE);
        let file_len = if path.exists() {
            fs::metadata(&path)?.len()
        } else {
            0
        };

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let mut assembler = Self {
            path,
            file,
            offset: 0,
        };

        if ledger.header_end() == 0 || file_len < ledger.header_end() {
            if ledger.header_end() != 0 || !ledger.done_pages().is_empty() {
                log::warn!(
                    "Output document is missing or shorter than its header; restarting output"
                );
                ledger.reset()?;
            }
            assembler.write_header(metadata, ledger)?;
        } else {
            assembler.resume(file_len, ledger)?;
        }

        Ok(assembler)
    }

    fn write_header(&mut self, metadata: &DocMetadata, ledger: &mut ResumeLedger) -> Result<()> {
        let header = document_header(metadata);
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(header.as_bytes())?;
        self.file.sync_all()?;
        self.offset = header.len() as u64;
        ledger.set_header_end(self.offset)
    }

    /// Walk back over recorded pages until one verifies against its content
    /// hash, then truncate to that page's end offset.
    fn resume(&mut self, file_len: u64, ledger: &mut ResumeLedger) -> Result<()> {
        loop {
            let Some((page, end, hash)) = ledger
                .last_done()
                .map(|e| (e.page, e.end_offset, e.content_hash.clone()))
            else {
                break;
            };

            let start = ledger.previous_end(page);
            if end <= file_len && start <= end && self.hash_range(start, end)? == hash {
                break;
            }

            log::warn!(
                "Recorded output for page {} fails verification; it will be reprocessed",
                page
            );
            ledger.invalidate(page)?;
        }

        let target = ledger.resume_offset().min(file_len);
        if target < file_len {
            log::info!(
                "Truncating {} bytes of non-durable output",
                file_len - target
            );
        }
        self.file.set_len(target)?;
        self.file.sync_all()?;
        self.file.seek(SeekFrom::End(0))?;
        self.offset = target;
        Ok(())
    }

    /// Append one page's rendered Markdown, durably.
    ///
    /// Returns the new end offset and the MD5 hash of the appended bytes,
    /// exactly what the ledger records for the page.
    pub fn append_page(&mut self, markdown: &str) -> Result<(u64, String)> {
        let bytes = markdown.as_bytes();
        self.file.write_all(bytes)?;
        self.file.sync_all()?;
        self.offset += bytes.len() as u64;
        Ok((self.offset, hash_bytes(bytes)))
    }

    /// Current end offset of the document.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path of the assembled document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Regenerate the table of contents between the header markers and
    /// shift the ledger's offsets by the rewrite delta.
    pub fn finish_toc(&mut self, ledger: &mut ResumeLedger) -> Result<()> {
        let content = fs::read_to_string(&self.path)?;
        let (updated, delta) = insert_toc(&content);
        if updated == content {
            return Ok(());
        }

        let tmp = self.path.with_extension("md.tmp");
        {
            let mut file = File::create(&tmp)?;
            file.write_all(updated.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.file.seek(SeekFrom::End(0))?;
        self.offset = updated.len() as u64;
        ledger.shift_offsets(delta)
    }

    fn hash_range(&mut self, start: u64, end: u64) -> Result<String> {
        let len = (end - start) as usize;
        self.file.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; len];
        self.file.read_exact(&mut buf)?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(hash_bytes(&buf))
    }
}

/// MD5 hex digest of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn document_header(metadata: &DocMetadata) -> String {
    let mut header = metadata.to_yaml_frontmatter();
    header.push('\n');
    header.push_str(TOC_START);
    header.push('\n');
    header.push_str(TOC_END);
    header.push_str("\n\n");
    header
}
