//! Durable writes of extracted page assets.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Durable storage for image and table assets, keyed by page and sequence
/// number. Returns stable relative identifiers used in `ImageRef` /
/// `TableRef` placeholders.
pub trait AssetWriter {
    /// Write an image asset, returning its relative identifier.
    fn write_image(&mut self, page: u32, seq: u32, data: &[u8]) -> Result<String>;

    /// Write a table asset as CSV, returning its relative identifier.
    fn write_table(&mut self, page: u32, seq: u32, rows: &[Vec<String>]) -> Result<String>;
}

/// Filesystem asset writer: `images/pNNNN_imgMM.png` and
/// `tables/pNNNN_tableMM.csv` under the output directory.
#[derive(Debug)]
pub struct DirAssetWriter {
    root: PathBuf,
}

impl DirAssetWriter {
    /// Create the writer and its subdirectories.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("images"))?;
        fs::create_dir_all(root.join("tables"))?;
        Ok(Self { root })
    }
}

impl AssetWriter for DirAssetWriter {
    fn write_image(&mut self, page: u32, seq: u32, data: &[u8]) -> Result<String> {
        let rel = format!("images/p{:04}_img{:02}.png", page, seq);
        let path = self.root.join(&rel);
        let mut file = File::create(&path)?;
        file.write_all(data)?;
        file.sync_all()?;
        Ok(rel)
    }

    fn write_table(&mut self, page: u32, seq: u32, rows: &[Vec<String>]) -> Result<String> {
        let rel = format!("tables/p{:04}_table{:02}.csv", page, seq);
        let path = self.root.join(&rel);
        let file = File::create(&path)?;
        let mut writer = csv::Writer::from_writer(file);
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| Error::AssetWrite(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| Error::AssetWrite(e.to_string()))?;
        writer
            .into_inner()
            .map_err(|e| Error::AssetWrite(e.to_string()))?
            .sync_all()?;
        Ok(rel)
    }
}
