//! Collaborator interfaces: page sources and optical-recognition engines.
//!
//! The pipeline never parses document bytes itself. It consumes pages
//! through the [`PageSource`] trait and invokes optical recognition through
//! the [`OcrEngine`] trait, so byte-level parsing, table detection, and the
//! recognition engine all stay behind these seams.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{DocMetadata, Fragment, PageGeometry, Region};

/// An image detected on a page, with its pixel data and an optional caption
/// candidate supplied by the source.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Bounding box on the page
    pub bounds: Region,
    /// Encoded image bytes (typically PNG)
    pub data: Vec<u8>,
    /// Caption text, if the source already knows one
    pub caption: Option<String>,
}

/// A table detected on a page, with its extracted cell rows.
///
/// The detection algorithm itself is the source's concern; the pipeline
/// only places the rows and suppresses overlapping text.
#[derive(Debug, Clone)]
pub struct PageTable {
    /// Bounding box on the page
    pub bounds: Region,
    /// Extracted cell rows
    pub rows: Vec<Vec<String>>,
}

/// A paginated document source.
///
/// Implementations must be cheap to query per page; the pipeline reads each
/// selected page exactly once and never retains its data afterwards.
pub trait PageSource {
    /// Total number of pages in the document.
    fn page_count(&self) -> u32;

    /// Document metadata.
    fn metadata(&self) -> DocMetadata {
        DocMetadata::default()
    }

    /// Page dimensions.
    fn geometry(&self, page: u32) -> Result<PageGeometry>;

    /// Positioned text fragments of a page.
    fn fragments(&self, page: u32) -> Result<Vec<Fragment>>;

    /// Images detected on a page.
    fn images(&self, _page: u32) -> Result<Vec<PageImage>> {
        Ok(Vec::new())
    }

    /// Tables detected on a page.
    fn tables(&self, _page: u32) -> Result<Vec<PageTable>> {
        Ok(Vec::new())
    }

    /// Rendered bitmap of a page, for optical recognition. `None` when the
    /// source cannot produce one.
    fn page_image(&self, _page: u32) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// An optical-recognition engine.
///
/// Returns raw text lines with no font metadata; the classifier falls back
/// to symbol-density and indentation signals for such lines.
pub trait OcrEngine {
    /// Whether the engine can actually run in this environment.
    fn is_available(&self) -> bool {
        true
    }

    /// Recognize text lines in an encoded page image.
    fn recognize(&self, image: &[u8]) -> Result<Vec<String>>;
}

/// The no-op engine used when no optical recognition is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOcr;

impl OcrEngine for NullOcr {
    fn is_available(&self) -> bool {
        false
    }

    fn recognize(&self, _image: &[u8]) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// An engine that shells out to an external recognizer binary.
///
/// The binary is invoked as `<program> <image-file> stdout -l <language>`,
/// matching the tesseract CLI convention.
#[derive(Debug, Clone)]
pub struct CommandOcr {
    program: String,
    language: String,
}

impl CommandOcr {
    /// Create an engine for the given program and language.
    pub fn new(program: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }

    /// The conventional tesseract setup with English text.
    pub fn tesseract() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl OcrEngine for CommandOcr {
    fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn recognize(&self, image: &[u8]) -> Result<Vec<String>> {
        let mut scratch = tempfile::NamedTempFile::new()?;
        scratch.write_all(image)?;
        scratch.flush()?;

        let output = Command::new(&self.program)
            .arg(scratch.path())
            .arg("stdout")
            .args(["-l", &self.language])
            .output()?;

        if !output.status.success() {
            return Err(Error::Ocr(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let lines: Vec<String> = text
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect();

        // Trim fully blank head and tail, keep interior blanks (they
        // separate paragraphs).
        let start = lines.iter().position(|l| !l.trim().is_empty());
        let end = lines.iter().rposition(|l| !l.trim().is_empty());
        Ok(match (start, end) {
            (Some(s), Some(e)) => lines[s..=e].to_vec(),
            _ => Vec::new(),
        })
    }
}

/// A page held by [`MemorySource`].
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    /// Page dimensions
    pub geometry: PageGeometry,
    /// Text fragments in any order
    pub fragments: Vec<Fragment>,
    /// Detected images
    pub images: Vec<PageImage>,
    /// Detected tables
    pub tables: Vec<PageTable>,
    /// Rendered page bitmap, if available
    pub page_image: Option<Vec<u8>>,
}

/// An in-memory page source for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    /// Document metadata
    pub metadata: DocMetadata,
    /// Pages in document order
    pub pages: Vec<MemoryPage>,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new(metadata: DocMetadata) -> Self {
        Self {
            metadata,
            pages: Vec::new(),
        }
    }

    /// Append a page and return the source for chaining.
    pub fn with_page(mut self, page: MemoryPage) -> Self {
        self.pages.push(page);
        self
    }

    fn page(&self, page: u32) -> Result<&MemoryPage> {
        if page == 0 {
            return Err(Error::PageOutOfRange(page, self.page_count()));
        }
        self.pages
            .get((page - 1) as usize)
            .ok_or(Error::PageOutOfRange(page, self.page_count()))
    }
}

impl PageSource for MemorySource {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn metadata(&self) -> DocMetadata {
        let mut meta = self.metadata.clone();
        meta.page_count = self.page_count();
        meta
    }

    fn geometry(&self, page: u32) -> Result<PageGeometry> {
        Ok(self.page(page)?.geometry)
    }

    fn fragments(&self, page: u32) -> Result<Vec<Fragment>> {
        Ok(self.page(page)?.fragments.clone())
    }

    fn images(&self, page: u32) -> Result<Vec<PageImage>> {
        Ok(self.page(page)?.images.clone())
    }

    fn tables(&self, page: u32) -> Result<Vec<PageTable>> {
        Ok(self.page(page)?.tables.clone())
    }

    fn page_image(&self, page: u32) -> Result<Option<Vec<u8>>> {
        Ok(self.page(page)?.page_image.clone())
    }
}

/// On-disk schema of a fragment-dump document consumed by [`JsonSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonDocument {
    #[serde(default)]
    metadata: DocMetadata,
    pages: Vec<JsonPage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonPage {
    width: f32,
    height: f32,
    #[serde(default)]
    fragments: Vec<Fragment>,
    #[serde(default)]
    images: Vec<JsonImage>,
    #[serde(default)]
    tables: Vec<JsonTable>,
    /// Relative path to a rendered page bitmap
    #[serde(default)]
    page_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonImage {
    bounds: Region,
    /// Relative path to the image file
    path: String,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JsonTable {
    bounds: Region,
    rows: Vec<Vec<String>>,
}

/// A page source backed by a fragment-dump JSON document.
///
/// The dump carries per-page geometry, positioned fragments, and detected
/// image/table entries; file paths inside it resolve relative to the dump's
/// own directory.
#[derive(Debug)]
pub struct JsonSource {
    base_dir: PathBuf,
    doc: JsonDocument,
}

impl JsonSource {
    /// Load a fragment-dump document from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let doc: JsonDocument = serde_json::from_str(&raw)?;
        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self { base_dir, doc })
    }

    fn page(&self, page: u32) -> Result<&JsonPage> {
        if page == 0 {
            return Err(Error::PageOutOfRange(page, self.page_count()));
        }
        self.doc
            .pages
            .get((page - 1) as usize)
            .ok_or(Error::PageOutOfRange(page, self.page_count()))
    }

    fn read_relative(&self, page: u32, rel: &str) -> Result<Vec<u8>> {
        std::fs::read(self.base_dir.join(rel)).map_err(|e| Error::SourceRead {
            page,
            reason: format!("cannot read `{}`: {}", rel, e),
        })
    }
}

impl PageSource for JsonSource {
    fn page_count(&self) -> u32 {
        self.doc.pages.len() as u32
    }

    fn metadata(&self) -> DocMetadata {
        let mut meta = self.doc.metadata.clone();
        meta.page_count = self.page_count();
        meta
    }

    fn geometry(&self, page: u32) -> Result<PageGeometry> {
        let p = self.page(page)?;
        Ok(PageGeometry::new(p.width, p.height))
    }

    fn fragments(&self, page: u32) -> Result<Vec<Fragment>> {
        let p = self.page(page)?;
        let mut fragments = p.fragments.clone();
        for frag in &mut fragments {
            if frag.page == 0 {
                frag.page = page;
            }
        }
        Ok(fragments)
    }

    fn images(&self, page: u32) -> Result<Vec<PageImage>> {
        let p = self.page(page)?;
        let mut images = Vec::with_capacity(p.images.len());
        for entry in &p.images {
            images.push(PageImage {
                bounds: entry.bounds,
                data: self.read_relative(page, &entry.path)?,
                caption: entry.caption.clone(),
            });
        }
        Ok(images)
    }

    fn tables(&self, page: u32) -> Result<Vec<PageTable>> {
        let p = self.page(page)?;
        Ok(p.tables
            .iter()
            .map(|t| PageTable {
                bounds: t.bounds,
                rows: t.rows.clone(),
            })
            .collect())
    }

    fn page_image(&self, page: u32) -> Result<Option<Vec<u8>>> {
        let p = self.page(page)?;
        match &p.page_image {
            Some(rel) => Ok(Some(self.read_relative(page, rel)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> MemorySource {
        MemorySource::new(DocMetadata {
            title: Some("Sample".to_string()),
            ..Default::default()
        })
        .with_page(MemoryPage {
            fragments: vec![Fragment::new(
                "Hello",
                Region::new(72.0, 72.0, 120.0, 84.0),
                12.0,
                "Helvetica",
                1,
            )],
            ..Default::default()
        })
    }

    #[test]
    fn test_memory_source_pages() {
        let source = sample_source();
        assert_eq!(source.page_count(), 1);
        assert_eq!(source.fragments(1).unwrap().len(), 1);
        assert!(source.fragments(2).is_err());
        assert!(source.fragments(0).is_err());
    }

    #[test]
    fn test_memory_source_metadata_page_count() {
        let source = sample_source();
        assert_eq!(source.metadata().page_count, 1);
    }

    #[test]
    fn test_null_ocr_unavailable() {
        let ocr = NullOcr;
        assert!(!ocr.is_available());
        assert!(ocr.recognize(b"png").unwrap().is_empty());
    }

    #[test]
    fn test_json_source_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "metadata": { "title": "Dump" },
            "pages": [
                {
                    "width": 612.0,
                    "height": 792.0,
                    "fragments": [
                        {
                            "text": "Intro",
                            "bounds": { "x0": 72.0, "y0": 80.0, "x1": 200.0, "y1": 102.0 },
                            "font_name": "Helvetica-Bold",
                            "font_size": 22.0
                        }
                    ],
                    "tables": [
                        {
                            "bounds": { "x0": 72.0, "y0": 300.0, "x1": 540.0, "y1": 400.0 },
                            "rows": [["a", "b"], ["1", "2"]]
                        }
                    ]
                }
            ]
        }"#;
        let path = dir.path().join("doc.json");
        std::fs::write(&path, json).unwrap();

        let source = JsonSource::open(&path).unwrap();
        assert_eq!(source.page_count(), 1);
        assert_eq!(source.metadata().title.as_deref(), Some("Dump"));

        let fragments = source.fragments(1).unwrap();
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].bold);
        assert_eq!(fragments[0].page, 1);

        let tables = source.tables(1).unwrap();
        assert_eq!(tables[0].rows.len(), 2);

        assert!(source.page_image(1).unwrap().is_none());
    }

    #[test]
    fn test_json_source_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let json = r#"{
            "pages": [
                {
                    "width": 612.0,
                    "height": 792.0,
                    "images": [
                        {
                            "bounds": { "x0": 0.0, "y0": 0.0, "x1": 10.0, "y1": 10.0 },
                            "path": "missing.png"
                        }
                    ]
                }
            ]
        }"#;
        let path = dir.path().join("doc.json");
        std::fs::write(&path, json).unwrap();

        let source = JsonSource::open(&path).unwrap();
        assert!(matches!(
            source.images(1),
            Err(Error::SourceRead { page: 1, .. })
        ));
    }
}
