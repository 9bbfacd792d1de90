//! The per-page processing driver.
//!
//! Pages are processed strictly in document order, one at a time: fragment
//! retrieval, signal extraction, classification, the optical-recognition
//! fallback decision, element emission, and, last of all, the ledger
//! update. Collaborator calls (optical recognition, table extraction) run
//! on worker threads bounded by the configured timeout, so one malformed
//! page can degrade but never stall the run.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use serde::Serialize;

use crate::assemble::Assembler;
use crate::assets::{AssetWriter, DirAssetWriter};
use crate::classify::{self, RegionIndex};
use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::fallback::{self, FallbackAction};
use crate::ledger::{PageStatus, ResumeLedger};
use crate::model::{Element, Fragment, PageGeometry, Region};
use crate::render;
use crate::signal::{self, LineCluster};
use crate::source::{NullOcr, OcrEngine, PageImage, PageSource, PageTable};

/// Vertical window (points) below an image region searched for a caption.
const CAPTION_WINDOW: f32 = 60.0;

/// A recorded per-page degradation. Any warning makes the run non-clean.
#[derive(Debug, Clone, Serialize)]
pub struct PageWarning {
    /// 1-indexed page number
    pub page: u32,
    /// What degraded
    pub message: String,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Pages processed this run, in order
    pub processed: Vec<u32>,
    /// Pages skipped because the ledger already records them
    pub skipped: Vec<u32>,
    /// Pages whose text came from optical recognition
    pub ocr_pages: Vec<u32>,
    /// Degradations recorded during the run
    pub warnings: Vec<PageWarning>,
    /// Wall-clock duration of the run
    pub duration: Duration,
}

impl RunReport {
    /// Whether every attempted page completed without degradation.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, page: u32, message: impl Into<String>) {
        let message = message.into();
        log::warn!("page {}: {}", page, message);
        self.warnings.push(PageWarning { page, message });
    }
}

struct PageOutcome {
    elements: Vec<Element>,
    status: PageStatus,
}

/// The streaming page pipeline over a page source.
pub struct Pipeline<S> {
    source: Arc<S>,
    ocr: Arc<dyn OcrEngine + Send + Sync>,
    config: RunConfig,
}

impl<S: PageSource + Send + Sync + 'static> Pipeline<S> {
    /// Create a pipeline with no optical-recognition engine configured.
    pub fn new(source: S, config: RunConfig) -> Self {
        Self {
            source: Arc::new(source),
            ocr: Arc::new(NullOcr),
            config,
        }
    }

    /// Attach an optical-recognition engine.
    pub fn with_ocr(mut self, ocr: impl OcrEngine + Send + Sync + 'static) -> Self {
        self.ocr = Arc::new(ocr);
        self
    }

    /// The run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Pages this run would process, resolved against the source.
    pub fn selected_pages(&self) -> Result<Vec<u32>> {
        self.config.pages.resolve(self.source.page_count())
    }

    /// Run the pipeline, writing all artifacts under `out_dir`.
    pub fn run(&self, out_dir: &Path) -> Result<RunReport> {
        self.run_with_progress(out_dir, |_, _| {})
    }

    /// Run the pipeline, invoking `on_page(page, index)` before each
    /// selected page is considered.
    pub fn run_with_progress(
        &self,
        out_dir: &Path,
        mut on_page: impl FnMut(u32, usize),
    ) -> Result<RunReport> {
        let started = Instant::now();

        // Configuration problems are fatal before any page is touched.
        self.config.validate()?;
        let selected = self.selected_pages()?;

        fs::create_dir_all(out_dir)?;
        if self.config.dump_pages {
            fs::create_dir_all(out_dir.join("logs"))?;
        }

        let mut ledger = ResumeLedger::open(out_dir, self.config.force)?;
        let metadata = self.source.metadata();
        let mut assembler = Assembler::open(out_dir, &metadata, &mut ledger)?;
        let mut assets = DirAssetWriter::new(out_dir)?;

        let mut report = RunReport::default();

        for (index, &page) in selected.iter().enumerate() {
            on_page(page, index);

            if ledger.is_done(page) {
                log::info!("Skipping page {} (already processed)", page);
                report.skipped.push(page);
                continue;
            }

            log::info!("Processing page {}", page);
            let outcome = self.process_page(page, out_dir, &mut assets, &mut report);

            let markdown = render::render_page(
                page,
                &outcome.elements,
                outcome.status == PageStatus::OcrUsed,
            );
            let (end_offset, content_hash) = assembler.append_page(&markdown)?;
            ledger.mark_done(page, outcome.status, end_offset, content_hash)?;

            if outcome.status == PageStatus::OcrUsed {
                report.ocr_pages.push(page);
            }
            report.processed.push(page);
        }

        if self.config.toc {
            assembler.finish_toc(&mut ledger)?;
        }

        report.duration = started.elapsed();
        let warning_lines: Vec<String> = report
            .warnings
            .iter()
            .map(|w| format!("page {}: {}", w.page, w.message))
            .collect();
        ledger.record_run(warning_lines, report.duration.as_secs_f64())?;

        Ok(report)
    }

    fn process_page(
        &self,
        page: u32,
        out_dir: &Path,
        assets: &mut DirAssetWriter,
        report: &mut RunReport,
    ) -> PageOutcome {
        let fragments = match self.source.fragments(page) {
            Ok(fragments) => fragments,
            Err(e) => {
                report.warn(page, format!("extraction failed: {}", e));
                return PageOutcome {
                    elements: vec![Element::paragraph(format!(
                        "*Text extraction failed for this page: {}*",
                        e
                    ))],
                    status: PageStatus::Done,
                };
            }
        };

        let geometry = match self.source.geometry(page) {
            Ok(geometry) => geometry,
            Err(e) => {
                report.warn(page, format!("no page geometry: {}", e));
                PageGeometry::default()
            }
        };

        let clusters = signal::cluster_lines(&fragments);
        let stats = signal::compute_stats(&fragments, &clusters);

        if self.config.dump_pages {
            self.dump_page(page, out_dir, &fragments);
        }

        // Table extraction is offloaded up front so it overlaps the
        // fallback path; the join below still reconciles in page order.
        let tables_rx = self.spawn_tables(page);

        let mut status = PageStatus::Done;
        let mut ocr_lines: Option<Vec<String>> = None;
        if fallback::decide(&stats, &geometry, &self.config) == FallbackAction::RunOcr {
            match self.run_ocr(page, report) {
                Some(lines) if !lines.is_empty() => {
                    status = PageStatus::OcrUsed;
                    ocr_lines = Some(lines);
                }
                _ => {}
            }
        }

        let images = match self.source.images(page) {
            Ok(images) => images,
            Err(e) => {
                report.warn(page, format!("image extraction failed: {}", e));
                Vec::new()
            }
        };
        let tables = match self.wait(tables_rx, page, "table extraction") {
            Ok(tables) => tables,
            Err(e) => {
                report.warn(page, e.to_string());
                Vec::new()
            }
        };

        let mut region_pairs: Vec<(Region, Element)> = Vec::new();
        for (i, image) in images.iter().enumerate() {
            match assets.write_image(page, (i + 1) as u32, &image.data) {
                Ok(id) => {
                    let caption = image
                        .caption
                        .clone()
                        .or_else(|| caption_for(&clusters, image));
                    region_pairs.push((image.bounds, Element::ImageRef { id, caption }));
                }
                Err(e) => report.warn(page, format!("image asset write failed: {}", e)),
            }
        }
        for (i, table) in tables.iter().enumerate() {
            match assets.write_table(page, (i + 1) as u32, &table.rows) {
                Ok(id) => region_pairs.push((table.bounds, Element::TableRef { id })),
                Err(e) => report.warn(page, format!("table asset write failed: {}", e)),
            }
        }

        let mut regions = RegionIndex::new(region_pairs);
        let mut elements = match ocr_lines {
            Some(lines) => classify::classify_ocr_lines(&lines, &self.config),
            None => classify::classify(&clusters, &stats, &self.config, &mut regions),
        };

        // Assets whose regions no cluster claimed still belong to the page.
        elements.extend(regions.unclaimed());

        PageOutcome { elements, status }
    }

    /// Run the optical-recognition collaborator for a page, bounded by the
    /// configured timeout. Returns `None` on any degradation (recorded).
    fn run_ocr(&self, page: u32, report: &mut RunReport) -> Option<Vec<String>> {
        if !self.ocr.is_available() {
            report.warn(
                page,
                "low extraction yield but no optical-recognition engine is available",
            );
            return None;
        }

        let image = match self.source.page_image(page) {
            Ok(Some(image)) => image,
            Ok(None) => {
                report.warn(page, "low extraction yield but no page image is available");
                return None;
            }
            Err(e) => {
                report.warn(page, format!("page image unavailable: {}", e));
                return None;
            }
        };

        let ocr = Arc::clone(&self.ocr);
        let rx = spawn_job("optical recognition", move || ocr.recognize(&image));
        match self.wait(rx, page, "optical recognition") {
            Ok(lines) => Some(lines),
            Err(e) => {
                report.warn(page, e.to_string());
                None
            }
        }
    }

    fn spawn_tables(&self, page: u32) -> Receiver<Result<Vec<PageTable>>> {
        let source = Arc::clone(&self.source);
        spawn_job("table extraction", move || source.tables(page))
    }

    fn wait<T>(&self, rx: Receiver<Result<T>>, page: u32, what: &'static str) -> Result<T> {
        match rx.recv_timeout(self.config.collaborator_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::FallbackTimeout { page, what }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::Other(format!("{} worker exited abnormally", what)))
            }
        }
    }

    fn dump_page(&self, page: u32, out_dir: &Path, fragments: &[Fragment]) {
        #[derive(Serialize)]
        struct PageDump<'a> {
            page: u32,
            fragments: &'a [Fragment],
        }

        let path = out_dir.join("logs").join(format!("page_{:04}.json", page));
        let dump = PageDump { page, fragments };
        match serde_json::to_string_pretty(&dump) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    log::warn!("Cannot write page dump {}: {}", path.display(), e);
                }
            }
            Err(e) => log::warn!("Cannot serialize page dump for page {}: {}", page, e),
        }
    }
}

/// Run a collaborator call on a worker thread, reporting through a channel.
///
/// The worker is detached: if it outlives the timeout the result is simply
/// dropped when the receiver goes away.
fn spawn_job<T, F>(what: &'static str, job: F) -> Receiver<Result<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (tx, rx) = bounded(1);
    let spawned = std::thread::Builder::new()
        .name(format!("pagemill-{}", what.replace(' ', "-")))
        .spawn(move || {
            let _ = tx.send(job());
        });
    if let Err(e) = spawned {
        log::warn!("Cannot spawn {} worker: {}", what, e);
    }
    rx
}

/// Caption candidate for an image: the nearest cluster starting below the
/// image region within the caption window.
fn caption_for(clusters: &[LineCluster], image: &PageImage) -> Option<String> {
    clusters
        .iter()
        .filter(|c| {
            c.bounds.y0 >= image.bounds.y1 && c.bounds.y0 - image.bounds.y1 <= CAPTION_WINDOW
        })
        .min_by(|a, b| {
            let da = a.bounds.y0 - image.bounds.y1;
            let db = b.bounds.y0 - image.bounds.y1;
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|c| c.paragraph_text())
        .filter(|text| !text.is_empty())
}
