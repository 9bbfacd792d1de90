//! Run configuration and tunable heuristic thresholds.

use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Processing mode for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Fast extraction; optical recognition fires only on near-zero yield
    #[default]
    Fast,
    /// Thorough extraction; fallback triggers more readily and heavy
    /// collaborators are offloaded to a worker
    Accurate,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "accurate" => Ok(Mode::Accurate),
            other => Err(Error::Config(format!("unknown mode `{}`", other))),
        }
    }
}

/// Page selection for a run (1-indexed).
#[derive(Debug, Clone, Default)]
pub enum PageSelection {
    /// Process all pages
    #[default]
    All,
    /// Process a range of pages (inclusive)
    Range(RangeInclusive<u32>),
    /// Process specific pages
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number is included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        // Simple range (e.g., "1-10")
        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidPageRange(s.to_string()))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidPageRange(s.to_string()))?;
                return Ok(PageSelection::Range(start..=end));
            }
        }

        // Comma-separated list with possible ranges
        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidPageRange(part.to_string()))?;
                let end: u32 = end
                    .trim()
                    .parse()
                    .map_err(|_| Error::InvalidPageRange(part.to_string()))?;
                for p in start..=end {
                    if !pages.contains(&p) {
                        pages.push(p);
                    }
                }
            } else {
                let p: u32 = part
                    .parse()
                    .map_err(|_| Error::InvalidPageRange(part.to_string()))?;
                if !pages.contains(&p) {
                    pages.push(p);
                }
            }
        }

        pages.sort_unstable();
        Ok(PageSelection::Pages(pages))
    }

    /// Resolve the selection against the document's page count into an
    /// ordered list of 1-indexed pages.
    ///
    /// Out-of-range selections are rejected before any page is touched.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>> {
        match self {
            PageSelection::All => Ok((1..=page_count).collect()),
            PageSelection::Range(range) => {
                let (start, end) = (*range.start(), *range.end());
                if start == 0 || start > end {
                    return Err(Error::InvalidPageRange(format!("{}-{}", start, end)));
                }
                if end > page_count {
                    return Err(Error::PageOutOfRange(end, page_count));
                }
                Ok((start..=end).collect())
            }
            PageSelection::Pages(pages) => {
                let mut resolved: Vec<u32> = Vec::with_capacity(pages.len());
                for &p in pages {
                    if p == 0 {
                        return Err(Error::InvalidPageRange("0".to_string()));
                    }
                    if p > page_count {
                        return Err(Error::PageOutOfRange(p, page_count));
                    }
                    if !resolved.contains(&p) {
                        resolved.push(p);
                    }
                }
                resolved.sort_unstable();
                Ok(resolved)
            }
        }
    }
}

/// Tunable thresholds for the classifier.
///
/// The defaults are heuristic constants calibrated against technical
/// documents; callers with an unusual corpus should adjust them rather
/// than rely on the defaults.
#[derive(Debug, Clone)]
pub struct ClassifyThresholds {
    /// Font-size ratios over the page median, descending; the first tier a
    /// cluster's ratio reaches yields its heading level (tier index + 1)
    pub heading_tiers: Vec<f32>,

    /// Window below the last heading tier within which a bold cluster is
    /// still promoted to the deepest heading level
    pub bold_margin: f32,

    /// Weight of the monospace-fraction signal in the code score
    pub mono_weight: f32,

    /// Weight of the indent-consistency signal in the code score
    pub indent_weight: f32,

    /// Weight of the symbol-density signal in the code score
    pub symbol_weight: f32,

    /// Code score at which a cluster is declared code
    pub code_threshold: f32,

    /// Higher code score above which code wins over a heading match
    pub code_over_heading: f32,

    /// Symbol density considered saturated relative to prose
    pub prose_symbol_density: f32,

    /// Horizontal tolerance (points) for "same indent"
    pub indent_epsilon: f32,

    /// Minimum lines before indent consistency counts as a code signal
    pub min_code_lines: usize,
}

impl Default for ClassifyThresholds {
    fn default() -> Self {
        Self {
            heading_tiers: vec![1.6, 1.45, 1.3, 1.2, 1.12, 1.06],
            bold_margin: 0.04,
            mono_weight: 0.5,
            indent_weight: 0.25,
            symbol_weight: 0.25,
            code_threshold: 0.5,
            code_over_heading: 0.65,
            prose_symbol_density: 0.2,
            indent_epsilon: 2.0,
            min_code_lines: 2,
        }
    }
}

impl ClassifyThresholds {
    /// Sanity-check the threshold set.
    pub fn validate(&self) -> Result<()> {
        if self.heading_tiers.is_empty() || self.heading_tiers.len() > 6 {
            return Err(Error::Config(
                "heading_tiers must contain between 1 and 6 ratios".to_string(),
            ));
        }
        if self.heading_tiers.windows(2).any(|w| w[0] <= w[1]) {
            return Err(Error::Config(
                "heading_tiers must be strictly descending".to_string(),
            ));
        }
        if self.code_over_heading < self.code_threshold {
            return Err(Error::Config(
                "code_over_heading must not be below code_threshold".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tunable thresholds for the optical-recognition fallback decision.
#[derive(Debug, Clone)]
pub struct FallbackThresholds {
    /// Absolute character floor in fast mode (near-zero yield only)
    pub fast_floor: usize,

    /// Absolute character floor in accurate mode (relaxed)
    pub accurate_floor: usize,

    /// Fraction of the expected character density in fast mode
    pub fast_fraction: f32,

    /// Fraction of the expected character density in accurate mode
    pub accurate_fraction: f32,

    /// Expected characters per square point of page area, used to estimate
    /// how much text a fully set page would carry
    pub chars_per_area: f32,
}

impl Default for FallbackThresholds {
    fn default() -> Self {
        Self {
            fast_floor: 20,
            accurate_floor: 150,
            fast_fraction: 0.05,
            accurate_fraction: 0.15,
            chars_per_area: 0.006,
        }
    }
}

impl FallbackThresholds {
    /// Character floor for the given mode.
    pub fn floor(&self, mode: Mode) -> usize {
        match mode {
            Mode::Fast => self.fast_floor,
            Mode::Accurate => self.accurate_floor,
        }
    }

    /// Density fraction for the given mode.
    pub fn fraction(&self, mode: Mode) -> f32 {
        match mode {
            Mode::Fast => self.fast_fraction,
            Mode::Accurate => self.accurate_fraction,
        }
    }
}

/// Configuration for a single run. Immutable once the run starts.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Processing mode
    pub mode: Mode,

    /// Which pages to process
    pub pages: PageSelection,

    /// Clear the ledger and restart from scratch
    pub force: bool,

    /// Insert a table of contents after the run completes
    pub toc: bool,

    /// Language hint used for code blocks with no stronger signal
    pub default_code_language: String,

    /// Dump each page's fragments as JSON under `logs/`
    pub dump_pages: bool,

    /// Time bound for optical-recognition and table-extraction collaborators
    pub collaborator_timeout: Duration,

    /// Classifier thresholds
    pub classify: ClassifyThresholds,

    /// Fallback decision thresholds
    pub fallback: FallbackThresholds,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Fast,
            pages: PageSelection::All,
            force: false,
            toc: false,
            default_code_language: "csharp".to_string(),
            dump_pages: false,
            collaborator_timeout: Duration::from_secs(30),
            classify: ClassifyThresholds::default(),
            fallback: FallbackThresholds::default(),
        }
    }
}

impl RunConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the processing mode.
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Force a restart, clearing the ledger before the run.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Insert a table of contents after the run.
    pub fn with_toc(mut self, toc: bool) -> Self {
        self.toc = toc;
        self
    }

    /// Set the default code-fence language hint.
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_code_language = language.into();
        self
    }

    /// Enable per-page fragment dumps.
    pub fn with_page_dumps(mut self, dump: bool) -> Self {
        self.dump_pages = dump;
        self
    }

    /// Set the collaborator time bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    /// Replace the classifier thresholds.
    pub fn with_classify_thresholds(mut self, thresholds: ClassifyThresholds) -> Self {
        self.classify = thresholds;
        self
    }

    /// Replace the fallback thresholds.
    pub fn with_fallback_thresholds(mut self, thresholds: FallbackThresholds) -> Self {
        self.fallback = thresholds;
        self
    }

    /// Validate the configuration. Fatal before any page is touched.
    pub fn validate(&self) -> Result<()> {
        if self.default_code_language.trim().is_empty() {
            return Err(Error::Config(
                "default_code_language must not be empty".to_string(),
            ));
        }
        if self.collaborator_timeout.is_zero() {
            return Err(Error::Config(
                "collaborator_timeout must be positive".to_string(),
            ));
        }
        self.classify.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("fast".parse::<Mode>().unwrap(), Mode::Fast);
        assert_eq!("Accurate".parse::<Mode>().unwrap(), Mode::Accurate);
        assert!("turbo".parse::<Mode>().is_err());
    }

    #[test]
    fn test_page_selection_parse() {
        assert!(matches!(
            PageSelection::parse("all").unwrap(),
            PageSelection::All
        ));
        assert!(matches!(
            PageSelection::parse("1-10").unwrap(),
            PageSelection::Range(_)
        ));

        let mixed = PageSelection::parse("1,3,5-7,10").unwrap();
        if let PageSelection::Pages(pages) = mixed {
            assert_eq!(pages, vec![1, 3, 5, 6, 7, 10]);
        } else {
            panic!("expected Pages variant");
        }

        assert!(PageSelection::parse("x-3").is_err());
    }

    #[test]
    fn test_page_selection_resolve() {
        let all = PageSelection::All.resolve(3).unwrap();
        assert_eq!(all, vec![1, 2, 3]);

        let range = PageSelection::Range(2..=3).resolve(5).unwrap();
        assert_eq!(range, vec![2, 3]);

        assert!(PageSelection::Range(0..=2).resolve(5).is_err());
        assert!(PageSelection::Range(2..=9).resolve(5).is_err());
        assert!(PageSelection::Pages(vec![6]).resolve(5).is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = RunConfig::new()
            .with_mode(Mode::Accurate)
            .with_toc(true)
            .with_default_language("rust");

        assert_eq!(config.mode, Mode::Accurate);
        assert!(config.toc);
        assert_eq!(config.default_code_language, "rust");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_thresholds_validate() {
        let mut t = ClassifyThresholds::default();
        assert!(t.validate().is_ok());

        t.heading_tiers = vec![1.2, 1.4];
        assert!(t.validate().is_err());

        t = ClassifyThresholds {
            code_over_heading: 0.1,
            ..Default::default()
        };
        assert!(t.validate().is_err());
    }
}
