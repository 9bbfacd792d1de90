//! Multi-signal fusion turning line clusters into structural elements.
//!
//! The fusion is an explicit scoring function over a cluster's signals
//! (font-size ratio, monospace fraction, indent consistency, symbol
//! density) returning a tagged kind plus confidence, so every threshold is
//! unit-testable in isolation.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::{ClassifyThresholds, RunConfig};
use crate::model::{CalloutKind, Element, Region};
use crate::signal::{symbol_density, LineCluster, PageStats};

/// Element kind chosen for a cluster by the scoring function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusterKind {
    /// A heading at the given level (1-6)
    Heading(u8),
    /// A code block
    Code,
    /// Plain prose
    Paragraph,
}

/// Outcome of scoring one cluster: best-matching kind plus confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterScore {
    /// Best-matching kind
    pub kind: ClusterKind,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

/// Score a cluster against the page statistics.
///
/// Code beats a heading match only above the higher `code_over_heading`
/// threshold: genuine section titles set in a monospace face stay headings
/// unless the cluster is also structurally indented, symbol-dense code.
pub fn score_cluster(
    cluster: &LineCluster,
    stats: &PageStats,
    t: &ClassifyThresholds,
) -> ClusterScore {
    let code = code_score(cluster, t);
    let heading = heading_level(cluster, stats, t);

    match heading {
        Some(level) if code < t.code_over_heading => ClusterScore {
            kind: ClusterKind::Heading(level),
            confidence: heading_confidence(cluster, stats, level, t),
        },
        _ if code >= t.code_threshold => ClusterScore {
            kind: ClusterKind::Code,
            confidence: code.min(1.0),
        },
        _ => ClusterScore {
            kind: ClusterKind::Paragraph,
            confidence: (1.0 - code).clamp(0.0, 1.0),
        },
    }
}

/// Weighted code score in [0, 1].
fn code_score(cluster: &LineCluster, t: &ClassifyThresholds) -> f32 {
    let mono = cluster.mono_fraction();

    // Indent consistency only counts once there are enough contiguous lines
    // for alignment to mean anything.
    let indent = if cluster.line_count() >= t.min_code_lines {
        cluster.indent_consistency(t.indent_epsilon)
    } else {
        0.0
    };

    let symbol = if t.prose_symbol_density > 0.0 {
        (cluster.symbol_density() / t.prose_symbol_density).min(1.0)
    } else {
        0.0
    };

    t.mono_weight * mono + t.indent_weight * indent + t.symbol_weight * symbol
}

/// Heading level for a cluster, if its font-size ratio reaches a tier.
///
/// Tiers are strictly descending, so a larger ratio can never map to a
/// deeper level. Bold promotes only clusters within `bold_margin` below the
/// last tier, and only to the deepest level, which preserves that
/// monotonicity.
fn heading_level(
    cluster: &LineCluster,
    stats: &PageStats,
    t: &ClassifyThresholds,
) -> Option<u8> {
    if stats.median_font_size <= 0.0 {
        return None;
    }
    let ratio = cluster.font_size() / stats.median_font_size;

    for (i, tier) in t.heading_tiers.iter().enumerate() {
        if ratio >= *tier {
            return Some(((i + 1).min(6)) as u8);
        }
    }

    let last = *t.heading_tiers.last()?;
    if cluster.bold_fraction() > 0.5 && ratio >= last - t.bold_margin {
        return Some((t.heading_tiers.len().min(6)) as u8);
    }

    None
}

fn heading_confidence(
    cluster: &LineCluster,
    stats: &PageStats,
    level: u8,
    t: &ClassifyThresholds,
) -> f32 {
    let tier = t
        .heading_tiers
        .get((level as usize).saturating_sub(1))
        .copied()
        .unwrap_or(1.0);
    if stats.median_font_size <= 0.0 || tier <= 0.0 {
        return 0.5;
    }
    let ratio = cluster.font_size() / stats.median_font_size;
    (ratio / tier).clamp(0.0, 1.0)
}

fn callout_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[\s>*_~\-]{0,4}(note|warning|tip|important)[\s*_~]{0,3}:[\s*_~]{0,3}\s*(.*)$")
            .unwrap()
    })
}

/// Parse a callout marker at the head of a paragraph.
///
/// The marker token matches case-insensitively with surrounding punctuation
/// allowed; the returned body has the marker stripped.
pub fn callout_for(text: &str) -> Option<(CalloutKind, String)> {
    let caps = callout_re().captures(text.trim())?;
    let kind = CalloutKind::from_token(caps.get(1)?.as_str())?;
    let body = caps.get(2)?.as_str().trim().to_string();
    Some((kind, body))
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```+\s*([A-Za-z0-9_+\-]*)\s*$").unwrap())
}

/// Known-language keyword sets for the density lookup.
const LANGUAGE_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "rust",
        &["fn", "let", "impl", "pub", "use", "mut", "struct", "match"],
    ),
    (
        "python",
        &["def", "import", "class", "self", "return", "elif", "lambda"],
    ),
    (
        "csharp",
        &["using", "namespace", "public", "void", "var", "static", "new"],
    ),
    (
        "javascript",
        &["function", "const", "let", "var", "return", "async", "await"],
    ),
    (
        "c",
        &["#include", "int", "void", "char", "struct", "return", "static"],
    ),
];

/// Guess a language from keyword density.
///
/// Only a hint: code detection itself never depends on keyword matching.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let words: Vec<&str> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c| "(){}[];,:".contains(c)))
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() < 4 {
        return None;
    }

    let mut best: Option<(&'static str, usize)> = None;
    for (lang, keywords) in LANGUAGE_KEYWORDS {
        let hits = words.iter().filter(|w| keywords.contains(w)).count();
        if hits >= 2 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((lang, hits));
        }
    }

    best.and_then(|(lang, hits)| {
        if hits as f32 / words.len() as f32 >= 0.08 {
            Some(lang)
        } else {
            None
        }
    })
}

/// Placeholder elements for detected image/table regions.
///
/// The first cluster geometrically overlapping a region claims it and is
/// replaced by the region's placeholder; later overlapping clusters are
/// suppressed so a table's cell text is not emitted twice.
#[derive(Debug, Default)]
pub struct RegionIndex {
    refs: Vec<RegionRef>,
}

#[derive(Debug)]
struct RegionRef {
    bounds: Region,
    element: Element,
    emitted: bool,
}

/// Result of testing a cluster against the region index.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionClaim {
    /// First overlap: emit this placeholder instead of the cluster
    Emit(Element),
    /// The region was already placed; drop the cluster
    Suppress,
    /// No overlap
    Miss,
}

impl RegionIndex {
    /// Build an index from region/placeholder pairs.
    pub fn new(pairs: Vec<(Region, Element)>) -> Self {
        Self {
            refs: pairs
                .into_iter()
                .map(|(bounds, element)| RegionRef {
                    bounds,
                    element,
                    emitted: false,
                })
                .collect(),
        }
    }

    /// Test a cluster's bounds against the index.
    pub fn claim(&mut self, bounds: &Region) -> RegionClaim {
        for r in &mut self.refs {
            if r.bounds.overlaps(bounds) {
                if r.emitted {
                    return RegionClaim::Suppress;
                }
                r.emitted = true;
                return RegionClaim::Emit(r.element.clone());
            }
        }
        RegionClaim::Miss
    }

    /// Placeholders no cluster overlapped, in insertion order. Marks them
    /// emitted.
    pub fn unclaimed(&mut self) -> Vec<Element> {
        self.refs
            .iter_mut()
            .filter(|r| !r.emitted)
            .map(|r| {
                r.emitted = true;
                r.element.clone()
            })
            .collect()
    }
}

/// Classify a page's clusters into elements in reading order.
pub fn classify(
    clusters: &[LineCluster],
    stats: &PageStats,
    config: &RunConfig,
    regions: &mut RegionIndex,
) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut code_lines: Vec<String> = Vec::new();

    for cluster in clusters {
        if cluster.is_empty() {
            continue;
        }

        match regions.claim(&cluster.bounds) {
            RegionClaim::Emit(el) => {
                flush_code(&mut elements, &mut code_lines, config);
                elements.push(el);
                continue;
            }
            RegionClaim::Suppress => continue,
            RegionClaim::Miss => {}
        }

        let score = score_cluster(cluster, stats, &config.classify);
        match score.kind {
            ClusterKind::Code => {
                // Contiguous code clusters merge into one block.
                code_lines.push(cluster.text());
            }
            ClusterKind::Heading(level) => {
                flush_code(&mut elements, &mut code_lines, config);
                let text = cluster.paragraph_text();
                let text = text.trim_start_matches('#').trim_start();
                if !text.is_empty() {
                    elements.push(Element::heading(level, text));
                }
            }
            ClusterKind::Paragraph => {
                flush_code(&mut elements, &mut code_lines, config);
                let text = cluster.paragraph_text();
                if let Some((kind, body)) = callout_for(&text) {
                    elements.push(Element::callout(kind, body));
                } else {
                    elements.push(Element::paragraph(text));
                }
            }
        }
    }

    flush_code(&mut elements, &mut code_lines, config);
    elements
}

/// Classify optical-recognition output.
///
/// Only Paragraph and CodeBlock are possible here: the lines carry no font
/// metadata, so the decision rests on symbol density and indentation alone.
pub fn classify_ocr_lines(lines: &[String], config: &RunConfig) -> Vec<Element> {
    let mut elements = Vec::new();
    let mut code_lines: Vec<String> = Vec::new();
    let mut prose: Vec<String> = Vec::new();

    for line in lines {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() {
            if !code_lines.is_empty() {
                // Interior blank inside a code run stays part of the block.
                code_lines.push(String::new());
            } else {
                flush_prose(&mut elements, &mut prose);
            }
            continue;
        }

        if is_ocr_code_line(trimmed, config) {
            flush_prose(&mut elements, &mut prose);
            code_lines.push(trimmed.to_string());
        } else {
            flush_code(&mut elements, &mut code_lines, config);
            prose.push(trimmed.trim().to_string());
        }
    }

    flush_prose(&mut elements, &mut prose);
    flush_code(&mut elements, &mut code_lines, config);
    elements
}

fn is_ocr_code_line(line: &str, config: &RunConfig) -> bool {
    line.starts_with("    ")
        || (symbol_density(line) > config.classify.prose_symbol_density
            && line.trim().chars().count() > 6)
}

fn flush_prose(elements: &mut Vec<Element>, prose: &mut Vec<String>) {
    if prose.is_empty() {
        return;
    }
    let text = std::mem::take(prose).join(" ");
    elements.push(Element::paragraph(text));
}

fn flush_code(elements: &mut Vec<Element>, code_lines: &mut Vec<String>, config: &RunConfig) {
    if code_lines.is_empty() {
        return;
    }
    let merged = std::mem::take(code_lines).join("\n");
    let (language, text) = strip_fences(&merged, &config.default_code_language);
    if text.trim().is_empty() {
        return;
    }
    elements.push(Element::code(language, text));
}

/// Split fence-marker lines off a merged code text.
///
/// Fence markers present in the source are markup around the code, not
/// content: they pick the language hint and are removed, while everything
/// between them is preserved byte-for-byte.
fn strip_fences(text: &str, default_language: &str) -> (String, String) {
    let mut lines: Vec<&str> = text.lines().collect();
    let mut language: Option<String> = None;

    if let Some(first) = lines.first() {
        if let Some(caps) = fence_re().captures(first.trim()) {
            let lang = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if !lang.is_empty() {
                language = Some(lang.to_string());
            }
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if fence_re()
            .captures(last.trim())
            .is_some_and(|c| c.get(1).map_or(true, |m| m.as_str().is_empty()))
        {
            lines.pop();
        }
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let body = lines.join("\n");
    let language = language
        .or_else(|| detect_language(&body).map(str::to_string))
        .unwrap_or_else(|| default_language.to_string());
    (language, body)
}
