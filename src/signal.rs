//! Per-page signal extraction: line clustering and layout statistics.
//!
//! Everything here is a pure function of one page's fragments. Statistics
//! are page-local: the median font size is never carried across
//! pages, so differently formatted pages are each judged on their own
//! layout and memory stays bounded by a single page.

use std::collections::BTreeMap;

use crate::model::{Fragment, Region};

/// A visual line assembled from fragments sharing a baseline.
#[derive(Debug, Clone)]
pub struct ClusterLine {
    /// Joined text of the line's fragments, left to right
    pub text: String,
    /// Left edge of the line
    pub x0: f32,
    /// Top edge of the line
    pub y0: f32,
    /// Dominant font size (character-weighted)
    pub font_size: f32,
    /// Characters set in a monospace face
    pub mono_chars: usize,
    /// Characters set in a bold face
    pub bold_chars: usize,
    /// Total characters
    pub total_chars: usize,
    /// Bounding box of the line
    pub bounds: Region,
}

impl ClusterLine {
    /// Build a line from fragments already known to share a baseline.
    fn from_fragments(mut fragments: Vec<Fragment>) -> Self {
        fragments.sort_by(|a, b| {
            a.bounds
                .x0
                .partial_cmp(&b.bounds.x0)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut text = String::new();
        let mut mono_chars = 0;
        let mut bold_chars = 0;
        let mut total_chars = 0;
        let mut weighted_size = 0.0;
        let mut bounds = fragments[0].bounds;

        for (i, frag) in fragments.iter().enumerate() {
            if i > 0 {
                let prev = &fragments[i - 1];
                let gap = frag.bounds.x0 - prev.bounds.x1;
                // Insert a space for a visible gap the source did not encode.
                let threshold = (frag.font_size * 0.2).max(0.5);
                if gap > threshold && !text.ends_with(' ') && !frag.text.starts_with(' ') {
                    text.push(' ');
                }
            }
            text.push_str(&frag.text);

            let chars = frag.char_count();
            total_chars += chars;
            if frag.monospace {
                mono_chars += chars;
            }
            if frag.bold {
                bold_chars += chars;
            }
            weighted_size += frag.font_size * chars as f32;
            bounds = bounds.union(&frag.bounds);
        }

        let font_size = if total_chars > 0 {
            weighted_size / total_chars as f32
        } else {
            fragments[0].font_size
        };

        Self {
            text,
            x0: bounds.x0,
            y0: bounds.y0,
            font_size,
            mono_chars,
            bold_chars,
            total_chars,
            bounds,
        }
    }

    /// Fraction of the line's characters set in a monospace face.
    pub fn mono_fraction(&self) -> f32 {
        if self.total_chars == 0 {
            return 0.0;
        }
        self.mono_chars as f32 / self.total_chars as f32
    }
}

/// A contiguous block of lines judged to belong together.
#[derive(Debug, Clone, Default)]
pub struct LineCluster {
    /// Lines in reading order
    pub lines: Vec<ClusterLine>,
    /// Bounding box of the whole cluster
    pub bounds: Region,
}

impl LineCluster {
    fn push(&mut self, line: ClusterLine) {
        self.bounds = if self.lines.is_empty() {
            line.bounds
        } else {
            self.bounds.union(&line.bounds)
        };
        self.lines.push(line);
    }

    /// Number of lines in the cluster.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Check if the cluster carries no visible text.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.text.trim().is_empty())
    }

    /// Cluster text with lines preserved, joined by newlines.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Cluster text reflowed as one paragraph line.
    pub fn paragraph_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Total characters across the cluster's lines.
    pub fn char_count(&self) -> usize {
        self.lines.iter().map(|l| l.total_chars).sum()
    }

    /// Character-weighted dominant font size.
    pub fn font_size(&self) -> f32 {
        let total: usize = self.lines.iter().map(|l| l.total_chars).sum();
        if total == 0 {
            return 0.0;
        }
        let weighted: f32 = self
            .lines
            .iter()
            .map(|l| l.font_size * l.total_chars as f32)
            .sum();
        weighted / total as f32
    }

    /// Fraction of characters set in a monospace face.
    pub fn mono_fraction(&self) -> f32 {
        let total: usize = self.lines.iter().map(|l| l.total_chars).sum();
        if total == 0 {
            return 0.0;
        }
        let mono: usize = self.lines.iter().map(|l| l.mono_chars).sum();
        mono as f32 / total as f32
    }

    /// Fraction of characters set in a bold face.
    pub fn bold_fraction(&self) -> f32 {
        let total: usize = self.lines.iter().map(|l| l.total_chars).sum();
        if total == 0 {
            return 0.0;
        }
        let bold: usize = self.lines.iter().map(|l| l.bold_chars).sum();
        bold as f32 / total as f32
    }

    /// Fraction of lines whose left edge sits within `epsilon` of the
    /// cluster's modal indent.
    pub fn indent_consistency(&self, epsilon: f32) -> f32 {
        if self.lines.is_empty() {
            return 0.0;
        }
        let mut best = 0usize;
        for anchor in &self.lines {
            let aligned = self
                .lines
                .iter()
                .filter(|l| (l.x0 - anchor.x0).abs() <= epsilon)
                .count();
            best = best.max(aligned);
        }
        best as f32 / self.lines.len() as f32
    }

    /// Ratio of symbol characters (neither alphanumeric nor whitespace) to
    /// total characters across the cluster.
    pub fn symbol_density(&self) -> f32 {
        let text = self.text();
        symbol_density(&text)
    }
}

/// Symbol-to-total character ratio of a text, the code-vs-prose signal.
pub fn symbol_density(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let symbols = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    symbols as f32 / total as f32
}

/// Per-page aggregates consumed by classification and the fallback decision.
///
/// Computed fresh for every page and never persisted.
#[derive(Debug, Clone, Default)]
pub struct PageStats {
    /// Median font size across the page's lines (0 when the page is empty)
    pub median_font_size: f32,
    /// Histogram of font sizes in 0.1pt buckets (key = size × 10)
    pub size_histogram: BTreeMap<i32, usize>,
    /// Histogram of line indents in 5pt buckets
    pub indent_buckets: BTreeMap<i32, usize>,
    /// Symbol density per cluster, in cluster order
    pub cluster_symbol_ratios: Vec<f32>,
    /// Number of fragments read from the source
    pub fragment_count: usize,
    /// Total characters extracted from the page
    pub extracted_chars: usize,
}

/// Group a page's fragments into visual lines, then contiguous clusters, in
/// reading order (top to bottom, left to right for ties).
pub fn cluster_lines(fragments: &[Fragment]) -> Vec<LineCluster> {
    let lines = build_lines(fragments);
    group_into_clusters(lines)
}

fn build_lines(fragments: &[Fragment]) -> Vec<ClusterLine> {
    let mut sorted: Vec<Fragment> = fragments
        .iter()
        .filter(|f| !f.is_blank())
        .cloned()
        .collect();
    if sorted.is_empty() {
        return Vec::new();
    }

    sorted.sort_by(|a, b| {
        let y_cmp = a
            .bounds
            .y0
            .partial_cmp(&b.bounds.y0)
            .unwrap_or(std::cmp::Ordering::Equal);
        if y_cmp == std::cmp::Ordering::Equal {
            a.bounds
                .x0
                .partial_cmp(&b.bounds.x0)
                .unwrap_or(std::cmp::Ordering::Equal)
        } else {
            y_cmp
        }
    });

    let mut lines: Vec<ClusterLine> = Vec::new();
    let mut current: Vec<Fragment> = Vec::new();
    let mut current_y: Option<f32> = None;

    for frag in sorted {
        let tolerance = (frag.font_size * 0.3).max(1.0);
        match current_y {
            Some(y) if (frag.bounds.y0 - y).abs() <= tolerance => {
                current.push(frag);
            }
            _ => {
                if !current.is_empty() {
                    lines.push(ClusterLine::from_fragments(std::mem::take(&mut current)));
                }
                current_y = Some(frag.bounds.y0);
                current.push(frag);
            }
        }
    }
    if !current.is_empty() {
        lines.push(ClusterLine::from_fragments(current));
    }

    lines
}

fn group_into_clusters(lines: Vec<ClusterLine>) -> Vec<LineCluster> {
    if lines.is_empty() {
        return Vec::new();
    }

    let avg_spacing = average_line_spacing(&lines);
    let mut clusters: Vec<LineCluster> = Vec::new();
    let mut current = LineCluster::default();

    for line in lines {
        let break_before = match current.lines.last() {
            None => false,
            Some(prev) => should_break(prev, &line, avg_spacing),
        };
        if break_before {
            clusters.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.lines.is_empty() {
        clusters.push(current);
    }

    clusters
}

fn average_line_spacing(lines: &[ClusterLine]) -> f32 {
    let spacings: Vec<f32> = lines
        .windows(2)
        .map(|w| (w[1].y0 - w[0].y0).abs())
        .filter(|s| *s > 0.1)
        .collect();
    if spacings.is_empty() {
        return 12.0;
    }
    spacings.iter().sum::<f32>() / spacings.len() as f32
}

fn should_break(prev: &ClusterLine, curr: &ClusterLine, avg_spacing: f32) -> bool {
    // Large vertical gap indicates a new block.
    let spacing = (curr.y0 - prev.y0).abs();
    if spacing > avg_spacing * 1.5 {
        return true;
    }

    // Font size change indicates a structural boundary.
    if (prev.font_size - curr.font_size).abs() > 1.0 {
        return true;
    }

    // A monospace run starting or ending splits code from prose even at
    // normal line spacing.
    let prev_mono = prev.mono_fraction() > 0.5;
    let curr_mono = curr.mono_fraction() > 0.5;
    if prev_mono != curr_mono {
        return true;
    }

    // Large indent change, unless both lines look like code (code bodies
    // indent freely within one block).
    if (prev.x0 - curr.x0).abs() > 20.0 && !(prev_mono && curr_mono) {
        return true;
    }

    false
}

/// Compute the page's layout statistics. Pure; page-local only.
///
/// An empty fragment set yields zero extracted characters, which is the
/// signal the fallback decider keys on for scanned pages.
pub fn compute_stats(fragments: &[Fragment], clusters: &[LineCluster]) -> PageStats {
    let mut stats = PageStats {
        fragment_count: fragments.len(),
        ..Default::default()
    };

    let mut line_sizes: Vec<f32> = Vec::new();
    for cluster in clusters {
        stats.cluster_symbol_ratios.push(cluster.symbol_density());
        for line in &cluster.lines {
            line_sizes.push(line.font_size);
            *stats
                .size_histogram
                .entry((line.font_size * 10.0) as i32)
                .or_insert(0) += 1;
            *stats
                .indent_buckets
                .entry((line.x0 / 5.0) as i32)
                .or_insert(0) += 1;
        }
    }

    stats.extracted_chars = fragments.iter().map(|f| f.char_count()).sum();

    line_sizes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    stats.median_font_size = match line_sizes.len() {
        0 => 0.0,
        n if n % 2 == 1 => line_sizes[n / 2],
        n => (line_sizes[n / 2 - 1] + line_sizes[n / 2]) / 2.0,
    };

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Region;

    fn frag(text: &str, x0: f32, y0: f32, size: f32, font: &str) -> Fragment {
        let width = text.len() as f32 * size * 0.5;
        Fragment::new(
            text,
            Region::new(x0, y0, x0 + width, y0 + size),
            size,
            font,
            1,
        )
    }

    #[test]
    fn test_build_lines_merges_same_baseline() {
        let fragments = vec![
            frag("Hello", 72.0, 100.0, 12.0, "Helvetica"),
            frag("world", 120.0, 100.5, 12.0, "Helvetica"),
            frag("Next line", 72.0, 116.0, 12.0, "Helvetica"),
        ];
        let clusters = cluster_lines(&fragments);
        let lines: usize = clusters.iter().map(|c| c.line_count()).sum();
        assert_eq!(lines, 2);
        assert!(clusters[0].lines[0].text.starts_with("Hello"));
        assert!(clusters[0].lines[0].text.contains("world"));
    }

    #[test]
    fn test_cluster_break_on_spacing() {
        let fragments = vec![
            frag("para one line one", 72.0, 100.0, 10.0, "Helvetica"),
            frag("para one line two", 72.0, 112.0, 10.0, "Helvetica"),
            frag("para two after a gap", 72.0, 160.0, 10.0, "Helvetica"),
        ];
        let clusters = cluster_lines(&fragments);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].line_count(), 2);
    }

    #[test]
    fn test_cluster_break_on_mono_flip() {
        let fragments = vec![
            frag("Some prose text here", 72.0, 100.0, 10.0, "Helvetica"),
            frag("let x = 1;", 90.0, 112.0, 10.0, "Courier"),
            frag("let y = 2;", 90.0, 124.0, 10.0, "Courier"),
        ];
        let clusters = cluster_lines(&fragments);
        assert_eq!(clusters.len(), 2);
        assert!(clusters[1].mono_fraction() > 0.9);
    }

    #[test]
    fn test_indent_consistency() {
        let fragments = vec![
            frag("line_a();", 100.0, 100.0, 10.0, "Courier"),
            frag("line_b();", 100.5, 112.0, 10.0, "Courier"),
            frag("line_c();", 99.8, 124.0, 10.0, "Courier"),
        ];
        let clusters = cluster_lines(&fragments);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].indent_consistency(2.0) > 0.99);
    }

    #[test]
    fn test_compute_stats_median_and_chars() {
        let fragments = vec![
            frag("body", 72.0, 100.0, 10.0, "Helvetica"),
            frag("body", 72.0, 112.0, 10.0, "Helvetica"),
            frag("Title", 72.0, 60.0, 20.0, "Helvetica-Bold"),
        ];
        let clusters = cluster_lines(&fragments);
        let stats = compute_stats(&fragments, &clusters);

        assert_eq!(stats.fragment_count, 3);
        assert_eq!(stats.extracted_chars, 13);
        assert!((stats.median_font_size - 10.0).abs() < 0.01);
    }

    #[test]
    fn test_compute_stats_empty_page() {
        let stats = compute_stats(&[], &[]);
        assert_eq!(stats.extracted_chars, 0);
        assert_eq!(stats.fragment_count, 0);
        assert_eq!(stats.median_font_size, 0.0);
    }

    #[test]
    fn test_symbol_density() {
        assert_eq!(symbol_density(""), 0.0);
        assert!(symbol_density("plain words only") < 0.05);
        assert!(symbol_density("if (x != null) { y->z(); }") > 0.2);
    }
}
