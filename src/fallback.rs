//! Decision logic for the optical-recognition fallback.

use crate::config::RunConfig;
use crate::model::PageGeometry;
use crate::signal::PageStats;

/// What the pipeline should do after native extraction of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackAction {
    /// Extraction yield is acceptable; proceed with the native fragments
    None,
    /// Yield is too low; run optical recognition on the page image
    RunOcr,
}

/// Decide whether a page's extraction yield warrants optical recognition.
///
/// Recognition fires when the extracted-character count falls below the
/// mode's absolute floor AND below a fraction of the characters a fully set
/// page of this size would carry; a legitimately near-blank page (a
/// section divider) clears at least one of the two bars and is left alone.
/// Accurate mode relaxes both bars so the fallback fires more readily;
/// fast mode only reacts to near-zero yield.
pub fn decide(stats: &PageStats, geometry: &PageGeometry, config: &RunConfig) -> FallbackAction {
    // A page with no fragments at all is a scanned page.
    if stats.fragment_count == 0 {
        return FallbackAction::RunOcr;
    }

    // Fragments without usable font metrics mean the extractor saw only
    // degenerate text; treat it like a scanned page.
    if stats.median_font_size <= 0.0 {
        return FallbackAction::RunOcr;
    }

    let floor = config.fallback.floor(config.mode);
    let fraction = config.fallback.fraction(config.mode);
    let expected = geometry.area() * config.fallback.chars_per_area;

    let chars = stats.extracted_chars;
    if chars < floor && (chars as f32) < expected * fraction {
        FallbackAction::RunOcr
    } else {
        FallbackAction::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    fn stats_with(chars: usize, fragments: usize) -> PageStats {
        PageStats {
            median_font_size: 10.0,
            fragment_count: fragments,
            extracted_chars: chars,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_fragments_always_triggers() {
        let config = RunConfig::default();
        let stats = PageStats::default();
        assert_eq!(
            decide(&stats, &PageGeometry::letter(), &config),
            FallbackAction::RunOcr
        );

        let accurate = RunConfig::default().with_mode(Mode::Accurate);
        assert_eq!(
            decide(&stats, &PageGeometry::letter(), &accurate),
            FallbackAction::RunOcr
        );
    }

    #[test]
    fn test_healthy_page_never_triggers_in_fast_mode() {
        let config = RunConfig::default();
        let expected = PageGeometry::letter().area() * config.fallback.chars_per_area;
        let healthy = (expected * config.fallback.fast_fraction) as usize
            + config.fallback.fast_floor;
        let stats = stats_with(healthy, 40);
        assert_eq!(
            decide(&stats, &PageGeometry::letter(), &config),
            FallbackAction::None
        );
    }

    #[test]
    fn test_near_zero_yield_triggers_in_fast_mode() {
        let config = RunConfig::default();
        let stats = stats_with(5, 2);
        assert_eq!(
            decide(&stats, &PageGeometry::letter(), &config),
            FallbackAction::RunOcr
        );
    }

    #[test]
    fn test_accurate_mode_is_more_eager() {
        let fast = RunConfig::default();
        let accurate = RunConfig::default().with_mode(Mode::Accurate);

        // A page with a modest yield: fine in fast mode, reprocessed in
        // accurate mode.
        let stats = stats_with(100, 10);
        assert_eq!(
            decide(&stats, &PageGeometry::letter(), &fast),
            FallbackAction::None
        );
        assert_eq!(
            decide(&stats, &PageGeometry::letter(), &accurate),
            FallbackAction::RunOcr
        );
    }

    #[test]
    fn test_divider_page_above_density_bar() {
        // A tiny page whose expected density is low: even a short yield
        // clears the density bar and does not trigger recognition.
        let config = RunConfig::default();
        let geometry = PageGeometry::new(100.0, 100.0);
        let stats = stats_with(10, 3);
        assert_eq!(decide(&stats, &geometry, &config), FallbackAction::None);
    }

    #[test]
    fn test_missing_font_metrics_trigger() {
        let config = RunConfig::default();
        let stats = PageStats {
            fragment_count: 4,
            extracted_chars: 300,
            median_font_size: 0.0,
            ..Default::default()
        };
        assert_eq!(
            decide(&stats, &PageGeometry::letter(), &config),
            FallbackAction::RunOcr
        );
    }
}
