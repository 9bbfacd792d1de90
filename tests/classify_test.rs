//! Classification scenarios: headings, verbatim code, callouts, fallback.

use pagemill::classify::{classify, classify_ocr_lines, score_cluster, ClusterKind, RegionIndex};
use pagemill::fallback::{decide, FallbackAction};
use pagemill::signal::{cluster_lines, compute_stats};
use pagemill::{CalloutKind, Element, Fragment, Mode, PageGeometry, Region, RunConfig};

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

fn with_body(mut extra: Vec<Fragment>) -> Vec<Fragment> {
    let mut fragments: Vec<Fragment> = (0..10)
        .map(|i| {
            frag(
                "plain body prose used to anchor the page median",
                72.0,
                300.0 + i as f32 * 14.0,
                10.0,
                "Helvetica",
            )
        })
        .collect();
    fragments.append(&mut extra);
    fragments
}

fn classify_page(fragments: &[Fragment], config: &RunConfig) -> Vec<Element> {
    let clusters = cluster_lines(fragments);
    let stats = compute_stats(fragments, &clusters);
    let mut regions = RegionIndex::default();
    classify(&clusters, &stats, config, &mut regions)
}

#[test]
fn test_heading_scenario_at_double_median() {
    // "# Introduction" at 2.2x the page median font size becomes a single
    // level-1 heading with the marker stripped.
    let fragments = with_body(vec![frag(
        "# Introduction",
        72.0,
        60.0,
        22.0,
        "Helvetica",
    )]);
    let config = RunConfig::default();

    let elements = classify_page(&fragments, &config);
    let headings: Vec<_> = elements
        .iter()
        .filter_map(|e| match e {
            Element::Heading { level, text } => Some((*level, text.clone())),
            _ => None,
        })
        .collect();

    assert_eq!(headings, vec![(1, "Introduction".to_string())]);
}

#[test]
fn test_six_line_code_cluster_survives_verbatim() {
    let code_lines = [
        "for (var i = 0; i < n; i++) {",
        "    total += values[i];",
        "    if (total > limit) {",
        "        break;",
        "    }",
        "}",
    ];
    let mut extra = Vec::new();
    for (i, line) in code_lines.iter().enumerate() {
        extra.push(frag(line, 100.0, 60.0 + i as f32 * 12.0, 10.0, "Consolas"));
    }
    let fragments = with_body(extra);
    let config = RunConfig::default();

    let elements = classify_page(&fragments, &config);
    let code_blocks: Vec<_> = elements.iter().filter(|e| e.is_code()).collect();
    assert_eq!(code_blocks.len(), 1);

    if let Element::CodeBlock { text, .. } = code_blocks[0] {
        assert_eq!(text.lines().count(), 6);
        for line in &code_lines {
            assert!(text.contains(line), "missing verbatim line: {}", line);
        }
    }
}

#[test]
fn test_code_boundary_beats_heading_regardless_of_font_size() {
    // Monospace fraction 0.9, consistent indentation, 4+ contiguous lines:
    // always a code block, never a heading, even at heading-sized fonts.
    let mut extra = Vec::new();
    for i in 0..4 {
        // Nine characters monospace, one character proportional per line.
        extra.push(frag("config[k]", 100.0, 40.0 + i as f32 * 26.0, 22.0, "Menlo"));
        extra.push(frag("=", 240.0, 40.0 + i as f32 * 26.0, 22.0, "Helvetica"));
    }
    let fragments = with_body(extra);

    let clusters = cluster_lines(&fragments);
    let stats = compute_stats(&fragments, &clusters);
    let config = RunConfig::default();

    let cluster = clusters
        .iter()
        .find(|c| c.mono_fraction() > 0.8 && c.mono_fraction() < 1.0)
        .expect("mixed-face cluster present");
    assert!(cluster.line_count() >= 4);

    let score = score_cluster(cluster, &stats, &config.classify);
    assert_eq!(score.kind, ClusterKind::Code);
}

#[test]
fn test_callout_scenario() {
    let fragments = with_body(vec![frag(
        "Note: check the config",
        72.0,
        60.0,
        10.0,
        "Helvetica",
    )]);
    let config = RunConfig::default();

    let elements = classify_page(&fragments, &config);
    assert!(elements.contains(&Element::Callout {
        kind: CalloutKind::Note,
        text: "check the config".to_string(),
    }));
}

#[test]
fn test_default_language_applied_to_unhinted_code() {
    let mut extra = Vec::new();
    for i in 0..3 {
        extra.push(frag(
            "x <- y %% z;;",
            100.0,
            60.0 + i as f32 * 12.0,
            10.0,
            "Courier",
        ));
    }
    let fragments = with_body(extra);
    let config = RunConfig::default().with_default_language("text");

    let elements = classify_page(&fragments, &config);
    let code = elements.iter().find(|e| e.is_code()).unwrap();
    if let Element::CodeBlock { language, .. } = code {
        assert_eq!(language, "text");
    }
}

#[test]
fn test_ocr_lines_classified_without_font_signal() {
    let config = RunConfig::default();
    let lines = vec![
        "Chapter summary text from the scanner.".to_string(),
        String::new(),
        "    value = table[key];".to_string(),
        "    emit(value);".to_string(),
    ];

    let elements = classify_ocr_lines(&lines, &config);
    assert_eq!(elements.len(), 2);
    assert!(matches!(elements[0], Element::Paragraph { .. }));
    assert!(elements[1].is_code());
}

#[test]
fn test_fallback_zero_fragments_always_fires() {
    let config = RunConfig::default();
    let stats = compute_stats(&[], &[]);
    assert_eq!(
        decide(&stats, &PageGeometry::letter(), &config),
        FallbackAction::RunOcr
    );
}

#[test]
fn test_fallback_healthy_page_never_fires_in_fast_mode() {
    let fragments = with_body(Vec::new());
    let clusters = cluster_lines(&fragments);
    let stats = compute_stats(&fragments, &clusters);
    let config = RunConfig::default();

    assert!(stats.extracted_chars > config.fallback.fast_floor);
    assert_eq!(
        decide(&stats, &PageGeometry::letter(), &config),
        FallbackAction::None
    );
}

#[test]
fn test_fallback_accurate_mode_relaxed() {
    // One short line: passes in fast mode, triggers recognition in
    // accurate mode.
    let fragments = vec![frag("Short divider text page", 72.0, 60.0, 10.0, "Helvetica")];
    let clusters = cluster_lines(&fragments);
    let stats = compute_stats(&fragments, &clusters);

    let fast = RunConfig::default();
    let accurate = RunConfig::default().with_mode(Mode::Accurate);

    assert_eq!(
        decide(&stats, &PageGeometry::letter(), &fast),
        FallbackAction::None
    );
    assert_eq!(
        decide(&stats, &PageGeometry::letter(), &accurate),
        FallbackAction::RunOcr
    );
}
