//! Table-of-contents generation over the assembled document.

/// Marker line opening the TOC block in the document head.
pub const TOC_START: &str = "<!-- toc -->";

/// Marker line closing the TOC block.
pub const TOC_END: &str = "<!-- /toc -->";

/// Collect TOC lines from the document's headings.
///
/// Heading lines inside code fences are skipped so fenced `# comments` do
/// not leak into the TOC.
pub fn generate_toc(markdown: &str) -> Vec<String> {
    let mut toc = Vec::new();
    let mut in_fence = false;

    for line in markdown.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || !line.starts_with('#') {
            continue;
        }

        let level = line.chars().take_while(|c| *c == '#').count();
        let title = line.trim_start_matches('#').trim();
        if title.is_empty() || level > 6 {
            continue;
        }

        let anchor = title.to_lowercase().replace(' ', "-");
        let indent = "  ".repeat(level - 1);
        toc.push(format!("{}- [{}](#{})", indent, title, anchor));
    }

    toc
}

/// Replace the marker block with a freshly generated TOC.
///
/// Idempotent: the block between [`TOC_START`] and [`TOC_END`] is replaced
/// wholesale, so repeated insertion converges. Returns the updated document
/// and the signed byte delta of the rewrite (zero when the markers are
/// missing or the TOC is unchanged).
pub fn insert_toc(markdown: &str) -> (String, i64) {
    let lines: Vec<&str> = markdown.split_inclusive('\n').collect();

    let start = lines
        .iter()
        .position(|l| l.trim_end() == TOC_START);
    let end = lines.iter().position(|l| l.trim_end() == TOC_END);

    let (start, end) = match (start, end) {
        (Some(s), Some(e)) if s < e => (s, e),
        _ => return (markdown.to_string(), 0),
    };

    let toc = generate_toc(markdown);
    let mut updated = String::with_capacity(markdown.len() + toc.len() * 32);
    for line in &lines[..=start] {
        updated.push_str(line);
    }
    for entry in &toc {
        updated.push_str(entry);
        updated.push('\n');
    }
    for line in &lines[end..] {
        updated.push_str(line);
    }

    let delta = updated.len() as i64 - markdown.len() as i64;
    (updated, delta)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\ntitle: \"T\"\n---\n\n<!-- toc -->\n<!-- /toc -->\n\n\
# Intro\n\nbody\n\n## Details\n\n```text\n# not a heading\n```\n";

    #[test]
    fn test_generate_toc_skips_fences() {
        let toc = generate_toc(DOC);
        assert_eq!(
            toc,
            vec![
                "- [Intro](#intro)".to_string(),
                "  - [Details](#details)".to_string(),
            ]
        );
    }

    #[test]
    fn test_insert_toc_idempotent() {
        let (once, delta_once) = insert_toc(DOC);
        assert!(delta_once > 0);
        assert!(once.contains("- [Intro](#intro)\n"));

        let (twice, delta_twice) = insert_toc(&once);
        assert_eq!(delta_twice, 0);
        assert_eq!(twice, once);
    }

    #[test]
    fn test_insert_toc_without_markers() {
        let doc = "# Plain\n\nno markers here\n";
        let (updated, delta) = insert_toc(doc);
        assert_eq!(delta, 0);
        assert_eq!(updated, doc);
    }
}
