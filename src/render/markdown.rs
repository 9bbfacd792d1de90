//! Obsidian-flavoured Markdown rendering of page elements.

use crate::model::Element;

/// Render one page's elements, with its page marker and an optical-
/// recognition provenance note when the text came from the fallback path.
pub fn render_page(page: u32, elements: &[Element], ocr_used: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("<!-- page: {} -->\n\n", page));

    if ocr_used {
        out.push_str("> [!note]\n> Optical recognition supplied the text for this page.\n\n");
    }

    for element in elements {
        render_element(&mut out, element);
    }

    out
}

/// Render a single element onto `out`.
pub fn render_element(out: &mut String, element: &Element) {
    match element {
        Element::Heading { level, text } => {
            let level = (*level).clamp(1, 6) as usize;
            out.push_str(&"#".repeat(level));
            out.push(' ');
            out.push_str(text);
            out.push_str("\n\n");
        }
        Element::Paragraph { text } => {
            if text.trim().is_empty() {
                return;
            }
            out.push_str(text);
            out.push_str("\n\n");
        }
        Element::CodeBlock { language, text } => {
            let fence = fence_for(text);
            out.push_str(&fence);
            out.push_str(language);
            out.push('\n');
            out.push_str(text);
            if !text.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&fence);
            out.push_str("\n\n");
        }
        Element::Callout { kind, text } => {
            out.push_str(&format!("> [!{}]\n", kind.as_str()));
            for line in text.lines() {
                out.push_str("> ");
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        Element::TableRef { id } => {
            out.push_str(&format!("[Table data]({})\n\n", id));
        }
        Element::ImageRef { id, caption } => {
            let alt = caption.as_deref().unwrap_or("Page image");
            out.push_str(&format!("![{}]({})\n\n", alt, id));
        }
    }
}

/// Pick a fence longer than any backtick run opening a line of the code, so
/// code containing fences still renders balanced.
fn fence_for(text: &str) -> String {
    let mut longest = 0usize;
    for line in text.lines() {
        let run = line.trim_start().chars().take_while(|c| *c == '`').count();
        longest = longest.max(run);
    }
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CalloutKind;

    #[test]
    fn test_render_heading() {
        let mut out = String::new();
        render_element(&mut out, &Element::heading(2, "Getting Started"));
        assert_eq!(out, "## Getting Started\n\n");
    }

    #[test]
    fn test_render_code_block_verbatim() {
        let mut out = String::new();
        render_element(
            &mut out,
            &Element::code("rust", "fn main() {\n    run();\n}"),
        );
        assert_eq!(out, "```rust\nfn main() {\n    run();\n}\n```\n\n");
    }

    #[test]
    fn test_render_code_containing_fence() {
        let mut out = String::new();
        render_element(&mut out, &Element::code("markdown", "```\ninner\n```"));
        assert!(out.starts_with("````markdown\n"));
        assert!(out.trim_end().ends_with("````"));

        // An odd number of fence lines would read as unbalanced; the outer
        // fence must be longer than any inner run.
        let fence_lines = out
            .lines()
            .filter(|l| l.trim_start().starts_with("````"))
            .count();
        assert_eq!(fence_lines, 2);
    }

    #[test]
    fn test_render_callout() {
        let mut out = String::new();
        render_element(
            &mut out,
            &Element::callout(CalloutKind::Warning, "do not unplug"),
        );
        assert_eq!(out, "> [!warning]\n> do not unplug\n\n");
    }

    #[test]
    fn test_render_refs() {
        let mut out = String::new();
        render_element(
            &mut out,
            &Element::ImageRef {
                id: "images/p0001_img01.png".to_string(),
                caption: Some("Figure 1".to_string()),
            },
        );
        render_element(
            &mut out,
            &Element::TableRef {
                id: "tables/p0001_table01.csv".to_string(),
            },
        );
        assert!(out.contains("![Figure 1](images/p0001_img01.png)"));
        assert!(out.contains("[Table data](tables/p0001_table01.csv)"));
    }

    #[test]
    fn test_render_page_with_ocr_note() {
        let rendered = render_page(4, &[Element::paragraph("scanned text")], true);
        assert!(rendered.starts_with("<!-- page: 4 -->\n\n"));
        assert!(rendered.contains("> [!note]"));
        assert!(rendered.contains("scanned text"));
    }
}
