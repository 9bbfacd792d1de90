//! Post-run validation of an output directory.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::assemble::DOCUMENT_FILE;
use crate::error::Result;
use crate::ledger::LEDGER_FILE;

/// Problems found while validating an output directory.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Human-readable problem descriptions
    pub problems: Vec<String>,
}

impl ValidationReport {
    /// Whether the output passed validation.
    pub fn is_ok(&self) -> bool {
        self.problems.is_empty()
    }

    fn problem(&mut self, message: impl Into<String>) {
        self.problems.push(message.into());
    }
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!?\[[^\]]*\]\(([^)#][^)]*)\)").unwrap())
}

/// Validate an output directory: the document exists, code fences balance,
/// referenced assets exist, and the ledger is readable.
pub fn validate_output(out_dir: &Path) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    let doc_path = out_dir.join(DOCUMENT_FILE);
    if !doc_path.exists() {
        report.problem(format!("{} missing", DOCUMENT_FILE));
        return Ok(report);
    }

    let content = std::fs::read_to_string(&doc_path)?;

    let fence_count = content
        .lines()
        .filter(|line| line.trim_start().starts_with("```"))
        .count();
    if fence_count % 2 != 0 {
        report.problem("unbalanced code fences");
    }

    for caps in link_re().captures_iter(&content) {
        let target = &caps[1];
        if target.starts_with("http://") || target.starts_with("https://") {
            continue;
        }
        if !out_dir.join(target).exists() {
            report.problem(format!("missing asset: {}", target));
        }
    }

    let ledger_path = out_dir.join(LEDGER_FILE);
    if ledger_path.exists() {
        let raw = std::fs::read_to_string(&ledger_path)?;
        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(doc) => {
                if doc.get("pages").and_then(|v| v.as_object()).is_none() {
                    report.problem("ledger has no pages object");
                }
            }
            Err(e) => report.problem(format!("ledger unreadable: {}", e)),
        }
    } else {
        report.problem(format!("{} missing", LEDGER_FILE));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_ledger(dir: &Path) {
        fs::write(
            dir.join(LEDGER_FILE),
            r#"{ "header_end": 0, "pages": {}, "warnings": [] }"#,
        )
        .unwrap();
    }

    #[test]
    fn test_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate_output(dir.path()).unwrap();
        assert!(!report.is_ok());
        assert!(report.problems[0].contains("missing"));
    }

    #[test]
    fn test_balanced_output_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(DOCUMENT_FILE),
            "# T\n\n```rust\nfn x() {}\n```\n",
        )
        .unwrap();
        write_ledger(dir.path());

        let report = validate_output(dir.path()).unwrap();
        assert!(report.is_ok(), "problems: {:?}", report.problems);
    }

    #[test]
    fn test_unbalanced_fences_flagged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(DOCUMENT_FILE), "```rust\nfn x() {}\n").unwrap();
        write_ledger(dir.path());

        let report = validate_output(dir.path()).unwrap();
        assert!(report
            .problems
            .iter()
            .any(|p| p.contains("unbalanced code fences")));
    }

    #[test]
    fn test_missing_asset_flagged() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(DOCUMENT_FILE),
            "![fig](images/p0001_img01.png)\n",
        )
        .unwrap();
        write_ledger(dir.path());

        let report = validate_output(dir.path()).unwrap();
        assert!(report
            .problems
            .iter()
            .any(|p| p.contains("images/p0001_img01.png")));
    }

    #[test]
    fn test_existing_asset_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/p0001_img01.png"), b"png").unwrap();
        fs::write(
            dir.path().join(DOCUMENT_FILE),
            "![fig](images/p0001_img01.png)\n",
        )
        .unwrap();
        write_ledger(dir.path());

        let report = validate_output(dir.path()).unwrap();
        assert!(report.is_ok(), "problems: {:?}", report.problems);
    }
}
