//! Advisory content scan for leftover scaffolding and debris.
//!
//! Flags patterns that usually mean a phase actor left something behind:
//! merge conflict markers, debug prints, focused tests, unfinished stubs.
//! Purely informational; findings never gate a checkpoint or block
//! completion.

use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RULES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "merge-conflict-marker",
            Regex::new(r"^(<{7}|={7}|>{7})(\s|$)").unwrap(),
        ),
        ("debug-print", Regex::new(r"\b(dbg!|console\.log)\(").unwrap()),
        ("focused-test", Regex::new(r"\.only\(").unwrap()),
        (
            "unfinished-stub",
            Regex::new(r"\b(unimplemented!|todo!)\(").unwrap(),
        ),
        ("leftover-marker", Regex::new(r"\b(TODO|FIXME|XXX)\b").unwrap()),
    ]
});

/// One advisory finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    pub rule: &'static str,
    pub excerpt: String,
}

/// Scan a single file for advisory findings.
pub fn scan_file(path: &Path) -> Result<Vec<Advisory>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file for advisory scan: {}", path.display()))?;

    let mut findings = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        for &(rule, ref regex) in RULES.iter() {
            if regex.is_match(line) {
                findings.push(Advisory {
                    path: path.to_path_buf(),
                    line: line_no + 1,
                    rule,
                    excerpt: line.trim().chars().take(120).collect(),
                });
            }
        }
    }

    Ok(findings)
}

/// Scan several files; unreadable ones are skipped, not fatal.
pub fn scan_paths(paths: &[PathBuf]) -> Vec<Advisory> {
    let mut findings = Vec::new();
    for path in paths {
        match scan_file(path) {
            Ok(mut f) => findings.append(&mut f),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "advisory scan skipped file");
            }
        }
    }
    findings
}
