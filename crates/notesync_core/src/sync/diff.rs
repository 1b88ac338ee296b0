//! Line-level diff used to present merge conflicts.
//!
//! The diff is computed with Myers' algorithm and surfaced as typed ops, so
//! every line is classified when it is produced.

use similar::{ChangeTag, TextDiff};
use std::collections::BTreeSet;

/// One line of an edit script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Equal(String),
    Insert(String),
    Delete(String),
}

/// Computes the minimal line edit script turning `old` into `new`.
pub fn diff_lines(old: &str, new: &str) -> Vec<DiffOp> {
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .map(|change| {
            let line = strip_line_ending(change.value()).to_string();
            match change.tag() {
                ChangeTag::Equal => DiffOp::Equal(line),
                ChangeTag::Insert => DiffOp::Insert(line),
                ChangeTag::Delete => DiffOp::Delete(line),
            }
        })
        .collect()
}

/// Renders ops as editable plain text. Equal lines pass through; deleted and
/// inserted lines get `marker` followed by `-` or `+`.
pub fn render_conflict(ops: &[DiffOp], marker: &str) -> String {
    let mut out = String::new();
    for op in ops {
        match op {
            DiffOp::Equal(line) => out.push_str(line),
            DiffOp::Delete(line) => {
                out.push_str(marker);
                out.push('-');
                out.push_str(line);
            }
            DiffOp::Insert(line) => {
                out.push_str(marker);
                out.push('+');
                out.push_str(line);
            }
        }
        out.push('\n');
    }
    out
}

/// Deduplicated, sorted union of two tag lists.
pub fn union_tags(left: &[String], right: &[String]) -> Vec<String> {
    left.iter()
        .chain(right)
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn strip_line_ending(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}
