//! Line-level text diffs.
//!
//! Two strategies share one result type:
//!
//! - [`DiffStrategy::Aligned`] runs a Myers line diff, so an inserted line is
//!   reported as one addition.
//! - [`DiffStrategy::Positional`] compares line *i* against line *i*; an
//!   insertion shifts every later comparison and shows up as a run of
//!   modifications. Kept for callers that depend on those counts. Texts
//!   whose lines match but whose line endings differ report `has_changes`
//!   with zero counts; `diff_text` then carries a `\` marker line.
//!
//! `diff_text` mimics unified-diff headers for display. It is not meant to be
//! fed to `patch`.

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, DiffOp, TextDiff};
use std::fmt;
use std::str::FromStr;

/// How lines of the two sides are paired up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStrategy {
    #[default]
    Aligned,
    Positional,
}

impl fmt::Display for DiffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffStrategy::Aligned => write!(f, "aligned"),
            DiffStrategy::Positional => write!(f, "positional"),
        }
    }
}

impl FromStr for DiffStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aligned" | "myers" => Ok(DiffStrategy::Aligned),
            "positional" => Ok(DiffStrategy::Positional),
            other => Err(format!("unknown diff strategy: {other}")),
        }
    }
}

/// Options for [`generate_diff`].
#[derive(Debug, Clone)]
pub struct DiffOptions {
    pub strategy: DiffStrategy,
    /// Unchanged lines shown around each change (aligned only).
    pub context_lines: usize,
    /// Label for the `---` header.
    pub old_label: String,
    /// Label for the `+++` header.
    pub new_label: String,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            strategy: DiffStrategy::default(),
            context_lines: 3,
            old_label: "a".to_string(),
            new_label: "b".to_string(),
        }
    }
}

impl DiffOptions {
    pub fn with_labels(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_label = old.into();
        self.new_label = new.into();
        self
    }

    pub fn with_strategy(mut self, strategy: DiffStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

/// One changed line. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LineChange {
    Added {
        line: usize,
        text: String,
    },
    Removed {
        line: usize,
        text: String,
    },
    Modified {
        old_line: usize,
        new_line: usize,
        old: String,
        new: String,
    },
}

/// Outcome of comparing two texts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub has_changes: bool,
    pub added_lines: usize,
    pub removed_lines: usize,
    pub modified_lines: usize,
    pub changes: Vec<LineChange>,
    pub diff_text: String,
}

impl DiffResult {
    fn push(&mut self, change: LineChange) {
        match &change {
            LineChange::Added { .. } => self.added_lines += 1,
            LineChange::Removed { .. } => self.removed_lines += 1,
            LineChange::Modified { .. } => self.modified_lines += 1,
        }
        self.changes.push(change);
    }
}

/// Compare `old` against `new`.
pub fn generate_diff(old: &str, new: &str, options: &DiffOptions) -> DiffResult {
    if old == new {
        return DiffResult::default();
    }

    let mut result = match options.strategy {
        DiffStrategy::Aligned => aligned_diff(old, new, options),
        DiffStrategy::Positional => positional_diff(old, new, options),
    };
    result.has_changes = true;
    result
}

fn positional_diff(old: &str, new: &str, options: &DiffOptions) -> DiffResult {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let mut result = DiffResult::default();
    let mut text = header(options);

    for i in 0..old_lines.len().max(new_lines.len()) {
        let line = i + 1;
        match (old_lines.get(i), new_lines.get(i)) {
            (Some(a), Some(b)) if a == b => {}
            (Some(a), Some(b)) => {
                push_line(&mut text, "-", a);
                push_line(&mut text, "+", b);
                result.push(LineChange::Modified {
                    old_line: line,
                    new_line: line,
                    old: a.to_string(),
                    new: b.to_string(),
                });
            }
            (Some(a), None) => {
                push_line(&mut text, "-", a);
                result.push(LineChange::Removed {
                    line,
                    text: a.to_string(),
                });
            }
            (None, Some(b)) => {
                push_line(&mut text, "+", b);
                result.push(LineChange::Added {
                    line,
                    text: b.to_string(),
                });
            }
            (None, None) => {}
        }
    }
    if result.changes.is_empty() {
        push_line_ending_note(&mut text, old, new);
    }

    result.diff_text = text;
    result
}

fn aligned_diff(old: &str, new: &str, options: &DiffOptions) -> DiffResult {
    let diff = TextDiff::from_lines(old, new);
    let old_slices = diff.old_slices();
    let new_slices = diff.new_slices();
    let mut result = DiffResult::default();

    let ops = diff.ops();
    let mut idx = 0;
    while idx < ops.len() {
        match ops[idx] {
            DiffOp::Equal { .. } => {}
            DiffOp::Delete {
                old_index, old_len, ..
            } => {
                // Adjacent delete and insert runs are a replacement
                if let Some(DiffOp::Insert {
                    new_index, new_len, ..
                }) = ops.get(idx + 1)
                {
                    pair_lines(
                        &mut result,
                        (old_index, old_len),
                        (*new_index, *new_len),
                        old_slices,
                        new_slices,
                    );
                    idx += 1;
                } else {
                    pair_lines(
                        &mut result,
                        (old_index, old_len),
                        (0, 0),
                        old_slices,
                        new_slices,
                    );
                }
            }
            DiffOp::Insert {
                new_index, new_len, ..
            } => {
                if let Some(DiffOp::Delete {
                    old_index, old_len, ..
                }) = ops.get(idx + 1)
                {
                    pair_lines(
                        &mut result,
                        (*old_index, *old_len),
                        (new_index, new_len),
                        old_slices,
                        new_slices,
                    );
                    idx += 1;
                } else {
                    pair_lines(
                        &mut result,
                        (0, 0),
                        (new_index, new_len),
                        old_slices,
                        new_slices,
                    );
                }
            }
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => pair_lines(
                &mut result,
                (old_index, old_len),
                (new_index, new_len),
                old_slices,
                new_slices,
            ),
        }
        idx += 1;
    }

    result.diff_text = unified_text(&diff, options);
    result
}

/// Pair the first `min(old_len, new_len)` lines as modifications and report
/// the surplus as removals or additions.
fn pair_lines(
    result: &mut DiffResult,
    (old_index, old_len): (usize, usize),
    (new_index, new_len): (usize, usize),
    old_slices: &[&str],
    new_slices: &[&str],
) {
    let paired = old_len.min(new_len);

    for k in 0..paired {
        result.push(LineChange::Modified {
            old_line: old_index + k + 1,
            new_line: new_index + k + 1,
            old: strip_eol(old_slices[old_index + k]).to_string(),
            new: strip_eol(new_slices[new_index + k]).to_string(),
        });
    }
    for k in paired..old_len {
        result.push(LineChange::Removed {
            line: old_index + k + 1,
            text: strip_eol(old_slices[old_index + k]).to_string(),
        });
    }
    for k in paired..new_len {
        result.push(LineChange::Added {
            line: new_index + k + 1,
            text: strip_eol(new_slices[new_index + k]).to_string(),
        });
    }
}

fn unified_text(diff: &TextDiff<'_, '_, '_, str>, options: &DiffOptions) -> String {
    let mut output = header(options);

    for (idx, group) in diff.grouped_ops(options.context_lines).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };
                push_line(&mut output, sign, strip_eol(change.value()));
            }
        }
    }

    output
}

fn header(options: &DiffOptions) -> String {
    format!(
        "--- a/{}\n+++ b/{}\n",
        options.old_label, options.new_label
    )
}

fn push_line(out: &mut String, sign: &str, line: &str) {
    out.push_str(sign);
    out.push_str(line);
    out.push('\n');
}

/// Describe a difference that `str::lines` hides.
fn push_line_ending_note(out: &mut String, old: &str, new: &str) {
    if old.ends_with('\n') == new.ends_with('\n') {
        out.push_str("\\ Line endings differ\n");
        return;
    }
    for (sign, side) in [("-", old), ("+", new)] {
        push_line(out, sign, side.lines().last().unwrap_or(""));
        if !side.ends_with('\n') {
            out.push_str("\\ No newline at end of file\n");
        }
    }
}

fn strip_eol(line: &str) -> &str {
    line.trim_end_matches(&['\n', '\r'][..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positional() -> DiffOptions {
        DiffOptions::default().with_strategy(DiffStrategy::Positional)
    }

    #[test]
    fn test_positional_missing_final_newline() {
        let result = generate_diff("a\n", "a", &positional());
        assert!(result.has_changes);
        assert!(result.changes.is_empty());
        assert_eq!(
            result.diff_text,
            "--- a/a\n+++ b/b\n-a\n+a\n\\ No newline at end of file\n"
        );

        let result = generate_diff("a\r\n", "a\n", &positional());
        assert!(result.has_changes);
        assert!(result.diff_text.ends_with("\\ Line endings differ\n"));
    }

    #[test]
    fn test_identical_texts_have_no_changes() {
        let result = generate_diff("a\nb\n", "a\nb\n", &DiffOptions::default());
        assert!(!result.has_changes);
        assert!(result.changes.is_empty());
        assert!(result.diff_text.is_empty());
    }

    #[test]
    fn test_single_line_change_is_one_modification() {
        for options in [DiffOptions::default(), positional()] {
            let result = generate_diff("line1\nline2\n", "line1\nchanged\n", &options);
            assert!(result.has_changes);
            assert_eq!(result.modified_lines, 1);
            assert_eq!(result.added_lines, 0);
            assert_eq!(result.removed_lines, 0);
            assert_eq!(
                result.changes,
                vec![LineChange::Modified {
                    old_line: 2,
                    new_line: 2,
                    old: "line2".to_string(),
                    new: "changed".to_string(),
                }]
            );
            assert!(result.diff_text.contains("-line2\n"));
            assert!(result.diff_text.contains("+changed\n"));
        }
    }

    #[test]
    fn test_positional_insert_cascades() {
        let result = generate_diff("a\nb\nc\n", "new\na\nb\nc\n", &positional());
        assert_eq!(result.modified_lines, 3);
        assert_eq!(result.added_lines, 1);
        assert_eq!(result.removed_lines, 0);
        assert_eq!(
            result.changes.last(),
            Some(&LineChange::Added {
                line: 4,
                text: "c".to_string()
            })
        );
    }

    #[test]
    fn test_aligned_insert_is_single_addition() {
        let result = generate_diff("a\nb\nc\n", "new\na\nb\nc\n", &DiffOptions::default());
        assert_eq!(result.modified_lines, 0);
        assert_eq!(result.added_lines, 1);
        assert_eq!(
            result.changes,
            vec![LineChange::Added {
                line: 1,
                text: "new".to_string()
            }]
        );
        assert!(result.diff_text.contains("+new\n"));
        assert!(result.diff_text.contains(" a\n"));
    }

    #[test]
    fn test_removed_trailing_lines() {
        for options in [DiffOptions::default(), positional()] {
            let result = generate_diff("a\nb\nc\n", "a\n", &options);
            assert_eq!(result.removed_lines, 2);
            assert_eq!(result.modified_lines, 0);
        }
    }

    #[test]
    fn test_replace_with_surplus_lines() {
        let result = generate_diff(
            "keep\nold1\nend\n",
            "keep\nnew1\nnew2\nend\n",
            &DiffOptions::default(),
        );
        assert_eq!(result.modified_lines, 1);
        assert_eq!(result.added_lines, 1);
        assert_eq!(result.removed_lines, 0);
    }

    #[test]
    fn test_headers_use_labels() {
        let options = positional().with_labels("notes.txt@1", "notes.txt@2");
        let result = generate_diff("x\n", "y\n", &options);
        assert!(result
            .diff_text
            .starts_with("--- a/notes.txt@1\n+++ b/notes.txt@2\n"));
        assert_eq!(
            result.diff_text,
            "--- a/notes.txt@1\n+++ b/notes.txt@2\n-x\n+y\n"
        );
    }

    #[test]
    fn test_missing_trailing_newline_still_counts_as_change() {
        let result = generate_diff("a\n", "a", &DiffOptions::default());
        assert!(result.has_changes);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("aligned".parse(), Ok(DiffStrategy::Aligned));
        assert_eq!(" Positional ".parse(), Ok(DiffStrategy::Positional));
        assert!("lcs-ish".parse::<DiffStrategy>().is_err());
        assert_eq!(DiffStrategy::Positional.to_string(), "positional");
    }
}
