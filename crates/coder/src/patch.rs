//! Ordered text edits with an indentation-insensitive fallback, plus the
//! unified diff shown back to the model.
use serde::{Deserialize, Serialize};
use similar::TextDiff;
use std::path::Path;

use crate::errors::{AgentError, AgentResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOperation {
    #[serde(rename = "oldText")]
    pub old_text: String,
    #[serde(rename = "newText")]
    pub new_text: String,
}

impl EditOperation {
    pub fn new<O: Into<String>, N: Into<String>>(old_text: O, new_text: N) -> Self {
        Self {
            old_text: old_text.into(),
            new_text: new_text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatchOutcome {
    pub content: String,
    /// Fenced unified diff between the original and patched content
    pub diff: String,
}

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Apply `edits` in order, each against the output of the previous one.
///
/// Fails with [`AgentError::NoMatchFound`] on the first edit whose old text
/// cannot be located, in which case nothing is returned for the earlier edits
/// either.
pub fn apply_edits(content: &str, edits: &[EditOperation]) -> AgentResult<String> {
    let mut modified = normalize_line_endings(content);

    for edit in edits {
        let old_text = normalize_line_endings(&edit.old_text);
        let new_text = normalize_line_endings(&edit.new_text);

        if old_text.is_empty() {
            return Err(AgentError::InvalidParameters(
                "oldText must not be empty".into(),
            ));
        }

        modified = replace_exact(&modified, &old_text, &new_text)
            .or_else(|| replace_fuzzy(&modified, &old_text, &new_text))
            .ok_or_else(|| AgentError::NoMatchFound(edit.old_text.clone()))?;
    }

    Ok(modified)
}

/// Apply edits and render the diff, without touching the filesystem
pub fn apply(original: &str, edits: &[EditOperation], label: &str) -> AgentResult<PatchOutcome> {
    let original = normalize_line_endings(original);
    let content = apply_edits(&original, edits)?;
    let diff = fence_diff(&unified_diff(&original, &content, label));
    Ok(PatchOutcome { content, diff })
}

/// Patch a file in place and return the fenced diff.
///
/// The file is only written once every edit matched and the diff was built,
/// and never when `dry_run` is set.
pub fn apply_file_edits(path: &Path, edits: &[EditOperation], dry_run: bool) -> AgentResult<String> {
    let original = std::fs::read_to_string(path)
        .map_err(|e| AgentError::ExecutionError(format!("Failed to read file: {}", e)))?;

    let outcome = apply(&original, edits, &path.display().to_string())?;

    if !dry_run {
        std::fs::write(path, &outcome.content)
            .map_err(|e| AgentError::ExecutionError(format!("Failed to write file: {}", e)))?;
    }
    Ok(outcome.diff)
}

fn replace_exact(content: &str, old_text: &str, new_text: &str) -> Option<String> {
    content
        .contains(old_text)
        .then(|| content.replace(old_text, new_text))
}

/// Replace the first window of lines equal to `old_text` modulo surrounding whitespace
fn replace_fuzzy(content: &str, old_text: &str, new_text: &str) -> Option<String> {
    let old_lines: Vec<&str> = old_text.split('\n').collect();
    let content_lines: Vec<&str> = content.split('\n').collect();

    if old_lines.len() > content_lines.len() {
        return None;
    }

    let start = (0..=content_lines.len() - old_lines.len()).find(|&i| {
        old_lines
            .iter()
            .zip(&content_lines[i..])
            .all(|(old, line)| old.trim() == line.trim())
    })?;

    let base_indent = leading_whitespace(content_lines[start]);
    let replacement = new_text.split('\n').enumerate().map(|(j, line)| {
        if j == 0 {
            return format!("{}{}", base_indent, line.trim_start());
        }
        match old_lines.get(j) {
            Some(old_line) => {
                let delta = indent_width(line) as isize - indent_width(old_line) as isize;
                format!(
                    "{}{}{}",
                    base_indent,
                    " ".repeat(delta.max(0) as usize),
                    line.trim_start()
                )
            }
            None => line.to_string(),
        }
    });

    let mut lines: Vec<String> = content_lines.iter().map(|line| line.to_string()).collect();
    lines.splice(start..start + old_lines.len(), replacement);
    Some(lines.join("\n"))
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

fn indent_width(line: &str) -> usize {
    leading_whitespace(line).chars().count()
}

/// Line-based unified diff; empty when the two texts have the same lines
pub fn unified_diff(original: &str, modified: &str, label: &str) -> String {
    let original = terminate_lines(original);
    let modified = terminate_lines(modified);

    let diff = TextDiff::configure()
        .newline_terminated(true)
        .diff_lines(&original, &modified);

    diff.unified_diff()
        .context_radius(3)
        .missing_newline_hint(false)
        .header(
            &format!("{} (original)", label),
            &format!("{} (modified)", label),
        )
        .to_string()
        .trim_end_matches('\n')
        .to_string()
}

/// Compare line content only, so a missing final newline is not a change
fn terminate_lines(text: &str) -> String {
    if text.is_empty() || text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}

/// Wrap a diff in a fence longer than any backtick run inside it
pub fn fence_diff(diff: &str) -> String {
    let longest_run = diff
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let fence = "`".repeat((longest_run + 1).max(3));
    format!("{fence}diff\n{diff}\n{fence}\n\n")
}
