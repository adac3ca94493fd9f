//! Exact/fuzzy file editing with diffs, backups, and transactional
//! multi-edit rollback: applies a batch of replace-in-place edits to a
//! file, backing up the original so a failed edit (or an explicit
//! rollback) restores it byte-for-byte.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::safety::{RiskLevel as PolicyRisk, SecurityPolicy, ValidationResult};

use super::traits::{Capability, RiskLevel, Tool, ToolResult};

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.85;

#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

#[derive(Debug, Clone)]
pub struct SingleEdit {
    pub search: String,
    pub replace: String,
    pub fuzzy: bool,
    pub similarity_threshold: f64,
}

/// Apply `search` → `replace` against `content`, exact match first, then
/// fuzzy (sliding-window similarity) if `edit.fuzzy` is set. Returns the
/// new content or an error describing why no match was found.
pub fn apply_single_edit(content: &str, edit: &SingleEdit) -> Result<String, String> {
    if let Some(pos) = content.find(edit.search.as_str()) {
        let mut out = String::with_capacity(content.len());
        out.push_str(&content[..pos]);
        out.push_str(&edit.replace);
        out.push_str(&content[pos + edit.search.len()..]);
        return Ok(out);
    }

    if !edit.fuzzy {
        return Err("no exact match found for search text".to_string());
    }

    match best_fuzzy_match(content, &edit.search, edit.similarity_threshold) {
        Some((start, end)) => {
            let mut out = String::with_capacity(content.len());
            out.push_str(&content[..start]);
            out.push_str(&edit.replace);
            out.push_str(&content[end..]);
            Ok(out)
        }
        None => Err(format!("no fuzzy match above similarity threshold {:.2}", edit.similarity_threshold)),
    }
}

/// Slide a window the length of `needle` across `haystack`, scoring each
/// position by normalized Levenshtein similarity, and return the byte
/// range of the best match if it clears `threshold`.
fn best_fuzzy_match(haystack: &str, needle: &str, threshold: f64) -> Option<(usize, usize)> {
    let needle_len = needle.chars().count();
    if needle_len == 0 {
        return None;
    }
    let hay_chars: Vec<char> = haystack.chars().collect();
    if hay_chars.len() < needle_len {
        return None;
    }

    let mut best_score = 0.0_f64;
    let mut best_range: Option<(usize, usize)> = None;

    let window = needle_len;
    for start in 0..=(hay_chars.len() - window) {
        let candidate: String = hay_chars[start..start + window].iter().collect();
        let score = similarity(&candidate, needle);
        if score > best_score {
            best_score = score;
            let byte_start: usize = hay_chars[..start].iter().map(|c| c.len_utf8()).sum();
            let byte_end: usize = byte_start + candidate.len();
            best_range = Some((byte_start, byte_end));
        }
    }

    if best_score >= threshold {
        best_range
    } else {
        None
    }
}

fn similarity(a: &str, b: &str) -> f64 {
    let dist = levenshtein(a, b) as f64;
    let max_len = a.chars().count().max(b.chars().count()).max(1) as f64;
    1.0 - (dist / max_len)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (m, n) = (a.len(), b.len());
    let mut row: Vec<usize> = (0..=n).collect();

    for i in 1..=m {
        let mut prev = row[0];
        row[0] = i;
        for j in 1..=n {
            let temp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j - 1])
            };
            prev = temp;
        }
    }
    row[n]
}

pub fn make_diff(path: &Path, original: &str, updated: &str) -> FileDiff {
    let patch = diffy::create_patch(original, updated);
    FileDiff { path: path.to_path_buf(), unified_diff: patch.to_string() }
}

fn backup_suffix_now() -> String {
    let now = chrono::Utc::now().to_rfc3339();
    now.replace(':', "-")
}

/// Write a timestamped backup of `path`, returning its location.
pub fn write_backup(path: &Path) -> std::io::Result<PathBuf> {
    let backup_path = PathBuf::from(format!("{}.backup.{}", path.display(), backup_suffix_now()));
    fs::copy(path, &backup_path)?;
    Ok(backup_path)
}

/// Write `content` to `path` atomically via a temp file + rename.
pub fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let epoch_ms = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or(0);
    let tmp_path = PathBuf::from(format!("{}.tmp.{}", path.display(), epoch_ms));
    fs::write(&tmp_path, content)?;
    fs::rename(&tmp_path, path)
}

/// Apply a sequence of edits across possibly-distinct files transactionally.
/// On any failure, if `rollback_on_error` is set, previously written
/// backups are restored in reverse order.
pub fn apply_transactional(edits: &[(PathBuf, SingleEdit)], rollback_on_error: bool) -> Result<Vec<FileDiff>, String> {
    let mut diffs = Vec::new();
    let mut backups: Vec<(PathBuf, PathBuf)> = Vec::new();

    for (path, edit) in edits {
        let original = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                if rollback_on_error {
                    rollback(&backups);
                }
                return Err(format!("failed to read '{}': {e}", path.display()));
            }
        };

        let updated = match apply_single_edit(&original, edit) {
            Ok(u) => u,
            Err(e) => {
                if rollback_on_error {
                    rollback(&backups);
                }
                return Err(format!("edit failed for '{}': {e}", path.display()));
            }
        };

        let backup_path = match write_backup(path) {
            Ok(b) => b,
            Err(e) => {
                if rollback_on_error {
                    rollback(&backups);
                }
                return Err(format!("failed to back up '{}': {e}", path.display()));
            }
        };
        backups.push((path.clone(), backup_path));

        if let Err(e) = write_atomic(path, &updated) {
            if rollback_on_error {
                rollback(&backups);
            }
            return Err(format!("failed to write '{}': {e}", path.display()));
        }

        diffs.push(make_diff(path, &original, &updated));
    }

    Ok(diffs)
}

fn rollback(backups: &[(PathBuf, PathBuf)]) {
    for (original, backup) in backups.iter().rev() {
        if let Err(e) = fs::copy(backup, original) {
            tracing::error!(path = %original.display(), %e, "rollback restore failed");
        }
    }
}

// ─── Tool wrapper ──────────────────────────────────────────────────────────

pub struct FileEditTool {
    policy: Arc<SecurityPolicy>,
}

impl FileEditTool {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "file_edit"
    }

    fn description(&self) -> &str {
        "Replace text in a file, exact match or fuzzy, with a timestamped backup and atomic write."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "search": { "type": "string" },
                "replace": { "type": "string" },
                "fuzzy": { "type": "boolean" },
                "similarity_threshold": { "type": "number" }
            },
            "required": ["path", "search", "replace"]
        })
    }

    fn required_capabilities(&self) -> Vec<Capability> {
        vec![Capability::WriteFile]
    }

    fn risk_level(&self) -> RiskLevel {
        RiskLevel::Medium
    }

    fn preflight(&self, args: &Value) -> crate::safety::PreflightReport {
        let paths: Vec<String> = args.get("path").and_then(Value::as_str).map(|p| vec![p.to_string()]).unwrap_or_default();
        crate::safety::preflight_files(crate::safety::OperationType::FileWrite, &paths)
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, String> {
        let path = args.get("path").and_then(Value::as_str).map(PathBuf::from).ok_or("missing required argument 'path'")?;
        let search = args.get("search").and_then(Value::as_str).ok_or("missing required argument 'search'")?.to_string();
        let replace = args.get("replace").and_then(Value::as_str).ok_or("missing required argument 'replace'")?.to_string();
        let fuzzy = args.get("fuzzy").and_then(Value::as_bool).unwrap_or(false);
        let similarity_threshold = args.get("similarity_threshold").and_then(Value::as_f64).unwrap_or(DEFAULT_SIMILARITY_THRESHOLD);

        match self.policy.validate_path(&path) {
            ValidationResult::Allowed => {}
            ValidationResult::NeedsApproval => return Err("path access requires user approval".into()),
            ValidationResult::Denied(reason) => return Err(format!("path denied: {reason}")),
        }
        self.policy.log_action(self.name(), args.clone(), PolicyRisk::Medium, "allowed", None);

        let edit = SingleEdit { search, replace, fuzzy, similarity_threshold };
        let path_clone = path.clone();
        let result = tokio::task::spawn_blocking(move || apply_transactional(&[(path_clone, edit)], true))
            .await
            .map_err(|e| format!("blocking task panicked: {e}"))?;

        match result {
            Ok(diffs) => {
                let diff = diffs.into_iter().next().ok_or("no diff produced")?;
                Ok(ToolResult::ok(format!("edited '{}'", path.display())).with_metadata(json!({
                    "path": path.display().to_string(),
                    "diff": diff.unified_diff,
                })))
            }
            Err(e) => Ok(ToolResult::err(e.clone()).with_metadata(json!({ "path": path.display().to_string(), "error": e }))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn exact_match_replaces() {
        let out = apply_single_edit("hello world", &SingleEdit { search: "world".into(), replace: "rust".into(), fuzzy: false, similarity_threshold: 0.85 }).unwrap();
        assert_eq!(out, "hello rust");
    }

    #[test]
    fn no_match_without_fuzzy_errors() {
        let r = apply_single_edit("hello world", &SingleEdit { search: "wrold".into(), replace: "x".into(), fuzzy: false, similarity_threshold: 0.85 });
        assert!(r.is_err());
    }

    #[test]
    fn fuzzy_match_tolerates_typo() {
        let out = apply_single_edit("hello wrold", &SingleEdit { search: "world".into(), replace: "rust".into(), fuzzy: true, similarity_threshold: 0.6 }).unwrap();
        assert_eq!(out, "hello rust");
    }

    #[test]
    fn fuzzy_below_threshold_errors() {
        let r = apply_single_edit("completely different text", &SingleEdit { search: "zzzzz".into(), replace: "x".into(), fuzzy: true, similarity_threshold: 0.95 });
        assert!(r.is_err());
    }

    #[test]
    fn levenshtein_identical_strings_is_zero() {
        assert_eq!(levenshtein("abc", "abc"), 0);
    }

    #[test]
    fn backup_then_restore_is_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, "original content").unwrap();

        let backup = write_backup(&file).unwrap();
        write_atomic(&file, "mutated content").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "mutated content");

        fs::copy(&backup, &file).unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "original content");
    }

    #[test]
    fn transactional_multi_edit_rolls_back_on_failure() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "alpha").unwrap();
        fs::write(&b, "beta").unwrap();

        let edits = vec![
            (a.clone(), SingleEdit { search: "alpha".into(), replace: "ALPHA".into(), fuzzy: false, similarity_threshold: 0.85 }),
            (b.clone(), SingleEdit { search: "nonexistent".into(), replace: "X".into(), fuzzy: false, similarity_threshold: 0.85 }),
        ];

        let result = apply_transactional(&edits, true);
        assert!(result.is_err());
        // `a` was edited, then rolled back because `b`'s edit failed.
        assert_eq!(fs::read_to_string(&a).unwrap(), "alpha");
        assert_eq!(fs::read_to_string(&b).unwrap(), "beta");
    }

    #[test]
    fn make_diff_produces_unified_diff_text() {
        let diff = make_diff(Path::new("f.txt"), "a\nb\n", "a\nc\n");
        assert!(diff.unified_diff.contains("-b"));
        assert!(diff.unified_diff.contains("+c"));
    }
}
