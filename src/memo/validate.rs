//! Field-level validation for memo and tag payloads.
//!
//! Validators collect every violation instead of stopping at the first one,
//! so the API can report all of them in a single 400 response.

use serde::{Deserialize, Serialize};

use super::types::{MemoPatch, NewMemo, NewTag};
use super::{MemoError, MemoResult};

pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 10_000;
pub const CATEGORY_MAX_CHARS: usize = 50;
pub const TAG_NAME_MAX_CHARS: usize = 50;
pub const URL_MAX_CHARS: usize = 2048;
/// Upper bound on the serialized size of a memo's `metadata` object.
pub const MAX_METADATA_BYTES: usize = 16 * 1024;

/// A single violated constraint, reported to clients under `details`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    /// JSON path of the offending field (e.g. `"title"`, `"tags[2]"`).
    pub field: String,
    /// Machine-readable code: `too_short`, `too_long`, `too_large`,
    /// `invalid_format`, `invalid_type`, `empty_update`, `duplicate`.
    pub code: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &str, code: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            code: code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, field: &str, code: &str, message: impl Into<String>) {
        self.0.push(FieldViolation::new(field, code, message));
    }

    fn bounded(&mut self, field: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        if len < min {
            self.push(field, "too_short", format!("{field} is required"));
        } else if len > max {
            self.push(
                field,
                "too_long",
                format!("{field} must be at most {max} characters"),
            );
        }
    }

    fn finish(self) -> MemoResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(MemoError::Validation(self.0))
        }
    }
}

pub fn validate_new_memo(memo: &NewMemo) -> MemoResult<()> {
    let mut v = Violations::default();
    v.bounded("title", &memo.title, 1, TITLE_MAX_CHARS);
    v.bounded("content", &memo.content, 1, CONTENT_MAX_CHARS);
    check_optional_fields(
        &mut v,
        memo.category.as_deref(),
        memo.summary.as_deref(),
        memo.audio_url.as_deref(),
        memo.tags.as_deref(),
        memo.metadata.as_ref(),
    );
    v.finish()
}

/// Validates a patch with the create bounds. An empty patch is rejected.
pub fn validate_patch(patch: &MemoPatch) -> MemoResult<()> {
    if patch.is_empty() {
        return Err(MemoError::invalid(
            "body",
            "empty_update",
            "no fields to update",
        ));
    }

    let mut v = Violations::default();
    if let Some(title) = &patch.title {
        v.bounded("title", title, 1, TITLE_MAX_CHARS);
    }
    if let Some(content) = &patch.content {
        v.bounded("content", content, 1, CONTENT_MAX_CHARS);
    }
    check_optional_fields(
        &mut v,
        patch.category.as_deref(),
        patch.summary.as_deref(),
        patch.audio_url.as_deref(),
        patch.tags.as_deref(),
        patch.metadata.as_ref(),
    );
    v.finish()
}

pub fn validate_new_tag(tag: &NewTag) -> MemoResult<()> {
    let mut v = Violations::default();
    v.bounded("name", tag.name.trim(), 1, TAG_NAME_MAX_CHARS);
    if let Some(color) = &tag.color {
        if !is_hex_color(color) {
            v.push("color", "invalid_format", "color must be a #RRGGBB hex value");
        }
    }
    v.finish()
}

fn check_optional_fields(
    v: &mut Violations,
    category: Option<&str>,
    summary: Option<&str>,
    audio_url: Option<&str>,
    tags: Option<&[String]>,
    metadata: Option<&serde_json::Value>,
) {
    if let Some(category) = category {
        v.bounded("category", category, 0, CATEGORY_MAX_CHARS);
    }
    if let Some(summary) = summary {
        v.bounded("summary", summary, 0, CONTENT_MAX_CHARS);
    }
    if let Some(url) = audio_url {
        v.bounded("audioUrl", url, 0, URL_MAX_CHARS);
    }
    if let Some(tags) = tags {
        for (i, tag) in tags.iter().enumerate() {
            v.bounded(&format!("tags[{i}]"), tag.trim(), 1, TAG_NAME_MAX_CHARS);
        }
    }
    if let Some(metadata) = metadata {
        check_metadata(v, metadata);
    }
}

fn check_metadata(v: &mut Violations, metadata: &serde_json::Value) {
    if !metadata.is_object() {
        v.push("metadata", "invalid_type", "metadata must be a JSON object");
        return;
    }
    let size = metadata.to_string().len();
    if size > MAX_METADATA_BYTES {
        v.push(
            "metadata",
            "too_large",
            format!("metadata must serialize to at most {MAX_METADATA_BYTES} bytes"),
        );
    }
}

/// Trim tag labels and drop blanks and duplicates, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

fn is_hex_color(s: &str) -> bool {
    s.len() == 7
        && s.starts_with('#')
        && s[1..].chars().all(|c| c.is_ascii_hexdigit())
}
