//! Input rules shared by handlers and repositories.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum chat message length, in Unicode scalar values.
pub const MESSAGE_MAX_CHARS: usize = 500;

/// Maximum zone slug length.
pub const SLUG_MAX_LEN: usize = 64;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid"));

/// Zone slugs are admin-chosen, human-readable ids such as `bano-norte`.
pub fn validate_slug(slug: &str) -> Result<(), CoreError> {
    if slug.is_empty() || slug.len() > SLUG_MAX_LEN {
        return Err(CoreError::Validation(format!(
            "zone id must be 1..={SLUG_MAX_LEN} characters"
        )));
    }
    if !SLUG_RE.is_match(slug) {
        return Err(CoreError::Validation(
            "zone id may only contain lowercase letters, digits and single hyphens".into(),
        ));
    }
    Ok(())
}

/// Normalize chat content: trimmed, non-empty, at most 500 codepoints.
pub fn normalize_message(content: &str) -> Result<String, CoreError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("message must not be empty".into()));
    }
    let chars = trimmed.chars().count();
    if chars > MESSAGE_MAX_CHARS {
        return Err(CoreError::Validation(format!(
            "message is {chars} characters long, the limit is {MESSAGE_MAX_CHARS}"
        )));
    }
    Ok(trimmed.to_string())
}
