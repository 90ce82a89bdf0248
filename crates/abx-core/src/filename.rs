//! Filesystem-safe names for files derived from server-side display names.

/// Longest sanitized stem kept for enumeration envelope files.
const MAX_NAME_LEN: usize = 150;

/// Longest full CSV filename, extension included.
const MAX_CSV_LEN: usize = 160;

/// Reduces a display name to a filesystem-safe stem.
///
/// Runs of anything outside `[A-Za-z0-9._-]` collapse to a single `_`,
/// leading/trailing underscores are stripped and the result is capped at 150
/// characters. Names that sanitize to nothing fall back to `unnamed`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = out.trim_matches('_');
    let capped: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    if capped.is_empty() {
        "unnamed".to_string()
    } else {
        capped
    }
}

/// Builds the CSV output filename for one entity export: `<name>_<id>.csv`,
/// capped at 160 characters by shortening the name part. A name that
/// sanitizes away entirely yields `factory_<id>.csv`.
#[must_use]
pub fn csv_filename(name: &str, id: &str) -> String {
    let stem = sanitize_name(name);
    if stem == "unnamed" {
        return format!("factory_{id}.csv");
    }
    let suffix = format!("_{id}.csv");
    let budget = MAX_CSV_LEN.saturating_sub(suffix.len());
    let stem: String = stem.chars().take(budget).collect();
    if stem.is_empty() {
        format!("factory_{id}.csv")
    } else {
        format!("{stem}{suffix}")
    }
}
