use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Linux NAME_MAX; every name we produce is ASCII so chars == bytes.
pub const MAX_FILENAME_LEN: usize = 255;

pub const DEFAULT_EXTENSION: &str = ".mp3";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("static whitespace pattern"));

/// Reduces `name` to `[A-Za-z0-9_.-]` with no path components.
///
/// - compatibility decomposition first, so `é` keeps its `e`; whatever is
///   still non-ASCII afterwards is dropped
/// - path separators become whitespace, and whitespace runs become a single `_`
/// - everything else outside the safe set is removed
/// - leading/trailing `.` and `_` are trimmed, so `..` can never survive
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Splits at the final dot; the extension keeps its dot. A dot in first
/// position does not start an extension.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => name.split_at(idx),
        _ => (name, ""),
    }
}

/// Turns a video title into a unique, storage-safe file name using the
/// local clock.
pub fn sanitize(raw_title: &str) -> String {
    sanitize_at(raw_title, Local::now().naive_local())
}

pub fn sanitize_at(raw_title: &str, now: NaiveDateTime) -> String {
    let secured = secure_filename(raw_title);
    let collapsed = WHITESPACE_RUN.replace_all(&secured, "_");

    let (base, ext) = split_extension(&collapsed);
    let ext = if ext.is_empty() { DEFAULT_EXTENSION } else { ext };

    let assembled = format!("{}_{}{}", base, now.format(TIMESTAMP_FORMAT), ext);
    assembled.chars().take(MAX_FILENAME_LEN).collect()
}
