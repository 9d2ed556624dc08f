// ABOUTME: URL normalization against the document origin and duplicate suppression for content sequences.
// ABOUTME: Also filters tracking pixels and spacer images out of media references.

use std::collections::HashSet;

use url::Url;

use crate::model::ContentSequence;

/// Patterns indicating tracking pixels or spacer images (case-insensitive check).
const TRACKING_PATTERNS: &[&str] = &[
    "tracking",
    "analytics",
    "beacon",
    "spacer.gif",
    "clear.gif",
    "blank.gif",
    "1x1.gif",
    "/pixel.",
    "data:image/gif;base64,r0lgodlhaqabai",
];

/// Resolves a possibly relative URL against `base`.
///
/// Protocol-relative (`//host/path`) and root-relative (`/path`) references are made
/// absolute; so are path-relative ones. Absolute URLs and `data:` URIs are returned
/// untouched. Returns `None` for empty input or when resolution fails.
pub fn resolve_url(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.starts_with("data:") || Url::parse(raw).is_ok() {
        return Some(raw.to_string());
    }

    base.join(raw).ok().map(|resolved| resolved.to_string())
}

/// Returns true for URLs that look like tracking pixels rather than article media.
pub fn is_tracking_pixel(url: &str) -> bool {
    let lower = url.to_lowercase();
    if TRACKING_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    let query = lower.split_once('?').map(|(_, q)| q).unwrap_or("");
    query
        .split('&')
        .any(|pair| matches!(pair, "width=1" | "height=1" | "w=1" | "h=1"))
}

/// Removes later duplicates by (kind, resolved content) identity.
///
/// The first occurrence is kept together with its caption; duplicates are dropped,
/// never merged.
pub fn deduplicate(contents: ContentSequence) -> ContentSequence {
    let mut seen = HashSet::new();
    contents
        .into_iter()
        .filter(|item| {
            let (kind, payload) = item.identity();
            seen.insert((kind, payload.to_string()))
        })
        .collect()
}
