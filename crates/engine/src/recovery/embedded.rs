// ABOUTME: Locates a named inline-script variable, recovers its literal, and maps it onto article fields.
// ABOUTME: Field names are configurable dotted paths; defaults follow the WeChat article script-data shape.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{QuasiJsonParser, RecoveredValue};
use crate::error::{RecoveryError, RecoveryStage};
use crate::model::{ContentItem, ContentKind, ContentSequence};
use crate::normalize::resolve_url;
use crate::time::{normalize_time, normalize_timestamp};

/// Marks that a document's primary content lives in a script variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedDataHint {
    /// Variable name as written in the script, e.g. `window.cgiDataNew`.
    pub variable: String,
    /// Older names for the same data, tried in order when `variable` is never assigned.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_variables: Vec<String>,
    /// A separately assigned array of image entries, read when the main data has no images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_variable: Option<String>,
    #[serde(default)]
    pub fields: EmbeddedFields,
}

impl EmbeddedDataHint {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            fallback_variables: Vec::new(),
            image_variable: None,
            fields: EmbeddedFields::default(),
        }
    }

    pub fn with_fallback(mut self, variable: impl Into<String>) -> Self {
        self.fallback_variables.push(variable.into());
        self
    }

    pub fn with_image_variable(mut self, variable: impl Into<String>) -> Self {
        self.image_variable = Some(variable.into());
        self
    }

    /// The primary variable followed by its fallbacks.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.variable.as_str()).chain(self.fallback_variables.iter().map(String::as_str))
    }

    pub fn with_fields(mut self, fields: EmbeddedFields) -> Self {
        self.fields = fields;
        self
    }
}

/// Dotted paths into the recovered value. For list fields the first non-empty path wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddedFields {
    pub title: Vec<String>,
    pub text: Vec<String>,
    pub author: Vec<String>,
    /// Date text, or a number of seconds since the epoch.
    pub time: Vec<String>,
    /// Seconds since the epoch, consulted when `time` yields nothing.
    pub timestamp: Vec<String>,
    /// Path to the image list.
    pub images: String,
    /// Path to the URL inside each image entry.
    pub image_url: String,
}

impl Default for EmbeddedFields {
    fn default() -> Self {
        let paths = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
        Self {
            title: paths(&["title"]),
            text: paths(&["desc", "content_noencode"]),
            author: paths(&["nick_name", "author"]),
            time: paths(&["create_time"]),
            timestamp: paths(&["ori_send_time"]),
            images: "picture_page_info_list".to_string(),
            image_url: "cdn_url".to_string(),
        }
    }
}

/// Article fields recovered from script data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbeddedArticle {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publish_time: Option<String>,
    /// Images first, then one text item per non-empty line.
    pub contents: ContentSequence,
}

/// Finds, recovers and maps the hinted variable.
///
/// The first of the hint's variables assigned in `markup` is used. Returns `Ok(None)` when
/// none is assigned and no separate image list is found either.
pub fn extract_embedded(
    markup: &str,
    hint: &EmbeddedDataHint,
    parser: &QuasiJsonParser,
    base: &Url,
) -> Result<Option<EmbeddedArticle>, RecoveryError> {
    let mut article = None;
    for variable in hint.variables() {
        let Some(literal) = locate(markup, variable)? else {
            continue;
        };
        let value = parser.parse(literal)?;
        let mapped = map_value(&value, &hint.fields, base);
        debug!(
            variable,
            items = mapped.contents.len(),
            has_title = mapped.title.is_some(),
            "embedded data recovered"
        );
        article = Some(mapped);
        break;
    }
    if article.is_none() {
        debug!(variable = %hint.variable, "embedded variable not present");
    }

    if let Some(image_variable) = &hint.image_variable {
        let has_images = article.as_ref().is_some_and(|a: &EmbeddedArticle| {
            a.contents.iter().any(|item| item.kind() == ContentKind::Image)
        });
        if !has_images {
            if let Some(literal) = locate(markup, image_variable)? {
                let images = map_images(&parser.parse(literal)?, &hint.fields.image_url, base);
                debug!(variable = %image_variable, images = images.len(), "embedded image list recovered");
                if !images.is_empty() {
                    let article = article.get_or_insert_with(EmbeddedArticle::default);
                    let mut contents = images;
                    contents.extend(std::mem::take(&mut article.contents));
                    article.contents = contents;
                }
            }
        }
    }

    Ok(article)
}

/// Returns the object or array literal assigned to `variable`.
///
/// Only `variable = ...` assignments count; `==` comparisons and longer identifiers
/// sharing the prefix are skipped.
pub fn locate<'m>(markup: &'m str, variable: &str) -> Result<Option<&'m str>, RecoveryError> {
    if variable.is_empty() {
        return Ok(None);
    }
    let bytes = markup.as_bytes();
    let mut search = 0;

    while let Some(rel) = markup.get(search..).and_then(|s| s.find(variable)) {
        let start = search + rel;
        let end = start + variable.len();
        search = end;

        let bounded_before = markup[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_identifier_char(c));
        let bounded_after = markup[end..].chars().next().map_or(true, |c| !is_identifier_char(c));
        if !bounded_before || !bounded_after {
            continue;
        }

        let eq = skip_spaces(bytes, end);
        if bytes.get(eq) != Some(&b'=') || bytes.get(eq + 1) == Some(&b'=') {
            continue;
        }

        let open = skip_spaces(bytes, eq + 1);
        return match bytes.get(open) {
            Some(b'{' | b'[') => match balanced_end(bytes, open) {
                Some(close) => Ok(Some(&markup[open..=close])),
                None => Err(RecoveryError::new(
                    RecoveryStage::Locate,
                    &markup[start..],
                    "unbalanced literal",
                )),
            },
            _ => Err(RecoveryError::new(
                RecoveryStage::Locate,
                &markup[start..],
                "assigned value is not an object or array literal",
            )),
        };
    }

    Ok(None)
}

/// Index of the bracket closing the one at `open`, skipping quoted strings.
fn balanced_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

fn map_value(value: &RecoveredValue, fields: &EmbeddedFields, base: &Url) -> EmbeddedArticle {
    let title = first_string(value, &fields.title);
    let author = first_string(value, &fields.author);

    let publish_time = fields
        .time
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(time_of)
        .or_else(|| {
            fields
                .timestamp
                .iter()
                .filter_map(|path| lookup(value, path))
                .find_map(|v| seconds_of(v).and_then(normalize_timestamp))
        });

    let mut contents = lookup(value, &fields.images)
        .map(|list| map_images(list, &fields.image_url, base))
        .unwrap_or_default();

    // Picture posts sometimes carry no body text; the title stands in for it.
    if let Some(text) = first_string(value, &fields.text).or_else(|| title.clone()) {
        contents.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ContentItem::text),
        );
    }

    EmbeddedArticle {
        title,
        author,
        publish_time,
        contents,
    }
}

/// One image item per array entry whose `image_url` path holds a URL.
fn map_images(list: &RecoveredValue, image_url: &str, base: &Url) -> ContentSequence {
    list.as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| lookup(entry, image_url).and_then(scalar_string))
        .filter_map(|raw| resolve_url(&raw.replace("&amp;", "&"), base))
        .map(|url| ContentItem::image(url, None))
        .collect()
}

/// Follows a dotted path through objects; numeric segments index arrays.
pub fn lookup<'v>(value: &'v RecoveredValue, path: &str) -> Option<&'v RecoveredValue> {
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(value, |current, segment| match current {
        RecoveredValue::Object(map) => map.get(segment),
        RecoveredValue::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn first_string(value: &RecoveredValue, paths: &[String]) -> Option<String> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find_map(scalar_string)
}

fn scalar_string(value: &RecoveredValue) -> Option<String> {
    let s = match value {
        RecoveredValue::String(s) => s.trim().to_string(),
        RecoveredValue::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn seconds_of(value: &RecoveredValue) -> Option<i64> {
    match value {
        RecoveredValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        RecoveredValue::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn time_of(value: &RecoveredValue) -> Option<String> {
    match seconds_of(value) {
        Some(seconds) => normalize_timestamp(seconds),
        None => value.as_str().and_then(normalize_time),
    }
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
