// ABOUTME: Quasi-JSON recovery: turns script-embedded object literals into a structured value.
// ABOUTME: Fixed pipeline of fast-path JSON, string-decoder unwrapping, numeral coercion, permissive decode.

//! Quasi-JSON recovery parser.
//!
//! Inline scripts often assign object literals that are almost, but not quite, JSON:
//!
//! ```text
//! { title: JsDecode('Harbour \x26 Docks'), create_time: '1709649000' * 1, tags: ['a',] }
//! ```
//!
//! [`QuasiJsonParser::parse`] repairs such text in four steps, each skipped when its
//! pattern is absent and each a no-op on its own output:
//!
//! 1. strict JSON parse (fast path, returns immediately on success)
//! 2. [`QuasiJsonParser::unwrap_string_calls`]: `JsDecode('...')` becomes a JSON string literal
//! 3. [`coerce_numerals`]: `'123' * 1` becomes `123`
//! 4. [`decode_permissive`]: JSON5 decode, tolerating unquoted keys, single quotes and trailing commas

pub mod embedded;

use std::borrow::Cow;

use aho_corasick::{AhoCorasick, MatchKind};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{RecoveryError, RecoveryStage};

/// A dynamically-typed tree recovered from embedded data.
pub type RecoveredValue = serde_json::Value;

/// The string-decoder identifier recognised by default.
pub const DEFAULT_STRING_DECODER: &str = "JsDecode";

/// Escape sequences understood inside a string-decoder argument, with their replacements.
const ESCAPE_TABLE: &[(&str, &str)] = &[
    (r"\x5c", "\\"),
    (r"\x0d", "\r"),
    (r"\x22", "\""),
    (r"\x26", "&"),
    (r"\x27", "'"),
    (r"\x3c", "<"),
    (r"\x3e", ">"),
    (r"\x0a", "\n"),
    (r"\\", "\\"),
    (r"\'", "'"),
    (r#"\""#, "\""),
    (r"\n", "\n"),
    (r"\r", "\r"),
    (r"\t", "\t"),
];

static ESCAPES: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostFirst)
        .build(ESCAPE_TABLE.iter().map(|(pattern, _)| pattern))
        .unwrap()
});

// What must follow a quoted numeral for it to be coerced: `* 1`, not `* 10` or `* 1.5`.
static COERCION_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\*\s*1").unwrap());

static NUMERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[\d.]+$").unwrap());

/// Decodes the fixed escape table in one left-to-right pass.
///
/// `\\x26` decodes to the four characters `\x26`, not to `\&`.
pub fn decode_escapes(s: &str) -> String {
    let replacements: Vec<&str> = ESCAPE_TABLE.iter().map(|(_, r)| *r).collect();
    ESCAPES.replace_all(s, &replacements)
}

/// Repairs and decodes script-embedded object literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuasiJsonParser {
    decoders: Vec<String>,
}

impl Default for QuasiJsonParser {
    fn default() -> Self {
        Self {
            decoders: vec![DEFAULT_STRING_DECODER.to_string()],
        }
    }
}

impl QuasiJsonParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `decoders` as the recognised string-decoder identifiers instead of the default.
    pub fn with_decoders<I, S>(decoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            decoders: decoders
                .into_iter()
                .map(Into::into)
                .filter(|d: &String| !d.is_empty())
                .collect(),
        }
    }

    pub fn decoders(&self) -> &[String] {
        &self.decoders
    }

    /// Runs the full pipeline over `raw`.
    pub fn parse(&self, raw: &str) -> Result<RecoveredValue, RecoveryError> {
        let raw = raw.trim();
        if let Ok(value) = serde_json::from_str::<RecoveredValue>(raw) {
            return Ok(value);
        }

        let unwrapped = self.unwrap_string_calls(raw)?;
        let coerced = coerce_numerals(&unwrapped)?;
        decode_permissive(&coerced)
    }

    /// Replaces every `decoder('...')` call with a JSON string literal of its decoded argument.
    ///
    /// Input without any recognised call is returned borrowed and unchanged.
    pub fn unwrap_string_calls<'s>(&self, input: &'s str) -> Result<Cow<'s, str>, RecoveryError> {
        let bytes = input.as_bytes();
        let mut out = String::new();
        let mut copied = 0;
        let mut cursor = 0;

        while let Some((start, name_len)) = self.next_call(input, cursor) {
            let mut i = skip_spaces(bytes, start + name_len + 1);
            let quote = match bytes.get(i) {
                Some(q @ (b'\'' | b'"')) => *q,
                // A call whose argument is not a string literal is left alone.
                _ => {
                    cursor = start + name_len;
                    continue;
                }
            };

            i += 1;
            let body_start = i;
            while i < bytes.len() && bytes[i] != quote {
                i += if bytes[i] == b'\\' { 2 } else { 1 };
            }
            if i >= bytes.len() {
                return Err(RecoveryError::new(
                    RecoveryStage::Unwrap,
                    &input[start..],
                    "unterminated string argument",
                ));
            }
            let body = &input[body_start..i];

            let close = skip_spaces(bytes, i + 1);
            if bytes.get(close) != Some(&b')') {
                return Err(RecoveryError::new(
                    RecoveryStage::Unwrap,
                    &input[start..],
                    "expected `)` after string argument",
                ));
            }

            let literal = serde_json::to_string(&decode_escapes(body))
                .map_err(|e| RecoveryError::new(RecoveryStage::Unwrap, body, e.to_string()))?;
            out.push_str(&input[copied..start]);
            out.push_str(&literal);
            copied = close + 1;
            cursor = copied;
        }

        if copied == 0 {
            return Ok(Cow::Borrowed(input));
        }
        out.push_str(&input[copied..]);
        Ok(Cow::Owned(out))
    }

    /// Earliest `decoder(` at or after `from` that is not the tail of a longer identifier.
    fn next_call(&self, input: &str, from: usize) -> Option<(usize, usize)> {
        self.decoders
            .iter()
            .filter_map(|name| {
                let mut search = from;
                while let Some(rel) = input.get(search..)?.find(name.as_str()) {
                    let start = search + rel;
                    let after = start + name.len();
                    let bounded = input[..start]
                        .chars()
                        .next_back()
                        .map_or(true, |c| !is_identifier_char(c));
                    if bounded && input.as_bytes().get(after) == Some(&b'(') {
                        return Some((start, name.len()));
                    }
                    search = after;
                }
                None
            })
            .min_by_key(|(start, _)| *start)
    }
}

/// Rewrites `'123' * 1` (either quote style) into the bare numeral `123`.
///
/// Only whole string literals are considered, so text inside another string is never
/// touched. Fails when the quoted text is not a number, e.g. `'1.2.3' * 1`.
pub fn coerce_numerals(input: &str) -> Result<Cow<'_, str>, RecoveryError> {
    let bytes = input.as_bytes();
    let mut out = String::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if !matches!(bytes[i], b'\'' | b'"') {
            i += 1;
            continue;
        }
        // Unterminated literals are left for the decode step to report.
        let Some(close) = closing_quote(bytes, i) else {
            break;
        };
        let body = &input[i + 1..close];
        let after = close + 1;

        let tail = NUMERAL
            .is_match(body)
            .then(|| COERCION_TAIL.find(&input[after..]))
            .flatten()
            .map(|m| after + m.end())
            .filter(|&end| {
                input[end..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_ascii_digit() && c != '.')
            });

        match tail {
            Some(end) => {
                let number = canonical_numeral(body).ok_or_else(|| {
                    RecoveryError::new(
                        RecoveryStage::Coerce,
                        &input[i..end],
                        format!("`{body}` is not a number"),
                    )
                })?;
                out.push_str(&input[copied..i]);
                out.push_str(&number);
                copied = end;
                i = end;
            }
            None => i = after,
        }
    }

    if copied == 0 {
        return Ok(Cow::Borrowed(input));
    }
    out.push_str(&input[copied..]);
    Ok(Cow::Owned(out))
}

/// Index of the quote closing the literal opened at `open`.
fn closing_quote(bytes: &[u8], open: usize) -> Option<usize> {
    let quote = bytes[open];
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Decodes with a JavaScript-object-literal-tolerant grammar.
pub fn decode_permissive(input: &str) -> Result<RecoveredValue, RecoveryError> {
    json5::from_str::<RecoveredValue>(input)
        .map_err(|err| RecoveryError::new(RecoveryStage::Decode, input, err.to_string()))
}

fn canonical_numeral(numeral: &str) -> Option<String> {
    if let Ok(n) = numeral.parse::<i64>() {
        return Some(n.to_string());
    }
    numeral
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n.to_string())
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
