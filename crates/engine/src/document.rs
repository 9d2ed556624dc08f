// ABOUTME: The engine's input document: markup text plus the base origin used to resolve relative URLs.
// ABOUTME: Handles byte decoding (Content-Type charset, else detection) and rejects text that is not markup.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::ExtractError;

static ELEMENT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z][A-Za-z0-9:-]*[\s/>]").unwrap());

/// Raw markup and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    markup: String,
    origin: Url,
    source_url: Option<Url>,
}

impl SourceDocument {
    /// `origin` is the scheme and host the markup was served from.
    pub fn new(markup: impl Into<String>, origin: Url) -> Self {
        Self {
            markup: markup.into(),
            origin,
            source_url: None,
        }
    }

    /// Records the full article URL. It becomes the resolution base and the identifier source.
    pub fn with_source_url(mut self, url: Url) -> Self {
        self.source_url = Some(url);
        self
    }

    /// Decodes a response body using the `Content-Type` charset when it names a known
    /// encoding, otherwise by detection.
    pub fn from_bytes(body: &[u8], content_type: Option<&str>, origin: Url) -> Self {
        Self::new(decode_body(body, content_type), origin)
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn source_url(&self) -> Option<&Url> {
        self.source_url.as_ref()
    }

    /// The URL relative references resolve against: the source URL when known, else the origin.
    pub fn base(&self) -> &Url {
        self.source_url.as_ref().unwrap_or(&self.origin)
    }

    /// Rejects text that cannot be treated as markup.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.markup.trim().is_empty() {
            return Err(ExtractError::malformed("document is empty"));
        }
        if self.markup.contains('\0') {
            return Err(ExtractError::malformed("document contains NUL bytes"));
        }
        if !ELEMENT_TAG.is_match(&self.markup) {
            return Err(ExtractError::malformed("document contains no element tags"));
        }
        Ok(())
    }
}

fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(encoding) = content_type
        .and_then(extract_charset)
        .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_bytes()))
    {
        let (decoded, _, _) = encoding.decode(body);
        return decoded.into_owned();
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from a Content-Type value.
fn extract_charset(content_type: &str) -> Option<String> {
    content_type.to_lowercase().split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|charset| charset.trim_matches(|c| c == '"' || c == '\'').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://news.example.com").unwrap()
    }

    #[test]
    fn base_prefers_source_url() {
        let doc = SourceDocument::new("<p>x</p>", origin());
        assert_eq!(doc.base().as_str(), "https://news.example.com/");

        let article = Url::parse("https://news.example.com/2024/story.html").unwrap();
        let doc = doc.with_source_url(article.clone());
        assert_eq!(doc.base(), &article);
        assert_eq!(doc.origin(), &origin());
    }

    #[test]
    fn rejects_non_markup() {
        for text in ["", "   \n", "just some words", "{\"json\": true}", "a < b > c"] {
            let err = SourceDocument::new(text, origin()).validate().unwrap_err();
            assert!(err.is_malformed_input(), "{text:?} should be malformed");
        }
        let err = SourceDocument::new("<p>ok\0</p>", origin()).validate().unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn accepts_fragments_and_documents() {
        assert!(SourceDocument::new("<p>hi</p>", origin()).validate().is_ok());
        assert!(SourceDocument::new("<!DOCTYPE html><html><body></body></html>", origin())
            .validate()
            .is_ok());
        assert!(SourceDocument::new("text then <br/>", origin()).validate().is_ok());
    }

    #[test]
    fn decodes_declared_charset() {
        let (bytes, _, _) = encoding_rs::GBK.encode("<p>港口新闻</p>");
        let doc = SourceDocument::from_bytes(&bytes, Some("text/html; charset=\"GBK\""), origin());
        assert_eq!(doc.markup(), "<p>港口新闻</p>");
    }

    #[test]
    fn detects_utf8_without_charset() {
        let doc = SourceDocument::from_bytes("<p>Café</p>".as_bytes(), None, origin());
        assert_eq!(doc.markup(), "<p>Café</p>");
    }

    #[test]
    fn charset_extraction() {
        assert_eq!(extract_charset("text/html; charset=UTF-8"), Some("utf-8".to_string()));
        assert_eq!(extract_charset("text/html"), None);
    }
}
