// ABOUTME: Extraction strategy types: explicitly-kinded selector expressions grouped per semantic slot.
// ABOUTME: Also carries SiteProfile and the built-in generic fallback lists used when no profile matches.

//! Strategies and site profiles.
//!
//! An [`ExtractionStrategy`] always states its expression kind; the engine never
//! guesses whether a string is CSS or XPath. A [`StrategyList`] is an ordered list of
//! alternatives for one [`Slot`], and a [`SiteProfile`] bundles one list per slot.
//!
//! ```
//! use newsloom_engine::{ExtractionStrategy, StrategyList};
//!
//! let title: StrategyList = vec![
//!     ExtractionStrategy::xpath(r#"//h1[@id="activity-name"]/text()"#),
//!     ExtractionStrategy::css("h1.headline"),
//!     ExtractionStrategy::attr(r#"meta[property="og:title"]"#, "content"),
//! ]
//! .into();
//! assert_eq!(title.len(), 3);
//! ```

pub mod cascade;
pub mod xpath;

use serde::{Deserialize, Serialize};

use crate::error::Slot;
use crate::recovery::embedded::EmbeddedDataHint;

/// The expression language of a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    Css,
    XPath,
    Attribute,
}

/// One way of locating a value in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// CSS selector; yields the matched element.
    Css { selector: String },
    /// XPath expression; yields elements, text nodes or attribute values.
    Xpath { expression: String },
    /// CSS selector plus attribute name; yields the attribute value of the first match carrying it.
    Attribute { selector: String, attribute: String },
}

impl ExtractionStrategy {
    pub fn css(selector: impl Into<String>) -> Self {
        ExtractionStrategy::Css {
            selector: selector.into(),
        }
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        ExtractionStrategy::Xpath {
            expression: expression.into(),
        }
    }

    pub fn attr(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        ExtractionStrategy::Attribute {
            selector: selector.into(),
            attribute: attribute.into(),
        }
    }

    pub fn kind(&self) -> ExpressionKind {
        match self {
            ExtractionStrategy::Css { .. } => ExpressionKind::Css,
            ExtractionStrategy::Xpath { .. } => ExpressionKind::XPath,
            ExtractionStrategy::Attribute { .. } => ExpressionKind::Attribute,
        }
    }

    /// The raw expression text, for diagnostics.
    pub fn expression(&self) -> &str {
        match self {
            ExtractionStrategy::Css { selector } => selector,
            ExtractionStrategy::Xpath { expression } => expression,
            ExtractionStrategy::Attribute { selector, .. } => selector,
        }
    }
}

/// Ordered alternatives for one slot. First non-empty match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyList(Vec<ExtractionStrategy>);

impl StrategyList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, strategy: ExtractionStrategy) {
        self.0.push(strategy);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExtractionStrategy> {
        self.0.iter()
    }

    /// Returns a new list with `other` appended after this list's strategies.
    pub fn chained(&self, other: &StrategyList) -> StrategyList {
        self.0.iter().chain(other.0.iter()).cloned().collect()
    }
}

impl From<Vec<ExtractionStrategy>> for StrategyList {
    fn from(v: Vec<ExtractionStrategy>) -> Self {
        Self(v)
    }
}

impl FromIterator<ExtractionStrategy> for StrategyList {
    fn from_iter<I: IntoIterator<Item = ExtractionStrategy>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a StrategyList {
    type Item = &'a ExtractionStrategy;
    type IntoIter = std::slice::Iter<'a, ExtractionStrategy>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Per-slot strategy lists tailored to one source's markup.
///
/// Profiles are read-only to the engine. Share one across threads with `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub name: String,
    pub title: StrategyList,
    pub subtitle: StrategyList,
    pub author: StrategyList,
    pub author_url: StrategyList,
    pub date: StrategyList,
    pub source: StrategyList,
    pub tags: StrategyList,
    pub content_root: StrategyList,
    /// Nodes detached before any slot is resolved.
    pub removal: StrategyList,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedded: Option<EmbeddedDataHint>,
}

impl SiteProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn list(&self, slot: Slot) -> &StrategyList {
        match slot {
            Slot::Title => &self.title,
            Slot::Subtitle => &self.subtitle,
            Slot::Author => &self.author,
            Slot::AuthorUrl => &self.author_url,
            Slot::PublishTime => &self.date,
            Slot::Source => &self.source,
            Slot::Tags => &self.tags,
            Slot::ContentRoot => &self.content_root,
            Slot::Removal => &self.removal,
        }
    }
}

/// The built-in list for `slot`: semantic tags, common class names and `og:` metadata.
pub fn generic_list(slot: Slot) -> StrategyList {
    use ExtractionStrategy as S;

    let list = match slot {
        Slot::Title => vec![
            S::css("h1.article-title"),
            S::css("h1.post-title"),
            S::css("h1.entry-title"),
            S::css("h1.news-title"),
            S::css("article h1"),
            S::css("h1"),
            S::attr(r#"meta[property="og:title"]"#, "content"),
            S::attr(r#"meta[name="title"]"#, "content"),
            S::css("title"),
        ],
        Slot::Subtitle => vec![
            S::css(".subtitle"),
            S::css(".article-subtitle"),
            S::css(".dek"),
            S::css(".standfirst"),
        ],
        Slot::Author => vec![
            S::attr(r#"meta[name="author"]"#, "content"),
            S::attr(r#"meta[property="article:author"]"#, "content"),
            S::css(r#"[itemprop="author"]"#),
            S::css(".author-name"),
            S::css(".byline"),
            S::css(".author"),
            S::css(r#"a[rel="author"]"#),
        ],
        Slot::AuthorUrl => vec![
            S::attr(r#"a[rel="author"]"#, "href"),
            S::attr(r#"link[rel="author"]"#, "href"),
        ],
        Slot::PublishTime => vec![
            S::attr(r#"meta[property="article:published_time"]"#, "content"),
            S::attr(r#"meta[name="publishdate"]"#, "content"),
            S::attr(r#"meta[name="publish_date"]"#, "content"),
            S::attr(r#"meta[itemprop="datePublished"]"#, "content"),
            S::attr("time[datetime]", "datetime"),
            S::css(".publish-time"),
            S::css(".publish-date"),
            S::css(".post-date"),
            S::css(".date"),
            S::css("time"),
        ],
        Slot::Source => vec![
            S::attr(r#"meta[property="og:site_name"]"#, "content"),
            S::css(".source"),
            S::css(".article-source"),
        ],
        Slot::Tags => vec![
            S::attr(r#"meta[property="article:tag"]"#, "content"),
            S::css(".tags a"),
            S::css(r#"a[rel="tag"]"#),
        ],
        Slot::ContentRoot => vec![
            S::css("article"),
            S::css(r#"[itemprop="articleBody"]"#),
            S::css(".article-content"),
            S::css(".post-content"),
            S::css(".entry-content"),
            S::css(".news-content"),
            S::css(".content-body"),
            S::css("main"),
        ],
        Slot::Removal => vec![
            S::css("script"),
            S::css("style"),
            S::css("noscript"),
            S::css(".advertisement"),
            S::css(".ad-container"),
            S::css(".social-share"),
            S::css(".share-buttons"),
        ],
    };
    list.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strategy_kind_is_an_explicit_tag() {
        let json = r#"[
            {"kind": "css", "selector": "h1"},
            {"kind": "xpath", "expression": "//h1/text()"},
            {"kind": "attribute", "selector": "meta[name=author]", "attribute": "content"}
        ]"#;
        let list: StrategyList = serde_json::from_str(json).unwrap();
        let kinds: Vec<_> = list.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![ExpressionKind::Css, ExpressionKind::XPath, ExpressionKind::Attribute]
        );
    }

    #[test]
    fn strategy_without_kind_is_rejected() {
        let json = r#"[{"selector": "//h1"}]"#;
        assert!(serde_json::from_str::<StrategyList>(json).is_err());
    }

    #[test]
    fn profile_missing_slots_default_to_empty() {
        let profile: SiteProfile =
            serde_json::from_str(r#"{"name": "mini", "title": [{"kind": "css", "selector": "h2"}]}"#)
                .unwrap();
        assert_eq!(profile.list(Slot::Title).len(), 1);
        assert!(profile.list(Slot::ContentRoot).is_empty());
        assert!(profile.embedded.is_none());
    }

    #[test]
    fn chained_keeps_profile_order_first() {
        let profile: StrategyList = vec![ExtractionStrategy::css("h2.x")].into();
        let chained = profile.chained(&generic_list(Slot::Title));
        assert_eq!(chained.iter().next().map(|s| s.expression()), Some("h2.x"));
        assert_eq!(chained.len(), generic_list(Slot::Title).len() + 1);
    }

    #[test]
    fn every_slot_has_a_generic_list() {
        for slot in [
            Slot::Title,
            Slot::Subtitle,
            Slot::Author,
            Slot::AuthorUrl,
            Slot::PublishTime,
            Slot::Source,
            Slot::Tags,
            Slot::ContentRoot,
            Slot::Removal,
        ] {
            assert!(!generic_list(slot).is_empty(), "{slot} has no generic list");
        }
    }
}
