// ABOUTME: The Extractor entry point wiring removal, embedded recovery, slot cascades, linearization and composition.
// ABOUTME: One call processes one document with no shared mutable state, so an Extractor can be shared across threads.

use scraper::Html;
use tracing::{debug, instrument};

use crate::compose::{compose, Draft};
use crate::document::SourceDocument;
use crate::error::{ExtractError, Slot};
use crate::linearize::Linearizer;
use crate::model::{ArticleMetadata, ContentItem, ContentSequence};
use crate::normalize::{deduplicate, is_tracking_pixel, resolve_url};
use crate::options::{ExtractOptions, ExtractOptionsBuilder};
use crate::recovery::embedded::{extract_embedded, EmbeddedArticle};
use crate::recovery::QuasiJsonParser;
use crate::strategy::cascade::{
    element_text, normalize_whitespace, resolve_all_text, resolve_node, resolve_text, resolve_with,
    select_all_nodes, Match,
};
use crate::strategy::{generic_list, StrategyList};
use crate::time::normalize_time;
use crate::Article;

/// Attributes read before element text when resolving a publish time.
const DATE_ATTRS: &[&str] = &["datetime", "content"];

/// Turns documents into [`Article`]s.
///
/// ```
/// use newsloom_engine::{Extractor, SourceDocument};
/// use url::Url;
///
/// let html = r#"<html><body><article><h1>Harbour reopens</h1><p>Ships are back.</p></article></body></html>"#;
/// let doc = SourceDocument::new(html, Url::parse("https://news.example.com").unwrap());
/// let article = Extractor::builder().build().extract(&doc).unwrap();
/// assert_eq!(article.title(), "Harbour reopens");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    opts: ExtractOptions,
}

impl Extractor {
    /// Create a new builder for configuring the extractor.
    pub fn builder() -> ExtractOptionsBuilder {
        ExtractOptionsBuilder::new()
    }

    pub fn new(opts: ExtractOptions) -> Self {
        Self { opts }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.opts
    }

    /// Extracts one article.
    ///
    /// Only the title and content root are required: when nothing matches either one the
    /// result is [`ExtractError::NoMatch`], unless a title placeholder is configured. Every
    /// other slot degrades to an absent field.
    #[instrument(level = "debug", skip_all, fields(origin = %document.origin()))]
    pub fn extract(&self, document: &SourceDocument) -> Result<Article, ExtractError> {
        document.validate()?;
        let base = document.base();

        let mut html = Html::parse_document(document.markup());
        let removed = self.remove_nodes(&mut html);
        debug!(removed, "detached removal nodes");

        let embedded = match self.opts.embedded_hint() {
            Some(hint) => {
                let parser = QuasiJsonParser::with_decoders(self.opts.string_decoders.iter().cloned());
                extract_embedded(document.markup(), hint, &parser, base)?
            }
            None => None,
        };
        let EmbeddedArticle {
            title: embedded_title,
            author: embedded_author,
            publish_time: embedded_time,
            contents: embedded_contents,
        } = embedded.unwrap_or_default();

        let title = embedded_title.or_else(|| resolve_text(&html, Slot::Title, &self.list(Slot::Title)));
        let has_placeholder = self
            .opts
            .title_placeholder
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty());
        if title.is_none() && !has_placeholder {
            return Err(ExtractError::no_match(Slot::Title));
        }
        let subtitle = resolve_text(&html, Slot::Subtitle, &self.list(Slot::Subtitle));

        let metadata = ArticleMetadata {
            author_name: embedded_author
                .or_else(|| resolve_text(&html, Slot::Author, &self.list(Slot::Author))),
            author_url: resolve_text(&html, Slot::AuthorUrl, &self.list(Slot::AuthorUrl))
                .and_then(|raw| resolve_url(&raw, base)),
            publish_time: embedded_time.or_else(|| self.publish_time(&html)),
            source: resolve_text(&html, Slot::Source, &self.list(Slot::Source)),
            tags: resolve_all_text(&html, Slot::Tags, &self.list(Slot::Tags)),
        };
        if !metadata.has_author() && !metadata.has_publish_time() {
            debug!("neither author nor publish time found");
        }

        let root = resolve_node(&html, Slot::ContentRoot, &self.list(Slot::ContentRoot));
        let visible = root.map(|root| {
            Linearizer::new(base)
                .drop_tracking_pixels(self.opts.drop_tracking_pixels)
                .linearize(root)
        });
        let embedded_contents = self.finish_embedded(embedded_contents);

        let contents = match visible {
            Some(visible) if !visible.is_empty() || embedded_contents.is_empty() => visible,
            _ if !embedded_contents.is_empty() => {
                debug!(items = embedded_contents.len(), "using embedded content");
                embedded_contents
            }
            _ => return Err(ExtractError::no_match(Slot::ContentRoot)),
        };

        let draft = Draft {
            source_url: document.source_url().map(|u| u.to_string()),
            title,
            subtitle,
            metadata,
            contents,
        };
        let article = compose(draft, self.opts.title_placeholder.as_deref())?;
        debug!(id = article.id(), items = article.contents().len(), "article composed");
        Ok(article)
    }

    /// The strategy list for `slot`: the profile's, then the generic one when enabled.
    fn list(&self, slot: Slot) -> StrategyList {
        match &self.opts.profile {
            Some(profile) if self.opts.generic_fallback => profile.list(slot).chained(&generic_list(slot)),
            Some(profile) => profile.list(slot).clone(),
            None => generic_list(slot),
        }
    }

    /// Detaches every node matched by any removal strategy.
    fn remove_nodes(&self, html: &mut Html) -> usize {
        let ids = select_all_nodes(html, &self.list(Slot::Removal));
        let mut removed = 0;
        for id in ids {
            if let Some(mut node) = html.tree.get_mut(id) {
                node.detach();
                removed += 1;
            }
        }
        removed
    }

    /// First strategy whose match normalizes to a time; `datetime`/`content` beat element text.
    fn publish_time(&self, html: &Html) -> Option<String> {
        resolve_with(html, Slot::PublishTime, &self.list(Slot::PublishTime), |m| {
            let raw = match m {
                Match::Node(el) => DATE_ATTRS
                    .iter()
                    .filter_map(|attr| el.value().attr(attr))
                    .map(normalize_whitespace)
                    .find(|v| !v.is_empty())
                    .or_else(|| element_text(&el)),
                Match::Value(v) => Some(normalize_whitespace(&v)),
            }?;
            let normalized = normalize_time(&raw);
            if normalized.is_none() {
                debug!(raw = %raw, "unparseable publish time");
            }
            normalized
        })
    }

    fn finish_embedded(&self, contents: ContentSequence) -> ContentSequence {
        let drop_pixels = self.opts.drop_tracking_pixels;
        let kept: ContentSequence = contents
            .into_iter()
            .filter(|item| !(drop_pixels && matches!(item, ContentItem::Image { url, .. } if is_tracking_pixel(url))))
            .collect();
        deduplicate(kept.without_blanks())
    }
}
