// ABOUTME: Data model for extraction output: content items, ordered sequences, metadata and Article.
// ABOUTME: Article is built only by composition and exposes read-only accessors plus markdown rendering.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// The kind of a [`ContentItem`], used for identity and projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Text,
    Image,
    Video,
}

/// One typed piece of article content.
///
/// Two items are equal when they share kind and primary payload (the text, or the
/// media URL). Captions never affect identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        content: String,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
    Video {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl ContentItem {
    pub fn text(content: impl Into<String>) -> Self {
        ContentItem::Text {
            content: content.into(),
        }
    }

    pub fn image(url: impl Into<String>, caption: Option<String>) -> Self {
        ContentItem::Image {
            url: url.into(),
            caption: non_empty(caption),
        }
    }

    pub fn video(url: impl Into<String>, caption: Option<String>) -> Self {
        ContentItem::Video {
            url: url.into(),
            caption: non_empty(caption),
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            ContentItem::Text { .. } => ContentKind::Text,
            ContentItem::Image { .. } => ContentKind::Image,
            ContentItem::Video { .. } => ContentKind::Video,
        }
    }

    /// The primary payload: text content or media URL.
    pub fn payload(&self) -> &str {
        match self {
            ContentItem::Text { content } => content,
            ContentItem::Image { url, .. } | ContentItem::Video { url, .. } => url,
        }
    }

    pub fn caption(&self) -> Option<&str> {
        match self {
            ContentItem::Text { .. } => None,
            ContentItem::Image { caption, .. } | ContentItem::Video { caption, .. } => {
                caption.as_deref()
            }
        }
    }

    /// The (kind, payload) pair that defines equality.
    pub fn identity(&self) -> (ContentKind, &str) {
        (self.kind(), self.payload())
    }

    /// True for text items holding only whitespace and media items without a URL.
    pub fn is_blank(&self) -> bool {
        self.payload().trim().is_empty()
    }
}

impl PartialEq for ContentItem {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ContentItem {}

impl Hash for ContentItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Content items in document reading order.
///
/// Insertion order is the reading order; the type offers no way to reorder it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentSequence(Vec<ContentItem>);

impl ContentSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: ContentItem) {
        self.0.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ContentItem>) {
        self.0.extend(items);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentItem> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[ContentItem] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<ContentItem> {
        self.0
    }

    /// Drops text items that are empty or whitespace-only and media items without a URL.
    pub fn without_blanks(self) -> Self {
        self.0.into_iter().filter(|item| !item.is_blank()).collect()
    }

    /// URLs of all items of the given media kind, in sequence order.
    pub fn urls_of(&self, kind: ContentKind) -> Vec<String> {
        self.0
            .iter()
            .filter(|item| item.kind() == kind && kind != ContentKind::Text)
            .map(|item| item.payload().to_string())
            .collect()
    }
}

impl FromIterator<ContentItem> for ContentSequence {
    fn from_iter<I: IntoIterator<Item = ContentItem>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ContentSequence {
    type Item = ContentItem;
    type IntoIter = std::vec::IntoIter<ContentItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ContentSequence {
    type Item = &'a ContentItem;
    type IntoIter = std::slice::Iter<'a, ContentItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Descriptive metadata resolved alongside the content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleMetadata {
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    /// Canonical `YYYY-MM-DD HH:MM:SS`, absent when unparseable or not found.
    pub publish_time: Option<String>,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArticleMetadata {
    pub fn has_author(&self) -> bool {
        self.author_name.as_ref().is_some_and(|a| !a.is_empty())
    }

    pub fn has_publish_time(&self) -> bool {
        self.publish_time.is_some()
    }
}

/// The final, validated extraction record.
///
/// Only composition constructs an `Article`; afterwards it is read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Article {
    pub(crate) id: String,
    pub(crate) source_url: Option<String>,
    pub(crate) title: String,
    pub(crate) subtitle: Option<String>,
    pub(crate) metadata: ArticleMetadata,
    pub(crate) contents: ContentSequence,
    pub(crate) images: Vec<String>,
    pub(crate) videos: Vec<String>,
}

impl Article {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_url(&self) -> Option<&str> {
        self.source_url.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }

    pub fn metadata(&self) -> &ArticleMetadata {
        &self.metadata
    }

    pub fn contents(&self) -> &ContentSequence {
        &self.contents
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn videos(&self) -> &[String] {
        &self.videos
    }

    /// All text items joined by blank lines.
    pub fn plain_text(&self) -> String {
        self.contents
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Format the article as a markdown document.
    pub fn format_markdown(&self) -> String {
        let mut parts = Vec::new();

        parts.push(format!("# {}", self.title));
        if let Some(ref subtitle) = self.subtitle {
            parts.push(format!("> {}", subtitle));
        }

        let mut meta = Vec::new();
        if let Some(ref author) = self.metadata.author_name {
            meta.push(format!("By {}", author));
        }
        if let Some(ref time) = self.metadata.publish_time {
            meta.push(time.clone());
        }
        if let Some(ref source) = self.metadata.source {
            meta.push(source.clone());
        }
        if !meta.is_empty() {
            parts.push(meta.join(" | "));
        }
        if let Some(ref url) = self.source_url {
            parts.push(format!("Source: {}", url));
        }

        parts.push("---".to_string());

        for item in &self.contents {
            let line = match item {
                ContentItem::Text { content } => content.clone(),
                ContentItem::Image { url, caption } => {
                    format!("![{}]({})", caption.as_deref().unwrap_or("image"), url)
                }
                ContentItem::Video { url, caption } => {
                    format!("[{}]({})", caption.as_deref().unwrap_or("video"), url)
                }
            };
            parts.push(line);
        }

        if !self.images.is_empty() || !self.videos.is_empty() {
            parts.push("---".to_string());
            if !self.images.is_empty() {
                parts.push(format!("## Images ({})", self.images.len()));
                parts.push(numbered(&self.images));
            }
            if !self.videos.is_empty() {
                parts.push(format!("## Videos ({})", self.videos.len()));
                parts.push(numbered(&self.videos));
            }
        }

        parts.join("\n\n")
    }
}

fn numbered(urls: &[String]) -> String {
    urls.iter()
        .enumerate()
        .map(|(i, url)| format!("{}. {}", i + 1, url))
        .collect::<Vec<_>>()
        .join("\n")
}
