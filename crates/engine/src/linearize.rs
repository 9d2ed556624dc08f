// ABOUTME: Document tree linearizer: walks a content root depth-first and emits typed content items.
// ABOUTME: Per-tag behavior is a closed NodeKind match covering containers, headings, lists, media and inline text.

//! Reading-order linearization.
//!
//! Rules, applied recursively from the content root (the root itself included; a root
//! whose tag has no rule of its own is walked as a container):
//!
//! - **Container** (`div`, `section`, `article`, `blockquote`, `figure`, ...): its own
//!   direct text is emitted first, then each child element is visited.
//! - **Heading** (`h1`-`h6`): full text as one item; children are not visited.
//! - **List** (`ul`, `ol`): direct text first, then one item per entry, prefixed `"N. "`
//!   (position among sibling entries) or `"• "`. Nested lists only contribute to the
//!   text of the entry that contains them.
//! - **ListItem** outside any list: bullet-prefixed.
//! - **Media** (`img`, `video`, `iframe`): one image or video item.
//! - **InlineText** (`p`, `span`, `a`, `strong`, ...): descendant media first, then the
//!   node's full text.
//! - Anything else, including `script` and `style`, is skipped with its subtree.
//!
//! Whitespace-only text is dropped and later duplicates are removed afterwards.

use ego_tree::NodeRef;
use scraper::{ElementRef, Node};
use tracing::trace;
use url::Url;

use crate::model::{ContentItem, ContentSequence};
use crate::normalize::{deduplicate, is_tracking_pixel, resolve_url};

const BULLET: &str = "• ";

/// Image source attributes in preference order. Lazy loaders keep the real URL in `data-*`.
const IMAGE_SOURCE_ATTRS: &[&str] = &["src", "data-src", "data-original"];

/// Closed classification of element tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Heading,
    List { ordered: bool },
    ListItem,
    Media(MediaKind),
    InlineText,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Frame,
}

impl NodeKind {
    /// Classifies a lowercase tag name.
    pub fn of(tag: &str) -> Self {
        match tag {
            "div" | "section" | "article" | "main" | "blockquote" | "figure" | "center"
            | "picture" | "body" | "table" | "thead" | "tbody" | "tr" | "td" | "th" | "dl"
            | "dt" | "dd" => NodeKind::Container,
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => NodeKind::Heading,
            "ul" => NodeKind::List { ordered: false },
            "ol" => NodeKind::List { ordered: true },
            "li" => NodeKind::ListItem,
            "img" => NodeKind::Media(MediaKind::Image),
            "video" => NodeKind::Media(MediaKind::Video),
            "iframe" => NodeKind::Media(MediaKind::Frame),
            "p" | "span" | "strong" | "em" | "b" | "i" | "u" | "a" | "figcaption" | "pre"
            | "code" | "font" | "mark" | "small" => NodeKind::InlineText,
            _ => NodeKind::Ignored,
        }
    }
}

/// Linearizes content roots, resolving media URLs against `base`.
#[derive(Debug, Clone)]
pub struct Linearizer<'u> {
    base: &'u Url,
    drop_tracking_pixels: bool,
}

impl<'u> Linearizer<'u> {
    pub fn new(base: &'u Url) -> Self {
        Self {
            base,
            drop_tracking_pixels: true,
        }
    }

    pub fn drop_tracking_pixels(mut self, drop: bool) -> Self {
        self.drop_tracking_pixels = drop;
        self
    }

    /// Produces the filtered, de-duplicated sequence for `root`.
    pub fn linearize(&self, root: ElementRef<'_>) -> ContentSequence {
        let mut raw = ContentSequence::new();
        match NodeKind::of(root.value().name()) {
            // The root was chosen by a strategy, so an unclassified tag is still walked.
            NodeKind::Ignored => self.visit_container(root, &mut raw),
            _ => self.visit(root, &mut raw),
        }
        let emitted = raw.len();
        let contents = deduplicate(raw.without_blanks());
        trace!(
            root = root.value().name(),
            emitted,
            kept = contents.len(),
            "linearized content root"
        );
        contents
    }

    fn visit(&self, el: ElementRef<'_>, out: &mut ContentSequence) {
        match NodeKind::of(el.value().name()) {
            NodeKind::Container => self.visit_container(el, out),
            NodeKind::Heading => push_text(out, text_content(el)),
            NodeKind::List { ordered } => {
                push_text(out, direct_text(el));
                for entry in list_entries(el) {
                    let Some(text) = text_content(entry) else {
                        continue;
                    };
                    let line = if ordered {
                        format!("{}. {}", sibling_position(entry), text)
                    } else {
                        format!("{BULLET}{text}")
                    };
                    out.push(ContentItem::text(line));
                }
            }
            NodeKind::ListItem => {
                if let Some(text) = text_content(el) {
                    out.push(ContentItem::text(format!("{BULLET}{text}")));
                }
            }
            NodeKind::Media(kind) => {
                if let Some(item) = self.media_item(el, kind) {
                    out.push(item);
                }
            }
            NodeKind::InlineText => {
                for nested in el.descendants().skip(1).filter_map(ElementRef::wrap) {
                    if let NodeKind::Media(kind) = NodeKind::of(nested.value().name()) {
                        if let Some(item) = self.media_item(nested, kind) {
                            out.push(item);
                        }
                    }
                }
                push_text(out, text_content(el));
            }
            NodeKind::Ignored => {}
        }
    }

    fn visit_container(&self, el: ElementRef<'_>, out: &mut ContentSequence) {
        push_text(out, direct_text(el));
        for child in el.children().filter_map(ElementRef::wrap) {
            self.visit(child, out);
        }
    }

    fn media_item(&self, el: ElementRef<'_>, kind: MediaKind) -> Option<ContentItem> {
        let attrs = el.value();
        let raw = match kind {
            MediaKind::Image => image_source(el),
            MediaKind::Video => non_blank(attrs.attr("src")).or_else(|| nested_source(el)),
            MediaKind::Frame => non_blank(attrs.attr("src")).or_else(|| non_blank(attrs.attr("data-src"))),
        }?;
        let url = resolve_url(raw, self.base)?;

        match kind {
            MediaKind::Image => {
                if self.drop_tracking_pixels && is_tracking_pixel(&url) {
                    trace!(url = %url, "dropping tracking pixel");
                    return None;
                }
                let caption = non_blank(attrs.attr("alt")).or_else(|| non_blank(attrs.attr("title")));
                Some(ContentItem::image(url, caption.map(str::to_string)))
            }
            MediaKind::Video | MediaKind::Frame => {
                let caption = non_blank(attrs.attr("title"));
                Some(ContentItem::video(url, caption.map(str::to_string)))
            }
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// First real image URL; a `data:` placeholder only when nothing else is present.
fn image_source<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    let candidates: Vec<&'a str> = IMAGE_SOURCE_ATTRS
        .iter()
        .filter_map(|name| non_blank(el.value().attr(name)))
        .collect();
    candidates
        .iter()
        .find(|c| !c.starts_with("data:"))
        .or_else(|| candidates.first())
        .copied()
}

fn nested_source<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "source")
        .find_map(|child| non_blank(child.value().attr("src")))
}

/// `li` elements whose nearest enclosing list is `list`.
fn list_entries<'a>(list: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    list.descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "li")
        .filter(|el| {
            el.ancestors()
                .find(|a| matches!(a.value(), Node::Element(e) if matches!(e.name(), "ul" | "ol")))
                .is_some_and(|a| a.id() == list.id())
        })
        .collect()
}

/// 1-based position among sibling `li` elements.
fn sibling_position(entry: ElementRef<'_>) -> usize {
    entry
        .prev_siblings()
        .filter(|s| matches!(s.value(), Node::Element(e) if e.name() == "li"))
        .count()
        + 1
}

fn push_text(out: &mut ContentSequence, text: Option<String>) {
    if let Some(text) = text {
        out.push(ContentItem::text(text));
    }
}

fn normalized(raw: &str) -> Option<String> {
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Text nodes that are immediate children of `el`.
fn direct_text(el: ElementRef<'_>) -> Option<String> {
    let raw: String = el
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(&**text),
            _ => None,
        })
        .collect();
    normalized(&raw)
}

/// All descendant text except script and style bodies, with block elements kept apart.
fn text_content(el: ElementRef<'_>) -> Option<String> {
    let mut raw = String::new();
    collect_text(*el, &mut raw);
    normalized(&raw)
}

fn collect_text(node: NodeRef<'_, Node>, out: &mut String) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if matches!(name, "script" | "style" | "noscript" | "template") {
                    continue;
                }
                // Block boundaries separate words; inline ones do not.
                let block = matches!(name, "p" | "br")
                    || matches!(
                        NodeKind::of(name),
                        NodeKind::Container | NodeKind::Heading | NodeKind::List { .. } | NodeKind::ListItem
                    );
                if block {
                    out.push(' ');
                }
                collect_text(child, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentKind;
    use pretty_assertions::assert_eq;
    use scraper::{Html, Selector};

    fn base() -> Url {
        Url::parse("https://news.example.com").unwrap()
    }

    fn run(fragment: &str) -> Vec<ContentItem> {
        let html = Html::parse_document(&format!("<html><body><div id=\"root\">{fragment}</div></body></html>"));
        let sel = Selector::parse("#root").unwrap();
        let root = html.select(&sel).next().unwrap();
        let base = base();
        Linearizer::new(&base).linearize(root).into_vec()
    }

    fn texts(items: &[ContentItem]) -> Vec<&str> {
        items.iter().map(|i| i.payload()).collect()
    }

    #[test]
    fn classifies_tags() {
        assert_eq!(NodeKind::of("section"), NodeKind::Container);
        assert_eq!(NodeKind::of("h3"), NodeKind::Heading);
        assert_eq!(NodeKind::of("ol"), NodeKind::List { ordered: true });
        assert_eq!(NodeKind::of("iframe"), NodeKind::Media(MediaKind::Frame));
        assert_eq!(NodeKind::of("strong"), NodeKind::InlineText);
        assert_eq!(NodeKind::of("script"), NodeKind::Ignored);
        assert_eq!(NodeKind::of("nav"), NodeKind::Ignored);
    }

    #[test]
    fn unclassified_root_is_walked_as_a_container() {
        let html = Html::parse_document(
            r#"<story-body>Lead <p>Body text</p><aside><p>Aside text</p></aside></story-body>"#,
        );
        let sel = Selector::parse("story-body").unwrap();
        let root = html.select(&sel).next().unwrap();
        let base = base();
        let items = Linearizer::new(&base).linearize(root);
        assert_eq!(texts(items.as_slice()), vec!["Lead", "Body text"]);
    }

    #[test]
    fn ordered_and_unordered_lists() {
        let items = run("<ol><li>Alpha</li><li>Beta</li></ol><ul><li>Alpha</li><li>Beta</li></ul>");
        assert_eq!(texts(&items), vec!["1. Alpha", "2. Beta", "• Alpha", "• Beta"]);
    }

    #[test]
    fn heading_paragraph_with_image_and_list() {
        let items = run(
            r#"<h1>Heading</h1>
               <p>Paragraph text <img src="/img/a.png" alt="Harbour"></p>
               <ul><li>item1</li><li>item2</li></ul>"#,
        );
        assert_eq!(
            items,
            vec![
                ContentItem::text("Heading"),
                ContentItem::image("https://news.example.com/img/a.png", None),
                ContentItem::text("Paragraph text"),
                ContentItem::text("• item1"),
                ContentItem::text("• item2"),
            ]
        );
        assert_eq!(items[1].caption(), Some("Harbour"));
    }

    #[test]
    fn container_direct_text_comes_before_children() {
        let items = run("<section>Lead in <p>Child</p> trailing</section>");
        assert_eq!(texts(&items), vec!["Lead in trailing", "Child"]);
    }

    #[test]
    fn list_direct_text_precedes_entries() {
        let items = run("<ol>Steps:<li>Open</li><li>Close</li></ol>");
        assert_eq!(texts(&items), vec!["Steps:", "1. Open", "2. Close"]);
    }

    #[test]
    fn nested_lists_fold_into_their_entry() {
        let items = run("<ol><li>One<ul><li>sub</li></ul></li><li>Two</li></ol>");
        assert_eq!(texts(&items), vec!["1. One sub", "2. Two"]);
    }

    #[test]
    fn orphan_list_items_get_bullets() {
        let items = run("<div><li>Loose</li></div>");
        assert_eq!(texts(&items), vec!["• Loose"]);
    }

    #[test]
    fn video_sources_and_frames() {
        let items = run(
            r#"<video><source src="/v/clip.mp4"></video>
               <video src="https://cdn.test/direct.mp4"><source src="/v/ignored.mp4"></video>
               <iframe data-src="https://v.qq.com/iframe/player.html?vid=x"></iframe>"#,
        );
        let kinds: Vec<_> = items.iter().map(|i| i.kind()).collect();
        assert_eq!(kinds, vec![ContentKind::Video; 3]);
        assert_eq!(
            texts(&items),
            vec![
                "https://news.example.com/v/clip.mp4",
                "https://cdn.test/direct.mp4",
                "https://v.qq.com/iframe/player.html?vid=x",
            ]
        );
    }

    #[test]
    fn lazy_images_prefer_real_sources() {
        let items = run(
            r#"<img src="data:image/svg+xml;base64,AAAA" data-src="//img.test/real.jpg">
               <img data-original="/lazy.jpg">"#,
        );
        assert_eq!(texts(&items), vec!["https://img.test/real.jpg", "https://news.example.com/lazy.jpg"]);
    }

    #[test]
    fn tracking_pixels_are_dropped_by_default() {
        let fragment = r#"<p>Story<img src="https://stats.test/beacon.gif?w=1&h=1"></p>"#;
        assert_eq!(texts(&run(fragment)), vec!["Story"]);

        let html = Html::parse_document(fragment);
        let sel = Selector::parse("p").unwrap();
        let base = base();
        let kept = Linearizer::new(&base)
            .drop_tracking_pixels(false)
            .linearize(html.select(&sel).next().unwrap());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn unknown_and_script_nodes_are_skipped() {
        let items = run(
            "<nav><p>Menu</p></nav><script>var x = 1;</script><p>Body<style>.a{}</style></p><form><p>Sign up</p></form>",
        );
        assert_eq!(texts(&items), vec!["Body"]);
    }

    #[test]
    fn duplicates_and_blanks_are_removed() {
        let items = run(
            r#"<p>   </p><img src="/a.png"><p>Same</p><figure><img src="/a.png" alt="again"></figure><p>Same</p>"#,
        );
        assert_eq!(texts(&items), vec!["https://news.example.com/a.png", "Same"]);
        assert_eq!(items[0].caption(), None);
    }

    #[test]
    fn linearization_is_idempotent() {
        let html = Html::parse_document(
            "<article><h2>T</h2><p>A <a href='/x'><img src='/i.png'>link</a></p><ol><li>x</li></ol></article>",
        );
        let sel = Selector::parse("article").unwrap();
        let root = html.select(&sel).next().unwrap();
        let base = base();
        let linearizer = Linearizer::new(&base);
        let first = linearizer.linearize(root);
        let second = linearizer.linearize(root);
        assert_eq!(first.clone().into_vec().len(), 4);
        assert_eq!(
            first.iter().map(|i| i.identity()).collect::<Vec<_>>(),
            second.iter().map(|i| i.identity()).collect::<Vec<_>>()
        );
    }
}
