// ABOUTME: Strategy cascade resolver: evaluates a StrategyList in order and returns the first non-empty result.
// ABOUTME: Dispatches on the strategy's declared kind; invalid expressions are skipped, never guessed at.

//! Cascade resolution.
//!
//! Key behaviors:
//! - Strategies are tried in order; the first one yielding a non-empty result wins and
//!   later strategies are never evaluated.
//! - Text results are whitespace-normalized; empty-after-trim counts as no match.
//! - An expression that fails to compile counts as no match for that strategy.
//! - Resolution is a pure read over the document.

use std::collections::HashSet;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};

use super::xpath::{XPath, XPathMatch};
use super::{ExtractionStrategy, StrategyList};
use crate::error::Slot;

/// A raw strategy result before projection.
#[derive(Debug, Clone)]
pub enum Match<'a> {
    Node(ElementRef<'a>),
    Value(String),
}

/// Collapses whitespace runs into single spaces and trims.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized text content of an element, `None` when blank.
pub fn element_text(el: &ElementRef<'_>) -> Option<String> {
    non_empty(normalize_whitespace(&el.text().collect::<String>()))
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Evaluates one strategy against the document. Results are in document order.
pub fn evaluate<'a>(html: &'a Html, strategy: &ExtractionStrategy) -> Vec<Match<'a>> {
    match strategy {
        ExtractionStrategy::Css { selector } => match Selector::parse(selector) {
            Ok(sel) => html.select(&sel).map(Match::Node).collect(),
            Err(err) => {
                debug!(selector = %selector, error = %err, "skipping invalid css selector");
                Vec::new()
            }
        },
        ExtractionStrategy::Attribute {
            selector,
            attribute,
        } => match Selector::parse(selector) {
            Ok(sel) => html
                .select(&sel)
                .filter_map(|el| el.value().attr(attribute))
                .map(|v| Match::Value(v.to_string()))
                .collect(),
            Err(err) => {
                debug!(selector = %selector, error = %err, "skipping invalid css selector");
                Vec::new()
            }
        },
        ExtractionStrategy::Xpath { expression } => match XPath::compile(expression) {
            Ok(xpath) => xpath
                .select(html)
                .into_iter()
                .map(|m| match m {
                    XPathMatch::Element(el) => Match::Node(el),
                    XPathMatch::Value(v) => Match::Value(v),
                })
                .collect(),
            Err(err) => {
                debug!(expression = %expression, error = %err, "skipping invalid xpath");
                Vec::new()
            }
        },
    }
}

/// Walks `list` in order and returns the first match that `project` accepts.
///
/// Within one strategy, matches are offered to `project` in document order; the first
/// accepted one wins.
pub fn resolve_with<'a, T>(
    html: &'a Html,
    slot: Slot,
    list: &StrategyList,
    mut project: impl FnMut(Match<'a>) -> Option<T>,
) -> Option<T> {
    for (index, strategy) in list.iter().enumerate() {
        for m in evaluate(html, strategy) {
            if let Some(value) = project(m) {
                debug!(%slot, index, expression = strategy.expression(), "slot resolved");
                return Some(value);
            }
        }
        trace!(%slot, index, expression = strategy.expression(), "strategy yielded nothing");
    }
    None
}

/// First non-empty text for the slot.
pub fn resolve_text(html: &Html, slot: Slot, list: &StrategyList) -> Option<String> {
    resolve_with(html, slot, list, text_of)
}

/// First matched element for the slot. Value-only matches are ignored.
pub fn resolve_node<'a>(html: &'a Html, slot: Slot, list: &StrategyList) -> Option<ElementRef<'a>> {
    resolve_with(html, slot, list, |m| match m {
        Match::Node(el) => Some(el),
        Match::Value(_) => None,
    })
}

/// Every non-empty text from the first strategy that yields any, de-duplicated in order.
pub fn resolve_all_text(html: &Html, slot: Slot, list: &StrategyList) -> Vec<String> {
    for (index, strategy) in list.iter().enumerate() {
        let mut seen = HashSet::new();
        let values: Vec<String> = evaluate(html, strategy)
            .into_iter()
            .filter_map(text_of)
            .filter(|v| seen.insert(v.clone()))
            .collect();
        if !values.is_empty() {
            debug!(%slot, index, count = values.len(), "slot resolved");
            return values;
        }
    }
    Vec::new()
}

/// Node ids matched by any strategy of the list, without short-circuiting.
///
/// Attribute strategies contribute the elements carrying the attribute.
pub fn select_all_nodes(html: &Html, list: &StrategyList) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for strategy in list {
        let elements: Vec<ElementRef<'_>> = match strategy {
            ExtractionStrategy::Attribute {
                selector,
                attribute,
            } => match Selector::parse(selector) {
                Ok(sel) => html
                    .select(&sel)
                    .filter(|el| el.value().attr(attribute).is_some())
                    .collect(),
                Err(_) => Vec::new(),
            },
            _ => evaluate(html, strategy)
                .into_iter()
                .filter_map(|m| match m {
                    Match::Node(el) => Some(el),
                    Match::Value(_) => None,
                })
                .collect(),
        };
        for el in elements {
            if seen.insert(el.id()) {
                ids.push(el.id());
            }
        }
    }
    ids
}

fn text_of(m: Match<'_>) -> Option<String> {
    match m {
        Match::Node(el) => element_text(&el),
        Match::Value(v) => non_empty(normalize_whitespace(&v)),
    }
}
