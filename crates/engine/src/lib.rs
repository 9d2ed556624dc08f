// ABOUTME: Library entry point for the newsloom extraction engine.
// ABOUTME: Re-exports the public API: Extractor, ExtractOptions, SourceDocument, Article and the error types.

//! Newsloom engine - turns news markup, or data embedded in its scripts, into one
//! normalized [`Article`].
//!
//! Every article slot (title, author, publish time, content root, ...) is resolved by an
//! ordered list of CSS, XPath or attribute strategies. A [`SiteProfile`] supplies
//! per-site lists; the built-in generic lists cover the rest. Pages that ship their
//! article as a script-assigned object literal are read through the quasi-JSON
//! [`QuasiJsonParser`].
//!
//! # Example
//!
//! ```
//! use newsloom_engine::{ExtractError, Extractor, SourceDocument};
//! use url::Url;
//!
//! fn main() -> Result<(), ExtractError> {
//!     let markup = r#"<html><body><article>
//!         <h1>Harbour reopens</h1>
//!         <p>Ships returned on Monday.</p>
//!     </article></body></html>"#;
//!     let origin = Url::parse("https://news.example.com").unwrap();
//!     let doc = SourceDocument::new(markup, origin);
//!
//!     let article = Extractor::builder().build().extract(&doc)?;
//!     println!("{}", article.format_markdown());
//!     Ok(())
//! }
//! ```

pub mod compose;
pub mod document;
pub mod error;
pub mod extract;
pub mod linearize;
pub mod model;
pub mod normalize;
pub mod options;
pub mod recovery;
pub mod strategy;
pub mod time;

pub use crate::document::SourceDocument;
pub use crate::error::{ExtractError, RecoveryError, RecoveryStage, Slot, ValidationError};
pub use crate::extract::Extractor;
pub use crate::model::{Article, ArticleMetadata, ContentItem, ContentKind, ContentSequence};
pub use crate::options::{ExtractOptions, ExtractOptionsBuilder};
pub use crate::recovery::embedded::{EmbeddedDataHint, EmbeddedFields};
pub use crate::recovery::{QuasiJsonParser, RecoveredValue};
pub use crate::strategy::{ExpressionKind, ExtractionStrategy, SiteProfile, StrategyList};
pub use crate::time::normalize_time;
