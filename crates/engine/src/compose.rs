// ABOUTME: Composition and validation: assembles the final Article and enforces its invariants.
// ABOUTME: Derives image/video lists from the content sequence and computes the stable identifier.

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ValidationError;
use crate::model::{Article, ArticleMetadata, ContentKind, ContentSequence};

/// Hex characters kept from the SHA-256 digest.
const ID_LEN: usize = 16;

/// Everything resolved for one document, before validation.
#[derive(Debug, Clone, Default)]
pub struct Draft {
    pub source_url: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub metadata: ArticleMetadata,
    pub contents: ContentSequence,
}

/// Validates `draft` and builds the [`Article`].
///
/// A missing title becomes `placeholder` when one is supplied, otherwise
/// [`ValidationError::EmptyTitle`]. The extractor reports an unmatched title slot before
/// composing, so here this only catches direct callers. An empty content sequence is always an error.
pub fn compose(draft: Draft, placeholder: Option<&str>) -> Result<Article, ValidationError> {
    let title = match draft.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        Some(title) => title,
        None => {
            let placeholder = placeholder
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or(ValidationError::EmptyTitle)?;
            debug!(placeholder, "title missing, substituting placeholder");
            placeholder.to_string()
        }
    };

    if draft.contents.is_empty() {
        return Err(ValidationError::EmptyContent);
    }

    let images = draft.contents.urls_of(ContentKind::Image);
    let videos = draft.contents.urls_of(ContentKind::Video);
    let id = stable_id(draft.source_url.as_deref(), &title, &draft.contents);

    Ok(Article {
        id,
        source_url: draft.source_url,
        title,
        subtitle: draft.subtitle.filter(|s| !s.trim().is_empty()),
        metadata: draft.metadata,
        contents: draft.contents,
        images,
        videos,
    })
}

/// SHA-256 of the source URL, or of the title and content identities when there is none.
pub fn stable_id(source_url: Option<&str>, title: &str, contents: &ContentSequence) -> String {
    let mut hasher = Sha256::new();
    match source_url {
        Some(url) => hasher.update(url.as_bytes()),
        None => {
            hasher.update(title.as_bytes());
            for item in contents {
                let (kind, payload) = item.identity();
                hasher.update([0u8]);
                hasher.update(format!("{kind:?}").as_bytes());
                hasher.update([0u8]);
                hasher.update(payload.as_bytes());
            }
        }
    }
    let digest = format!("{:x}", hasher.finalize());
    digest[..ID_LEN].to_string()
}
