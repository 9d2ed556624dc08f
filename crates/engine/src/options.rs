// ABOUTME: Configuration for extraction calls: ExtractOptions and the fluent ExtractOptionsBuilder.
// ABOUTME: The builder produces an Extractor; options are read-only once built and safe to share.

use std::sync::Arc;

use crate::extract::Extractor;
use crate::recovery::embedded::EmbeddedDataHint;
use crate::recovery::DEFAULT_STRING_DECODER;
use crate::strategy::SiteProfile;

/// Options applied to every extraction made by one [`Extractor`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Per-slot strategy lists. `None` uses the generic lists alone.
    pub profile: Option<Arc<SiteProfile>>,
    /// Overrides any hint carried by the profile.
    pub embedded: Option<EmbeddedDataHint>,
    /// Continue with the generic list once a profile's list for a slot is exhausted.
    pub generic_fallback: bool,
    /// Title used when every title strategy fails. `None` makes that a validation error.
    pub title_placeholder: Option<String>,
    pub drop_tracking_pixels: bool,
    /// Identifiers treated as string decoders by embedded-data recovery.
    pub string_decoders: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            profile: None,
            embedded: None,
            generic_fallback: true,
            title_placeholder: None,
            drop_tracking_pixels: true,
            string_decoders: vec![DEFAULT_STRING_DECODER.to_string()],
        }
    }
}

impl ExtractOptions {
    /// The embedded-data hint in effect: explicit option first, then the profile's.
    pub fn embedded_hint(&self) -> Option<&EmbeddedDataHint> {
        self.embedded
            .as_ref()
            .or_else(|| self.profile.as_ref().and_then(|p| p.embedded.as_ref()))
    }
}

/// Builder for constructing Extractor instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptionsBuilder {
    opts: ExtractOptions,
}

impl ExtractOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a site profile. Accepts an owned profile or a shared `Arc`.
    pub fn profile(mut self, profile: impl Into<Arc<SiteProfile>>) -> Self {
        self.opts.profile = Some(profile.into());
        self
    }

    pub fn embedded(mut self, hint: EmbeddedDataHint) -> Self {
        self.opts.embedded = Some(hint);
        self
    }

    pub fn generic_fallback(mut self, enabled: bool) -> Self {
        self.opts.generic_fallback = enabled;
        self
    }

    pub fn title_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.opts.title_placeholder = Some(placeholder.into());
        self
    }

    pub fn drop_tracking_pixels(mut self, drop: bool) -> Self {
        self.opts.drop_tracking_pixels = drop;
        self
    }

    /// Replace the recognised string-decoder identifiers.
    pub fn string_decoders<I, S>(mut self, decoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts.string_decoders = decoders.into_iter().map(Into::into).collect();
        self
    }

    pub fn into_options(self) -> ExtractOptions {
        self.opts
    }

    /// Build the Extractor with the configured options.
    pub fn build(self) -> Extractor {
        Extractor::new(self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = ExtractOptions::default();
        assert!(opts.generic_fallback);
        assert!(opts.drop_tracking_pixels);
        assert!(opts.title_placeholder.is_none());
        assert_eq!(opts.string_decoders, vec!["JsDecode".to_string()]);
    }

    #[test]
    fn explicit_hint_overrides_profile_hint() {
        let mut profile = SiteProfile::new("wechat");
        profile.embedded = Some(EmbeddedDataHint::new("window.cgiDataNew"));

        let opts = ExtractOptionsBuilder::new().profile(profile.clone()).into_options();
        assert_eq!(opts.embedded_hint().map(|h| h.variable.as_str()), Some("window.cgiDataNew"));

        let opts = ExtractOptionsBuilder::new()
            .profile(profile)
            .embedded(EmbeddedDataHint::new("window.__DATA__"))
            .into_options();
        assert_eq!(opts.embedded_hint().map(|h| h.variable.as_str()), Some("window.__DATA__"));
    }

    #[test]
    fn shared_profile_is_not_copied() {
        let shared = Arc::new(SiteProfile::new("cnn"));
        let opts = ExtractOptionsBuilder::new().profile(Arc::clone(&shared)).into_options();
        assert!(Arc::ptr_eq(opts.profile.as_ref().unwrap(), &shared));
    }
}
