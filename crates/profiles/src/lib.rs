// ABOUTME: Read-only registry of site profiles keyed by host, loaded from an embedded JSON catalog.
// ABOUTME: Provides load_builtin_registry() and host/URL lookup with www. and parent-domain fallback.

//! Site profile registry.
//!
//! The engine takes a [`SiteProfile`] per extraction and keeps no registry of its own.
//! This crate owns the host-to-profile mapping:
//!
//! ```
//! use newsloom_engine::Extractor;
//! use newsloom_profiles::load_builtin_registry;
//! use url::Url;
//!
//! let registry = load_builtin_registry().unwrap();
//! let url = Url::parse("https://mp.weixin.qq.com/s/abc").unwrap();
//! let profile = registry.for_url(&url).unwrap();
//! let extractor = Extractor::builder().profile(profile).build();
//! # let _ = extractor;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use newsloom_engine::SiteProfile;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Embedded JSON containing the built-in site profiles.
const BUILTIN_PROFILES_JSON: &str = include_str!("../data/site_profiles.json");

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("malformed profile catalog: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("profile entry has an empty domain")]
    EmptyDomain,
}

/// One catalog entry: a profile and the hosts it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileEntry {
    pub domain: String,
    #[serde(default)]
    pub supported_domains: Vec<String>,
    #[serde(flatten)]
    pub profile: SiteProfile,
}

/// Host-keyed profiles. Every host of one entry shares the same `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    map: HashMap<String, Arc<SiteProfile>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON array of [`ProfileEntry`] values into a registry.
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let entries: Vec<ProfileEntry> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for entry in entries {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    /// Registers an entry for its primary and supported domains. Later entries replace
    /// earlier ones for the same host.
    pub fn register(&mut self, entry: ProfileEntry) -> Result<(), ProfileError> {
        let primary = entry.domain.trim().to_lowercase();
        if primary.is_empty() {
            return Err(ProfileError::EmptyDomain);
        }
        let profile = Arc::new(entry.profile);
        for host in entry.supported_domains.iter().map(|d| d.trim().to_lowercase()) {
            if !host.is_empty() {
                self.map.insert(host, Arc::clone(&profile));
            }
        }
        self.map.insert(primary, profile);
        Ok(())
    }

    /// Exact host lookup.
    pub fn get(&self, host: &str) -> Option<Arc<SiteProfile>> {
        self.map.get(&host.to_lowercase()).cloned()
    }

    /// Looks up the URL's host, then the host without `www.`, then each parent domain.
    pub fn for_url(&self, url: &Url) -> Option<Arc<SiteProfile>> {
        let host = url.host_str()?.to_lowercase();
        if let Some(profile) = self.get(&host) {
            return Some(profile);
        }
        if let Some(bare) = host.strip_prefix("www.") {
            if let Some(profile) = self.get(bare) {
                return Some(profile);
            }
        }

        let mut rest = host.as_str();
        while let Some((_, parent)) = rest.split_once('.') {
            // A bare TLD never identifies a site.
            if !parent.contains('.') {
                break;
            }
            if let Some(profile) = self.get(parent) {
                debug!(host = %host, matched = parent, "profile matched parent domain");
                return Some(profile);
            }
            rest = parent;
        }
        None
    }

    /// Number of registered host mappings.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Loads the built-in registry from the embedded catalog.
pub fn load_builtin_registry() -> Result<ProfileRegistry, ProfileError> {
    ProfileRegistry::from_json(BUILTIN_PROFILES_JSON)
}
