use super::{ResolveOptions, ResolvedLayout, resolve_with_options};
use crate::declaration::{Declaration, Fingerprint};
use copylens_profile::DecodeProfile;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolved layouts keyed by declaration fingerprint.
///
/// A cache is bound to one set of [`ResolveOptions`], so the fingerprint
/// alone identifies an entry. Layouts are handed out as [`Arc`]s and stay
/// valid after invalidation.
#[derive(Debug, Default)]
pub struct LayoutCache {
    options: ResolveOptions,
    entries: HashMap<Fingerprint, Arc<ResolvedLayout>>,
}

impl LayoutCache {
    /// Empty cache resolving with `options`.
    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            entries: HashMap::new(),
        }
    }

    /// Empty cache resolving with the repetition cap from `profile`.
    pub fn with_profile(profile: &DecodeProfile) -> Self {
        Self::new(ResolveOptions::from(profile))
    }

    /// Options every layout in this cache is resolved with.
    pub fn options(&self) -> ResolveOptions {
        self.options
    }

    /// Cached layout for `decl`, resolving it on first use.
    pub fn get_or_resolve(&mut self, decl: &Declaration) -> Arc<ResolvedLayout> {
        let fingerprint = decl.fingerprint();
        if let Some(layout) = self.entries.get(&fingerprint) {
            tracing::trace!(%fingerprint, "layout cache hit");
            return Arc::clone(layout);
        }
        tracing::debug!(%fingerprint, "layout cache miss");
        let layout = Arc::new(resolve_with_options(decl, &self.options));
        self.entries.insert(fingerprint, Arc::clone(&layout));
        layout
    }

    /// Cached layout for a fingerprint, without resolving.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<ResolvedLayout>> {
        self.entries.get(fingerprint).map(Arc::clone)
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&mut self, fingerprint: &Fingerprint) -> bool {
        self.entries.remove(fingerprint).is_some()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cached layouts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no layouts.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
