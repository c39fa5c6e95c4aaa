//! Location entries and their lazily fetched enrichment fields.

use std::sync::Arc;

use bytes::Bytes;
use deunicode::deunicode;
use indexmap::IndexMap;
use tokio::sync::OnceCell;

use atlasbot_extract::PageDoc;
use atlasbot_shared::{AtlasError, Result};

use crate::enrich::EnrichSession;

/// Normalize a display name into a registry key: ASCII folded, lowercased.
pub fn normalize_key(name: &str) -> String {
    deunicode(name).to_lowercase()
}

/// How much of an entity has been fetched so far.
///
/// States are ordered: `Bare < NameOnly < Full`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EnrichmentState {
    /// Only the ingested row data (key, link, attributes).
    Bare,
    /// Page document and display name fetched.
    NameOnly,
    /// Page, display name, and infobox image fetched.
    Full,
}

/// One place entry in the registry.
///
/// The ingested fields (`key`, `link`, `extra_info`) are immutable. The
/// remaining fields are populated lazily by [`LocationEntity::ensure`] and are
/// monotonic: written once on success, never cleared. Entities are shared as
/// `Arc<LocationEntity>` so concurrent enrichment converges on the same cells.
#[derive(Debug)]
pub struct LocationEntity {
    /// Normalized matching key. Not unique across the registry.
    pub key: String,
    /// Canonical article URL.
    pub link: String,
    /// Attributes carried from the source row, in column order.
    pub extra_info: IndexMap<String, String>,

    display_name: OnceCell<String>,
    page: OnceCell<Arc<PageDoc>>,
    image: OnceCell<Bytes>,
}

impl LocationEntity {
    pub fn new(key: String, link: String, extra_info: IndexMap<String, String>) -> Self {
        Self {
            key,
            link,
            extra_info,
            display_name: OnceCell::new(),
            page: OnceCell::new(),
            image: OnceCell::new(),
        }
    }

    /// The display name from the article heading, when fetched.
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.get().map(String::as_str)
    }

    /// The parsed article document, when fetched.
    pub fn page(&self) -> Option<&Arc<PageDoc>> {
        self.page.get()
    }

    /// The infobox image bytes, when fetched.
    pub fn image(&self) -> Option<&Bytes> {
        self.image.get()
    }

    /// Current enrichment state, derived from field presence.
    pub fn state(&self) -> EnrichmentState {
        if self.image.get().is_some() {
            EnrichmentState::Full
        } else if self.display_name.get().is_some() {
            EnrichmentState::NameOnly
        } else {
            EnrichmentState::Bare
        }
    }

    /// Fetch whatever fields are missing to reach `target`.
    ///
    /// Idempotent. Concurrent callers for the same link coalesce through the
    /// session's flight maps, so each link is fetched at most once per batch.
    /// On failure the affected fields stay unset and the next call retries;
    /// fields that were already set are never touched.
    pub async fn ensure(&self, target: EnrichmentState, session: &EnrichSession) -> Result<()> {
        if self.display_name.get().is_none() || self.page.get().is_none() {
            let doc = session.page_doc(&self.link).await?;
            let name = atlasbot_extract::title(&doc)?;
            let _ = self.page.set(doc);
            let _ = self.display_name.set(name);
        }

        if target == EnrichmentState::Full && self.image.get().is_none() {
            let doc = self
                .page
                .get()
                .ok_or_else(|| AtlasError::MissingEnrichment {
                    link: self.link.clone(),
                })?;
            if !doc.has_infobox {
                return Err(AtlasError::NoInfobox);
            }
            let image_url = doc.infobox_image.clone().ok_or(AtlasError::NoImage)?;
            let bytes = session.image(&image_url).await?;
            let _ = self.image.set(bytes);
        }

        Ok(())
    }
}

/// Equality over the ingested fields plus the display name. The page document
/// and image are derived from `link` and excluded.
impl PartialEq for LocationEntity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && self.link == other.link
            && self.extra_info == other.extra_info
            && self.display_name.get() == other.display_name.get()
    }
}

impl Eq for LocationEntity {}
