//! Batch-scoped enrichment sessions.
//!
//! A session wraps the injected [`Fetcher`] with per-link flight maps for page
//! documents and image payloads. One session covers one batch of work (a
//! matching pass, a lookup, a registry build step); dropping it drops the
//! cache, so nothing is pinned between batches.

use std::sync::Arc;

use bytes::Bytes;
use tracing::warn;

use atlasbot_extract::PageDoc;
use atlasbot_fetch::{Fetcher, FlightMap};
use atlasbot_shared::{AtlasError, Result};

use crate::entity::{EnrichmentState, LocationEntity};

pub struct EnrichSession {
    fetcher: Arc<dyn Fetcher>,
    pages: FlightMap<Arc<PageDoc>>,
    images: FlightMap<Bytes>,
}

impl EnrichSession {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            pages: FlightMap::new(),
            images: FlightMap::new(),
        }
    }

    /// Fetch and parse the article at `url`, at most once per session.
    pub async fn page_doc(&self, url: &str) -> Result<Arc<PageDoc>> {
        self.pages
            .get_or_fetch(url, || async {
                let html = self.fetcher.fetch_text(url).await?;
                Ok(Arc::new(PageDoc::parse(&html, url)))
            })
            .await
    }

    /// Fetch raw image bytes at `url`, at most once per session.
    pub async fn image(&self, url: &str) -> Result<Bytes> {
        self.images
            .get_or_fetch(url, || self.fetcher.fetch_bytes(url))
            .await
    }
}

/// Enrich a batch of entities to `target`, fanning out one task per entity.
///
/// Returns one result per entity, in input order. Individual failures do not
/// abort the batch.
pub async fn enrich_all(
    session: &Arc<EnrichSession>,
    entities: &[Arc<LocationEntity>],
    target: EnrichmentState,
) -> Vec<Result<()>> {
    let mut handles = Vec::with_capacity(entities.len());
    for entity in entities {
        let entity = Arc::clone(entity);
        let session = Arc::clone(session);
        handles.push(tokio::spawn(async move {
            entity.ensure(target, &session).await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "enrichment task aborted");
                Err(AtlasError::Network(format!("enrichment task aborted: {e}")))
            }
        });
    }
    results
}
