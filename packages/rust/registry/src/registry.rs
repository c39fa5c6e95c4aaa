//! The keyed registry: matching, lookup, merging, random selection.

use std::sync::Arc;

use indexmap::IndexMap;
use rand::seq::SliceRandom;
use regex::Regex;
use tracing::{debug, instrument, warn};

use atlasbot_fetch::Fetcher;
use atlasbot_shared::{AtlasError, Result};

use crate::enrich::{self, EnrichSession};
use crate::entity::{EnrichmentState, LocationEntity, normalize_key};

/// Entities filed under one normalized key, with the precompiled mention
/// pattern for that key.
struct KeyEntry {
    pattern: Regex,
    entities: Vec<Arc<LocationEntity>>,
}

/// Outcome of a lookup by display name.
#[derive(Debug, Clone)]
pub enum NameLookup {
    /// Exactly one entry matched, or one candidate's name matched exactly.
    Found(Arc<LocationEntity>),
    /// Several candidates matched and none of their names matched exactly.
    /// The caller decides; no silent guess.
    Ambiguous(Vec<Arc<LocationEntity>>),
    /// Nothing matched.
    NotFound,
}

/// Insertion-ordered map of keys to their entities.
///
/// Keys are not unique per place; several entities (distinct `link`s) can share
/// one key. Within a key, `link` is unique: inserting an entity with an
/// existing `(key, link)` pair merges instead of duplicating.
#[derive(Default)]
pub struct LocationRegistry {
    keys: IndexMap<String, KeyEntry>,
}

/// Word-boundary pattern for a key: the key may be wrapped in punctuation or
/// underscores but must be delimited by whitespace on both sides.
fn key_pattern(key: &str) -> Regex {
    let escaped = regex::escape(key);
    Regex::new(&format!(r"\s[\W_]*{escaped}[\W_]*\s")).expect("escaped key pattern is valid")
}

/// Pad and normalize free-form text for matching.
fn normalize_text(text: &str) -> String {
    format!(" {} ", normalize_key(text))
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct keys.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Total number of entities across all keys.
    pub fn len(&self) -> usize {
        self.keys.values().map(|e| e.entities.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All entities in key-insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<LocationEntity>> {
        self.keys.values().flat_map(|e| e.entities.iter())
    }

    /// Entities filed under `key`, in insertion order.
    pub fn get(&self, key: &str) -> &[Arc<LocationEntity>] {
        self.keys
            .get(key)
            .map(|e| e.entities.as_slice())
            .unwrap_or(&[])
    }

    /// Insert an entity, merging on an existing `(key, link)` pair.
    ///
    /// On a merge the entity with more `extra_info` fields survives; ties keep
    /// the entity already present.
    pub fn insert(&mut self, entity: Arc<LocationEntity>) {
        let entry = self
            .keys
            .entry(entity.key.clone())
            .or_insert_with(|| KeyEntry {
                pattern: key_pattern(&entity.key),
                entities: Vec::new(),
            });

        match entry.entities.iter_mut().find(|e| e.link == entity.link) {
            None => entry.entities.push(entity),
            Some(existing) => {
                if entity.extra_info.len() > existing.extra_info.len() {
                    *existing = entity;
                }
            }
        }
    }

    /// Fold registries left to right, resolving `(key, link)` collisions with
    /// the insert merge rule. Earlier operands win ties.
    pub fn combine(registries: impl IntoIterator<Item = LocationRegistry>) -> LocationRegistry {
        let mut combined = LocationRegistry::new();
        for registry in registries {
            for entry in registry.keys.into_values() {
                for entity in entry.entities {
                    combined.insert(entity);
                }
            }
        }
        combined
    }

    /// Keys whose pattern matches the normalized text, with their entities.
    fn matching_entities(&self, text: &str) -> Vec<Arc<LocationEntity>> {
        let padded = normalize_text(text);
        let mut matched = Vec::new();
        for entry in self.keys.values() {
            if entry.pattern.is_match(&padded) {
                matched.extend(entry.entities.iter().cloned());
            }
        }
        matched
    }

    /// Find every entity mentioned in `text` and enrich the matches to
    /// [`EnrichmentState::Full`].
    ///
    /// Matching is case and punctuation insensitive. Entities whose enrichment
    /// fails stay in the result with their fields unset; the failure is logged
    /// and the next access retries.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn find_mentions(
        &self,
        text: &str,
        fetcher: Arc<dyn Fetcher>,
    ) -> Vec<Arc<LocationEntity>> {
        let matched = self.matching_entities(text);
        if matched.is_empty() {
            return matched;
        }
        debug!(count = matched.len(), "mentions matched");

        let session = Arc::new(EnrichSession::new(fetcher));
        let results = enrich::enrich_all(&session, &matched, EnrichmentState::Full).await;
        for (entity, result) in matched.iter().zip(&results) {
            if let Err(e) = result {
                warn!(link = %entity.link, error = %e, "enrichment failed");
            }
        }
        matched
    }

    /// Resolve a place by display name.
    ///
    /// `candidates` defaults to the word-boundary matches of `name`. All
    /// candidates are enriched to [`EnrichmentState::NameOnly`]; a fetch
    /// failure among them propagates. With several candidates the one whose
    /// display name equals `name` case-insensitively wins; otherwise the full
    /// candidate list comes back as [`NameLookup::Ambiguous`].
    pub async fn resolve_by_name(
        &self,
        name: &str,
        candidates: Option<Vec<Arc<LocationEntity>>>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<NameLookup> {
        let candidates = candidates.unwrap_or_else(|| self.matching_entities(name));
        if candidates.is_empty() {
            return Ok(NameLookup::NotFound);
        }

        let session = Arc::new(EnrichSession::new(fetcher));
        for result in enrich::enrich_all(&session, &candidates, EnrichmentState::NameOnly).await {
            result?;
        }

        if let [single] = candidates.as_slice() {
            return Ok(NameLookup::Found(Arc::clone(single)));
        }

        let wanted = name.to_lowercase();
        match candidates
            .iter()
            .find(|e| e.display_name().is_some_and(|n| n.to_lowercase() == wanted))
        {
            Some(exact) => Ok(NameLookup::Found(Arc::clone(exact))),
            None => Ok(NameLookup::Ambiguous(candidates)),
        }
    }

    /// A uniformly random entity, enriched to [`EnrichmentState::Full`].
    pub async fn random_entity(&self, fetcher: Arc<dyn Fetcher>) -> Result<Arc<LocationEntity>> {
        let all: Vec<&Arc<LocationEntity>> = self.entities().collect();
        let entity = all
            .choose(&mut rand::thread_rng())
            .map(|e| Arc::clone(e))
            .ok_or_else(|| AtlasError::not_found("any location"))?;

        let session = EnrichSession::new(fetcher);
        entity.ensure(EnrichmentState::Full, &session).await?;
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;

    struct StaticFetcher {
        pages: HashMap<String, String>,
        images: HashMap<String, Bytes>,
        text_calls: AtomicUsize,
    }

    impl StaticFetcher {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
                images: HashMap::new(),
                text_calls: AtomicUsize::new(0),
            }
        }

        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn image_payload(mut self, url: &str, bytes: &[u8]) -> Self {
            self.images
                .insert(url.to_string(), Bytes::copy_from_slice(bytes));
            self
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| AtlasError::Network(format!("{url}: HTTP 404 Not Found")))
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Bytes> {
            self.images
                .get(url)
                .cloned()
                .ok_or_else(|| AtlasError::Network(format!("{url}: HTTP 404 Not Found")))
        }
    }

    fn entity(key: &str, link: &str, extra: &[(&str, &str)]) -> Arc<LocationEntity> {
        let extra_info = extra
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Arc::new(LocationEntity::new(key.into(), link.into(), extra_info))
    }

    fn page_html(name: &str, image: &str) -> String {
        format!(
            r#"<h1>{name}</h1>
               <div id="mw-content-text">
                 <table class="infobox"><tr><td><img src="{image}"></td></tr></table>
                 <p>About {name}.</p>
               </div>"#
        )
    }

    fn santa_cruz_registry() -> LocationRegistry {
        let mut registry = LocationRegistry::new();
        registry.insert(entity(
            "santa cruz",
            "https://en.wikipedia.org/wiki/Santa_Cruz_de_Tenerife",
            &[("Country", "Spain")],
        ));
        registry.insert(entity(
            "santa cruz",
            "https://en.wikipedia.org/wiki/Santa_Cruz,_California",
            &[("Country", "United States")],
        ));
        registry
    }

    fn santa_cruz_fetcher() -> Arc<StaticFetcher> {
        Arc::new(
            StaticFetcher::new()
                .page(
                    "https://en.wikipedia.org/wiki/Santa_Cruz_de_Tenerife",
                    &page_html("Santa Cruz de Tenerife", "//img.example/tenerife.jpg"),
                )
                .page(
                    "https://en.wikipedia.org/wiki/Santa_Cruz,_California",
                    &page_html("Santa Cruz, California", "//img.example/california.jpg"),
                )
                .image_payload("https://img.example/tenerife.jpg", b"t")
                .image_payload("https://img.example/california.jpg", b"c"),
        )
    }

    #[test]
    fn insert_merges_on_key_and_link() {
        let mut registry = LocationRegistry::new();
        let link = "https://en.wikipedia.org/wiki/Paris";
        registry.insert(entity("paris", link, &[]));
        registry.insert(entity("paris", link, &[("Country", "France")]));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("paris")[0].extra_info.get("Country"),
            Some(&"France".to_string())
        );
    }

    #[test]
    fn insert_keeps_existing_on_tie() {
        let mut registry = LocationRegistry::new();
        let link = "https://en.wikipedia.org/wiki/Paris";
        registry.insert(entity("paris", link, &[("Population", "2M")]));
        registry.insert(entity("paris", link, &[("Country", "France")]));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("paris")[0].extra_info.contains_key("Population"));
    }

    #[test]
    fn shared_keys_keep_distinct_links() {
        let registry = santa_cruz_registry();
        assert_eq!(registry.key_count(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn combine_takes_union_with_richer_survivor() {
        let link = "https://en.wikipedia.org/wiki/Paris";
        let mut a = LocationRegistry::new();
        a.insert(entity("paris", link, &[("Country", "France")]));
        a.insert(entity("lyon", "https://en.wikipedia.org/wiki/Lyon", &[]));

        let mut b = LocationRegistry::new();
        b.insert(entity(
            "paris",
            link,
            &[("Country", "France"), ("Population", "2M")],
        ));
        b.insert(entity("nice", "https://en.wikipedia.org/wiki/Nice", &[]));

        let combined = LocationRegistry::combine([a, b]);
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.get("paris")[0].extra_info.len(), 2);
    }

    #[test]
    fn matching_is_case_and_punctuation_insensitive() {
        let registry = santa_cruz_registry();
        assert_eq!(registry.matching_entities("We flew to Santa Cruz,").len(), 2);
        assert_eq!(registry.matching_entities("santa cruz").len(), 2);
        assert_eq!(registry.matching_entities("(SANTA CRUZ)").len(), 2);
        assert_eq!(registry.matching_entities("_santa cruz_").len(), 2);
    }

    #[test]
    fn matching_requires_word_boundaries() {
        let mut registry = LocationRegistry::new();
        registry.insert(entity("nice", "https://en.wikipedia.org/wiki/Nice", &[]));
        assert!(registry.matching_entities("what a nicety").is_empty());
        assert_eq!(registry.matching_entities("Nice is nice.").len(), 1);
    }

    #[test]
    fn matching_folds_diacritics() {
        let mut registry = LocationRegistry::new();
        registry.insert(entity(
            "sao paulo",
            "https://en.wikipedia.org/wiki/S%C3%A3o_Paulo",
            &[],
        ));
        assert_eq!(registry.matching_entities("Carnival in São Paulo!").len(), 1);
    }

    #[tokio::test]
    async fn find_mentions_enriches_matches() {
        let registry = santa_cruz_registry();
        let mentions = registry
            .find_mentions("I visited Santa Cruz last summer", santa_cruz_fetcher())
            .await;

        assert_eq!(mentions.len(), 2);
        assert!(
            mentions
                .iter()
                .all(|e| e.state() == EnrichmentState::Full)
        );
    }

    #[tokio::test]
    async fn find_mentions_keeps_entities_whose_fetch_failed() {
        let registry = santa_cruz_registry();
        let fetcher = Arc::new(StaticFetcher::new().page(
            "https://en.wikipedia.org/wiki/Santa_Cruz_de_Tenerife",
            &page_html("Santa Cruz de Tenerife", "//img.example/tenerife.jpg"),
        ));

        let mentions = registry.find_mentions("go to santa cruz now", fetcher).await;
        assert_eq!(mentions.len(), 2);
        let bare = mentions
            .iter()
            .filter(|e| e.state() == EnrichmentState::Bare)
            .count();
        assert_eq!(bare, 1);
    }

    #[tokio::test]
    async fn resolve_by_name_picks_exact_display_name() {
        let registry = santa_cruz_registry();
        let lookup = registry
            .resolve_by_name("santa cruz, california", None, santa_cruz_fetcher())
            .await
            .unwrap();

        match lookup {
            NameLookup::Found(e) => {
                assert_eq!(e.display_name(), Some("Santa Cruz, California"));
                // Name resolution never fetches images.
                assert_eq!(e.state(), EnrichmentState::NameOnly);
            }
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_by_name_is_ambiguous_without_exact_match() {
        let registry = santa_cruz_registry();
        let lookup = registry
            .resolve_by_name("Santa Cruz", None, santa_cruz_fetcher())
            .await
            .unwrap();

        match lookup {
            NameLookup::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolve_by_name_not_found_for_unknown() {
        let registry = santa_cruz_registry();
        let lookup = registry
            .resolve_by_name("Atlantis", None, santa_cruz_fetcher())
            .await
            .unwrap();
        assert!(matches!(lookup, NameLookup::NotFound));
    }

    #[tokio::test]
    async fn resolve_by_name_propagates_fetch_failures() {
        let registry = santa_cruz_registry();
        let fetcher = Arc::new(StaticFetcher::new());
        let err = registry
            .resolve_by_name("Santa Cruz", None, fetcher)
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::Network(_)));
    }

    #[tokio::test]
    async fn random_entity_errors_on_empty_registry() {
        let registry = LocationRegistry::new();
        let err = registry
            .random_entity(santa_cruz_fetcher())
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::NotFound { .. }));
    }

    #[tokio::test]
    async fn random_entity_is_enriched() {
        let registry = santa_cruz_registry();
        let entity = registry.random_entity(santa_cruz_fetcher()).await.unwrap();
        assert_eq!(entity.state(), EnrichmentState::Full);
    }
}
