//! The place registry: entities, lazy enrichment, mention matching, source
//! ingestion, reply rendering, and per-channel continuation state.

pub mod continuation;
pub mod enrich;
pub mod entity;
pub mod ingest;
pub mod registry;
pub mod reply;
pub mod sources;

pub use continuation::{ChannelId, ContinuationStore};
pub use enrich::{EnrichSession, enrich_all};
pub use entity::{EnrichmentState, LocationEntity, normalize_key};
pub use ingest::{ColumnSelect, IngestOptions, ingest};
pub use registry::{LocationRegistry, NameLookup};
pub use reply::{ContentChunk, ReplyOptions};
pub use sources::{
    build_registry, from_city_index, from_city_tables, from_continent_table, from_country_table,
};
