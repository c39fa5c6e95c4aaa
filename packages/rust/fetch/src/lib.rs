//! HTTP fetch capability for AtlasBot.
//!
//! Library code never talks to reqwest directly: it depends on the [`Fetcher`]
//! trait, injected at the edges. [`HttpFetcher`] is the production
//! implementation; tests substitute in-memory fetchers.

mod client;
mod flight;

pub use client::{Fetcher, HttpFetcher, USER_AGENT};
pub use flight::FlightMap;
