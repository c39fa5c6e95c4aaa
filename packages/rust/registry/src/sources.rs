//! Live source ingestion: city, country, and continent registries built from
//! remote list pages and folded into one master registry.

use std::sync::Arc;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use tracing::{info, instrument};
use url::Url;

use atlasbot_extract::{SourceTable, first_table, source_tables, titled_anchors};
use atlasbot_fetch::Fetcher;
use atlasbot_shared::{AtlasError, Result, SourcesConfig};

use crate::ingest::{ColumnSelect, IngestOptions, ingest};
use crate::registry::LocationRegistry;

/// Anchor `title` identifying per-country city list pages on the index page.
/// The visible anchor text there is usually just the country name.
static CITY_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^List of towns and cities with 100,000 or more inhabitants/country")
        .expect("valid regex")
});

/// Scheme + host for a page URL, used to resolve relative links.
fn site_root(url: &str) -> Result<String> {
    let parsed = Url::parse(url).map_err(|e| AtlasError::parse(format!("{url}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| AtlasError::parse(format!("{url}: no host")))?;
    Ok(format!("{}://{host}", parsed.scheme()))
}

fn no_extra() -> IndexMap<String, String> {
    IndexMap::new()
}

// ---------------------------------------------------------------------------
// Cities
// ---------------------------------------------------------------------------

/// Build a registry from one page of per-country city tables.
///
/// Each table contributes its first column as cities, tagged with the table's
/// section heading as `Country`. Tables with more than two columns carry a
/// state/district column second; those become untagged entries of their own,
/// first occurrence per key only.
#[instrument(skip(fetcher))]
pub async fn from_city_tables(
    fetcher: &Arc<dyn Fetcher>,
    url: &str,
) -> Result<LocationRegistry> {
    let root = site_root(url)?;
    let html = fetcher.fetch_text(url).await?;
    let tables = source_tables(&html, &root);

    let mut registry = LocationRegistry::new();
    for table in &tables {
        let mut extra = no_extra();
        if let Some(country) = &table.section {
            extra.insert("Country".to_string(), country.clone());
        }

        let cities = ingest(
            &table.headers,
            &table.rows,
            &IngestOptions {
                column_select: ColumnSelect::Indices(vec![0]),
                extra_columns: extra,
                skip_duplicate_keys: false,
            },
        )?;
        registry = LocationRegistry::combine([registry, cities]);

        if table.headers.len() > 2 {
            let states = ingest(
                &table.headers,
                &table.rows,
                &IngestOptions {
                    column_select: ColumnSelect::Indices(vec![1]),
                    extra_columns: no_extra(),
                    skip_duplicate_keys: true,
                },
            )?;
            registry = LocationRegistry::combine([registry, states]);
        }
    }

    info!(url, entities = registry.len(), "city tables ingested");
    Ok(registry)
}

/// Follow the index page's per-country links and combine the resulting city
/// registries. Sub-pages are fetched concurrently; combining preserves the
/// index page's link order.
#[instrument(skip(fetcher))]
pub async fn from_city_index(
    fetcher: &Arc<dyn Fetcher>,
    url: &str,
) -> Result<LocationRegistry> {
    let root = site_root(url)?;
    let html = fetcher.fetch_text(url).await?;
    let links = city_list_links(&html, &root);
    info!(url, count = links.len(), "per-country city pages discovered");

    let mut handles = Vec::with_capacity(links.len());
    for link in links {
        let fetcher = Arc::clone(fetcher);
        handles.push(tokio::spawn(async move {
            from_city_tables(&fetcher, &link).await
        }));
    }

    let mut registries = Vec::with_capacity(handles.len());
    for handle in handles {
        let registry = handle
            .await
            .map_err(|e| AtlasError::Network(format!("city page task aborted: {e}")))??;
        registries.push(registry);
    }

    Ok(LocationRegistry::combine(registries))
}

/// Absolute URLs of anchors whose `title` marks a city list page.
fn city_list_links(html: &str, root: &str) -> Vec<String> {
    let mut links = Vec::new();
    for anchor in titled_anchors(html) {
        if !CITY_LIST_RE.is_match(&anchor.title) || anchor.href.starts_with('#') {
            continue;
        }
        let absolute = if anchor.href.starts_with("http") {
            anchor.href
        } else {
            format!("{root}{}", anchor.href)
        };
        if !links.contains(&absolute) {
            links.push(absolute);
        }
    }
    links
}

// ---------------------------------------------------------------------------
// Countries and continents
// ---------------------------------------------------------------------------

/// Header row and data rows of a page's first table.
///
/// Tables whose header cells are plain `th` rows arrive with headers already
/// split out; otherwise the first data row doubles as the header row. In both
/// cases the first remaining row is an aggregate ("World") and is dropped.
fn first_table_data(table: SourceTable) -> Result<(Vec<String>, Vec<Vec<atlasbot_extract::SourceCell>>)> {
    if !table.headers.is_empty() {
        let rows = table.rows.into_iter().skip(1).collect();
        return Ok((table.headers, rows));
    }

    let mut rows = table.rows.into_iter();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| AtlasError::parse("table has no rows"))?
        .into_iter()
        .map(|cell| cell.text)
        .collect();
    Ok((headers, rows.skip(1).collect()))
}

/// Registry of countries from the population list page.
#[instrument(skip(fetcher, columns))]
pub async fn from_country_table(
    fetcher: &Arc<dyn Fetcher>,
    url: &str,
    columns: &[String],
) -> Result<LocationRegistry> {
    let root = site_root(url)?;
    let html = fetcher.fetch_text(url).await?;
    let table = first_table(&html, &root)
        .ok_or_else(|| AtlasError::parse(format!("{url}: no table found")))?;
    let (headers, rows) = first_table_data(table)?;

    let registry = ingest(
        &headers,
        &rows,
        &IngestOptions {
            column_select: ColumnSelect::Names(columns.to_vec()),
            extra_columns: no_extra(),
            skip_duplicate_keys: false,
        },
    )?;
    info!(url, entities = registry.len(), "country table ingested");
    Ok(registry)
}

/// Registry of continents from the population list page.
#[instrument(skip(fetcher, columns))]
pub async fn from_continent_table(
    fetcher: &Arc<dyn Fetcher>,
    url: &str,
    columns: &[String],
) -> Result<LocationRegistry> {
    let root = site_root(url)?;
    let html = fetcher.fetch_text(url).await?;
    let table = first_table(&html, &root)
        .ok_or_else(|| AtlasError::parse(format!("{url}: no table found")))?;
    let (headers, rows) = first_table_data(table)?;

    let registry = ingest(
        &headers,
        &rows,
        &IngestOptions {
            column_select: ColumnSelect::Names(columns.to_vec()),
            extra_columns: no_extra(),
            skip_duplicate_keys: false,
        },
    )?;
    info!(url, entities = registry.len(), "continent table ingested");
    Ok(registry)
}

// ---------------------------------------------------------------------------
// Master registry
// ---------------------------------------------------------------------------

/// Fetch all configured source families concurrently and fold them into one
/// registry, cities first, then countries, then continents.
#[instrument(skip_all)]
pub async fn build_registry(
    fetcher: &Arc<dyn Fetcher>,
    config: &SourcesConfig,
) -> Result<LocationRegistry> {
    let (cities, countries, continents) = tokio::join!(
        from_city_index(fetcher, &config.city_index_url),
        from_country_table(fetcher, &config.countries_url, &config.country_columns),
        from_continent_table(fetcher, &config.continents_url, &config.continent_columns),
    );

    let combined = LocationRegistry::combine([cities?, countries?, continents?]);
    info!(
        keys = combined.key_count(),
        entities = combined.len(),
        "registry built"
    );
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use bytes::Bytes;

    struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    impl StaticFetcher {
        fn new() -> Self {
            Self {
                pages: HashMap::new(),
            }
        }

        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }

        fn shared(self) -> Arc<dyn Fetcher> {
            Arc::new(self)
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| AtlasError::Network(format!("{url}: HTTP 404 Not Found")))
        }

        async fn fetch_bytes(&self, _url: &str) -> Result<Bytes> {
            Err(AtlasError::Network("no image fixtures".into()))
        }
    }

    const INDEX_URL: &str = "https://en.wikipedia.org/wiki/Index";
    const FRANCE_URL: &str = "https://en.wikipedia.org/wiki/List_of_cities_in_France";

    // Index anchors show the country name; the list page is named by `title`.
    const INDEX_HTML: &str = r#"
        <div id="mw-content-text">
          <ul>
            <li><a href="/wiki/List_of_cities_in_France"
                   title="List of towns and cities with 100,000 or more inhabitants/country: F">France</a></li>
            <li><a href="/wiki/France" title="France">France</a></li>
          </ul>
        </div>"#;

    const FRANCE_HTML: &str = r#"
        <h2>France</h2>
        <table class="wikitable">
          <tr><th>City</th><th>Region</th><th>Population</th></tr>
          <tr><td><a href="/wiki/Paris">Paris</a></td>
              <td><a href="/wiki/%C3%8Ele-de-France">Île-de-France</a></td>
              <td>2,100,000</td></tr>
          <tr><td><a href="/wiki/Lyon">Lyon</a></td>
              <td><a href="/wiki/%C3%8Ele-de-France">Île-de-France</a></td>
              <td>520,000</td></tr>
        </table>"#;

    const COUNTRIES_URL: &str = "https://en.wikipedia.org/wiki/Countries";
    const COUNTRIES_HTML: &str = r#"
        <table>
          <tr><th>Location</th><th>Population</th></tr>
          <tr><td>World</td><td>8,000,000,000</td></tr>
          <tr><td><a href="/wiki/India">India</a></td><td>1,400,000,000</td></tr>
          <tr><td><a href="/wiki/China">China</a></td><td>1,400,000,000</td></tr>
        </table>"#;

    #[tokio::test]
    async fn city_tables_tag_cities_with_their_section_country() {
        let fetcher = StaticFetcher::new().page(FRANCE_URL, FRANCE_HTML).shared();
        let registry = from_city_tables(&fetcher, FRANCE_URL).await.unwrap();

        let paris = &registry.get("paris")[0];
        assert_eq!(paris.link, "https://en.wikipedia.org/wiki/Paris");
        assert_eq!(paris.extra_info.get("Country"), Some(&"France".to_string()));
    }

    #[tokio::test]
    async fn wide_city_tables_also_ingest_the_second_column() {
        let fetcher = StaticFetcher::new().page(FRANCE_URL, FRANCE_HTML).shared();
        let registry = from_city_tables(&fetcher, FRANCE_URL).await.unwrap();

        let region = registry.get("ile-de-france");
        assert_eq!(region.len(), 1);
        assert_eq!(
            region[0].link,
            "https://en.wikipedia.org/wiki/%C3%8Ele-de-France"
        );
        // State/district entries carry only their own column, no country tag.
        assert_eq!(
            region[0].extra_info.get("Region"),
            Some(&"Île-de-France".to_string())
        );
        assert!(!region[0].extra_info.contains_key("Country"));
    }

    #[tokio::test]
    async fn city_index_follows_anchors_by_title_not_text() {
        let fetcher = StaticFetcher::new()
            .page(INDEX_URL, INDEX_HTML)
            .page(FRANCE_URL, FRANCE_HTML)
            .shared();
        let registry = from_city_index(&fetcher, INDEX_URL).await.unwrap();

        // Both index anchors read "France"; only the one whose title names a
        // city list page is followed.
        assert_eq!(registry.get("paris").len(), 1);
        assert!(registry.get("france").is_empty());
    }

    #[tokio::test]
    async fn country_table_skips_the_world_row() {
        let fetcher = StaticFetcher::new()
            .page(COUNTRIES_URL, COUNTRIES_HTML)
            .shared();
        let columns = vec!["Location".to_string(), "Population".to_string()];
        let registry = from_country_table(&fetcher, COUNTRIES_URL, &columns)
            .await
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("world").is_empty());
        assert_eq!(
            registry.get("india")[0].extra_info.get("Population"),
            Some(&"1,400,000,000".to_string())
        );
    }

    #[tokio::test]
    async fn build_registry_combines_all_sources() {
        let config = SourcesConfig {
            city_index_url: INDEX_URL.to_string(),
            countries_url: COUNTRIES_URL.to_string(),
            continents_url: "https://en.wikipedia.org/wiki/Continents".to_string(),
            country_columns: vec!["Location".to_string(), "Population".to_string()],
            continent_columns: vec!["Continent".to_string()],
        };
        let continents_html = r#"
            <table>
              <tr><th>Continent</th><th>Population</th></tr>
              <tr><td>World</td><td>8,000,000,000</td></tr>
              <tr><td><a href="/wiki/Asia">Asia</a></td><td>4,700,000,000</td></tr>
            </table>"#;
        let fetcher = StaticFetcher::new()
            .page(INDEX_URL, INDEX_HTML)
            .page(FRANCE_URL, FRANCE_HTML)
            .page(COUNTRIES_URL, COUNTRIES_HTML)
            .page("https://en.wikipedia.org/wiki/Continents", continents_html)
            .shared();

        let registry = build_registry(&fetcher, &config).await.unwrap();
        assert!(!registry.get("paris").is_empty());
        assert!(!registry.get("india").is_empty());
        assert!(!registry.get("asia").is_empty());
    }

    #[tokio::test]
    async fn missing_source_page_fails_the_build() {
        let config = SourcesConfig::default();
        let fetcher = StaticFetcher::new().shared();
        assert!(build_registry(&fetcher, &config).await.is_err());
    }
}
