//! Building registry entries from tabular source rows.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use atlasbot_extract::SourceCell;
use atlasbot_shared::{AtlasError, Result};

use crate::entity::{LocationEntity, normalize_key};
use crate::registry::LocationRegistry;

/// Which columns of a source table to keep, in order. The first selected
/// column names the place and supplies its link.
#[derive(Debug, Clone)]
pub enum ColumnSelect {
    /// Match columns by header text.
    Names(Vec<String>),
    /// Select columns by position.
    Indices(Vec<usize>),
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub column_select: ColumnSelect,
    /// Fixed attributes appended to every produced entity.
    pub extra_columns: IndexMap<String, String>,
    /// Keep only the first row for each key instead of adding entities that
    /// share a key.
    pub skip_duplicate_keys: bool,
}

/// Build a registry from table rows.
///
/// Per row: the key comes from the normalized text of the first selected
/// cell and the link from that cell's article anchor; rows without an anchor
/// are skipped. Every selected cell, the name column included, becomes an
/// attribute keyed by its header text, followed by `extra_columns`. Insertion
/// merges on `(key, link)`.
pub fn ingest(
    headers: &[String],
    rows: &[Vec<SourceCell>],
    options: &IngestOptions,
) -> Result<LocationRegistry> {
    let indices = resolve_columns(headers, &options.column_select)?;
    let mut registry = LocationRegistry::new();
    let mut skipped = 0usize;

    'rows: for row in rows {
        let mut cells = Vec::with_capacity(indices.len());
        for &i in &indices {
            match row.get(i) {
                Some(cell) => cells.push((i, cell)),
                None => continue 'rows,
            }
        }
        let Some(&(_, name_cell)) = cells.first() else {
            continue;
        };

        let key = normalize_key(&name_cell.text);
        if key.is_empty() {
            continue;
        }
        let Some(link) = name_cell.link.clone() else {
            skipped += 1;
            continue;
        };
        if options.skip_duplicate_keys && !registry.get(&key).is_empty() {
            continue;
        }

        let mut extra_info = IndexMap::new();
        for &(i, cell) in &cells {
            let header = headers
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("Column {i}"));
            extra_info.insert(header, cell.text.clone());
        }
        for (k, v) in &options.extra_columns {
            extra_info.insert(k.clone(), v.clone());
        }

        registry.insert(Arc::new(LocationEntity::new(key, link, extra_info)));
    }

    debug!(
        entities = registry.len(),
        skipped_unlinked = skipped,
        "rows ingested"
    );
    Ok(registry)
}

fn resolve_columns(headers: &[String], select: &ColumnSelect) -> Result<Vec<usize>> {
    match select {
        ColumnSelect::Indices(indices) => Ok(indices.clone()),
        ColumnSelect::Names(names) => names
            .iter()
            .map(|name| {
                headers
                    .iter()
                    .position(|h| h == name)
                    .ok_or_else(|| AtlasError::parse(format!("column {name:?} not in headers")))
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(text: &str, link: Option<&str>) -> SourceCell {
        SourceCell {
            text: text.to_string(),
            link: link.map(String::from),
        }
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn options(select: ColumnSelect) -> IngestOptions {
        IngestOptions {
            column_select: select,
            extra_columns: IndexMap::new(),
            skip_duplicate_keys: false,
        }
    }

    #[test]
    fn ingests_named_columns_as_attributes() {
        let headers = headers(&["Location", "Population", "Flag"]);
        let rows = vec![vec![
            cell("France", Some("https://en.wikipedia.org/wiki/France")),
            cell("68,000,000", None),
            cell("tricolore", None),
        ]];
        let opts = options(ColumnSelect::Names(vec![
            "Location".into(),
            "Population".into(),
        ]));

        let registry = ingest(&headers, &rows, &opts).unwrap();
        assert_eq!(registry.len(), 1);
        let entity = &registry.get("france")[0];
        assert_eq!(entity.link, "https://en.wikipedia.org/wiki/France");
        // The name column is an attribute like any other selected column.
        assert_eq!(
            entity.extra_info.get("Location"),
            Some(&"France".to_string())
        );
        assert_eq!(
            entity.extra_info.get("Population"),
            Some(&"68,000,000".to_string())
        );
        assert!(!entity.extra_info.contains_key("Flag"));
    }

    #[test]
    fn unknown_column_name_is_an_error() {
        let headers = headers(&["Location"]);
        let opts = options(ColumnSelect::Names(vec!["Nope".into()]));
        assert!(ingest(&headers, &[], &opts).is_err());
    }

    #[test]
    fn rows_without_links_are_skipped() {
        let headers = headers(&["City"]);
        let rows = vec![
            vec![cell("Linked", Some("https://en.wikipedia.org/wiki/Linked"))],
            vec![cell("Unlinked", None)],
        ];
        let registry = ingest(&headers, &rows, &options(ColumnSelect::Indices(vec![0]))).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keys_are_normalized() {
        let headers = headers(&["City"]);
        let rows = vec![vec![cell(
            "São Paulo",
            Some("https://en.wikipedia.org/wiki/S%C3%A3o_Paulo"),
        )]];
        let registry = ingest(&headers, &rows, &options(ColumnSelect::Indices(vec![0]))).unwrap();
        assert_eq!(registry.get("sao paulo").len(), 1);
    }

    #[test]
    fn skip_duplicate_keys_keeps_the_first_row() {
        let headers = headers(&["City"]);
        let rows = vec![
            vec![cell("Springfield", Some("https://en.wikipedia.org/wiki/Springfield,_Illinois"))],
            vec![cell("Springfield", Some("https://en.wikipedia.org/wiki/Springfield,_Missouri"))],
        ];

        let mut opts = options(ColumnSelect::Indices(vec![0]));
        opts.skip_duplicate_keys = true;
        let registry = ingest(&headers, &rows, &opts).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("springfield")[0].link,
            "https://en.wikipedia.org/wiki/Springfield,_Illinois"
        );

        let registry = ingest(&headers, &rows, &options(ColumnSelect::Indices(vec![0]))).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn extra_columns_are_appended() {
        let headers = headers(&["City"]);
        let rows = vec![vec![cell("Lyon", Some("https://en.wikipedia.org/wiki/Lyon"))]];
        let mut opts = options(ColumnSelect::Indices(vec![0]));
        opts.extra_columns
            .insert("Country".to_string(), "France".to_string());

        let registry = ingest(&headers, &rows, &opts).unwrap();
        assert_eq!(
            registry.get("lyon")[0].extra_info.get("Country"),
            Some(&"France".to_string())
        );
    }

    #[test]
    fn short_rows_are_skipped() {
        let headers = headers(&["City", "Population"]);
        let rows = vec![vec![cell("Lone", Some("https://en.wikipedia.org/wiki/Lone"))]];
        let opts = options(ColumnSelect::Indices(vec![0, 1]));
        let registry = ingest(&headers, &rows, &opts).unwrap();
        assert!(registry.is_empty());
    }
}
