//! Structured extraction of data tables from article HTML.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::document::is_dropped_marker;

/// One table cell: its visible text plus the first article link inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCell {
    pub text: String,
    pub link: Option<String>,
}

/// A data table with its header row and the section heading it sits under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    /// Text of the nearest `h2` preceding the table, when one exists.
    pub section: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<SourceCell>>,
}

static WIKITABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.wikitable").expect("valid selector"));
static TABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static TH_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static TR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static A_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static H2_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").expect("valid selector"));

static ARTICLE_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/wiki/[^:]+$").expect("valid regex"));

/// Extract every `table.wikitable` from `html`, resolving cell links
/// against `site_root`.
pub fn source_tables(html: &str, site_root: &str) -> Vec<SourceTable> {
    let doc = Html::parse_document(html);
    let mut out = Vec::new();
    for table in doc.select(&WIKITABLE_SEL) {
        out.push(parse_table(table, site_root, preceding_section(table)));
    }
    out
}

/// Extract the first `table` element from `html`, if any.
pub fn first_table(html: &str, site_root: &str) -> Option<SourceTable> {
    let doc = Html::parse_document(html);
    let table = doc.select(&TABLE_SEL).next()?;
    Some(parse_table(table, site_root, preceding_section(table)))
}

fn parse_table(table: ElementRef<'_>, site_root: &str, section: Option<String>) -> SourceTable {
    let mut headers = Vec::new();
    let mut rows = Vec::new();

    for tr in table.select(&TR_SEL) {
        let cells: Vec<ElementRef<'_>> = tr
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| matches!(el.value().name(), "th" | "td"))
            .collect();
        if cells.is_empty() {
            continue;
        }
        let all_headers = cells.iter().all(|el| el.value().name() == "th");
        if all_headers && headers.is_empty() {
            headers = cells.iter().map(|el| cell_text(*el)).collect();
            continue;
        }
        rows.push(
            cells
                .iter()
                .map(|el| SourceCell {
                    text: cell_text(*el),
                    link: cell_link(*el, site_root),
                })
                .collect(),
        );
    }

    SourceTable {
        section,
        headers,
        rows,
    }
}

/// Visible cell text: descendant text joined on single spaces, with
/// footnote superscripts and edit markers dropped as in block extraction.
fn cell_text(el: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let fragment = text.trim();
        if fragment.is_empty() {
            continue;
        }
        if node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(is_dropped_marker)
        {
            continue;
        }
        parts.push(fragment);
    }
    parts.join(" ")
}

/// First article link inside the cell, made absolute.
fn cell_link(el: ElementRef<'_>, site_root: &str) -> Option<String> {
    el.select(&A_SEL)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| ARTICLE_HREF_RE.is_match(href))
        .map(|href| format!("{site_root}{href}"))
}

/// Walk prior siblings (and their descendants) for the closest `h2`.
fn preceding_section(table: ElementRef<'_>) -> Option<String> {
    let mut node = table.prev_sibling();
    while let Some(n) = node {
        if let Some(el) = ElementRef::wrap(n) {
            if el.value().name() == "h2" {
                return Some(cell_text(el));
            }
            if let Some(h2) = el.select(&H2_SEL).last() {
                return Some(cell_text(h2));
            }
        }
        node = n.prev_sibling();
    }
    // Headings may sit one level up when the table is wrapped in a container.
    let parent = table.parent().and_then(ElementRef::wrap)?;
    let mut node = parent.prev_sibling();
    while let Some(n) = node {
        if let Some(el) = ElementRef::wrap(n) {
            if el.value().name() == "h2" {
                return Some(cell_text(el));
            }
            if let Some(h2) = el.select(&H2_SEL).last() {
                return Some(cell_text(h2));
            }
        }
        node = n.prev_sibling();
    }
    None
}
