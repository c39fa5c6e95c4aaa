//! Page document model.
//!
//! Raw markup is parsed once into a small tagged tree — inlines are `Text` or
//! `Link`, blocks are `Paragraph`, `Heading`, or `List` — so later passes and
//! renderers traverse owned data instead of re-walking library node types.
//! Footnote superscripts and edit-section markers are dropped here, and blocks
//! nested inside tables are never collected.

use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

fn selector(s: &str) -> Selector {
    Selector::parse(s).expect("valid selector")
}

static BLOCK_SEL: LazyLock<Selector> = LazyLock::new(|| selector("p, h2, h3, ul, ol"));
static H1_SEL: LazyLock<Selector> = LazyLock::new(|| selector("h1"));
static LI_SEL: LazyLock<Selector> = LazyLock::new(|| selector("li"));
static CONTENT_SEL: LazyLock<Selector> = LazyLock::new(|| selector("#mw-content-text"));
static BODY_SEL: LazyLock<Selector> = LazyLock::new(|| selector("body"));
static INFOBOX_SEL: LazyLock<Selector> = LazyLock::new(|| selector("table.infobox"));
static IMG_SEL: LazyLock<Selector> = LazyLock::new(|| selector("img"));
static TITLED_A_SEL: LazyLock<Selector> = LazyLock::new(|| selector("a[title][href]"));

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// A text fragment or a hyperlinked fragment inside a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    Text(String),
    Link {
        text: String,
        href: String,
        /// Anchor marked as pointing at the page itself.
        self_link: bool,
    },
}

/// A structural block inside the content region.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Heading { level: u8, inlines: Vec<Inline> },
    List { ordered: bool, items: Vec<Vec<Inline>> },
}

/// Parsed form of one remote page: the opaque document stored on an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct PageDoc {
    /// Canonical URL the page was fetched from.
    pub url: String,
    /// Inlines of the first top-level heading, if the page has one.
    pub heading: Option<Vec<Inline>>,
    /// Content-region blocks in document order, table-nested blocks excluded.
    pub blocks: Vec<Block>,
    /// Whether the page carries an infobox table at all.
    pub has_infobox: bool,
    /// Absolute URL of the infobox's first image.
    pub infobox_image: Option<String>,
}

impl PageDoc {
    /// Parse raw page markup fetched from `url`.
    pub fn parse(html: &str, url: &str) -> Self {
        let doc = Html::parse_document(html);

        let heading = doc
            .select(&H1_SEL)
            .next()
            .map(|h1| collect_inlines(h1, None));

        // The encyclopedia's main content container, or the whole body for
        // plainer pages.
        let region = doc
            .select(&CONTENT_SEL)
            .next()
            .or_else(|| doc.select(&BODY_SEL).next());

        let mut blocks = Vec::new();
        if let Some(region) = region {
            for el in region.select(&BLOCK_SEL) {
                if has_ancestor(el, &["table"]) {
                    continue;
                }
                match el.value().name() {
                    "p" => blocks.push(Block::Paragraph(collect_inlines(el, None))),
                    "h2" | "h3" => blocks.push(Block::Heading {
                        level: el.value().name()[1..].parse().unwrap_or(2),
                        inlines: collect_inlines(el, None),
                    }),
                    "ul" | "ol" => {
                        // Nested lists are flattened into the outermost block.
                        if has_ancestor(el, &["ul", "ol"]) {
                            continue;
                        }
                        let items = el
                            .select(&LI_SEL)
                            .map(|li| collect_inlines(li, Some(li)))
                            .collect();
                        blocks.push(Block::List {
                            ordered: el.value().name() == "ol",
                            items,
                        });
                    }
                    _ => {}
                }
            }
        }

        let infobox = doc.select(&INFOBOX_SEL).next();
        let infobox_image = infobox.and_then(|table| {
            table
                .select(&IMG_SEL)
                .next()
                .and_then(|img| img.value().attr("src"))
                .map(absolute_image_url)
        });

        let has_infobox = infobox.is_some();
        debug!(url, blocks = blocks.len(), has_infobox, "page parsed");

        Self {
            url: url.to_string(),
            heading,
            blocks,
            has_infobox,
            infobox_image,
        }
    }
}

/// An anchor carrying a `title` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitledAnchor {
    pub title: String,
    pub href: String,
}

/// Every titled anchor in `html`, in document order. Index pages identify
/// their sub-pages by anchor title rather than by visible text.
pub fn titled_anchors(html: &str) -> Vec<TitledAnchor> {
    let doc = Html::parse_document(html);
    doc.select(&TITLED_A_SEL)
        .filter_map(|a| {
            let title = a.value().attr("title")?;
            let href = a.value().attr("href")?;
            Some(TitledAnchor {
                title: title.to_string(),
                href: href.to_string(),
            })
        })
        .collect()
}

/// Image sources are usually protocol-relative; give them a scheme.
fn absolute_image_url(src: &str) -> String {
    if src.starts_with("http") {
        src.to_string()
    } else {
        format!("https:{src}")
    }
}

// ---------------------------------------------------------------------------
// Inline collection
// ---------------------------------------------------------------------------

/// Elements whose text never contributes: footnote superscripts and
/// edit-section markers. Shared between inline collection and table cells.
pub(crate) fn is_dropped_marker(el: ElementRef<'_>) -> bool {
    match el.value().name() {
        "sup" => true,
        "span" => el.value().classes().any(|c| c == "mw-editsection"),
        _ => false,
    }
}

/// Collect the filtered text fragments under `el` in document order.
///
/// Fragments under a `sup` (footnote markers) or an edit-section `span` are
/// dropped. When `item_root` is set (list items), fragments belonging to a
/// nested list are skipped — they become their own items.
pub(crate) fn collect_inlines(el: ElementRef<'_>, item_root: Option<ElementRef<'_>>) -> Vec<Inline> {
    let mut inlines = Vec::new();

    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let fragment = text.trim_matches('\n');
        if fragment.is_empty() {
            continue;
        }

        let mut skip = false;
        for ancestor in node.ancestors() {
            if item_root.is_some_and(|root| ancestor.id() == root.id()) {
                break;
            }
            let Some(ancestor_el) = ElementRef::wrap(ancestor) else {
                continue;
            };
            if is_dropped_marker(ancestor_el) {
                skip = true;
                break;
            }
            let name = ancestor_el.value().name();
            if item_root.is_some() && matches!(name, "ul" | "ol") && ancestor.id() != el.id() {
                // Text of a nested list item; the item is collected separately.
                skip = true;
                break;
            }
        }
        if skip {
            continue;
        }

        let parent_el = node.parent().and_then(ElementRef::wrap);
        match parent_el {
            Some(parent) if parent.value().name() == "a" => {
                if let Some(href) = parent.value().attr("href") {
                    inlines.push(Inline::Link {
                        text: fragment.to_string(),
                        href: href.to_string(),
                        self_link: parent.value().classes().any(|c| c == "mw-selflink"),
                    });
                } else {
                    inlines.push(Inline::Text(fragment.to_string()));
                }
            }
            _ => inlines.push(Inline::Text(fragment.to_string())),
        }
    }

    inlines
}

fn has_ancestor(el: ElementRef<'_>, names: &[&str]) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| names.contains(&a.value().name()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_collects_heading_and_paragraphs() {
        let html = r#"<html><body>
            <h1>Paris</h1>
            <div id="mw-content-text">
                <p>Capital of France.</p>
                <h2>History</h2>
                <p>Founded long ago.</p>
            </div>
        </body></html>"#;

        let doc = PageDoc::parse(html, "https://en.wikipedia.org/wiki/Paris");
        assert!(doc.heading.is_some());
        assert_eq!(doc.blocks.len(), 3);
        assert!(matches!(doc.blocks[0], Block::Paragraph(_)));
        assert!(matches!(doc.blocks[1], Block::Heading { level: 2, .. }));
    }

    #[test]
    fn parse_drops_superscripts_and_edit_markers() {
        let html = r#"<html><body><div id="mw-content-text">
            <p>Population is large<sup>[1]</sup>.</p>
            <h2>History<span class="mw-editsection">[edit]</span></h2>
        </div></body></html>"#;

        let doc = PageDoc::parse(html, "https://example.org/p");
        let Block::Paragraph(inlines) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        let joined: String = inlines
            .iter()
            .map(|i| match i {
                Inline::Text(t) => t.as_str(),
                Inline::Link { text, .. } => text.as_str(),
            })
            .collect();
        assert_eq!(joined, "Population is large.");

        let Block::Heading { inlines, .. } = &doc.blocks[1] else {
            panic!("expected heading");
        };
        assert_eq!(inlines, &vec![Inline::Text("History".into())]);
    }

    #[test]
    fn parse_excludes_table_nested_blocks() {
        let html = r#"<html><body><div id="mw-content-text">
            <table class="infobox"><tr><td><p>Infobox text</p></td></tr></table>
            <p>Real content.</p>
        </div></body></html>"#;

        let doc = PageDoc::parse(html, "https://example.org/p");
        assert_eq!(doc.blocks.len(), 1);
        assert!(doc.has_infobox);
    }

    #[test]
    fn parse_finds_infobox_image() {
        let html = r#"<html><body><div id="mw-content-text">
            <table class="infobox"><tr><td>
                <img src="//upload.example.org/flag.png">
            </td></tr></table>
        </div></body></html>"#;

        let doc = PageDoc::parse(html, "https://example.org/p");
        assert_eq!(
            doc.infobox_image.as_deref(),
            Some("https://upload.example.org/flag.png")
        );
    }

    #[test]
    fn parse_without_infobox() {
        let doc = PageDoc::parse("<html><body><p>x</p></body></html>", "https://e.org/p");
        assert!(!doc.has_infobox);
        assert!(doc.infobox_image.is_none());
    }

    #[test]
    fn parse_marks_self_links() {
        let html = r#"<html><body><div id="mw-content-text">
            <p>See <a class="mw-selflink" href="/wiki/Paris">Paris</a> itself.</p>
        </div></body></html>"#;

        let doc = PageDoc::parse(html, "https://example.org/p");
        let Block::Paragraph(inlines) = &doc.blocks[0] else {
            panic!("expected paragraph");
        };
        assert!(inlines.iter().any(|i| matches!(
            i,
            Inline::Link {
                self_link: true,
                ..
            }
        )));
    }

    #[test]
    fn titled_anchors_need_both_title_and_href() {
        let html = r#"<html><body>
            <p><a href="/wiki/List_of_cities" title="List of cities by country">Algeria</a></p>
            <p><a href="/wiki/Plain">untitled</a></p>
        </body></html>"#;

        let anchors = titled_anchors(html);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].title, "List of cities by country");
        assert_eq!(anchors[0].href, "/wiki/List_of_cities");
    }

    #[test]
    fn nested_lists_flatten_into_separate_items() {
        let html = r#"<html><body><div id="mw-content-text">
            <ul>
                <li>Outer item<ul><li>Inner item</li></ul></li>
                <li>Second item</li>
            </ul>
        </div></body></html>"#;

        let doc = PageDoc::parse(html, "https://example.org/p");
        assert_eq!(doc.blocks.len(), 1);
        let Block::List { ordered, items } = &doc.blocks[0] else {
            panic!("expected list");
        };
        assert!(!ordered);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], vec![Inline::Text("Outer item".into())]);
        assert_eq!(items[1], vec![Inline::Text("Inner item".into())]);
    }
}
