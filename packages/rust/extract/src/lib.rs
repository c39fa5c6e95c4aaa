//! Article content extraction: a parsed document model, renderers over it,
//! table extraction, and chunking of rendered output.

pub mod chunk;
pub mod document;
pub mod render;
pub mod tables;

pub use chunk::{EMPTY_LINE_PLACEHOLDER, split_chunks};
pub use document::{Block, Inline, PageDoc, TitledAnchor, titled_anchors};
pub use render::{Markdown, PlainText, Renderer};
pub use tables::{SourceCell, SourceTable, first_table, source_tables};

use atlasbot_shared::Result;

/// Trailing sections that end the readable article body.
const STOP_PHRASES: &[&str] = &["see also", "notes", "references", "external links"];

/// The article's display title, taken from its top-level heading.
pub fn title(doc: &PageDoc) -> Result<String> {
    let heading = doc
        .heading
        .as_ref()
        .ok_or_else(|| atlasbot_shared::AtlasError::malformed(format!("{}: no heading", doc.url)))?;
    Ok(PlainText.render_inlines(heading).trim().to_string())
}

/// The lead section: consecutive paragraphs before the first heading or list.
pub fn summary(doc: &PageDoc, renderer: &dyn Renderer) -> String {
    let mut paragraphs = Vec::new();
    for block in &doc.blocks {
        match block {
            Block::Paragraph(_) => {
                let text = renderer.render_block(block);
                if !text.is_empty() {
                    paragraphs.push(text);
                }
            }
            Block::Heading { .. } | Block::List { .. } => break,
        }
    }
    paragraphs.join("\n\n").trim_end().to_string()
}

/// The full readable body, stopping at trailing reference sections.
pub fn body(doc: &PageDoc, renderer: &dyn Renderer) -> String {
    let mut text = String::new();
    for block in &doc.blocks {
        let plain = PlainText.render_block(block).to_lowercase();
        if STOP_PHRASES.iter().any(|s| plain.contains(s)) {
            break;
        }
        let rendered = renderer.render_block(block);
        if rendered.is_empty() {
            continue;
        }
        match block {
            Block::Paragraph(_) => text.push_str(&format!("{rendered}\n\n")),
            Block::Heading { .. } => text.push_str(&format!("{rendered}\n")),
            Block::List { .. } => {
                text = format!("{}\n{rendered}\n\n", text.trim_end());
            }
        }
    }
    text.trim_end().to_string()
}
