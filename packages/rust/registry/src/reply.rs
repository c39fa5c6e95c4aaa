//! Rendering an enriched entity into an ordered reply of bounded chunks.

use bytes::Bytes;
use url::Url;

use atlasbot_extract::{EMPTY_LINE_PLACEHOLDER, Markdown, PlainText, Renderer, split_chunks};
use atlasbot_shared::{AtlasError, Result};

use crate::entity::LocationEntity;

/// One reply segment, delivered in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentChunk {
    /// Text no longer than the configured chunk length.
    Text(String),
    /// The entity's primary image.
    Image(Bytes),
}

#[derive(Debug, Clone)]
pub struct ReplyOptions {
    /// Render only the lead section instead of the full body.
    pub summary: bool,
    /// Markdown rendering with the infobox image; plain text otherwise.
    pub markdown: bool,
    /// Hard upper bound on each text chunk, in characters.
    pub max_chunk_len: usize,
    /// Display name of the next pending entity, when the reply is one of
    /// several matches; appends a continuation hint.
    pub continue_name: Option<String>,
}

impl LocationEntity {
    /// Render this entity's page into delivery chunks.
    ///
    /// Requires the page to be fetched, plus the image when `markdown` is set;
    /// errors with `MissingEnrichment` otherwise. Markdown replies open with
    /// the title and image, plain replies with the title alone.
    pub fn render_reply(&self, options: &ReplyOptions) -> Result<Vec<ContentChunk>> {
        let missing = || AtlasError::MissingEnrichment {
            link: self.link.clone(),
        };
        let doc = self.page().ok_or_else(missing)?;
        let name = self.display_name().ok_or_else(missing)?;

        let mut chunks = Vec::new();
        let text = if options.markdown {
            let image = self.image().ok_or_else(missing)?;
            chunks.push(ContentChunk::Text(format!("# {name}")));
            chunks.push(ContentChunk::Image(image.clone()));

            let renderer = Markdown {
                page_url: self.link.clone(),
                site_root: site_root(&self.link)?,
            };
            rendered_text(doc, &renderer, options.summary)
        } else {
            chunks.push(ContentChunk::Text(name.to_string()));
            rendered_text(doc, &PlainText, options.summary)
        };

        chunks.extend(
            split_chunks(&text, options.max_chunk_len)
                .into_iter()
                .map(ContentChunk::Text),
        );

        if let Some(next) = &options.continue_name {
            chunks.push(ContentChunk::Text(EMPTY_LINE_PLACEHOLDER.to_string()));
            chunks.push(ContentChunk::Text(format!(
                "Type /continue to read about {next}"
            )));
        }
        Ok(chunks)
    }
}

fn rendered_text(
    doc: &atlasbot_extract::PageDoc,
    renderer: &dyn Renderer,
    summary: bool,
) -> String {
    if summary {
        atlasbot_extract::summary(doc, renderer)
    } else {
        atlasbot_extract::body(doc, renderer)
    }
}

fn site_root(link: &str) -> Result<String> {
    let url = Url::parse(link).map_err(|e| AtlasError::parse(format!("{link}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| AtlasError::parse(format!("{link}: no host")))?;
    Ok(format!("{}://{host}", url.scheme()))
}
