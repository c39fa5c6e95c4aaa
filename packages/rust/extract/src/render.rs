//! Plain-text and markdown renderers over the document model.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::{Block, Inline};

/// Renders blocks and inlines into one output flavor.
///
/// List items render per item: unordered as `- item`, ordered as `<index>. item`
/// with 0-based indices; items with empty rendered text are omitted.
pub trait Renderer {
    /// Render a run of inline fragments.
    fn render_inlines(&self, inlines: &[Inline]) -> String;

    /// Render a heading's text at the given depth.
    fn render_heading(&self, level: u8, inlines: &[Inline]) -> String;

    /// Render one block to a trailing-trimmed string.
    fn render_block(&self, block: &Block) -> String {
        match block {
            Block::Paragraph(inlines) => self.render_inlines(inlines).trim_end().to_string(),
            Block::Heading { level, inlines } => {
                self.render_heading(*level, inlines).trim_end().to_string()
            }
            Block::List { ordered, items } => {
                let mut out = String::new();
                for (i, item) in items.iter().enumerate() {
                    let text = self.render_inlines(item).trim_end().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    if *ordered {
                        out.push_str(&format!("{i}. {text}\n"));
                    } else {
                        out.push_str(&format!("- {text}\n"));
                    }
                }
                out.trim_end().to_string()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Plain text
// ---------------------------------------------------------------------------

/// Plain-text rendering: link fragments contribute their display text only.
pub struct PlainText;

impl Renderer for PlainText {
    fn render_inlines(&self, inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(t) => out.push_str(t),
                Inline::Link { text, .. } => out.push_str(text),
            }
        }
        out
    }

    fn render_heading(&self, _level: u8, inlines: &[Inline]) -> String {
        self.render_inlines(inlines)
    }
}

// ---------------------------------------------------------------------------
// Markdown
// ---------------------------------------------------------------------------

/// Markdown rendering: headings gain `#` runs, anchors become links resolved
/// against the page URL (self links, fragments) or the site origin.
pub struct Markdown {
    /// URL of the page being rendered; self and fragment links resolve here.
    pub page_url: String,
    /// Site origin (scheme + host) for other relative hrefs.
    pub site_root: String,
}

static BRACKETS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\[\]]+").expect("valid regex"));

impl Markdown {
    fn resolve(&self, href: &str, self_link: bool) -> String {
        if self_link {
            self.page_url.clone()
        } else if href.starts_with('#') {
            format!("{}{href}", self.page_url)
        } else if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else {
            format!("{}{href}", self.site_root)
        }
    }
}

impl Renderer for Markdown {
    fn render_inlines(&self, inlines: &[Inline]) -> String {
        let mut out = String::new();
        for inline in inlines {
            match inline {
                Inline::Text(t) => out.push_str(t),
                Inline::Link {
                    text,
                    href,
                    self_link,
                } => {
                    let href = self.resolve(href, *self_link);
                    // Literal brackets around the link text stay outside the
                    // generated link syntax instead of being escaped.
                    let leading: String = text.chars().take_while(|c| *c == '[').collect();
                    let trailing: String = text
                        .chars()
                        .rev()
                        .take_while(|c| *c == ']')
                        .collect();
                    let name = BRACKETS_RE.replace_all(text, "");
                    out.push_str(&format!("{leading}[{name}]({href}){trailing}"));
                }
            }
        }
        out
    }

    fn render_heading(&self, level: u8, inlines: &[Inline]) -> String {
        let text = self.render_inlines(inlines);
        format!("{} {}", "#".repeat(level as usize), text)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
