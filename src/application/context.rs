//! Context documents derived from the index.
//!
//! The basic document strips every link and bare URL. The full document
//! inlines the mirror document behind each internal link, then expands the
//! inlined documents in turn up to the configured depth.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::application::error::MirrorError;
use crate::application::index::IndexService;
use crate::application::markdown::MarkdownService;
use crate::application::mirror::{MirrorConfig, record_build};
use crate::cache::{CacheKey, DocumentCache};
use crate::config::FullContextDepth;

static LINK_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^\)]+\)").expect("link pattern"));
static BARE_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").expect("url pattern"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").expect("newline pattern"));
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ ]{2,}").expect("space pattern"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^\)]+)\)").expect("link capture pattern"));

/// Replace `[text](url)` with `text`, drop bare URLs and squeeze whitespace.
pub fn strip_links(content: &str) -> String {
    let content = LINK_TEXT.replace_all(content, "$1");
    let content = BARE_URL.replace_all(&content, "");
    let content = BLANK_LINES.replace_all(&content, "\n\n");
    let content = SPACE_RUNS.replace_all(&content, " ");
    content.trim().to_string()
}

struct LinkMatch {
    start: usize,
    end: usize,
    text: String,
    url: String,
}

fn find_links(content: &str) -> Vec<LinkMatch> {
    LINK.captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(LinkMatch {
                start: whole.start(),
                end: whole.end(),
                text: caps.get(1)?.as_str().to_string(),
                url: caps.get(2)?.as_str().to_string(),
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct ContextService {
    index: IndexService,
    markdown: MarkdownService,
    cache: DocumentCache,
    config: Arc<MirrorConfig>,
}

impl ContextService {
    pub fn new(
        index: IndexService,
        markdown: MarkdownService,
        cache: DocumentCache,
        config: Arc<MirrorConfig>,
    ) -> Self {
        Self {
            index,
            markdown,
            cache,
            config,
        }
    }

    #[instrument(skip_all)]
    pub async fn get_or_build_basic(&self) -> Result<String, MirrorError> {
        if let Some(document) = self.cache.get(&CacheKey::BasicContext) {
            return Ok(document);
        }

        let started_at = Instant::now();
        let index = self.index.get_or_build().await?;
        let document = strip_links(&index);

        self.cache.put(&CacheKey::BasicContext, &document);
        record_build("basic_context", started_at);
        Ok(document)
    }

    /// Full context document.
    ///
    /// Starts from the index exactly as configured. Entries only embed their
    /// content when `include.content` is set; everything else reaches the
    /// document through link expansion.
    #[instrument(skip_all)]
    pub async fn get_or_build_full(&self) -> Result<String, MirrorError> {
        if let Some(document) = self.cache.get(&CacheKey::FullContext) {
            return Ok(document);
        }

        let started_at = Instant::now();
        let index = self.index.get_or_build().await?;
        let document = self.expand(index).await;

        self.cache.put(&CacheKey::FullContext, &document);
        record_build("full_context", started_at);
        Ok(document)
    }

    /// Expand the internal links of `index` and of every inlined document.
    ///
    /// Nesting is driven by an explicit frame stack, so arbitrarily deep
    /// expansions run in constant call-stack space. `chain` holds the
    /// entities whose documents are open on the stack below the top frame.
    async fn expand(&self, index: String) -> String {
        let max_depth = self.config.full_context.max_depth;
        let mut stack = vec![Frame::new(index, 1, max_depth)];
        let mut chain: Vec<Uuid> = Vec::new();

        loop {
            let Some(frame) = stack.last_mut() else {
                return String::new();
            };

            let Some(url) = frame.pending_url() else {
                let Some(done) = stack.pop() else {
                    return String::new();
                };
                let expanded = done.finish();
                match stack.last_mut() {
                    Some(parent) => {
                        chain.pop();
                        parent.emit(Some(expanded));
                    }
                    None => return expanded,
                }
                continue;
            };

            if let Some(document) = frame.resolved.get(&url).cloned() {
                frame.emit(document);
                continue;
            }

            let depth = frame.depth;
            match self.resolve(&url, depth, &chain).await {
                Resolution::Keep => frame.emit(None),
                Resolution::Inline(document) => frame.emit(Some(document)),
                Resolution::Descend {
                    entity_id,
                    document,
                } => {
                    chain.push(entity_id);
                    stack.push(Frame::new(document, depth + 1, max_depth));
                }
            }
        }
    }

    /// What to put in place of the link to `url`, found at `depth`.
    async fn resolve(&self, url: &str, depth: u32, chain: &[Uuid]) -> Resolution {
        let Some(slug) = self.config.slug_from_mirror_url(url) else {
            return Resolution::Keep;
        };

        let entity = match self.markdown.resolve_eligible(slug).await {
            Ok(entity) => entity,
            Err(source) => {
                let err = MirrorError::link_resolution(url, source.to_string());
                warn!(depth, error = %err, "Link left unexpanded");
                return Resolution::Keep;
            }
        };

        if self.config.full_context.detect_cycles && chain.contains(&entity.id) {
            debug!(depth, url, entity_id = %entity.id, "Cyclic link left unexpanded");
            return Resolution::Keep;
        }

        let document = match self.markdown.document_for(&entity) {
            Ok(document) => document,
            Err(source) => {
                let err = MirrorError::link_resolution(url, source.to_string());
                warn!(depth, error = %err, "Link left unexpanded");
                return Resolution::Keep;
            }
        };

        if self.config.full_context.max_depth.descends_below(depth) {
            Resolution::Descend {
                entity_id: entity.id,
                document,
            }
        } else {
            Resolution::Inline(document)
        }
    }
}

enum Resolution {
    /// Leave the link as written.
    Keep,
    /// Inline the document without expanding it.
    Inline(String),
    /// Inline the document after expanding its own links.
    Descend { entity_id: Uuid, document: String },
}

/// A document whose links are being substituted, left to right.
///
/// Replacement text is never rescanned at the same level. Each distinct URL
/// is resolved once per frame.
struct Frame {
    content: String,
    links: Vec<LinkMatch>,
    next: usize,
    cursor: usize,
    out: String,
    resolved: HashMap<String, Option<String>>,
    depth: u32,
}

impl Frame {
    fn new(content: String, depth: u32, max_depth: FullContextDepth) -> Self {
        let links = if max_depth.permits(depth) {
            find_links(&content)
        } else {
            Vec::new()
        };
        Self {
            out: String::with_capacity(content.len()),
            content,
            links,
            next: 0,
            cursor: 0,
            resolved: HashMap::new(),
            depth,
        }
    }

    fn pending_url(&self) -> Option<String> {
        self.links.get(self.next).map(|link| link.url.clone())
    }

    /// Write out the pending link, inlining `document` when there is one.
    fn emit(&mut self, document: Option<String>) {
        let Some(link) = self.links.get(self.next) else {
            return;
        };

        self.out.push_str(&self.content[self.cursor..link.start]);
        match &document {
            Some(document) => {
                self.out
                    .push_str(&format!("\n\n### {}\n\n{document}\n\n---\n\n", link.text));
            }
            None => self.out.push_str(&self.content[link.start..link.end]),
        }
        self.cursor = link.end;
        self.resolved.insert(link.url.clone(), document);
        self.next += 1;
    }

    fn finish(mut self) -> String {
        self.out.push_str(&self.content[self.cursor..]);
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_links_keeps_link_text() {
        let stripped = strip_links("### [Hello World](https://site/hello-world.md)\n\nBody");
        assert_eq!(stripped, "### Hello World\n\nBody");
    }

    #[test]
    fn strip_links_removes_bare_urls_and_squeezes_whitespace() {
        let stripped = strip_links("See https://example.com/x  now\n\n\n\n\nEnd   ");
        assert_eq!(stripped, "See now\n\nEnd");
    }

    #[test]
    fn frames_substitute_each_link_once() {
        let mut frame = Frame::new(
            "a [B](u1) c [B](u1) [D](u2)".to_string(),
            1,
            FullContextDepth::Limited(1),
        );
        assert_eq!(frame.pending_url().as_deref(), Some("u1"));
        frame.emit(Some("doc".to_string()));
        let repeat = frame.pending_url().expect("second link");
        let cached = frame.resolved.get(&repeat).cloned().expect("memoised");
        frame.emit(cached);
        frame.emit(None);
        assert!(frame.pending_url().is_none());
        assert_eq!(
            frame.finish(),
            "a \n\n### B\n\ndoc\n\n---\n\n c \n\n### B\n\ndoc\n\n---\n\n [D](u2)"
        );
    }

    #[test]
    fn frames_past_the_limit_keep_their_links() {
        let frame = Frame::new("[B](u1)".to_string(), 2, FullContextDepth::Limited(1));
        assert!(frame.pending_url().is_none());
        assert_eq!(frame.finish(), "[B](u1)");
    }

    #[test]
    fn find_links_reports_positions() {
        let links = find_links("a [B](u1) c [D](u2)");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].text, "B");
        assert_eq!(links[0].url, "u1");
        assert_eq!(links[1].start, 12);
        assert_eq!(links[1].end, 19);
    }
}
