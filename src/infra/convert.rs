//! `lol_html` based HTML to Markdown converter.
//!
//! The rewriter strips every tag and leaves Markdown syntax plus layout
//! sentinels in its place. A second pass turns the sentinels into line
//! breaks, normalises whitespace outside code blocks and decodes entities.

use lol_html::{RewriteStrSettings, element, html_content::ContentType, rewrite_str};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

use crate::application::convert::{ConvertError, Converter};

/// Paragraph break.
const BLOCK: char = '\u{E000}';
/// Single line break.
const LINE: char = '\u{E001}';
/// Boundary of a preformatted block.
const FENCE: char = '\u{E002}';

static WHITESPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\r\n\f]+").expect("whitespace pattern"));
static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("newline pattern"));

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlConverter;

impl HtmlConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Converter for HtmlConverter {
    fn convert(&self, html: &str) -> Result<String, ConvertError> {
        let marked = mark_up(html)?;
        Ok(decode_entities(&layout(&marked)))
    }
}

fn mark_up(html: &str) -> Result<String, ConvertError> {
    let block = BLOCK.to_string();
    let line = LINE.to_string();
    let fence = FENCE.to_string();

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", |el| {
                    el.remove_and_keep_content();
                    Ok(())
                }),
                element!("script, style, noscript, template, head", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("h1, h2, h3, h4, h5, h6", |el| {
                    let level = el
                        .tag_name()
                        .trim_start_matches('h')
                        .parse::<usize>()
                        .unwrap_or(1);
                    el.before(
                        &format!("{BLOCK}{} ", "#".repeat(level)),
                        ContentType::Html,
                    );
                    el.after(&block, ContentType::Html);
                    Ok(())
                }),
                element!("p, div, section, article, header, footer, table, figure, ul, ol", |el| {
                    el.before(&block, ContentType::Html);
                    el.after(&block, ContentType::Html);
                    Ok(())
                }),
                element!("ul > li", |el| {
                    el.before(&format!("{LINE}- "), ContentType::Html);
                    Ok(())
                }),
                element!("ol > li", |el| {
                    el.before(&format!("{LINE}1. "), ContentType::Html);
                    Ok(())
                }),
                element!("tr", |el| {
                    el.before(&line, ContentType::Html);
                    Ok(())
                }),
                element!("td, th", |el| {
                    el.after(" ", ContentType::Html);
                    Ok(())
                }),
                element!("strong, b", |el| {
                    el.before("**", ContentType::Html);
                    el.after("**", ContentType::Html);
                    Ok(())
                }),
                element!("em, i", |el| {
                    el.before("_", ContentType::Html);
                    el.after("_", ContentType::Html);
                    Ok(())
                }),
                element!("*:not(pre) > code", |el| {
                    el.before("`", ContentType::Html);
                    el.after("`", ContentType::Html);
                    Ok(())
                }),
                element!("a[href]", |el| {
                    let href = el.get_attribute("href").unwrap_or_default();
                    el.before("[", ContentType::Html);
                    el.after(&format!("]({href})"), ContentType::Html);
                    Ok(())
                }),
                element!("img", |el| {
                    match el.get_attribute("src") {
                        Some(src) => {
                            let alt = el.get_attribute("alt").unwrap_or_default();
                            el.replace(&format!("![{alt}]({src})"), ContentType::Html);
                        }
                        None => el.remove(),
                    }
                    Ok(())
                }),
                element!("br", |el| {
                    el.replace(&line, ContentType::Html);
                    Ok(())
                }),
                element!("hr", |el| {
                    el.replace(&format!("{BLOCK}---{BLOCK}"), ContentType::Html);
                    Ok(())
                }),
                element!("blockquote", |el| {
                    el.before(&format!("{BLOCK}> "), ContentType::Html);
                    el.after(&block, ContentType::Html);
                    Ok(())
                }),
                element!("pre", |el| {
                    el.before(&fence, ContentType::Html);
                    el.after(&fence, ContentType::Html);
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| ConvertError::rewrite(err.to_string()))
}

/// Resolve sentinels. Odd segments between fences are preformatted.
fn layout(marked: &str) -> String {
    let blocks: Vec<String> = marked
        .split(FENCE)
        .enumerate()
        .filter_map(|(position, segment)| {
            let rendered = if position % 2 == 1 {
                code_block(segment)
            } else {
                flow_text(segment)
            };
            (!rendered.is_empty()).then_some(rendered)
        })
        .collect();

    blocks.join("\n\n")
}

fn code_block(segment: &str) -> String {
    let code: String = segment
        .chars()
        .filter_map(|ch| match ch {
            LINE => Some('\n'),
            BLOCK => None,
            other => Some(other),
        })
        .collect();
    let code = code.trim_matches('\n');
    if code.trim().is_empty() {
        return String::new();
    }
    format!("```\n{code}\n```")
}

fn flow_text(segment: &str) -> String {
    let collapsed = WHITESPACE_RUNS.replace_all(segment, " ");
    let broken = collapsed
        .replace(BLOCK, "\n\n")
        .replace(LINE, "\n");
    let trimmed: Vec<&str> = broken.lines().map(str::trim).collect();
    let joined = trimmed.join("\n");
    EXCESS_NEWLINES
        .replace_all(&joined, "\n\n")
        .trim()
        .to_string()
}

/// Resolve character references with the full HTML5 entity table.
///
/// Markup has already been stripped, so the fragment parses to text nodes
/// (and any stray comments, which are dropped).
fn decode_entities(text: &str) -> String {
    Html::parse_fragment(text).root_element().text().collect()
}
