//! Markdown to HTML conversion.
//!
//! Headings get generated ids, footnotes get back-links, and a table of
//! contents can be prepended when the page asks for one. Raw HTML in the
//! source is passed through untouched.

use std::collections::HashMap;

use pulldown_cmark::{html, CowStr, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

use super::html::{escape_attr, escape_text};

/// Extension of files rendered as markdown.
pub const MARKDOWN_EXTENSION: &str = "md";

/// A heading collected for the table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub level: u8,
    pub title: String,
    pub id: String,
}

/// Rendering switches taken from the page frontmatter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    pub toc: bool,
}

fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

/// Output of a markdown conversion.
#[derive(Debug, Clone, Default)]
pub struct Rendered {
    pub html: String,
    pub toc: Vec<TocEntry>,
}

/// Render markdown source to HTML.
pub fn render(source: &str, options: RenderOptions) -> Rendered {
    let events: Vec<Event<'_>> = Parser::new_ext(source, parser_options()).collect();
    let mut headings = HeadingIds::default();
    let mut footnotes = Footnotes::default();
    let mut toc = Vec::new();

    let mut output = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        match event {
            Event::Start(Tag::Heading { level, id, classes, attrs }) => {
                let end = heading_end(&events, index);
                let title = plain_text(&events[index + 1..end]);
                let id = match id {
                    Some(id) => headings.reserve(id),
                    None => headings.generate(&title),
                };
                toc.push(TocEntry {
                    level: level_number(*level),
                    title: title.trim().to_string(),
                    id: id.clone(),
                });
                output.push(Event::Start(Tag::Heading {
                    level: *level,
                    id: Some(CowStr::from(id)),
                    classes: classes.clone(),
                    attrs: attrs.clone(),
                }));
            }
            Event::FootnoteReference(label) => {
                let number = footnotes.number(label);
                output.push(Event::InlineHtml(CowStr::from(format!(
                    r##"<sup class="footnote-reference" id="fnref-{label}"><a href="#fn-{label}">{number}</a></sup>"##,
                    label = escape_attr(label),
                ))));
            }
            Event::Start(Tag::FootnoteDefinition(label)) => {
                let number = footnotes.number(label);
                output.push(Event::Html(CowStr::from(format!(
                    r#"<div class="footnote-definition" id="fn-{label}"><sup class="footnote-definition-label">{number}</sup>"#,
                    label = escape_attr(label),
                ))));
                footnotes.open.push(label.to_string());
            }
            Event::End(TagEnd::FootnoteDefinition) => {
                let label = footnotes.open.pop().unwrap_or_default();
                output.push(Event::Html(CowStr::from(format!(
                    r##"<a href="#fnref-{}" class="footnote-backref">&#8617;</a></div>"##,
                    escape_attr(&label),
                ))));
            }
            event => output.push(event.clone()),
        }
    }

    let mut body = String::with_capacity(source.len() * 3 / 2);
    if options.toc && !toc.is_empty() {
        body.push_str(&render_toc(&toc));
    }
    html::push_html(&mut body, output.into_iter());
    Rendered { html: body, toc }
}

fn heading_end(events: &[Event<'_>], start: usize) -> usize {
    events[start..]
        .iter()
        .position(|e| matches!(e, Event::End(TagEnd::Heading(_))))
        .map_or(events.len(), |offset| start + offset)
}

fn plain_text(events: &[Event<'_>]) -> String {
    let mut text = String::new();
    for event in events {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

/// Nested `<ul>` list of links, one level per heading depth change.
fn render_toc(entries: &[TocEntry]) -> String {
    let base = entries.iter().map(|e| e.level).min().unwrap_or(1);
    let mut out = String::from("<nav class=\"toc\">\n");
    let mut depth = 0u8;
    for entry in entries {
        let target = entry.level - base + 1;
        while depth < target {
            out.push_str("<ul>\n");
            depth += 1;
        }
        while depth > target {
            out.push_str("</ul>\n");
            depth -= 1;
        }
        out.push_str(&format!(
            "<li><a href=\"#{}\">{}</a></li>\n",
            escape_attr(&entry.id),
            escape_text(&entry.title)
        ));
    }
    while depth > 0 {
        out.push_str("</ul>\n");
        depth -= 1;
    }
    out.push_str("</nav>\n");
    out
}

#[derive(Default)]
struct HeadingIds {
    seen: HashMap<String, usize>,
}

impl HeadingIds {
    fn reserve(&mut self, id: &str) -> String {
        *self.seen.entry(id.to_string()).or_default() += 1;
        id.to_string()
    }

    fn generate(&mut self, text: &str) -> String {
        let base = slugify(text);
        let count = self.seen.entry(base.clone()).or_default();
        let id = match *count {
            0 => base,
            n => format!("{base}-{n}"),
        };
        *count += 1;
        id
    }
}

#[derive(Default)]
struct Footnotes {
    numbers: HashMap<String, usize>,
    open: Vec<String>,
}

impl Footnotes {
    fn number(&mut self, label: &str) -> usize {
        let next = self.numbers.len() + 1;
        *self.numbers.entry(label.to_string()).or_insert(next)
    }
}

fn level_number(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Lowercase slug with single dashes between words.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.trim().chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' || c == '_' {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("section");
    }
    slug
}
