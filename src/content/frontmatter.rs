//! Frontmatter detection and extraction.
//!
//! A content file may start with a metadata block in one of three styles:
//!
//! ```text
//! ---            <!--           ```yaml
//! Raw: true      Raw: true      Raw: true
//! ---            -->            ```
//! ```
//!
//! The style is decided once from the first line; the block then runs to the
//! first line that is exactly the matching terminator.

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use thiserror::Error;

/// Delimiter tokens are short, so only this many bytes are inspected when
/// looking for an opening line.
const PEEK_LEN: usize = 32;

/// The recognized frontmatter styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Dashes,
    HtmlComment,
    YamlFence,
}

impl Delimiter {
    fn from_opening(line: &str) -> Option<Self> {
        match line {
            "---" => Some(Self::Dashes),
            "<!--" => Some(Self::HtmlComment),
            "```yaml" => Some(Self::YamlFence),
            _ => None,
        }
    }

    /// The line that closes a block opened with this delimiter.
    pub fn closing(self) -> &'static str {
        match self {
            Self::Dashes => "---",
            Self::HtmlComment => "-->",
            Self::YamlFence => "```",
        }
    }
}

/// Page metadata. Absent fields keep their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    /// Template to render the page with.
    #[serde(rename = "Template", alias = "template", default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Skip markdown conversion.
    #[serde(rename = "Raw", alias = "raw", default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,

    /// Generate a table of contents from markdown headings.
    #[serde(rename = "MDTOC", alias = "mdtoc", default, skip_serializing_if = "Option::is_none")]
    pub toc: Option<bool>,

    /// Arbitrary page data handed to templates.
    #[serde(rename = "Data", alias = "data", default, skip_serializing_if = "Mapping::is_empty")]
    pub data: Mapping,
}

impl FrontMatter {
    pub fn is_raw(&self) -> bool {
        self.raw.unwrap_or(false)
    }

    pub fn wants_toc(&self) -> bool {
        self.toc.unwrap_or(false)
    }

    /// Layer `page` over `self`: set fields win, data keys merge.
    pub fn merged_with(mut self, page: FrontMatter) -> FrontMatter {
        self.template = page.template.or(self.template);
        self.raw = page.raw.or(self.raw);
        self.toc = page.toc.or(self.toc);
        for (key, value) in page.data {
            self.data.insert(key, value);
        }
        self
    }
}

/// Error type for frontmatter extraction.
#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("frontmatter opened with {0:?} is never closed")]
    Unterminated(Delimiter),

    #[error("invalid frontmatter: {0}")]
    Invalid(#[from] serde_yaml::Error),
}

/// Split `input` into metadata and body.
///
/// Input without a recognized opening line is returned whole with default
/// metadata.
pub fn extract(input: &[u8]) -> Result<(FrontMatter, &[u8]), FrontMatterError> {
    let Some(delimiter) = opening_delimiter(input) else {
        return Ok((FrontMatter::default(), input));
    };

    let mut lines = Lines::new(input);
    lines.next();

    let block_start = lines.offset;
    loop {
        let line_start = lines.offset;
        let Some(line) = lines.next() else {
            return Err(FrontMatterError::Unterminated(delimiter));
        };
        if trim_line_ending(line) == delimiter.closing().as_bytes() {
            let block = String::from_utf8_lossy(&input[block_start..line_start]);
            return Ok((parse_block(&block)?, &input[lines.offset..]));
        }
    }
}

fn opening_delimiter(input: &[u8]) -> Option<Delimiter> {
    let peek = &input[..input.len().min(PEEK_LEN)];
    let newline = peek.iter().position(|&b| b == b'\n')?;
    let first = std::str::from_utf8(trim_line_ending(&peek[..=newline])).ok()?;
    Delimiter::from_opening(first)
}

fn parse_block(block: &str) -> Result<FrontMatter, serde_yaml::Error> {
    if block.trim().is_empty() {
        return Ok(FrontMatter::default());
    }
    serde_yaml::from_str(block)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Byte lines including their terminator, tracking the offset of the next one.
struct Lines<'a> {
    input: &'a [u8],
    offset: usize,
}

impl<'a> Lines<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, offset: 0 }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.input[self.offset..];
        if rest.is_empty() {
            return None;
        }
        let len = rest.iter().position(|&b| b == b'\n').map_or(rest.len(), |i| i + 1);
        self.offset += len;
        Some(&rest[..len])
    }
}
