// Document Parser: splits an article document into named sections.
//
// A section starts at a paragraph beginning with one of the fixed markers
// (case sensitive) and runs until the next marker. Text following the
// marker on its own paragraph belongs to the section too. Anything before
// the first marker is preamble and only shows up in [`ParsedDocument::paragraphs`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CopydeskError, Result};
use crate::source::{split_list, Row};

/// A run of text with uniform formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub link: Option<String>,
}

impl TextRun {
    pub fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            link: None,
        }
    }

    pub fn linked(text: &str, url: &str) -> Self {
        Self {
            text: text.to_string(),
            link: Some(url.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paragraph {
    pub runs: Vec<TextRun>,
}

impl Paragraph {
    pub fn new(runs: Vec<TextRun>) -> Self {
        Self { runs }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A fetched document reduced to its paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub paragraphs: Vec<Paragraph>,
}

/// Read access to linked documents.
pub trait DocumentSource {
    fn fetch_document(&self, doc_id: &str) -> Result<Document>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Headline,
    Cutlines,
    FeaturedImage,
    Authors,
    Categories,
    Redaction,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Headline,
        Section::Cutlines,
        Section::FeaturedImage,
        Section::Authors,
        Section::Categories,
        Section::Redaction,
    ];

    pub fn marker(self) -> &'static str {
        match self {
            Section::Headline => "Headline:",
            Section::Cutlines => "Cutlines:",
            Section::FeaturedImage => "Featured image:",
            Section::Authors => "Authors:",
            Section::Categories => "Categories:",
            Section::Redaction => "Redaction:",
        }
    }

    fn at_start_of(text: &str) -> Option<Section> {
        Section::ALL.into_iter().find(|s| text.starts_with(s.marker()))
    }
}

/// One line of document text and its HTML rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub html: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub headline: String,
    pub body_html: String,
    pub cutline: String,
    pub redaction: String,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub featured_image_link: Option<String>,
    /// Every paragraph after the leading blank ones, markers and blank
    /// lines included, so operator line numbers match the document.
    pub paragraphs: Vec<Line>,
}

impl ParsedDocument {
    /// Fill authors and categories the document left empty: authors from the
    /// row, categories from the row and then the section label.
    pub fn apply_row_defaults(&mut self, row: &Row) {
        if self.authors.is_empty() {
            self.authors = row.authors.clone();
        }
        if self.categories.is_empty() {
            self.categories = if row.categories.is_empty() {
                vec![row.section.clone()]
            } else {
                row.categories.clone()
            };
        }
    }

    /// Use the paragraphs from `start` (0-based) onwards as the body.
    pub fn set_redaction_from(&mut self, start: usize) {
        let lines: Vec<Line> = self
            .paragraphs
            .get(start..)
            .unwrap_or_default()
            .iter()
            .filter(|l| !l.text.is_empty())
            .cloned()
            .collect();
        self.redaction = join_text(&lines, "\n");
        self.body_html = render_body(&lines);
    }
}

pub fn parse_document(source: &dyn DocumentSource, doc_id: &str) -> Result<ParsedDocument> {
    let document = source.fetch_document(doc_id)?;
    Ok(parse_sections(&document))
}

/// Single linear scan from marker to accumulated lines.
pub fn parse_sections(document: &Document) -> ParsedDocument {
    let mut sections: BTreeMap<Section, Vec<Line>> = BTreeMap::new();
    let mut paragraphs = Vec::new();
    let mut current: Option<Section> = None;

    for paragraph in &document.paragraphs {
        let text = paragraph.text();
        let lead = text.len() - text.trim_start().len();
        let trimmed = text.trim();

        let skip = match Section::at_start_of(trimmed) {
            Some(section) => {
                current = Some(section);
                sections.entry(section).or_default();
                lead + section.marker().len()
            }
            None => 0,
        };

        match render_line(&paragraph.runs, 0) {
            Some(line) => paragraphs.push(line),
            None if !paragraphs.is_empty() => paragraphs.push(Line::default()),
            None => {}
        }

        if let Some(line) = render_line(&paragraph.runs, skip) {
            if let Some(section) = current {
                sections.entry(section).or_default().push(line);
            }
        }
    }

    let lines = |s: Section| sections.get(&s).map(Vec::as_slice).unwrap_or_default();

    ParsedDocument {
        headline: join_text(lines(Section::Headline), " "),
        cutline: join_text(lines(Section::Cutlines), " "),
        redaction: join_text(lines(Section::Redaction), "\n"),
        body_html: render_body(lines(Section::Redaction)),
        authors: split_list(&join_text(lines(Section::Authors), ",")),
        categories: split_list(&join_text(lines(Section::Categories), ",")),
        featured_image_link: first_link(lines(Section::FeaturedImage)),
        paragraphs,
    }
}

/// Extract the document id from a Docs link.
pub fn document_id(link: &str) -> Result<String> {
    static DOC: OnceLock<Regex> = OnceLock::new();
    let re = DOC.get_or_init(|| Regex::new(r"/document/d/([a-zA-Z0-9_-]+)").expect("valid regex"));
    re.captures(link)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| CopydeskError::DocumentAccess(format!("not a Google Docs link: {}", link)))
}

/// Render runs as text and HTML, dropping the first `skip` bytes of text.
/// Returns `None` when nothing but whitespace remains.
fn render_line(runs: &[TextRun], skip: usize) -> Option<Line> {
    let mut remaining = skip;
    let mut text = String::new();
    let mut html = String::new();

    for run in runs {
        let piece = if remaining >= run.text.len() {
            remaining -= run.text.len();
            continue;
        } else {
            let piece = &run.text[remaining..];
            remaining = 0;
            piece
        };

        text.push_str(piece);
        match &run.link {
            Some(url) if !piece.trim().is_empty() => {
                let leading = &piece[..piece.len() - piece.trim_start().len()];
                let trailing = &piece[piece.trim_end().len()..];
                html.push_str(&escape_html(leading));
                html.push_str(&format!(
                    "<a href=\"{}\">{}</a>",
                    escape_html(url),
                    escape_html(piece.trim())
                ));
                html.push_str(&escape_html(trailing));
            }
            _ => html.push_str(&escape_html(piece)),
        }
    }

    let text = text.trim().to_string();
    if text.is_empty() {
        return None;
    }
    Some(Line {
        text,
        html: html.trim().to_string(),
    })
}

fn render_body(lines: &[Line]) -> String {
    lines.iter().map(|l| format!("<p>{}</p>", l.html)).collect()
}

fn join_text(lines: &[Line], sep: &str) -> String {
    lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join(sep)
}

fn first_link(lines: &[Line]) -> Option<String> {
    static HREF: OnceLock<Regex> = OnceLock::new();
    static URL: OnceLock<Regex> = OnceLock::new();
    let href = HREF.get_or_init(|| Regex::new(r#"href="([^"]+)""#).expect("valid regex"));
    let url = URL.get_or_init(|| Regex::new(r"https?://\S+").expect("valid regex"));

    lines.iter().find_map(|line| {
        href.captures(&line.html)
            .map(|caps| unescape_html(&caps[1]))
            .or_else(|| url.find(&line.text).map(|m| m.as_str().to_string()))
    })
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decode the named entities `escape_html` produces plus numeric ones
/// (`&#039;`, `&#x2019;`). `&amp;` goes last so it is decoded once.
pub(crate) fn unescape_html(text: &str) -> String {
    static NUMERIC: OnceLock<Regex> = OnceLock::new();
    let numeric = NUMERIC.get_or_init(|| Regex::new(r"&#([xX][0-9a-fA-F]+|[0-9]+);").expect("valid regex"));

    let decoded = numeric.replace_all(text, |caps: &regex::Captures| {
        let raw = &caps[1];
        let code = match raw.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    decoded
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
