// Headline and cutline option documents.
//
// The desk keeps shared documents listing the headlines and cutlines written
// for the whole edition, one `slug: text` line per story, grouped under lines
// ending in `:`. The operator picks from these when a story document has no
// headline or cutline of its own.

use crate::document::Document;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineOption {
    pub slug: String,
    pub text: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutlineOption {
    pub slug: String,
    pub text: String,
    pub credit: Option<String>,
    pub group: String,
}

impl CutlineOption {
    /// Cutline text with the photo credit appended, as it goes on the image.
    pub fn full_text(&self) -> String {
        match &self.credit {
            Some(credit) => format!("{} PHOTO CREDIT: {}", self.text, credit),
            None => self.text.clone(),
        }
    }
}

const DEFAULT_GROUP: &str = "Uncategorized";

fn lines(document: &Document) -> Vec<String> {
    document
        .paragraphs
        .iter()
        .map(|p| p.text().trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Walk the lines after the `title` line, yielding `(group, slug, text)`.
/// An `Insides` block (sample entries) is skipped until the title line.
fn entries(document: &Document, title: &str) -> Vec<(String, String, String)> {
    let mut out = Vec::new();
    let mut group = DEFAULT_GROUP.to_string();
    let mut active = false;

    for line in lines(document) {
        if line.eq_ignore_ascii_case("insides") {
            active = false;
            continue;
        }
        if line.eq_ignore_ascii_case(title) {
            active = true;
            group = DEFAULT_GROUP.to_string();
            continue;
        }
        if !active {
            continue;
        }

        let line = line.trim_start_matches('*').trim();
        if let Some(header) = line.strip_suffix(':') {
            if !header.contains(':') {
                group = header.trim().to_string();
                continue;
            }
        }

        if let Some((slug, text)) = line.split_once(':') {
            let (slug, text) = (slug.trim(), text.trim());
            if !slug.is_empty() && !text.is_empty() {
                out.push((group.clone(), slug.to_string(), text.to_string()));
            }
        }
    }
    out
}

pub fn parse_headline_options(document: &Document) -> Vec<HeadlineOption> {
    entries(document, "headlines")
        .into_iter()
        .map(|(group, slug, text)| {
            let text = match text.split_once("SH:") {
                Some((main, sub)) => format!("{}: {}", main.trim(), sub.trim()),
                None => text,
            };
            HeadlineOption { slug, text, group }
        })
        .collect()
}

pub fn parse_cutline_options(document: &Document) -> Vec<CutlineOption> {
    entries(document, "cutlines")
        .into_iter()
        .map(|(group, slug, text)| {
            let split = text
                .split_once("PHOTO CREDITS")
                .or_else(|| text.split_once("PHOTO CREDIT"));
            let (text, credit) = match split {
                Some((body, credit)) => {
                    let credit = credit.trim().trim_start_matches(':').trim();
                    (
                        body.trim().to_string(),
                        Some(credit.to_string()).filter(|c| !c.is_empty()),
                    )
                }
                None => (text.clone(), None),
            };
            CutlineOption {
                slug,
                text,
                credit,
                group,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Paragraph, TextRun};

    fn doc(lines: &[&str]) -> Document {
        Document {
            paragraphs: lines.iter().map(|l| Paragraph::new(vec![TextRun::plain(l)])).collect(),
        }
    }

    #[test]
    fn test_headline_options_grouped() {
        let document = doc(&[
            "Insides",
            "sample: Not a real headline",
            "Headlines",
            "NEWS:",
            "river: Volunteers clear the river",
            "budget: Council passes budget SH: Taxes hold steady",
            "SPORTS:",
            "finals: Tigers win title",
            "a line without a colon",
        ]);

        let options = parse_headline_options(&document);
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].slug, "river");
        assert_eq!(options[0].group, "NEWS");
        assert_eq!(options[1].text, "Council passes budget: Taxes hold steady");
        assert_eq!(options[2].group, "SPORTS");
    }

    #[test]
    fn test_no_title_line_means_no_options() {
        let document = doc(&["river: Volunteers clear the river"]);
        assert!(parse_headline_options(&document).is_empty());
    }

    #[test]
    fn test_cutline_options_with_credit() {
        let document = doc(&[
            "Cutlines",
            "NEWS:",
            "*river: Volunteers haul debris. PHOTO CREDIT: Sam Ortiz",
            "budget: The council chamber. PHOTO CREDITS: Lee Park and Jo Kim",
            "plain: No credit here",
        ]);

        let options = parse_cutline_options(&document);
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].slug, "river");
        assert_eq!(options[0].text, "Volunteers haul debris.");
        assert_eq!(options[0].credit.as_deref(), Some("Sam Ortiz"));
        assert_eq!(options[0].full_text(), "Volunteers haul debris. PHOTO CREDIT: Sam Ortiz");
        assert_eq!(options[1].credit.as_deref(), Some("Lee Park and Jo Kim"));
        assert_eq!(options[2].credit, None);
    }
}
