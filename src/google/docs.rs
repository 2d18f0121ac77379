use std::sync::Arc;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::auth::TokenProvider;
use crate::document::{Document, DocumentSource, Paragraph, TextRun};
use crate::error::{CopydeskError, Result};

const DOCS_URL: &str = "https://docs.googleapis.com/v1/documents";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocResponse {
    #[serde(default)]
    body: Option<Body>,
    #[serde(default)]
    tabs: Vec<Tab>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tab {
    #[serde(default)]
    document_tab: Option<DocumentTab>,
    #[serde(default)]
    child_tabs: Vec<Tab>,
}

#[derive(Debug, Default, Deserialize)]
struct DocumentTab {
    #[serde(default)]
    body: Option<Body>,
}

#[derive(Debug, Default, Deserialize)]
struct Body {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Default, Deserialize)]
struct StructuralElement {
    #[serde(default)]
    paragraph: Option<ParagraphElement>,
}

#[derive(Debug, Default, Deserialize)]
struct ParagraphElement {
    #[serde(default)]
    elements: Vec<ParagraphRun>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphRun {
    #[serde(default)]
    text_run: Option<ApiTextRun>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTextRun {
    #[serde(default)]
    content: String,
    #[serde(default)]
    text_style: Option<TextStyle>,
}

#[derive(Debug, Default, Deserialize)]
struct TextStyle {
    #[serde(default)]
    link: Option<Link>,
}

#[derive(Debug, Default, Deserialize)]
struct Link {
    #[serde(default)]
    url: Option<String>,
}

impl DocResponse {
    /// Paragraphs of every tab in order, or of the body for untabbed documents.
    fn into_document(self) -> Document {
        let mut paragraphs = Vec::new();
        if self.tabs.is_empty() {
            if let Some(body) = self.body {
                collect_body(body, &mut paragraphs);
            }
        } else {
            for tab in self.tabs {
                collect_tab(tab, &mut paragraphs);
            }
        }
        Document { paragraphs }
    }
}

fn collect_tab(tab: Tab, out: &mut Vec<Paragraph>) {
    if let Some(body) = tab.document_tab.and_then(|t| t.body) {
        collect_body(body, out);
    }
    for child in tab.child_tabs {
        collect_tab(child, out);
    }
}

fn collect_body(body: Body, out: &mut Vec<Paragraph>) {
    for element in body.content {
        let Some(paragraph) = element.paragraph else {
            continue;
        };
        let runs = paragraph
            .elements
            .into_iter()
            .filter_map(|e| e.text_run)
            .map(|run| TextRun {
                text: run.content.trim_end_matches('\n').to_string(),
                link: run.text_style.and_then(|s| s.link).and_then(|l| l.url),
            })
            .collect();
        out.push(Paragraph::new(runs));
    }
}

/// Blocking Google Docs client.
pub struct DocsClient {
    client: Client,
    tokens: Arc<TokenProvider>,
}

impl DocsClient {
    pub fn new(client: Client, tokens: Arc<TokenProvider>) -> Self {
        Self { client, tokens }
    }
}

impl DocumentSource for DocsClient {
    fn fetch_document(&self, doc_id: &str) -> Result<Document> {
        let token = self
            .tokens
            .token()
            .map_err(|e| CopydeskError::DocumentAccess(e.to_string()))?;
        let url = format!("{}/{}", DOCS_URL, doc_id);

        let res = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(&[("includeTabsContent", "true")])
            .send()
            .map_err(|e| CopydeskError::DocumentAccess(format!("failed to send document request: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            return Err(CopydeskError::DocumentAccess(format!(
                "document {}: {} - {}",
                doc_id, status, txt
            )));
        }

        let doc: DocResponse = res
            .json()
            .map_err(|e| CopydeskError::DocumentAccess(format!("unreadable document {}: {}", doc_id, e)))?;
        tracing::debug!(doc_id, tabs = doc.tabs.len(), "Fetched document");
        Ok(doc.into_document())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tabbed_document_with_links() {
        let raw = r#"{
            "tabs": [
                {"documentTab": {"body": {"content": [
                    {"sectionBreak": {}},
                    {"paragraph": {"elements": [
                        {"textRun": {"content": "Headline: "}},
                        {"textRun": {"content": "Win", "textStyle": {"link": {"url": "https://example.com/"}}}},
                        {"textRun": {"content": "\n"}}
                    ]}}
                ]}},
                 "childTabs": [
                    {"documentTab": {"body": {"content": [
                        {"paragraph": {"elements": [{"textRun": {"content": "Redaction: Body\n"}}]}}
                    ]}}}
                 ]}
            ]
        }"#;

        let doc: DocResponse = serde_json::from_str(raw).unwrap();
        let document = doc.into_document();
        assert_eq!(document.paragraphs.len(), 2);
        assert_eq!(document.paragraphs[0].text(), "Headline: Win");
        assert_eq!(document.paragraphs[0].runs[1].link.as_deref(), Some("https://example.com/"));
        assert_eq!(document.paragraphs[1].text(), "Redaction: Body");
    }

    #[test]
    fn test_untabbed_document_uses_body() {
        let raw = r#"{"body": {"content": [
            {"paragraph": {"elements": [{"textRun": {"content": "Only line\n"}}]}}
        ]}}"#;

        let doc: DocResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.into_document().paragraphs[0].text(), "Only line");
    }
}
