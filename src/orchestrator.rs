// Orchestrator: walks the eligible rows one at a time and drives each through
// parse, fill-in prompts, image, review and publish.
//
// A failing row is logged and recorded, then the loop moves on. Only the
// operator's abort (or a dead terminal) ends the loop early.

use crate::console;
use crate::document::{document_id, parse_document, Document, DocumentSource, ParsedDocument};
use crate::error::{CopydeskError, Result};
use crate::image::{fetch_image, upload_image, ImageSource, MediaAsset, RetryPolicy};
use crate::options::{parse_cutline_options, parse_headline_options, CutlineOption, HeadlineOption};
use crate::publisher::{PostPayload, PostStatus, Publisher, PublishTarget, Verification};
use crate::review::{read_decision, show_review, Decision, ImageFallback, KeySource, Prompter, ReviewCard};
use crate::source::{get_eligible_rows, Row, SheetSource};
use crate::summary::{Outcome, RowReport, RunSummary};

const HEADLINE_PREVIEW_CHARS: usize = 300;

enum Step {
    Continue,
    Abort,
}

/// An uploaded featured image and where it came from.
struct Featured {
    media_id: u64,
    source: String,
}

pub struct Orchestrator<'a> {
    sheets: &'a dyn SheetSource,
    documents: &'a dyn DocumentSource,
    images: &'a dyn ImageSource,
    publisher: Publisher<'a>,
    keys: &'a mut dyn KeySource,
    prompter: &'a mut dyn Prompter,
    retry: RetryPolicy,
    headline_options: Vec<HeadlineOption>,
    cutline_options: Vec<CutlineOption>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        sheets: &'a dyn SheetSource,
        documents: &'a dyn DocumentSource,
        images: &'a dyn ImageSource,
        target: &'a dyn PublishTarget,
        keys: &'a mut dyn KeySource,
        prompter: &'a mut dyn Prompter,
    ) -> Self {
        Self {
            sheets,
            documents,
            images,
            publisher: Publisher::new(target),
            keys,
            prompter,
            retry: RetryPolicy::default(),
            headline_options: Vec::new(),
            cutline_options: Vec::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Process every eligible row of the sheet. Only a sheet that cannot be
    /// read is an error; row failures end up in the summary.
    pub fn run(&mut self, sheet_id: &str) -> Result<RunSummary> {
        let spinner = console::spinner("Reading spreadsheet...");
        let rows = get_eligible_rows(self.sheets, sheet_id);
        spinner.finish_and_clear();
        let rows = rows?;

        let mut summary = RunSummary::new();
        let Some(first) = rows.first() else {
            console::info("No rows are ready to post.");
            return Ok(summary);
        };
        console::info(&format!("Found {} row(s) ready to post", rows.len()));
        self.load_options(first);

        for row in &rows {
            let mut report = RowReport::new(row.number, &row.section, Outcome::Failed);
            report.headline = "Untitled".to_string();

            match self.process_row(sheet_id, row, &mut report) {
                Ok(Step::Continue) => summary.record(report),
                Ok(Step::Abort) => {
                    tracing::info!(row = row.number, "Run aborted by operator");
                    summary.aborted_at = Some(row.number);
                    break;
                }
                Err(e) => {
                    tracing::error!(row = row.number, error = %e, "Row failed");
                    console::error(&format!("Row {}: {}", row.number, e));
                    report.outcome = Outcome::Failed;
                    report.error = Some(e.to_string());
                    summary.record(report);
                    if matches!(e, CopydeskError::Terminal(_)) {
                        summary.aborted_at = Some(row.number);
                        break;
                    }
                }
            }
        }
        Ok(summary)
    }

    fn load_options(&mut self, row: &Row) {
        if let Some(link) = &row.headlines_link {
            match self.option_document(link) {
                Ok(doc) => self.headline_options = parse_headline_options(&doc),
                Err(e) => {
                    tracing::warn!(error = %e, "Headline options unavailable");
                    console::warning(&format!("Could not read the headlines document: {}", e));
                }
            }
        }
        if let Some(link) = &row.cutlines_link {
            match self.option_document(link) {
                Ok(doc) => self.cutline_options = parse_cutline_options(&doc),
                Err(e) => {
                    tracing::warn!(error = %e, "Cutline options unavailable");
                    console::warning(&format!("Could not read the cutlines document: {}", e));
                }
            }
        }
        tracing::debug!(
            headlines = self.headline_options.len(),
            cutlines = self.cutline_options.len(),
            "Loaded option documents"
        );
    }

    fn option_document(&self, link: &str) -> Result<Document> {
        let id = document_id(link)?;
        self.documents.fetch_document(&id)
    }

    fn process_row(&mut self, sheet_id: &str, row: &Row, report: &mut RowReport) -> Result<Step> {
        console::info(&format!("Processing row {} ({})", row.number, row.section));

        let doc_id = document_id(&row.document_link)?;
        let spinner = console::spinner("Reading document...");
        let parsed = parse_document(self.documents, &doc_id);
        spinner.finish_and_clear();
        let mut parsed = parsed?;
        parsed.apply_row_defaults(row);

        self.fill_redaction(&mut parsed)?;
        self.fill_headline(&mut parsed)?;
        report.headline = parsed.headline.clone();

        let image_link = row.image_link.clone().or_else(|| parsed.featured_image_link.clone());
        if image_link.is_some() && parsed.cutline.trim().is_empty() {
            parsed.cutline = self.prompter.cutline(&self.cutline_options, &parsed.headline)?;
        }
        let featured = match image_link {
            Some(link) => self.featured_image(link, &parsed.cutline, &doc_id, report)?,
            None => None,
        };

        let authors = self.publisher.resolve_authors(&parsed.authors)?;
        let categories = self.publisher.resolve_categories(&parsed.categories)?;
        report.co_authors = parsed.authors.iter().skip(1).cloned().collect();

        show_review(&ReviewCard {
            row: row.number,
            section: &row.section,
            headline: &parsed.headline,
            authors: &parsed.authors,
            categories: &parsed.categories,
            image: featured.as_ref().map(|f| f.source.as_str()),
            cutline: &parsed.cutline,
            redaction: &parsed.redaction,
        });

        let status = match read_decision(self.keys)? {
            Decision::Abort => {
                console::warning("Exiting program...");
                return Ok(Step::Abort);
            }
            Decision::Skip => {
                console::info(&format!("Skipped row {}", row.number));
                report.outcome = Outcome::Skipped;
                return Ok(Step::Continue);
            }
            Decision::Publish => PostStatus::Publish,
            Decision::Draft => PostStatus::Draft,
        };

        let payload = PostPayload {
            title: parsed.headline.clone(),
            content: parsed.body_html.clone(),
            status,
            featured_media: featured.as_ref().map(|f| f.media_id),
            authors,
            categories,
        };
        let spinner = console::spinner("Creating post...");
        let created = self.publisher.create_post(&payload);
        spinner.finish_and_clear();
        let created = created?;

        report.outcome = match status {
            PostStatus::Publish => Outcome::Published,
            PostStatus::Draft => Outcome::Draft,
        };
        report.post_link = created.link.clone();
        console::success(&format!(
            "Created {} post {}: {}",
            status,
            created.id,
            created.link.as_deref().unwrap_or("(no link returned)")
        ));

        let verification = self.publisher.verify_post(created.id, &payload);
        match &verification {
            Verification::Verified => console::success("Featured image and categories verified"),
            other => console::warning(&format!("Post {}", other)),
        }
        report.verification = Some(verification);

        // The post exists at this point, so a failed write-back is only a note.
        match self.sheets.mark_online(sheet_id, row.number) {
            Ok(()) => report.sheet_note = Some("marked online".to_string()),
            Err(e) => {
                tracing::warn!(row = row.number, error = %e, "Online flag not written");
                console::warning(&format!("Post created but the sheet was not updated: {}", e));
                report.sheet_note = Some(format!("online flag not set: {}", e));
            }
        }
        Ok(Step::Continue)
    }

    fn fill_redaction(&mut self, parsed: &mut ParsedDocument) -> Result<()> {
        if !parsed.redaction.trim().is_empty() {
            return Ok(());
        }
        console::warning("No Redaction section found in the document.");
        if let Some(start) = self.prompter.redaction_start(&parsed.paragraphs)? {
            parsed.set_redaction_from(start);
        }
        if parsed.redaction.trim().is_empty() {
            return Err(CopydeskError::DocumentAccess(
                "document has no body text; post it by hand".to_string(),
            ));
        }
        Ok(())
    }

    fn fill_headline(&mut self, parsed: &mut ParsedDocument) -> Result<()> {
        if !parsed.headline.trim().is_empty() {
            return Ok(());
        }
        console::warning("No Headline section found in the document.");
        let preview: String = parsed.redaction.chars().take(HEADLINE_PREVIEW_CHARS).collect();
        let headline = self.prompter.headline(&self.headline_options, &preview)?;
        if headline.trim().is_empty() {
            return Err(CopydeskError::DocumentAccess("no headline given".to_string()));
        }
        parsed.headline = headline.trim().to_string();
        Ok(())
    }

    /// Fetch and upload the featured image, offering the fallback menu after
    /// every failure. Image trouble never fails the row.
    fn featured_image(
        &mut self,
        link: String,
        caption: &str,
        stem: &str,
        report: &mut RowReport,
    ) -> Result<Option<Featured>> {
        let mut choice = ImageFallback::DriveLink(link);
        loop {
            let (asset, source) = match &choice {
                ImageFallback::DriveLink(link) => {
                    let spinner = console::spinner("Downloading featured image...");
                    let asset = fetch_image(self.images, link, caption, stem);
                    spinner.finish_and_clear();
                    (asset, link.clone())
                }
                ImageFallback::LocalFile(path) => {
                    let asset = match MediaAsset::from_path(path, caption) {
                        Ok(asset) => Some(asset),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "Local image unusable");
                            None
                        }
                    };
                    (asset, path.display().to_string())
                }
                ImageFallback::Skip => {
                    report.image_note = Some("none (skipped by operator)".to_string());
                    return Ok(None);
                }
            };

            match asset {
                Some(asset) => {
                    let spinner = console::spinner("Uploading featured image...");
                    let uploaded = upload_image(self.publisher.target(), &asset, &self.retry);
                    spinner.finish_and_clear();
                    match uploaded {
                        Ok(media_id) => {
                            console::success(&format!("Featured image uploaded ({})", asset.filename));
                            report.image_note = Some(format!("uploaded from {}", source));
                            return Ok(Some(Featured { media_id, source }));
                        }
                        Err(e) => console::warning(&format!("Image upload failed: {}", e)),
                    }
                }
                None => console::warning(&format!("Could not use the image at {}", source)),
            }

            choice = self.prompter.image_fallback()?;
        }
    }
}
