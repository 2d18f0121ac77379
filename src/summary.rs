// Run summary: what happened to every row, grouped by section.

use std::collections::BTreeMap;

use crossterm::style::Stylize;

use crate::console;
use crate::publisher::Verification;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Published,
    Draft,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowReport {
    pub row: usize,
    pub section: String,
    pub headline: String,
    pub outcome: Outcome,
    pub post_link: Option<String>,
    pub error: Option<String>,
    pub image_note: Option<String>,
    /// Authors beyond the first, which the target cannot attach.
    pub co_authors: Vec<String>,
    pub sheet_note: Option<String>,
    /// Re-read of the created post; `None` when no post was created.
    pub verification: Option<Verification>,
}

impl RowReport {
    pub fn new(row: usize, section: &str, outcome: Outcome) -> Self {
        Self {
            row,
            section: section.to_string(),
            headline: String::new(),
            outcome,
            post_link: None,
            error: None,
            image_note: None,
            co_authors: Vec::new(),
            sheet_note: None,
            verification: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub published: usize,
    pub draft: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.published + self.draft + self.skipped + self.failed
    }

    fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Published => self.published += 1,
            Outcome::Draft => self.draft += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    reports: Vec<RowReport>,
    /// Row at which the operator aborted the run.
    pub aborted_at: Option<usize>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: RowReport) {
        self.reports.push(report);
    }

    pub fn reports(&self) -> &[RowReport] {
        &self.reports
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for report in &self.reports {
            counts.add(report.outcome);
        }
        counts
    }

    /// Reports per section label, sections in alphabetical order.
    pub fn by_section(&self) -> BTreeMap<&str, Vec<&RowReport>> {
        let mut sections: BTreeMap<&str, Vec<&RowReport>> = BTreeMap::new();
        for report in &self.reports {
            sections.entry(report.section.as_str()).or_default().push(report);
        }
        sections
    }

    pub fn section_counts(&self, section: &str) -> Counts {
        let mut counts = Counts::default();
        for report in self.reports.iter().filter(|r| r.section == section) {
            counts.add(report.outcome);
        }
        counts
    }

    pub fn print(&self) {
        console::heading("POSTING SUMMARY BY SECTION");

        for (section, reports) in self.by_section() {
            println!("\n{}", format!("SECTION: {}", section).blue().bold());
            println!("{}", "-".repeat(70));

            let created: Vec<_> = reports
                .iter()
                .filter(|r| matches!(r.outcome, Outcome::Published | Outcome::Draft))
                .collect();
            if !created.is_empty() {
                println!("\n{}", "POSTS CREATED".green().bold());
                for report in created {
                    let status = if report.outcome == Outcome::Published { "Published" } else { "Draft" };
                    println!("\n{}", format!("Row {}: {} ({})", report.row, report.headline, status).bold());
                    if let Some(link) = &report.post_link {
                        println!("  Post URL: {}", link);
                    }
                    if !report.co_authors.is_empty() {
                        println!("  Co-authors to add manually: {}", report.co_authors.join(", "));
                    }
                    if let Some(note) = &report.image_note {
                        println!("  Featured image: {}", note);
                    }
                    if let Some(note) = &report.sheet_note {
                        println!("  Spreadsheet: {}", note);
                    }
                    match &report.verification {
                        Some(Verification::Verified) => println!("  Post check: {}", "verified".green()),
                        Some(other) => println!("  Post check: {}", other.to_string().yellow()),
                        None => {}
                    }
                }
            }

            let skipped: Vec<_> = reports.iter().filter(|r| r.outcome == Outcome::Skipped).collect();
            if !skipped.is_empty() {
                println!("\n{}", "SKIPPED POSTS".blue().bold());
                for report in skipped {
                    println!("Row {}: {}", report.row, report.headline);
                }
            }

            let failed: Vec<_> = reports.iter().filter(|r| r.outcome == Outcome::Failed).collect();
            if !failed.is_empty() {
                println!("\n{}", "POSTS WITH ERRORS".red().bold());
                for report in failed {
                    println!("\n{}", format!("Row {}: {}", report.row, report.headline).bold());
                    println!("{}", format!("  Error: {}", report.error.as_deref().unwrap_or("unknown")).red());
                    println!("{}", "  Action needed: Manual posting required".yellow());
                }
            }

            let c = self.section_counts(section);
            println!(
                "\n{} {} published, {} draft, {} skipped, {} failed",
                format!("Section '{}' summary:", section).bold(),
                c.published,
                c.draft,
                c.skipped,
                c.failed
            );
        }

        let counts = self.counts();
        let total = counts.total();
        let pct = |n: usize| if total > 0 { n as f64 / total as f64 * 100.0 } else { 0.0 };

        console::heading("OVERALL SUMMARY");
        println!("{} {}", "Total sections:".bold(), self.by_section().len());
        println!("{} {}", "Total posts processed:".bold(), total);
        println!("{} {} ({:.1}%)", "Published:".bold(), counts.published, pct(counts.published));
        println!("{} {} ({:.1}%)", "Draft:".bold(), counts.draft, pct(counts.draft));
        println!("{} {} ({:.1}%)", "Skipped:".bold(), counts.skipped, pct(counts.skipped));
        println!("{} {} ({:.1}%)", "Failed:".bold(), counts.failed, pct(counts.failed));
        if let Some(row) = self.aborted_at {
            println!("{}", format!("Run aborted by operator at row {}", row).red());
        }
        println!("{}\n", "=".repeat(70).blue().bold());
    }
}
