// Interactive Review: the operator's side of a run.
//
// Two kinds of input are needed. The publish decision is a single keypress
// read in raw mode (no echo, no Enter), behind `KeySource`. Everything else
// (picking a headline, a cutline, where the body starts, a replacement image)
// is a line-oriented `dialoguer` prompt behind `Prompter`. Both traits exist
// so the orchestrator can be driven by scripted input in tests.

use std::path::PathBuf;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal;
use dialoguer::{Input, Select};

use crate::console;
use crate::document::Line;
use crate::error::Result;
use crate::options::{CutlineOption, HeadlineOption};

const DEFAULT_REDACTION_START: usize = 4;
const PREVIEW_LINES: usize = 9;
const PREVIEW_WIDTH: usize = 100;
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "heic", "heif"];

/// What the operator decided for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Publish,
    Draft,
    Skip,
    Abort,
}

/// ENTER publishes, BACKSPACE drafts, SPACE skips, ESC aborts.
pub fn decision_for_key(key: KeyCode) -> Option<Decision> {
    match key {
        KeyCode::Enter => Some(Decision::Publish),
        KeyCode::Backspace => Some(Decision::Draft),
        KeyCode::Char(' ') => Some(Decision::Skip),
        KeyCode::Esc => Some(Decision::Abort),
        _ => None,
    }
}

/// Source of single keypresses.
pub trait KeySource {
    fn read_key(&mut self) -> Result<KeyCode>;
}

/// Reads keys from the terminal in raw mode. Ctrl-C is reported as ESC,
/// since raw mode swallows the interrupt signal. Ctrl-H (what some
/// terminals send for Backspace) is reported as Backspace.
pub struct TerminalKeys;

impl KeySource for TerminalKeys {
    fn read_key(&mut self) -> Result<KeyCode> {
        terminal::enable_raw_mode()?;
        let key = next_key_press();
        terminal::disable_raw_mode()?;
        key
    }
}

fn next_key_press() -> Result<KeyCode> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            return Ok(normalize_key(key));
        }
    }
}

fn normalize_key(key: KeyEvent) -> KeyCode {
    if !key.modifiers.contains(KeyModifiers::CONTROL) {
        return key.code;
    }
    match key.code {
        KeyCode::Char('c') => KeyCode::Esc,
        KeyCode::Char('h') => KeyCode::Backspace,
        code => code,
    }
}

/// Block until one of the four decision keys is pressed.
pub fn read_decision(keys: &mut dyn KeySource) -> Result<Decision> {
    loop {
        println!("\nWaiting for command...");
        let key = keys.read_key()?;
        match decision_for_key(key) {
            Some(decision) => return Ok(decision),
            None => console::warning("Unknown command. Please use ENTER, BACKSPACE, SPACE, or ESC."),
        }
    }
}

/// How to continue after the featured image could not be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFallback {
    DriveLink(String),
    LocalFile(PathBuf),
    Skip,
}

/// Line-oriented operator prompts.
pub trait Prompter {
    /// Headline for a story whose document has none. Empty means none given.
    fn headline(&mut self, options: &[HeadlineOption], preview: &str) -> Result<String>;

    /// Cutline for the featured image. Empty is allowed.
    fn cutline(&mut self, options: &[CutlineOption], headline: &str) -> Result<String>;

    /// Index (0-based) of the paragraph where the body starts, or `None` to
    /// give up on the row.
    fn redaction_start(&mut self, paragraphs: &[Line]) -> Result<Option<usize>>;

    fn image_fallback(&mut self) -> Result<ImageFallback>;
}

/// `Prompter` on the real terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn headline(&mut self, options: &[HeadlineOption], preview: &str) -> Result<String> {
        println!("\n{}", "Redaction preview:".bold());
        println!("{}", truncate(preview, 150));

        if options.is_empty() {
            console::warning("No headline options found. Please enter a headline manually:");
            let typed: String = Input::new().with_prompt("Headline").allow_empty(true).interact_text()?;
            return Ok(typed.trim().to_string());
        }

        println!("\n{}", "What is the headline of this post?".bold());
        let mut group = "";
        for (i, option) in options.iter().enumerate() {
            if option.group != group {
                group = &option.group;
                println!("\n{}", format!("{}:", group).bold());
            }
            println!("{}. {}: {}", i + 1, option.slug, option.text);
        }

        let typed: String = Input::new()
            .with_prompt(format!("Enter number (1-{}) or type a custom headline", options.len()))
            .allow_empty(true)
            .interact_text()?;
        Ok(pick(&typed, options, |o| o.text.clone()))
    }

    fn cutline(&mut self, options: &[CutlineOption], headline: &str) -> Result<String> {
        println!("\n{}", "What is the cutline for the featured image?".bold());
        println!("{}", format!("(For headline: {})", headline).blue());

        let mut group = "";
        for (i, option) in options.iter().enumerate() {
            if option.group != group {
                group = &option.group;
                println!("\n{}", format!("{}:", group).bold());
            }
            println!("{}. {}: {}", i + 1, option.slug, option.full_text());
        }

        let prompt = if options.is_empty() {
            "Enter a cutline or press Enter to skip".to_string()
        } else {
            format!("Enter number (1-{}), a custom cutline, or Enter to skip", options.len())
        };
        let typed: String = Input::new().with_prompt(prompt).allow_empty(true).interact_text()?;
        Ok(pick(&typed, options, CutlineOption::full_text))
    }

    fn redaction_start(&mut self, paragraphs: &[Line]) -> Result<Option<usize>> {
        if paragraphs.is_empty() {
            console::warning("Document appears to be empty");
            return Ok(None);
        }

        let shown = paragraphs.len().min(PREVIEW_LINES);
        println!("\n{}", format!("First {} lines of the redaction document:", shown).blue().bold());
        for (i, line) in paragraphs.iter().take(shown).enumerate() {
            println!("{}. {}", i + 1, truncate(&line.text, PREVIEW_WIDTH));
        }

        let default = DEFAULT_REDACTION_START.min(paragraphs.len());
        loop {
            let typed: String = Input::new()
                .with_prompt("Where does the redaction start? (line number, 0 to skip the row)")
                .default(default.to_string())
                .interact_text()?;
            match typed.trim().parse::<usize>() {
                Ok(0) => return Ok(None),
                Ok(n) if n <= paragraphs.len() => return Ok(Some(n - 1)),
                _ => console::warning(&format!(
                    "Invalid input. Please enter a valid line number (1-{}):",
                    paragraphs.len()
                )),
            }
        }
    }

    fn image_fallback(&mut self) -> Result<ImageFallback> {
        let items = [
            "Enter a new Google Drive URL",
            "Pick a local file",
            "Skip image upload (continue without image)",
        ];
        println!("\n{}", "Image upload fallback options:".yellow().bold());
        let selection = Select::new().items(&items).default(2).interact()?;
        match selection {
            0 => {
                let url: String = Input::new()
                    .with_prompt("New Google Drive URL")
                    .allow_empty(true)
                    .interact_text()?;
                if url.trim().is_empty() {
                    console::warning("No URL provided. Skipping image upload.");
                    return Ok(ImageFallback::Skip);
                }
                Ok(ImageFallback::DriveLink(url.trim().to_string()))
            }
            1 => {
                // The native dialog is unavailable over SSH; fall back to a typed path.
                let picked = rfd::FileDialog::new()
                    .set_title("Featured image")
                    .add_filter("Images", IMAGE_EXTENSIONS)
                    .pick_file();
                let path = match picked {
                    Some(path) => path,
                    None => {
                        let typed: String = Input::new()
                            .with_prompt("Local file path")
                            .allow_empty(true)
                            .interact_text()?;
                        if typed.trim().is_empty() {
                            return Ok(ImageFallback::Skip);
                        }
                        PathBuf::from(typed.trim())
                    }
                };
                Ok(ImageFallback::LocalFile(path))
            }
            _ => Ok(ImageFallback::Skip),
        }
    }
}

/// A number selects an option, anything else is taken literally.
fn pick<T>(typed: &str, options: &[T], text: impl Fn(&T) -> String) -> String {
    let typed = typed.trim();
    match typed.parse::<usize>() {
        Ok(n) if n >= 1 && n <= options.len() => text(&options[n - 1]),
        _ => typed.to_string(),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        format!("{}...", text.chars().take(width).collect::<String>())
    } else {
        text.to_string()
    }
}

/// What the operator sees before deciding.
#[derive(Debug, Clone)]
pub struct ReviewCard<'a> {
    pub row: usize,
    pub section: &'a str,
    pub headline: &'a str,
    pub authors: &'a [String],
    pub categories: &'a [String],
    pub image: Option<&'a str>,
    pub cutline: &'a str,
    pub redaction: &'a str,
}

pub fn show_review(card: &ReviewCard<'_>) {
    console::heading(&format!("POST REVIEW - ROW {} - SECTION: {}", card.row, card.section));

    println!("\n{}", "Headline:".bold());
    println!("{}", card.headline);

    println!("\n{}", "Authors:".bold());
    if card.authors.is_empty() {
        println!("{}", "  No authors specified".yellow());
    }
    for (i, author) in card.authors.iter().enumerate() {
        println!("  {}{}", if i == 0 { "Primary: " } else { "Co-author: " }, author);
    }

    println!("\n{}", "Categories:".bold());
    for category in card.categories {
        println!("  {}", category);
    }

    println!("\n{}", "Featured Image:".bold());
    match card.image {
        Some(source) => {
            println!("{}", "  Image available".green());
            println!("  Source: {}", source);
            if !card.cutline.is_empty() {
                println!("\n{}", "Cutlines:".bold());
                println!("  {}", card.cutline);
            }
        }
        None => println!("{}", "  No image available".yellow()),
    }

    println!("\n{}", "Content:".bold());
    let lines: Vec<&str> = card.redaction.lines().filter(|l| !l.trim().is_empty()).collect();
    for line in lines.iter().take(5) {
        println!("  {}", truncate(line, PREVIEW_WIDTH));
    }
    if lines.len() > 5 {
        println!("  {}", format!("... and {} more lines ...", lines.len() - 5).yellow());
    }

    println!("\n{}", "-".repeat(70).blue().bold());
    println!("ACTIONS:");
    println!("{} Publish post and continue", "[ENTER]".green());
    println!("{} Create as draft and continue", "[BACKSPACE]".yellow());
    println!("{} Skip this post and continue", "[SPACEBAR]".blue());
    println!("{} Exit program", "[ESC]".red());
    println!("{}", "-".repeat(70).blue().bold());
}

/// Ask for the spreadsheet URL at startup.
pub fn prompt_sheet_url() -> Result<String> {
    let url: String = Input::new().with_prompt("Enter Google Sheets URL").interact_text()?;
    Ok(url.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// Replays a fixed sequence of keys.
    struct ScriptedKeys(Vec<KeyCode>);

    impl KeySource for ScriptedKeys {
        fn read_key(&mut self) -> Result<KeyCode> {
            Ok(self.0.remove(0))
        }
    }

    #[rstest]
    #[case(KeyCode::Enter, Some(Decision::Publish))]
    #[case(KeyCode::Backspace, Some(Decision::Draft))]
    #[case(KeyCode::Char(' '), Some(Decision::Skip))]
    #[case(KeyCode::Esc, Some(Decision::Abort))]
    #[case(KeyCode::Char('q'), None)]
    #[case(KeyCode::Tab, None)]
    fn test_decision_for_key(#[case] key: KeyCode, #[case] expected: Option<Decision>) {
        assert_eq!(decision_for_key(key), expected);
    }

    #[rstest]
    #[case(KeyCode::Char('c'), KeyModifiers::CONTROL, KeyCode::Esc)]
    #[case(KeyCode::Char('h'), KeyModifiers::CONTROL, KeyCode::Backspace)]
    #[case(KeyCode::Char('h'), KeyModifiers::NONE, KeyCode::Char('h'))]
    #[case(KeyCode::Backspace, KeyModifiers::NONE, KeyCode::Backspace)]
    #[case(KeyCode::Enter, KeyModifiers::CONTROL, KeyCode::Enter)]
    fn test_normalize_key(#[case] code: KeyCode, #[case] modifiers: KeyModifiers, #[case] expected: KeyCode) {
        assert_eq!(normalize_key(KeyEvent::new(code, modifiers)), expected);
    }

    #[test]
    fn test_ctrl_h_chooses_draft() {
        let key = normalize_key(KeyEvent::new(KeyCode::Char('h'), KeyModifiers::CONTROL));
        assert_eq!(decision_for_key(key), Some(Decision::Draft));
    }

    #[test]
    fn test_unknown_keys_reprompt() {
        let mut keys = ScriptedKeys(vec![KeyCode::Char('x'), KeyCode::Up, KeyCode::Backspace, KeyCode::Enter]);
        assert_eq!(read_decision(&mut keys).unwrap(), Decision::Draft);
        assert_eq!(keys.0, vec![KeyCode::Enter]);
    }

    #[test]
    fn test_pick_by_number_or_text() {
        let options = vec!["first".to_string(), "second".to_string()];
        assert_eq!(pick("2", &options, |o| o.clone()), "second");
        assert_eq!(pick(" 3 ", &options, |o| o.clone()), "3");
        assert_eq!(pick("0", &options, |o| o.clone()), "0");
        assert_eq!(pick("Custom head", &options, |o| o.clone()), "Custom head");
        assert_eq!(pick("", &options, |o| o.clone()), "");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }
}
