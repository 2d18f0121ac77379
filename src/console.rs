use std::time::Duration;

use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message.green());
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message.blue());
}

/// Print a warning message
pub fn warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message.yellow());
}

/// Print an error message
pub fn error(message: &str) {
    println!("{} {}", "✗".red(), message.red());
}

/// Print a bold heading between rules
pub fn heading(title: &str) {
    println!("\n{}", "=".repeat(70).blue().bold());
    println!("{}", title.blue().bold());
    println!("{}", "=".repeat(70).blue().bold());
}

/// Start a spinner for a blocking network call.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
