// Entrypoint for the CLI application.
// - Configuration is read before anything is prompted, so a missing variable
//   fails fast with a non-zero exit.
// - Returns `anyhow::Result` to keep top-level error handling simple.

use std::time::Duration;

use anyhow::Context;
use reqwest::blocking::Client;
use tracing_subscriber::EnvFilter;

use copydesk::config::Config;
use copydesk::console;
use copydesk::google::GoogleClients;
use copydesk::orchestrator::Orchestrator;
use copydesk::review::{prompt_sheet_url, TerminalKeys, TerminalPrompter};
use copydesk::source::sheet_id_from_url;
use copydesk::wordpress::WordPressClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let spinner = console::spinner("Connecting to Google and WordPress...");
    let connected = GoogleClients::connect(client.clone(), &config).and_then(|google| {
        let wordpress = WordPressClient::new(client, &config)?;
        wordpress.verify_credentials()?;
        Ok((google, wordpress))
    });
    spinner.finish_and_clear();
    let (google, wordpress) = connected?;
    console::success("Connected");

    let sheet_id = sheet_id_from_url(&prompt_sheet_url()?)?;

    let mut keys = TerminalKeys;
    let mut prompter = TerminalPrompter;
    let summary = Orchestrator::new(
        &google.sheets,
        &google.docs,
        &google.drive,
        &wordpress,
        &mut keys,
        &mut prompter,
    )
    .run(&sheet_id)?;

    summary.print();
    Ok(())
}
