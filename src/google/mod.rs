// Google Workspace clients: Sheets for the tracking spreadsheet, Docs for
// story documents, Drive for featured images. All three share one token
// provider built from the service-account key.

pub mod auth;
pub mod docs;
pub mod drive;
pub mod sheets;

use std::sync::Arc;

use reqwest::blocking::Client;

use crate::config::Config;
use crate::error::Result;

use auth::{ServiceAccountKey, TokenProvider};
use docs::DocsClient;
use drive::DriveClient;
use sheets::SheetsClient;

pub struct GoogleClients {
    pub sheets: SheetsClient,
    pub docs: DocsClient,
    pub drive: DriveClient,
}

impl GoogleClients {
    pub fn connect(client: Client, config: &Config) -> Result<Self> {
        let key = ServiceAccountKey::from_file(&config.google_credentials_file)?;
        tracing::info!(account = %key.client_email, "Loaded service-account key");
        let tokens = Arc::new(TokenProvider::new(client.clone(), key)?);
        // Fail early on a revoked or misconfigured key.
        tokens.token()?;

        Ok(Self {
            sheets: SheetsClient::new(client.clone(), Arc::clone(&tokens)),
            docs: DocsClient::new(client.clone(), Arc::clone(&tokens)),
            drive: DriveClient::new(client, tokens),
        })
    }
}
