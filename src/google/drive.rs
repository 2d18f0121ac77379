use std::sync::Arc;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;

use super::auth::TokenProvider;
use crate::error::{CopydeskError, Result};
use crate::image::{DriveFile, ImageSource};

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata {
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
}

/// Read-only Drive v3 client for featured images.
pub struct DriveClient {
    client: Client,
    tokens: Arc<TokenProvider>,
}

impl DriveClient {
    pub fn new(client: Client, tokens: Arc<TokenProvider>) -> Self {
        Self { client, tokens }
    }

    fn get(&self, file_id: &str, query: &[(&str, &str)]) -> Result<Response> {
        let token = self
            .tokens
            .token()
            .map_err(|e| CopydeskError::Image(e.to_string()))?;
        let res = self
            .client
            .get(format!("{}/{}", DRIVE_FILES_URL, file_id))
            .bearer_auth(token)
            .query(&[("supportsAllDrives", "true")])
            .query(query)
            .send()
            .map_err(|e| CopydeskError::Image(format!("failed to reach Drive: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            return Err(CopydeskError::Image(format!("Drive file {}: {} - {}", file_id, status, txt)));
        }
        Ok(res)
    }
}

impl ImageSource for DriveClient {
    fn file_metadata(&self, file_id: &str) -> Result<DriveFile> {
        let meta: FileMetadata = self
            .get(file_id, &[("fields", "name,mimeType")])?
            .json()
            .map_err(|e| CopydeskError::Image(format!("unreadable Drive metadata: {}", e)))?;
        tracing::debug!(file_id, name = %meta.name, mime = %meta.mime_type, "Drive metadata");
        Ok(DriveFile {
            name: meta.name,
            mime_type: meta.mime_type,
        })
    }

    fn download(&self, file_id: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(file_id, &[("alt", "media")])?
            .bytes()
            .map_err(|e| CopydeskError::Image(format!("Drive download interrupted: {}", e)))?;
        Ok(bytes.to_vec())
    }
}
