use std::sync::Arc;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::auth::TokenProvider;
use crate::error::{CopydeskError, Result};
use crate::source::{Cell, GridRow, SheetSource, ONLINE_COLUMN_LETTER};

const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const GRID_FIELDS: &str = "sheets(data(rowData(values(formattedValue,hyperlink,textFormatRuns))))";

#[derive(Debug, Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
struct Sheet {
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<Cell>,
}

/// Blocking Google Sheets client over the v4 REST API.
pub struct SheetsClient {
    client: Client,
    tokens: Arc<TokenProvider>,
}

impl SheetsClient {
    pub fn new(client: Client, tokens: Arc<TokenProvider>) -> Self {
        Self { client, tokens }
    }

    fn token(&self) -> Result<String> {
        self.tokens
            .token()
            .map_err(|e| CopydeskError::SourceAccess(e.to_string()))
    }
}

impl SheetSource for SheetsClient {
    fn fetch_grid(&self, sheet_id: &str) -> Result<Vec<GridRow>> {
        let url = format!("{}/{}", SHEETS_URL, sheet_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(&[("includeGridData", "true"), ("fields", GRID_FIELDS)])
            .send()
            .map_err(|e| CopydeskError::SourceAccess(format!("failed to send sheet request: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            return Err(CopydeskError::SourceAccess(format!("{} - {}", status, txt)));
        }

        let spreadsheet: Spreadsheet = res
            .json()
            .map_err(|e| CopydeskError::SourceFormat(format!("unreadable sheet response: {}", e)))?;

        let grid = spreadsheet
            .sheets
            .into_iter()
            .next()
            .and_then(|sheet| sheet.data.into_iter().next())
            .ok_or_else(|| CopydeskError::SourceFormat("spreadsheet has no grid data".into()))?;

        Ok(grid
            .row_data
            .into_iter()
            .map(|row| GridRow { cells: row.values })
            .collect())
    }

    fn mark_online(&self, sheet_id: &str, row: usize) -> Result<()> {
        let range = format!("{}{}", ONLINE_COLUMN_LETTER, row);
        let url = format!("{}/{}/values/{}", SHEETS_URL, sheet_id, range);
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[true]],
        });

        let res = self
            .client
            .put(&url)
            .bearer_auth(self.token()?)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&body)
            .send()
            .map_err(|e| CopydeskError::SourceAccess(format!("failed to send cell update: {}", e)))?;

        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_default();
            return Err(CopydeskError::SourceAccess(format!(
                "updating {} failed: {} - {}",
                range, status, txt
            )));
        }

        tracing::info!(cell = %range, "Marked row online");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_response_shape() {
        let raw = r#"{
            "sheets": [{
                "data": [{
                    "rowData": [
                        {},
                        {"values": [
                            {"formattedValue": "Sports"},
                            {"formattedValue": "TRUE"},
                            {},
                            {"formattedValue": "FALSE"},
                            {"formattedValue": "Story", "hyperlink": "https://docs.google.com/document/d/abc/edit"}
                        ]}
                    ]
                }]
            }]
        }"#;

        let spreadsheet: Spreadsheet = serde_json::from_str(raw).unwrap();
        let rows = &spreadsheet.sheets[0].data[0].row_data;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].values.is_empty());
        assert_eq!(rows[1].values[4].hyperlink.as_deref(), Some("https://docs.google.com/document/d/abc/edit"));
    }
}
