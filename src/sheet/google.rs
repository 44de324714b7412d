//! Google Sheets exporter: a thin wrapper posting the company
//! aggregate view to one sheet tab via the Sheets REST API
//! (`spreadsheets.values.update`), authenticating with a bearer token
//! loaded from a service-account credentials file. Out of core scope
//! per spec.md §6 — implemented only at the level the interface
//! requires, not as a full Sheets client.

use std::fs;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::PipelineError;
use crate::http::{Body, HttpClient, RequestSpec};
use crate::store::models::CompanyExportRow;

use super::SheetExporter;

const HEADER_ROW: &[&str] = &[
    "company_id",
    "display_name",
    "website_url",
    "unique_offer_count",
    "offer_count",
    "max_score",
    "top_category_id",
    "strong_offer_count",
    "avg_strong_score",
    "last_strong_at",
];

pub struct GoogleSheetsExporter {
    client: HttpClient,
    spreadsheet_id: String,
    sheet_range: String,
    bearer_token: String,
}

impl GoogleSheetsExporter {
    /// Load credentials from a JSON file containing `{"access_token":
    /// "...", "spreadsheet_id": "...", "sheet_range": "Sheet1!A1"}`.
    /// A real service-account OAuth flow is out of scope here — the
    /// token is read as-is and assumed to be refreshed by the caller's
    /// deployment tooling.
    pub fn from_credentials_file(client: HttpClient, path: &str) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read sheets credentials at {path}: {e}"))?;
        let parsed: Value = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse sheets credentials at {path}: {e}"))?;

        let bearer_token = parsed["access_token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("sheets credentials missing access_token"))?
            .to_string();
        let spreadsheet_id = parsed["spreadsheet_id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("sheets credentials missing spreadsheet_id"))?
            .to_string();
        let sheet_range = parsed["sheet_range"].as_str().unwrap_or("Sheet1!A1").to_string();

        Ok(Self {
            client,
            spreadsheet_id,
            sheet_range,
            bearer_token,
        })
    }

    fn rows_to_values(rows: &[CompanyExportRow]) -> Vec<Vec<Value>> {
        let mut values: Vec<Vec<Value>> = vec![HEADER_ROW.iter().map(|h| json!(h)).collect()];
        for row in rows {
            values.push(vec![
                json!(row.company_id),
                json!(row.display_name),
                json!(row.website_url),
                json!(row.unique_offer_count),
                json!(row.offer_count),
                json!(row.max_score),
                json!(row.top_category_id),
                json!(row.strong_offer_count),
                json!(row.avg_strong_score),
                json!(row.last_strong_at.map(|t| t.to_rfc3339())),
            ]);
        }
        values
    }
}

#[async_trait]
impl SheetExporter for GoogleSheetsExporter {
    async fn export(&self, rows: &[CompanyExportRow]) -> Result<(), PipelineError> {
        let url = format!(
            "https://sheets.googleapis.com/v4/spreadsheets/{}/values/{}",
            self.spreadsheet_id, self.sheet_range
        );
        let body = json!({
            "range": self.sheet_range,
            "majorDimension": "ROWS",
            "values": Self::rows_to_values(rows),
        });
        let auth_header = format!("Bearer {}", self.bearer_token);
        let spec = RequestSpec {
            query: &[("valueInputOption", "RAW")],
            headers: &[("Authorization", &auth_header)],
            json_body: Some(&body),
        };

        match self.client.put(&url, &spec).await {
            Ok(Body::Json(_)) | Ok(Body::Empty) | Ok(Body::Text(_)) => Ok(()),
            Err(e) => Err(PipelineError::Transport(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn rows_to_values_includes_header_and_all_columns() {
        let rows = vec![CompanyExportRow {
            company_id: 1,
            display_name: Some("Acme".into()),
            website_url: Some("https://acme.com".into()),
            unique_offer_count: 3,
            offer_count: 5,
            max_score: 8,
            top_category_id: Some("cat_fx_direct".into()),
            strong_offer_count: 2,
            avg_strong_score: Some(7.5),
            last_strong_at: Some(Utc::now()),
        }];
        let values = GoogleSheetsExporter::rows_to_values(&rows);
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].len(), HEADER_ROW.len());
        assert_eq!(values[1][0], json!(1));
    }
}
