//! REDCap API export client.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::fetch::{ExportContent, ExportSource, FetchError};

const USER_AGENT: &str = concat!("survey-harmonizer/", env!("CARGO_PKG_VERSION"));

/// Exports records and metadata from a REDCap project as flat CSV
pub struct RedcapClient {
    http_client: reqwest::Client,
    api_url: String,
}

impl RedcapClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            api_url: api_url.into(),
        })
    }

    /// Form parameters of one export request
    #[must_use]
    pub fn export_params(token: &str, content: ExportContent) -> Vec<(&'static str, String)> {
        vec![
            ("token", token.to_string()),
            ("content", content.as_str().to_string()),
            ("format", "csv".to_string()),
            ("type", "flat".to_string()),
            ("rawOrLabel", "raw".to_string()),
            ("exportCheckboxLabel", "false".to_string()),
            ("returnFormat", "json".to_string()),
        ]
    }

    async fn post_export(&self, token: &str, content: ExportContent) -> Result<String, FetchError> {
        let response = self
            .http_client
            .post(&self.api_url)
            .form(&Self::export_params(token, content))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }
        Ok(body)
    }
}

impl ExportSource for RedcapClient {
    fn export<'a>(
        &'a self,
        token: &'a str,
        content: ExportContent,
    ) -> Pin<Box<dyn Future<Output = Result<String, FetchError>> + Send + 'a>> {
        Box::pin(self.post_export(token, content))
    }
}
