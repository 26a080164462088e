// SPDX-License-Identifier: GPL-3.0-only

//! HTTP client for the fashion analysis service

use super::AnalysisBackend;
use super::request::AnalysisRequest;
use super::response::{AnalysisOutcome, AnalysisResponse, HealthStatus, StyleUpload};
use super::style::StyleReferenceSet;
use crate::constants::endpoints;
use crate::errors::{AnalysisError, AnalysisResult, AppError, AppResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Client for the remote analysis endpoint
///
/// One call per request. There is no retry; a failed request is reported
/// and the next capture simply tries again.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one analysis request
    pub async fn analyze(&self, request: &AnalysisRequest) -> AnalysisResult<AnalysisOutcome> {
        let url = self.url(endpoints::ANALYZE);
        debug!(
            %url,
            mode = ?request.mode(),
            season = %request.season(),
            styles = request.style_profile().map(|p| p.images.len()).unwrap_or(0),
            "Submitting frame for analysis"
        );

        let resp = self.client.post(&url).json(request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Analysis request failed");
            return Err(AnalysisError::HttpStatus(status.as_u16()));
        }

        let body: AnalysisResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;
        let outcome = AnalysisOutcome::try_from(body)?;

        info!(
            items = outcome.feedback.len(),
            confidence = outcome.confidence_score,
            "Analysis received"
        );
        Ok(outcome)
    }

    /// Check the service health
    pub async fn health_check(&self) -> AnalysisResult<HealthStatus> {
        let resp = self.client.get(self.url(endpoints::HEALTH)).send().await?;
        if !resp.status().is_success() {
            return Err(AnalysisError::HttpStatus(resp.status().as_u16()));
        }
        resp.json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
    }

    /// Upload the style reference images as a stored style profile
    pub async fn upload_style(
        &self,
        styles: &StyleReferenceSet,
        tags: &[String],
    ) -> AnalysisResult<StyleUpload> {
        let mut form = Form::new();
        for reference in styles.iter() {
            let part = Part::bytes(reference.image.bytes().to_vec())
                .file_name(reference.name.clone())
                .mime_str(reference.image.mime_type())?;
            form = form.part("images", part);
        }
        if !tags.is_empty() {
            let tags_json = serde_json::to_string(tags)
                .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;
            form = form.text("tags", tags_json);
        }

        info!(images = styles.len(), tags = tags.len(), "Uploading style references");
        let resp = self
            .client
            .post(self.url(endpoints::UPLOAD_STYLE))
            .multipart(form)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AnalysisError::HttpStatus(resp.status().as_u16()));
        }
        resp.json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
    }

    /// Fetch a stored style profile
    pub async fn get_style(&self, style_id: &str) -> AnalysisResult<StyleUpload> {
        let url = format!("{}/{}", self.url(endpoints::STYLES), style_id);
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(AnalysisError::HttpStatus(resp.status().as_u16()));
        }
        resp.json()
            .await
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
    }
}

impl AnalysisBackend for HttpAnalysisClient {
    fn submit(&self, request: AnalysisRequest) -> BoxFuture<'_, AnalysisResult<AnalysisOutcome>> {
        async move { self.analyze(&request).await }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpAnalysisClient::new("http://localhost:8000/", Duration::from_secs(5));
        let url = client.map(|c| c.url(endpoints::ANALYZE)).ok();
        assert_eq!(url.as_deref(), Some("http://localhost:8000/api/analyze"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_failure() {
        // Port 9 (discard) is essentially never listening on loopback
        let client = match HttpAnalysisClient::new("http://127.0.0.1:9", Duration::from_secs(2)) {
            Ok(c) => c,
            Err(e) => panic!("client creation failed: {}", e),
        };
        let health = client.health_check().await;
        assert!(matches!(health, Err(AnalysisError::NetworkFailure(_))));
    }
}
