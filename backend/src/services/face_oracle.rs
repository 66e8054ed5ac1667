//! Face-similarity oracle consumed by PAID-tier check-ins.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cfg;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Face oracle is not configured")]
    NotConfigured,

    #[error("Face oracle request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Face oracle returned status {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("Face oracle did not answer within {0:?}")]
    TimedOut(std::time::Duration),
}

/// Result of comparing a reference photo with a submitted one
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct FaceMatch {
    pub matched: bool,
    pub similarity: f64, // 0-100
}

#[automock]
#[async_trait]
pub trait FaceOracle: Send + Sync {
    /// Compares the face in `reference_image_url` against `candidate_image_url`.
    async fn compare(
        &self,
        reference_image_url: &str,
        candidate_image_url: &str,
        similarity_threshold: f64,
    ) -> Result<FaceMatch, OracleError>;
}

#[derive(Serialize)]
struct CompareRequest<'a> {
    source_image_url: &'a str,
    target_image_url: &'a str,
    similarity_threshold: f64,
}

/// Oracle reached over HTTP: posts both image URLs and reads back a `FaceMatch`
#[derive(Clone, Debug)]
pub struct HttpFaceOracle {
    http_client: reqwest::Client,
    settings: cfg::FaceOracleSettings,
}

impl HttpFaceOracle {
    #[must_use]
    pub const fn new(http_client: reqwest::Client, settings: cfg::FaceOracleSettings) -> Self {
        Self { http_client, settings }
    }
}

#[async_trait]
impl FaceOracle for HttpFaceOracle {
    async fn compare(
        &self,
        reference_image_url: &str,
        candidate_image_url: &str,
        similarity_threshold: f64,
    ) -> Result<FaceMatch, OracleError> {
        if self.settings.endpoint.is_empty() {
            return Err(OracleError::NotConfigured);
        }

        let mut request = self
            .http_client
            .post(&self.settings.endpoint)
            .timeout(self.settings.timeout())
            .json(&CompareRequest {
                source_image_url: reference_image_url,
                target_image_url: candidate_image_url,
                similarity_threshold,
            });
        if !self.settings.api_key.is_empty() {
            request = request.bearer_auth(&self.settings.api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            tracing::error!("Face oracle returned status: {}", response.status());
            return Err(OracleError::UnexpectedStatus(response.status()));
        }

        let face_match: FaceMatch = response.json().await?;
        tracing::debug!(matched = face_match.matched, similarity = face_match.similarity, "Face comparison completed");
        Ok(face_match)
    }
}
