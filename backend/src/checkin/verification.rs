//! Plan-dependent identity verification for check-ins.
//!
//! FREE tenants run under [`VerificationStrategy::EmbeddingTrust`]: the client
//! compares the submitted face embedding against the reference embedding and
//! the server accepts any well-formed embedding without checking similarity.
//! That comparison is the client's responsibility, so a FREE check-in proves
//! location, not identity, and never carries a confidence score.
//!
//! PAID tenants run under [`VerificationStrategy::OracleComparison`], where the
//! reference photo and the submitted photo are compared by the face oracle.

use std::sync::Arc;
use std::time::Duration;

use crate::services::{FaceOracle, OracleError};
use crate::store::PlanType;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VerificationOutcome {
    pub accepted: bool,
    pub confidence: Option<f64>,
}

impl VerificationOutcome {
    const fn rejected() -> Self {
        Self {
            accepted: false,
            confidence: None,
        }
    }
}

/// What the strategy compares: reference data on file vs. what was just submitted
#[derive(Clone, Copy, Debug)]
pub struct VerificationInput<'a> {
    pub reference_photo_url: &'a str,
    pub reference_embedding: &'a [f64],
    pub submitted_photo_url: &'a str,
    pub submitted_embedding: &'a [f64],
}

#[derive(Clone)]
pub enum VerificationStrategy {
    EmbeddingTrust,
    OracleComparison {
        oracle: Arc<dyn FaceOracle>,
        threshold: f64,
        timeout: Duration,
    },
}

impl std::fmt::Debug for VerificationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmbeddingTrust => write!(f, "EmbeddingTrust"),
            Self::OracleComparison { threshold, timeout, .. } => f
                .debug_struct("OracleComparison")
                .field("threshold", threshold)
                .field("timeout", timeout)
                .finish_non_exhaustive(),
        }
    }
}

impl VerificationStrategy {
    #[must_use]
    pub fn for_plan(plan_type: PlanType, oracle: Arc<dyn FaceOracle>, threshold: f64, timeout: Duration) -> Self {
        match plan_type {
            PlanType::Free => Self::EmbeddingTrust,
            PlanType::Paid => Self::OracleComparison {
                oracle,
                threshold,
                timeout,
            },
        }
    }

    /// Never fails: oracle errors and timeouts come back as a rejection.
    pub async fn verify(&self, input: &VerificationInput<'_>) -> VerificationOutcome {
        match self {
            Self::EmbeddingTrust => {
                if input.submitted_embedding.is_empty() {
                    return VerificationOutcome::rejected();
                }
                VerificationOutcome {
                    accepted: true,
                    confidence: None,
                }
            }
            Self::OracleComparison {
                oracle,
                threshold,
                timeout,
            } => {
                let comparison = tokio::time::timeout(
                    *timeout,
                    oracle.compare(input.reference_photo_url, input.submitted_photo_url, *threshold),
                )
                .await
                .unwrap_or(Err(OracleError::TimedOut(*timeout)));

                match comparison {
                    Ok(face_match) if face_match.matched && face_match.similarity >= *threshold => VerificationOutcome {
                        accepted: true,
                        confidence: Some(face_match.similarity),
                    },
                    Ok(face_match) => {
                        tracing::info!(
                            matched = face_match.matched,
                            similarity = face_match.similarity,
                            threshold = *threshold,
                            "Face comparison below threshold"
                        );
                        VerificationOutcome::rejected()
                    }
                    Err(e) => {
                        tracing::error!("Face oracle failed, rejecting check-in: {e}");
                        VerificationOutcome::rejected()
                    }
                }
            }
        }
    }
}
