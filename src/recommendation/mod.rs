//! Location -> crop recommendations.
//!
//! ```text
//! location → analysis call → reformat call → extract_crops → RecommendationSet
//! ```
//!
//! Both calls are non-streaming and a failure of either ends the pipeline.

pub mod extract;
pub mod prompts;

pub use extract::{extract_crops, CropDetails, CropRecommendations};

use crate::config::{Config, ModelConfig};
use crate::errors::{ErrorClass, FormatError};
use crate::llm::{GatewayError, ModelGateway, TokenUsage};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecommendationError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("AI analysis failed to produce results")]
    EmptyAnalysis,
    #[error("AI formatting failed to produce results")]
    EmptyFormatting,
}

impl RecommendationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            RecommendationError::Gateway(e) => e.class(),
            RecommendationError::Format(e) => e.class(),
            RecommendationError::EmptyAnalysis | RecommendationError::EmptyFormatting => {
                ErrorClass::Backend
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationSet {
    pub crops: CropRecommendations,
    /// Summed over both calls.
    pub usage: TokenUsage,
}

#[derive(Clone)]
pub struct RecommendationPipeline {
    gateway: ModelGateway,
    analysis_model: ModelConfig,
    formatting_model: ModelConfig,
}

impl RecommendationPipeline {
    pub fn new(
        gateway: ModelGateway,
        analysis_model: ModelConfig,
        formatting_model: ModelConfig,
    ) -> Self {
        Self {
            gateway,
            analysis_model,
            formatting_model,
        }
    }

    pub fn from_config(gateway: ModelGateway, config: &Config) -> Self {
        Self::new(gateway, config.recommendations.clone(), config.accessory.clone())
    }

    #[instrument(skip(self))]
    pub async fn recommend(
        &self,
        location: &str,
    ) -> Result<RecommendationSet, RecommendationError> {
        info!("Requesting crop analysis");
        let analysis = self
            .gateway
            .complete(prompts::analysis_prompt(location), &self.analysis_model)
            .await
            .map_err(|e| {
                warn!(error = %e, "Analysis call failed");
                e
            })?;
        if analysis.text.trim().is_empty() {
            warn!("Analysis call returned no text");
            return Err(RecommendationError::EmptyAnalysis);
        }
        debug!(len = analysis.text.len(), "Received analysis");

        let formatted = self
            .gateway
            .complete(prompts::reformat_prompt(&analysis.text), &self.formatting_model)
            .await
            .map_err(|e| {
                warn!(error = %e, "Formatting call failed");
                e
            })?;
        if formatted.text.trim().is_empty() {
            warn!("Formatting call returned no text");
            return Err(RecommendationError::EmptyFormatting);
        }

        let crops = extract_crops(&formatted.text).map_err(|e| {
            error!(
                error = %e,
                formatted = %formatted.text,
                "Failed to extract crop recommendations"
            );
            e
        })?;

        let usage = analysis.usage + formatted.usage;
        info!(
            crops = crops.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Generated crop recommendations"
        );
        Ok(RecommendationSet { crops, usage })
    }
}
