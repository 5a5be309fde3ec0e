//! Generative-language client that writes a short dropshipping assessment.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trendwatch_core::ScoredProduct;

use crate::error::InsightError;
use crate::Annotator;

pub struct GenerativeAnnotator {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GenerativeAnnotator {
    /// # Errors
    ///
    /// Returns [`InsightError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, InsightError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: url.to_owned(),
            api_key: api_key.to_owned(),
        })
    }
}

#[async_trait]
impl Annotator for GenerativeAnnotator {
    async fn annotate(&self, product: &ScoredProduct) -> Result<Option<String>, InsightError> {
        let prompt = build_prompt(product);
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: &prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InsightError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("")
            .trim()
            .to_owned();

        if text.is_empty() {
            return Ok(None);
        }
        Ok(Some(text))
    }
}

/// Prompt asking for a two-to-three sentence assessment of one product.
#[must_use]
pub fn build_prompt(product: &ScoredProduct) -> String {
    let price = product
        .price_estimate
        .map_or_else(|| "Unknown".to_owned(), |p| format!("${p:.2}"));

    let mut prompt = String::from("As a dropshipping expert, analyze this product:\n\n");
    let _ = writeln!(prompt, "Product: {}", product.name);
    let _ = writeln!(prompt, "Category: {}", product.category);
    let _ = writeln!(prompt, "Price: {price}");
    let _ = writeln!(prompt, "Trend Score: {:.2}/100", product.score);
    prompt.push_str(
        "\nProvide a brief analysis (2-3 sentences) covering:\n\
         1. Dropshipping viability\n\
         2. Target audience\n\
         3. Key selling points or concerns\n\n\
         Keep it concise and actionable.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendwatch_core::{ProductStatus, ScoreBreakdown};

    #[test]
    fn prompt_includes_product_fields_and_unknown_price() {
        let product = ScoredProduct {
            name: "Posture Corrector".to_owned(),
            category: "Sports".to_owned(),
            source_url: "https://www.example.com/dp/B01".to_owned(),
            score: 74.5,
            search_volume: 12,
            price_estimate: None,
            breakdown: ScoreBreakdown {
                velocity: 15.0,
                rank: 30.0,
                price: 5.0,
                competition: 10.0,
            },
            status: ProductStatus::Active,
            notes: None,
        };
        let prompt = build_prompt(&product);
        assert!(prompt.contains("Product: Posture Corrector"));
        assert!(prompt.contains("Category: Sports"));
        assert!(prompt.contains("Price: Unknown"));
        assert!(prompt.contains("Trend Score: 74.50/100"));
    }
}
