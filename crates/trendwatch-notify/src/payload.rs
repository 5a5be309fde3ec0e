//! Discord-compatible webhook payloads.

use chrono::{DateTime, Utc};
use serde::Serialize;

const USERNAME: &str = "Trend Detective";
const FOOTER: &str = "trendwatch";
const MAX_FIELDS: usize = 5;
const MAX_FIELD_NAME_CHARS: usize = 80;

const COLOR_HOT: u32 = 0x00FF_6B35;
const COLOR_QUIET: u32 = 0x004E_CDC4;
const COLOR_FAILURE: u32 = 0x00FF_0000;

/// The product fields a notification needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDigest {
    pub name: String,
    pub category: String,
    pub source_url: String,
    pub score: f64,
    pub price_estimate: Option<f64>,
    pub search_volume: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookPayload {
    pub username: String,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    pub footer: Footer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Footer {
    pub text: String,
}

/// Builds the hot-product summary.
///
/// `hot` must already be filtered to scores at or above `threshold`.
/// Returns `None` for an empty selection: nothing is sent.
#[must_use]
pub fn summary_payload(
    hot: &[ProductDigest],
    touched: usize,
    threshold: f64,
    at: DateTime<Utc>,
) -> Option<WebhookPayload> {
    if hot.is_empty() {
        return None;
    }

    let mut ranked: Vec<&ProductDigest> = hot.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));

    let highest = ranked.first().map_or(0.0, |p| p.score);
    #[allow(clippy::cast_precision_loss)]
    let average = ranked.iter().map(|p| p.score).sum::<f64>() / ranked.len() as f64;

    let fields = ranked
        .iter()
        .take(MAX_FIELDS)
        .enumerate()
        .map(|(idx, p)| product_field(idx + 1, p))
        .collect();

    Some(WebhookPayload {
        username: USERNAME.to_owned(),
        embeds: vec![Embed {
            title: "Daily Trend Report".to_owned(),
            description: format!(
                "Scored **{touched}** products\n\
                 Hot products (score >= {threshold:.0}): **{}**\n\
                 Highest score: **{highest:.1}/100**\n\
                 Average hot score: **{average:.1}/100**",
                ranked.len()
            ),
            color: COLOR_HOT,
            fields,
            footer: Footer {
                text: FOOTER.to_owned(),
            },
            timestamp: Some(at.to_rfc3339()),
        }],
    })
}

/// Builds the payload sent when a run fails or degrades.
#[must_use]
pub fn failure_payload(status: &str, message: &str, at: DateTime<Utc>) -> WebhookPayload {
    let color = if status == "partial" {
        COLOR_QUIET
    } else {
        COLOR_FAILURE
    };
    WebhookPayload {
        username: USERNAME.to_owned(),
        embeds: vec![Embed {
            title: format!("Trend scan {status}"),
            description: format!("The trend scan did not complete cleanly:\n\n```{message}```"),
            color,
            fields: Vec::new(),
            footer: Footer {
                text: FOOTER.to_owned(),
            },
            timestamp: Some(at.to_rfc3339()),
        }],
    }
}

fn product_field(position: usize, product: &ProductDigest) -> EmbedField {
    let name: String = product.name.chars().take(MAX_FIELD_NAME_CHARS).collect();
    let price = product
        .price_estimate
        .map_or_else(|| "N/A".to_owned(), |p| format!("${p:.2}"));

    EmbedField {
        name: format!("#{position} - {name}"),
        value: format!(
            "**Score:** {:.1}/100\n\
             **Category:** {}\n\
             **Price:** {price}\n\
             **Search Volume:** {}\n\
             [View listing]({})",
            product.score, product.category, product.search_volume, product.source_url
        ),
        inline: false,
    }
}
