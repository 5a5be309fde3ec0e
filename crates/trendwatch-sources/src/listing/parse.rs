//! Best-seller HTML parsing.
//!
//! Listing markup changes often, so extraction walks a cascade of container
//! selectors and uses the first one that matches at least
//! [`MIN_CONTAINERS`] elements. When nothing matches, product links
//! (`/dp/<asin>`) are used directly.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use trendwatch_core::ListingEntry;

const MIN_CONTAINERS: usize = 3;
const MAX_ELEMENTS: usize = 60;
const MIN_TITLE_CHARS: usize = 5;
const MAX_TITLE_CHARS: usize = 200;

fn compile(selectors: &[&str]) -> Vec<Selector> {
    selectors
        .iter()
        .map(|s| Selector::parse(s).expect("valid listing selector"))
        .collect()
}

static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        "div[id^='gridItemRoot']",
        "div.zg-grid-general-faceout",
        "div.p13n-sc-uncoverable-faceout",
        "div[data-asin]",
        "li.zg-item-immersion",
    ])
});

static TITLES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        "div.p13n-sc-truncate",
        "span.zg-text-center-align",
        "div._cDEzb_p13n-sc-css-line-clamp-3_g3dy1",
        "div._cDEzb_p13n-sc-css-line-clamp-4_2q2cc",
        "span.a-size-small",
        "a.a-link-normal",
    ])
});

static PRICES: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    compile(&[
        "span.a-price",
        "span.p13n-sc-price",
        "span._cDEzb_p13n-sc-price_3mJ9Z",
        "span.a-color-price",
    ])
});

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

static OFFSCREEN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.a-offscreen").expect("valid offscreen selector"));

static PRODUCT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href*='/dp/']").expect("valid product link selector"));

static PRICE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*)").expect("valid price regex"));

/// Extracts up to `limit` ranked entries from a best-seller page.
///
/// Rank is the 1-based position of the container on the page, so entries
/// come back in ascending rank order.
#[must_use]
pub fn parse_listing(html: &str, base_url: &str, category: &str, limit: usize) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);

    let containers = CONTAINERS.iter().find_map(|selector| {
        let found: Vec<ElementRef<'_>> = document.select(selector).collect();
        (found.len() >= MIN_CONTAINERS).then_some(found)
    });

    let Some(containers) = containers else {
        tracing::warn!(category, "no listing containers matched, falling back to product links");
        return parse_product_links(&document, base_url, category, limit);
    };

    let mut entries = Vec::new();
    for (idx, element) in containers.into_iter().take(MAX_ELEMENTS).enumerate() {
        if entries.len() >= limit {
            break;
        }
        let rank = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        if let Some(entry) = parse_container(element, base_url, category, rank) {
            entries.push(entry);
        }
    }
    entries
}

fn parse_container(
    element: ElementRef<'_>,
    base_url: &str,
    category: &str,
    rank: u32,
) -> Option<ListingEntry> {
    let anchor = element.select(&ANCHOR).next();

    let title = TITLES
        .iter()
        .filter_map(|selector| element.select(selector).next())
        .map(element_text)
        .find(|t| t.chars().count() >= MIN_TITLE_CHARS)
        .or_else(|| {
            let anchor = anchor?;
            anchor
                .value()
                .attr("title")
                .map(collapse_whitespace)
                .filter(|t| !t.is_empty())
                .or_else(|| Some(element_text(anchor)))
        })
        .filter(|t| t.chars().count() >= MIN_TITLE_CHARS)?;

    let source_url = absolute_url(anchor?.value().attr("href")?, base_url)?;

    let price = PRICES.iter().find_map(|selector| {
        let price_el = element.select(selector).next()?;
        let text = price_el
            .select(&OFFSCREEN)
            .next()
            .map_or_else(|| element_text(price_el), element_text);
        parse_price(&text)
    });

    Some(ListingEntry {
        name: truncate_chars(&title, MAX_TITLE_CHARS),
        category: category.to_owned(),
        source_url,
        rank,
        price,
    })
}

fn parse_product_links(
    document: &Html,
    base_url: &str,
    category: &str,
    limit: usize,
) -> Vec<ListingEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for link in document.select(&PRODUCT_LINK).take(MAX_ELEMENTS) {
        if entries.len() >= limit {
            break;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(asin) = asin_of(href) else {
            continue;
        };
        if !seen.insert(asin.to_owned()) {
            continue;
        }

        let title = element_text(link);
        if title.chars().count() < MIN_TITLE_CHARS {
            continue;
        }
        let Some(source_url) = absolute_url(href, base_url) else {
            continue;
        };

        let rank = u32::try_from(entries.len() + 1).unwrap_or(u32::MAX);
        entries.push(ListingEntry {
            name: truncate_chars(&title, MAX_TITLE_CHARS),
            category: category.to_owned(),
            source_url,
            rank,
            price: None,
        });
    }
    entries
}

/// Parses a displayed price such as `"$1,299.99"` or `"£12.50 - £18.00"`.
///
/// Ranges resolve to their low end. Returns `None` when no positive number
/// is present.
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '£' | '€' | ',') && !c.is_whitespace())
        .collect();
    let low = cleaned.split('-').next().unwrap_or_default();
    PRICE_NUMBER
        .captures(low)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|p| *p > 0.0)
}

/// Resolves `href` against `base_url` and drops any query string.
fn absolute_url(href: &str, base_url: &str) -> Option<String> {
    let url = if href.starts_with("http://") || href.starts_with("https://") {
        href.to_owned()
    } else if href.starts_with('/') {
        format!("{}{href}", base_url.trim_end_matches('/'))
    } else {
        return None;
    };
    let stripped = url.split(['?', '#']).next().unwrap_or_default();
    Some(stripped.to_owned())
}

fn asin_of(href: &str) -> Option<&str> {
    let (_, rest) = href.split_once("/dp/")?;
    let asin = rest.split(['/', '?', '#']).next()?;
    (!asin.is_empty()).then_some(asin)
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
#[path = "parse_test.rs"]
mod tests;
