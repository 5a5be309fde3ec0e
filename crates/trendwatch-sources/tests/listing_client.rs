//! Integration tests for `ListingClient` against a local mock server.

use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use trendwatch_core::Region;
use trendwatch_sources::{ListingClient, RetryPolicy, SourceError};

fn test_client(server: &MockServer, retry: RetryPolicy) -> ListingClient {
    ListingClient::new(
        Region::Us,
        Some(&server.uri()),
        5,
        "trendwatch-test/0.1",
        retry,
        0,
    )
    .expect("failed to build test ListingClient")
}

fn listing_html(count: usize) -> String {
    let items: String = (1..=count)
        .map(|i| {
            format!(
                r#"<div id="gridItemRoot{i}">
                     <a class="a-link-normal" href="/item-{i}/dp/B00000000{i}/ref=zg?psc=1">
                       <div class="p13n-sc-truncate">Best selling product {i}</div>
                     </a>
                     <span class="p13n-sc-price">${i}9.99</span>
                   </div>"#
            )
        })
        .collect();
    format!("<html><body>{items}</body></html>")
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fetch_category_returns_ranked_entries() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gp/bestsellers/beauty/"))
        .and(header_exists("accept-language"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(5)))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, RetryPolicy::none());
    let entries = client.fetch_category("Beauty", 3).await.expect("entries");

    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].rank, 1);
    assert_eq!(entries[0].name, "Best selling product 1");
    assert_eq!(entries[0].category, "Beauty");
    assert_eq!(entries[0].price, Some(19.99));
    assert_eq!(
        entries[2].source_url,
        format!("{}/item-3/dp/B000000003/ref=zg", server.uri())
    );
}

// ---------------------------------------------------------------------------
// Retry behaviour
// ---------------------------------------------------------------------------

#[tokio::test]
async fn service_unavailable_is_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/gp/bestsellers/electronics/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gp/bestsellers/electronics/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_html(4)))
        .mount(&server)
        .await;

    let client = test_client(&server, RetryPolicy::new(3, 0).without_jitter());
    let entries = client
        .fetch_category("Electronics", 50)
        .await
        .expect("should succeed after retries");
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn rate_limiting_exhausts_retries_and_reports_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server, RetryPolicy::new(2, 0).without_jitter());
    let result = client.fetch_category("Home", 50).await;

    assert!(
        matches!(result, Err(SourceError::RateLimited { .. })),
        "expected RateLimited, got: {result:?}"
    );
}

#[tokio::test]
async fn blocked_response_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&server)
        .await;

    let client = test_client(&server, RetryPolicy::new(1, 0).without_jitter());
    let result = client.fetch_category("Sports", 50).await;
    assert!(matches!(result, Err(SourceError::Blocked { .. })));
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, RetryPolicy::new(3, 0).without_jitter());
    let result = client.fetch_category("Fashion", 50).await;
    assert!(matches!(result, Err(SourceError::NotFound { .. })));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_html(3))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = ListingClient::new(
        Region::Us,
        Some(&server.uri()),
        1,
        "trendwatch-test/0.1",
        RetryPolicy::none(),
        0,
    )
    .expect("client");
    let result = client.fetch_category("Home", 50).await;
    assert!(
        matches!(result, Err(SourceError::Timeout { .. })),
        "expected Timeout, got: {result:?}"
    );
}

#[tokio::test]
async fn page_without_products_is_an_empty_listing_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>captcha</body></html>"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server, RetryPolicy::none());
    let result = client.fetch_category("Home", 50).await;
    assert!(matches!(result, Err(SourceError::EmptyListing { ref category }) if category == "Home"));
}
