//! External signal sources: best-seller listings and search interest.

pub mod error;
pub mod listing;
pub mod retry;
pub mod search;
pub mod throttle;

use async_trait::async_trait;
use trendwatch_core::{ListingEntry, SearchSignal};

pub use error::SourceError;
pub use listing::ListingClient;
pub use retry::RetryPolicy;
pub use search::{clean_keyword, SearchInterestClient};
pub use throttle::Throttle;

/// A ranked-listing provider, fetched one category at a time.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Returns up to `limit` entries for `category` in ascending rank order.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the category could not be fetched
    /// after retries. Callers treat this as a degraded category, not a
    /// failed run.
    async fn fetch_category(
        &self,
        category: &str,
        limit: usize,
    ) -> Result<Vec<ListingEntry>, SourceError>;
}

/// A search-interest provider.
#[async_trait]
pub trait SearchInterestSource: Send + Sync {
    /// Returns the signal for one product. A keyword without data is
    /// `Ok` with the "no signal" value.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] once retries are exhausted. Callers score
    /// the product without search data and count the lookup as failed.
    async fn signal(
        &self,
        product_name: &str,
        category: &str,
    ) -> Result<SearchSignal, SourceError>;
}
