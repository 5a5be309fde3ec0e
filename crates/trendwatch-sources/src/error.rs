use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("rate limited by {host}")]
    RateLimited {
        host: String,
        retry_after_secs: Option<u64>,
    },

    #[error("source unavailable (HTTP {status}) at {url}")]
    SourceUnavailable { status: u16, url: String },

    #[error("request blocked by {url}")]
    Blocked { url: String },

    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no listing entries could be parsed for category {category}")]
    EmptyListing { category: String },

    #[error("unknown category \"{category}\" for region {region}")]
    UnknownCategory { category: String, region: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl SourceError {
    /// Classifies a transport-level failure, separating timeouts from other
    /// network errors.
    pub(crate) fn from_transport(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            SourceError::Timeout {
                url: url.to_owned(),
            }
        } else {
            SourceError::Http(err)
        }
    }

    /// Maps a non-success HTTP status to the matching error kind.
    pub(crate) fn from_status(
        status: reqwest::StatusCode,
        url: &str,
        retry_after_secs: Option<u64>,
    ) -> Self {
        let url = url.to_owned();
        match status.as_u16() {
            429 => SourceError::RateLimited {
                host: host_of(&url),
                retry_after_secs,
            },
            503 => SourceError::SourceUnavailable { status: 503, url },
            403 => SourceError::Blocked { url },
            404 => SourceError::NotFound { url },
            other => SourceError::UnexpectedStatus { status: other, url },
        }
    }
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
        .unwrap_or_else(|| url.to_owned())
}
