use thiserror::Error;

/// Conditions that end a scrape run. Every one of them is raised only after
/// the listings gathered so far have been handed to the store.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed fetch (HTTP {status}) for {url}")]
    Transport { status: u16, url: String },

    #[error("request failed: {0}")]
    Network(String),

    #[error("response body is not JSON: {0}")]
    Decode(String),

    #[error("no new listings, aborting ({accumulated} collected)")]
    Stalled { accumulated: usize },

    #[error("{count} empty pages in a row, aborting ({accumulated} collected)")]
    EmptyPages { count: usize, accumulated: usize },

    #[error("first request returned no listings at all")]
    NoListings,

    #[error("storing listings failed: {0}")]
    Store(String),
}
