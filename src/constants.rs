/// Canonical placeholder stored in every template pattern.
pub const QUERY_PLACEHOLDER: &str = "{query}";

pub const USER_AGENT: &str = concat!("pricehound/", env!("CARGO_PKG_VERSION"));

pub mod limits {

    pub const MAX_PRICE: f64 = 999_999_999.99;

    pub const MAX_RATING: f64 = 100.0;

    /// Google Custom Search returns at most 10 results per request.
    pub const MAX_SEARCH_RESULTS: u32 = 10;
}

pub mod intervals {
    use std::time::Duration;

    pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}
