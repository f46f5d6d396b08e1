pub mod extractor;
pub mod google;
pub mod probe;

pub use extractor::RemoteExtractor;
pub use google::GoogleSearchClient;
pub use probe::SearchFormProber;
