pub mod client;
pub mod config;
pub mod export;
pub mod github;
pub mod metrics;
pub mod model;
pub mod numbers;

pub use config::ScraperConfig;
pub use github::{FetchError, HttpSource, PageSource, Scraper};
pub use model::{
    CommitRecord, ContributorRecord, RepositoryProfile, TimeRange, TrendingEntry, language_slug,
};
