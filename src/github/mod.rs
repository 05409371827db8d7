pub mod repository;
pub mod trending;

use std::future::Future;
use std::time::Duration;

use scraper::ElementRef;

use crate::client::{self, Client};
use crate::config::ScraperConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),
    #[error("{url} answered {status}")]
    Status { status: u16, url: String },
    #[error("background task panicked: {0}")]
    TaskPanic(#[from] tokio::task::JoinError),
}

/// Wrap raw reqwest errors through the middleware error type so `?` works on
/// `.text()` and client construction.
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(reqwest_middleware::Error::Reqwest(e))
    }
}

/// Where page bodies come from. `timeout` is a per-request deadline; `None`
/// leaves it to the transport.
pub trait PageSource: Sync {
    fn fetch(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Live pages over HTTP.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self {
            client: client::build_client()?,
        })
    }
}

impl PageSource for HttpSource {
    async fn fetch(&self, url: &str, timeout: Option<Duration>) -> Result<String, FetchError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}

/// Fetches and extracts. Public operations never fail: every error is
/// logged and resolved to an empty or default value.
pub struct Scraper<S = HttpSource> {
    source: S,
    config: ScraperConfig,
}

impl Scraper<HttpSource> {
    pub fn http(config: ScraperConfig) -> Result<Self, FetchError> {
        Ok(Self::new(HttpSource::new()?, config))
    }
}

impl<S: PageSource> Scraper<S> {
    pub fn new(source: S, config: ScraperConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

/// Trimmed text content of an element.
pub(crate) fn text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Like [`text`], but whitespace-only content counts as missing.
pub(crate) fn non_empty_text(el: ElementRef) -> Option<String> {
    Some(text(el)).filter(|s| !s.is_empty())
}
