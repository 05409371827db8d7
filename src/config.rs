use std::time::Duration;

// -- Site --
pub const GITHUB_BASE_URL: &str = "https://github.com";
pub const BASE_URL_ENV: &str = "OPENTREND_BASE_URL";
pub const FILTER_ALL: &str = "all";

// -- Trending --
pub const TRENDING_MAX_ATTEMPTS: u32 = 3;
pub const TRENDING_RETRY_DELAY_SECS: u64 = 2;
pub const TRENDING_TIMEOUT_SECS: u64 = 30;
pub const ITEM_PAUSE_MIN_MS: u64 = 100;
pub const ITEM_PAUSE_MAX_MS: u64 = 300;
pub const BUILT_BY_LIMIT: usize = 5;

// -- Repository deep dive --
pub const RECENT_COMMITS_LIMIT: usize = 10;
pub const TOP_CONTRIBUTORS_LIMIT: usize = 10;

// -- Sentinels --
pub const NO_DESCRIPTION: &str = "No description available";
pub const UNKNOWN_LANGUAGE: &str = "Unknown";
pub const NO_CONTRIBUTORS: &str = "N/A";
pub const UNKNOWN_CONTRIBUTOR: &str = "Unknown";

/// Display name → trending URL slug, for names whose slug isn't just the
/// lower-cased name.
pub const LANGUAGE_SLUGS: &[(&str, &str)] = &[
    ("C#", "c%23"),
    ("C++", "c++"),
    ("F#", "f%23"),
    ("Jupyter Notebook", "jupyter-notebook"),
    ("Vim Script", "vim-script"),
];

/// Languages listed by `opentrend languages`. Any other display name works too.
pub const LANGUAGES: &[&str] = &[
    "Python",
    "JavaScript",
    "TypeScript",
    "Java",
    "C++",
    "C#",
    "Go",
    "Rust",
    "PHP",
    "Ruby",
    "Swift",
    "Kotlin",
    "Dart",
    "HTML",
    "CSS",
    "Shell",
];

/// Everything the scraper needs from its environment, fixed at construction.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub base_url: String,
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub item_pause_min: Duration,
    pub item_pause_max: Duration,
    pub trending_timeout: Duration,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: GITHUB_BASE_URL.to_string(),
            max_attempts: TRENDING_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(TRENDING_RETRY_DELAY_SECS),
            item_pause_min: Duration::from_millis(ITEM_PAUSE_MIN_MS),
            item_pause_max: Duration::from_millis(ITEM_PAUSE_MAX_MS),
            trending_timeout: Duration::from_secs(TRENDING_TIMEOUT_SECS),
        }
    }
}

impl ScraperConfig {
    /// Defaults, with the base URL taken from `OPENTREND_BASE_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = base_url_override() {
            config.base_url = url;
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// No retry delay and no per-item pause. Attempt cap and timeouts are kept.
    pub fn without_delays(mut self) -> Self {
        self.retry_delay = Duration::ZERO;
        self.item_pause_min = Duration::ZERO;
        self.item_pause_max = Duration::ZERO;
        self
    }

    /// Base URL without a trailing slash, so paths can be appended with `/`.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Uniform random pause in `[item_pause_min, item_pause_max]`.
    pub fn item_pause(&self) -> Duration {
        let min = self.item_pause_min;
        let max = self.item_pause_max.max(min);
        min + (max - min).mul_f64(rand::random::<f64>())
    }
}

fn base_url_override() -> Option<String> {
    std::env::var(BASE_URL_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
