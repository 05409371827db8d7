use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::numbers::parse_count;

/// One row of a trending listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub name: String,
    pub url: String,
    pub description: String,
    pub language: String,
    pub stars: u64,
    pub forks: u64,
    pub stars_today: u64,
    /// Comma-joined handles, or `"N/A"`.
    pub contributors: String,
}

impl TrendingEntry {
    /// Contributor handles, empty when the listing showed none.
    pub fn contributor_handles(&self) -> Vec<&str> {
        if self.contributors == config::NO_CONTRIBUTORS {
            return Vec::new();
        }
        self.contributors
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Aggregate of one repository's root, commits, contributors and issues pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryProfile {
    pub name: String,
    pub url: String,
    pub owner: String,
    pub repo_name: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub language: String,
    pub description: String,
    pub size_kb: u64,
    pub open_issues: u64,
    /// Newest first.
    pub recent_commits: Vec<CommitRecord>,
    pub top_contributors: Vec<ContributorRecord>,
}

impl RepositoryProfile {
    /// Profile with identity filled in and every extracted field at its default.
    pub fn new(url: &str, owner: &str, repo_name: &str) -> Self {
        Self {
            name: format!("{owner}/{repo_name}"),
            url: url.to_string(),
            owner: owner.to_string(),
            repo_name: repo_name.to_string(),
            stars: 0,
            forks: 0,
            watchers: 0,
            language: config::UNKNOWN_LANGUAGE.to_string(),
            description: String::new(),
            size_kb: 0,
            open_issues: 0,
            recent_commits: Vec::new(),
            top_contributors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub message: String,
    pub author: String,
    /// `datetime` attribute as rendered. Not validated.
    pub date: Option<String>,
}

impl CommitRecord {
    pub fn is_empty(&self) -> bool {
        self.message.is_empty() && self.author.is_empty() && self.date.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorRecord {
    pub username: String,
    /// Raw text such as `"1,234 commits"`; see [`ContributorRecord::commit_count`].
    pub commits: String,
}

impl ContributorRecord {
    pub fn commit_count(&self) -> u64 {
        parse_count(&self.commits)
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.commits.is_empty()
    }
}

/// Window of the trending listing, mapped 1:1 to the `since` query parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TimeRange {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl TimeRange {
    pub const ALL: [TimeRange; 3] = [TimeRange::Daily, TimeRange::Weekly, TimeRange::Monthly];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::Daily => "daily",
            TimeRange::Weekly => "weekly",
            TimeRange::Monthly => "monthly",
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown time range {0:?}, expected daily, weekly or monthly")]
pub struct ParseTimeRangeError(String);

impl FromStr for TimeRange {
    type Err = ParseTimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(TimeRange::Daily),
            "weekly" => Ok(TimeRange::Weekly),
            "monthly" => Ok(TimeRange::Monthly),
            _ => Err(ParseTimeRangeError(s.to_string())),
        }
    }
}

/// Trending URL slug for a display language. `None` means no filter.
pub fn language_slug(display: &str) -> Option<String> {
    let display = display.trim();
    if display.is_empty() || display.eq_ignore_ascii_case(config::FILTER_ALL) {
        return None;
    }
    if let Some(&(_, slug)) = config::LANGUAGE_SLUGS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(display))
    {
        return Some(slug.to_string());
    }
    Some(
        display
            .to_lowercase()
            .replace('#', "%23")
            .replace(' ', "-"),
    )
}
