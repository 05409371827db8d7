use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::config;
use crate::model::{CommitRecord, ContributorRecord, RepositoryProfile, TrendingEntry};

const STARS_WEIGHT: f64 = 0.7;
const FORKS_WEIGHT: f64 = 0.2;
const STARS_TODAY_WEIGHT: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ActivityLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl ActivityLevel {
    pub fn from_stars_today(stars_today: u64) -> Self {
        match stars_today {
            100.. => ActivityLevel::VeryHigh,
            50.. => ActivityLevel::High,
            20.. => ActivityLevel::Medium,
            5.. => ActivityLevel::Low,
            _ => ActivityLevel::VeryLow,
        }
    }

    /// Bucket for a 0–100 health score.
    pub fn from_health_score(score: f64) -> Self {
        if score >= 80.0 {
            ActivityLevel::VeryHigh
        } else if score >= 60.0 {
            ActivityLevel::High
        } else if score >= 40.0 {
            ActivityLevel::Medium
        } else if score >= 20.0 {
            ActivityLevel::Low
        } else {
            ActivityLevel::VeryLow
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::VeryLow => "Very Low",
            ActivityLevel::Low => "Low",
            ActivityLevel::Medium => "Medium",
            ActivityLevel::High => "High",
            ActivityLevel::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Trending --

/// Largest value of each counter across a set of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Maxima {
    pub stars: u64,
    pub forks: u64,
    pub stars_today: u64,
}

impl Maxima {
    pub fn of(entries: &[TrendingEntry]) -> Self {
        entries.iter().fold(Self::default(), |m, e| Self {
            stars: m.stars.max(e.stars),
            forks: m.forks.max(e.forks),
            stars_today: m.stars_today.max(e.stars_today),
        })
    }
}

fn ratio(value: u64, max: u64) -> f64 {
    if max == 0 { 0.0 } else { value as f64 / max as f64 }
}

/// Weighted share of the maxima, scaled to 0–100.
pub fn popularity_score(entry: &TrendingEntry, maxima: &Maxima) -> f64 {
    100.0
        * (STARS_WEIGHT * ratio(entry.stars, maxima.stars)
            + FORKS_WEIGHT * ratio(entry.forks, maxima.forks)
            + STARS_TODAY_WEIGHT * ratio(entry.stars_today, maxima.stars_today))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredEntry {
    #[serde(flatten)]
    pub entry: TrendingEntry,
    pub popularity_score: f64,
    pub activity_level: ActivityLevel,
}

pub fn score_entries(entries: &[TrendingEntry]) -> Vec<ScoredEntry> {
    let maxima = Maxima::of(entries);
    entries
        .iter()
        .map(|entry| ScoredEntry {
            popularity_score: popularity_score(entry, &maxima),
            activity_level: ActivityLevel::from_stars_today(entry.stars_today),
            entry: entry.clone(),
        })
        .collect()
}

/// Case-insensitive. "all" or empty keeps everything.
pub fn filter_by_language(entries: &[TrendingEntry], language: &str) -> Vec<TrendingEntry> {
    let language = language.trim();
    if language.is_empty() || language.eq_ignore_ascii_case(config::FILTER_ALL) {
        return entries.to_vec();
    }
    entries
        .iter()
        .filter(|e| e.language.eq_ignore_ascii_case(language))
        .cloned()
        .collect()
}

pub fn filter_by_stars(
    entries: &[TrendingEntry],
    min_stars: u64,
    max_stars: Option<u64>,
) -> Vec<TrendingEntry> {
    entries
        .iter()
        .filter(|e| e.stars >= min_stars && max_stars.is_none_or(|max| e.stars <= max))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SortKey {
    #[default]
    Stars,
    Forks,
    StarsToday,
}

impl SortKey {
    fn value(self, entry: &TrendingEntry) -> u64 {
        match self {
            SortKey::Stars => entry.stars,
            SortKey::Forks => entry.forks,
            SortKey::StarsToday => entry.stars_today,
        }
    }
}

/// `n` largest by `key`; ties keep listing order.
pub fn top_by(entries: &[TrendingEntry], n: usize, key: SortKey) -> Vec<TrendingEntry> {
    let mut sorted = entries.to_vec();
    sorted.sort_by(|a, b| key.value(b).cmp(&key.value(a)));
    sorted.truncate(n);
    sorted
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageShare {
    pub language: String,
    pub repositories: usize,
    pub stars: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageStats {
    pub total_languages: usize,
    pub most_popular_language: String,
    /// By repository count, descending; ties keep first appearance.
    pub distribution: Vec<LanguageShare>,
}

impl LanguageStats {
    /// Shares ordered by total stars, descending.
    pub fn by_stars(&self) -> Vec<LanguageShare> {
        let mut shares = self.distribution.clone();
        shares.sort_by(|a, b| b.stars.cmp(&a.stars));
        shares
    }
}

pub fn language_statistics(entries: &[TrendingEntry]) -> LanguageStats {
    let mut distribution: Vec<LanguageShare> = Vec::new();
    for entry in entries {
        match distribution.iter_mut().find(|s| s.language == entry.language) {
            Some(share) => {
                share.repositories += 1;
                share.stars += entry.stars;
            }
            None => distribution.push(LanguageShare {
                language: entry.language.clone(),
                repositories: 1,
                stars: entry.stars,
            }),
        }
    }
    distribution.sort_by(|a, b| b.repositories.cmp(&a.repositories));

    LanguageStats {
        total_languages: distribution.len(),
        most_popular_language: distribution
            .first()
            .map_or_else(|| config::UNKNOWN_LANGUAGE.to_string(), |s| s.language.clone()),
        distribution,
    }
}

// -- Repository --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitKind {
    Feature,
    Fix,
    Docs,
    Style,
    Refactor,
    Test,
    Other,
}

/// Keyword classes, checked in order; the first hit wins.
const COMMIT_KEYWORDS: &[(CommitKind, &[&str])] = &[
    (CommitKind::Feature, &["feat", "feature", "add", "new"]),
    (CommitKind::Fix, &["fix", "bug", "patch"]),
    (CommitKind::Docs, &["doc", "readme", "comment"]),
    (CommitKind::Style, &["style", "format", "lint"]),
    (CommitKind::Refactor, &["refactor", "clean", "optimize"]),
    (CommitKind::Test, &["test", "spec", "coverage"]),
];

impl CommitKind {
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        COMMIT_KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| message.contains(w)))
            .map_or(CommitKind::Other, |&(kind, _)| kind)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommitTypes {
    pub feature: usize,
    pub fix: usize,
    pub docs: usize,
    pub style: usize,
    pub refactor: usize,
    pub test: usize,
    pub other: usize,
}

impl CommitTypes {
    fn count(&mut self, kind: CommitKind) {
        let slot = match kind {
            CommitKind::Feature => &mut self.feature,
            CommitKind::Fix => &mut self.fix,
            CommitKind::Docs => &mut self.docs,
            CommitKind::Style => &mut self.style,
            CommitKind::Refactor => &mut self.refactor,
            CommitKind::Test => &mut self.test,
            CommitKind::Other => &mut self.other,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitAnalysis {
    pub total_commits: usize,
    pub daily_commit_rate: f64,
    pub unique_authors: usize,
    pub average_message_length: f64,
    pub commit_types: CommitTypes,
}

/// `None` for an empty slice. Dates that don't parse as RFC 3339 are left
/// out of the commit rate but the commit still counts everywhere else.
pub fn analyze_commits(commits: &[CommitRecord]) -> Option<CommitAnalysis> {
    if commits.is_empty() {
        return None;
    }

    let dates: Vec<DateTime<FixedOffset>> = commits
        .iter()
        .filter_map(|c| c.date.as_deref())
        .filter_map(|d| DateTime::parse_from_rfc3339(d).ok())
        .collect();
    let daily_commit_rate = match (dates.iter().min(), dates.iter().max()) {
        (Some(first), Some(last)) if dates.len() > 1 => {
            let days = (*last - *first).num_days().max(1);
            dates.len() as f64 / days as f64
        }
        _ => 0.0,
    };

    let unique_authors = commits
        .iter()
        .map(|c| c.author.as_str())
        .filter(|a| !a.is_empty())
        .collect::<HashSet<_>>()
        .len();

    let total_chars: usize = commits.iter().map(|c| c.message.chars().count()).sum();

    let mut commit_types = CommitTypes::default();
    for commit in commits {
        commit_types.count(CommitKind::classify(&commit.message));
    }

    Some(CommitAnalysis {
        total_commits: commits.len(),
        daily_commit_rate,
        unique_authors,
        average_message_length: total_chars as f64 / commits.len() as f64,
        commit_types,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributorAnalysis {
    pub total_contributors: usize,
    pub top_contributor: String,
    pub total_commits: u64,
    pub average_commits: f64,
    /// `1 − Σ share²`: 0 when one person did everything.
    pub diversity: f64,
}

pub fn analyze_contributors(contributors: &[ContributorRecord]) -> Option<ContributorAnalysis> {
    let top = contributors.first()?;
    let counts: Vec<u64> = contributors.iter().map(ContributorRecord::commit_count).collect();
    let total: u64 = counts.iter().sum();

    let diversity = if total == 0 {
        0.0
    } else {
        let hhi: f64 = counts
            .iter()
            .map(|&c| (c as f64 / total as f64).powi(2))
            .sum();
        1.0 - hhi
    };

    Some(ContributorAnalysis {
        total_contributors: contributors.len(),
        top_contributor: if top.username.is_empty() {
            config::UNKNOWN_CONTRIBUTOR.to_string()
        } else {
            top.username.clone()
        },
        total_commits: total,
        average_commits: total as f64 / counts.len() as f64,
        diversity,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub health_score: f64,
    pub activity_level: ActivityLevel,
    pub community_engagement: f64,
    pub development_velocity: f64,
}

fn tier(value: f64, thresholds: [f64; 3]) -> f64 {
    if value > thresholds[0] {
        1.0
    } else if value > thresholds[1] {
        0.8
    } else if value > thresholds[2] {
        0.6
    } else {
        0.3
    }
}

pub fn health_metrics(
    profile: &RepositoryProfile,
    commits: Option<&CommitAnalysis>,
    contributors: Option<&ContributorAnalysis>,
) -> HealthMetrics {
    let daily_rate = commits.map_or(0.0, |c| c.daily_commit_rate);
    let factors = [
        tier(profile.stars as f64, [10_000.0, 1_000.0, 100.0]),
        tier(profile.forks as f64, [1_000.0, 100.0, 10.0]),
        tier(daily_rate, [1.0, 0.5, 0.1]),
    ];
    let health_score = factors.iter().sum::<f64>() / factors.len() as f64 * 100.0;

    let (total_contributors, diversity) =
        contributors.map_or((0, 0.0), |c| (c.total_contributors, c.diversity));

    HealthMetrics {
        health_score,
        activity_level: ActivityLevel::from_health_score(health_score),
        community_engagement: (total_contributors as f64 * 10.0 + diversity * 50.0).min(100.0),
        development_velocity: (daily_rate * 50.0).min(100.0),
    }
}

/// A profile plus everything derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryReport {
    #[serde(flatten)]
    pub profile: RepositoryProfile,
    pub commit_analysis: Option<CommitAnalysis>,
    pub contributor_analysis: Option<ContributorAnalysis>,
    pub activity_metrics: HealthMetrics,
}

pub fn analyze_profile(profile: RepositoryProfile) -> RepositoryReport {
    let commit_analysis = analyze_commits(&profile.recent_commits);
    let contributor_analysis = analyze_contributors(&profile.top_contributors);
    let activity_metrics = health_metrics(
        &profile,
        commit_analysis.as_ref(),
        contributor_analysis.as_ref(),
    );
    RepositoryReport {
        profile,
        commit_analysis,
        contributor_analysis,
        activity_metrics,
    }
}
