use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use super::{FetchError, PageSource, Scraper, non_empty_text, text};
use crate::config;
use crate::model::{CommitRecord, ContributorRecord, RepositoryProfile};
use crate::numbers::{parse_count, parse_size};

struct Selectors {
    stat_links: Vec<Selector>,
    strong: Selector,
    languages: Vec<Selector>,
    descriptions: Vec<Selector>,
    span: Selector,
    commit_rows: Vec<Selector>,
    commit_messages: Vec<Selector>,
    commit_authors: Vec<Selector>,
    commit_times: Vec<Selector>,
    contributor_items: Selector,
    contributor_name: Selector,
    contributor_commits: Selector,
    issue_count: Selector,
}

static SELECTORS: LazyLock<Option<Selectors>> = LazyLock::new(|| {
    let parse_all = |list: &[&str]| -> Option<Vec<Selector>> {
        list.iter().map(|s| Selector::parse(s).ok()).collect()
    };
    let selectors = (|| {
        Some(Selectors {
            stat_links: parse_all(&["a.Link--primary", "a.Link--muted"])?,
            strong: Selector::parse("strong").ok()?,
            languages: parse_all(&[
                "span[itemprop='programmingLanguage']",
                "span.color-fg-default.text-bold",
            ])?,
            descriptions: parse_all(&["p[itemprop='about']", "p.f4.my-3"])?,
            span: Selector::parse("span").ok()?,
            commit_rows: parse_all(&["div.Box-row", "li.Box-row"])?,
            commit_messages: parse_all(&["a[data-pjax]", "a.markdown-title"])?,
            commit_authors: parse_all(&["a.commit-author", ".commit-author"])?,
            commit_times: parse_all(&["relative-time[datetime]", "time[datetime]"])?,
            contributor_items: Selector::parse("li.contrib-person").ok()?,
            contributor_name: Selector::parse("a.text-normal").ok()?,
            contributor_commits: Selector::parse("span.num").ok()?,
            issue_count: Selector::parse("span#issues-repo-tab-count").ok()?,
        })
    })();
    if selectors.is_none() {
        tracing::error!("github: CSS selectors failed to parse, repository scraper is broken");
    }
    selectors
});

/// Counters and text from a repository's root page. Missing pieces are
/// `None` / 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootStats {
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub language: Option<String>,
    pub description: Option<String>,
    pub size_kb: u64,
}

/// Owner and repository name: the last two path segments of `repo_url`.
pub fn split_repo_url(repo_url: &str) -> Option<(String, String)> {
    let url = Url::parse(repo_url.trim()).ok()?;
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [.., owner, repo] => Some((owner.to_string(), repo.to_string())),
        _ => None,
    }
}

pub fn commits_url(base: &str, owner: &str, repo: &str) -> String {
    format!("{}/{owner}/{repo}/commits", base.trim_end_matches('/'))
}

pub fn contributors_url(base: &str, owner: &str, repo: &str) -> String {
    format!("{}/{owner}/{repo}/graphs/contributors", base.trim_end_matches('/'))
}

pub fn issues_url(base: &str, owner: &str, repo: &str) -> String {
    format!("{}/{owner}/{repo}/issues", base.trim_end_matches('/'))
}

impl<S: PageSource> Scraper<S> {
    /// Deep dive on one repository.
    ///
    /// `None` when the URL has fewer than two path segments (nothing is
    /// fetched) or when the root page can't be fetched. The commits,
    /// contributors and issues pages are then fetched concurrently; each one
    /// that fails leaves its part of the profile at the default.
    pub async fn analyze_repository(&self, repo_url: &str) -> Option<RepositoryProfile> {
        let Some((owner, repo)) = split_repo_url(repo_url) else {
            warn!(url = repo_url, "github repository: not an owner/repo URL");
            return None;
        };

        info!(%owner, %repo, "github repository: analyzing");

        let root = match self.fetch_parsed(repo_url, parse_root_page).await {
            Ok(root) => root,
            Err(e) => {
                warn!(url = repo_url, error = %e, "github repository: root page failed");
                return None;
            }
        };

        let base = self.config.base();
        let (recent_commits, top_contributors, open_issues) = tokio::join!(
            self.best_effort("commits", commits_url(base, &owner, &repo), parse_commits),
            self.best_effort(
                "contributors",
                contributors_url(base, &owner, &repo),
                parse_contributors
            ),
            self.best_effort("issues", issues_url(base, &owner, &repo), parse_issue_count),
        );

        let mut profile = RepositoryProfile::new(repo_url, &owner, &repo);
        profile.stars = root.stars;
        profile.forks = root.forks;
        profile.watchers = root.watchers;
        if let Some(language) = root.language {
            profile.language = language;
        }
        if let Some(description) = root.description {
            profile.description = description;
        }
        profile.size_kb = root.size_kb;
        profile.open_issues = open_issues;
        profile.recent_commits = recent_commits;
        profile.top_contributors = top_contributors;

        info!(
            repo = %profile.name,
            stars = profile.stars,
            commits = profile.recent_commits.len(),
            contributors = profile.top_contributors.len(),
            open_issues = profile.open_issues,
            "github repository: analyzed"
        );
        Some(profile)
    }

    async fn fetch_parsed<T: Send + 'static>(
        &self,
        url: &str,
        parse: fn(&str) -> T,
    ) -> Result<T, FetchError> {
        let html = self.source.fetch(url, None).await?;
        // spawn_blocking: scraper HTML parsing is CPU-bound.
        Ok(tokio::task::spawn_blocking(move || parse(&html)).await?)
    }

    /// One sub-page. A failure is logged and yields `T::default()`.
    async fn best_effort<T: Default + Send + 'static>(
        &self,
        what: &'static str,
        url: String,
        parse: fn(&str) -> T,
    ) -> T {
        self.fetch_parsed(&url, parse).await.unwrap_or_else(|e| {
            warn!(page = what, %url, error = %e, "github repository: sub-page failed");
            T::default()
        })
    }
}

pub fn parse_root_page(html: &str) -> RootStats {
    let Some(sel) = SELECTORS.as_ref() else {
        return RootStats::default();
    };
    let document = Html::parse_document(html);
    let root = document.root_element();

    // "<strong>12.3k</strong> stars": the emphasized part is the number
    let stat = |marker: &str| -> u64 {
        sel.stat_links
            .iter()
            .flat_map(|s| root.select(s))
            .filter(|a| a.value().attr("href").is_some_and(|h| h.contains(marker)))
            .map(|a| {
                let count = a.select(&sel.strong).next().unwrap_or(a);
                parse_count(&text(count))
            })
            .find(|&n| n > 0)
            .unwrap_or(0)
    };

    RootStats {
        stars: stat("/stargazers"),
        forks: stat("/forks"),
        watchers: stat("/watchers"),
        language: first_text(root, &sel.languages),
        description: first_text(root, &sel.descriptions),
        size_kb: root
            .select(&sel.span)
            .map(|span| parse_size(&text(span)))
            .find(|&kb| kb > 0)
            .unwrap_or(0),
    }
}

/// Up to ten commit rows, newest first. Rows with nothing readable are dropped.
pub fn parse_commits(html: &str) -> Vec<CommitRecord> {
    let Some(sel) = SELECTORS.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let rows: Vec<ElementRef> = sel
        .commit_rows
        .iter()
        .map(|s| document.select(s).collect::<Vec<_>>())
        .find(|rows| !rows.is_empty())
        .unwrap_or_default();

    rows.into_iter()
        .take(config::RECENT_COMMITS_LIMIT)
        .map(|row| CommitRecord {
            message: first_text(row, &sel.commit_messages).unwrap_or_default(),
            author: first_text(row, &sel.commit_authors).unwrap_or_default(),
            date: sel
                .commit_times
                .iter()
                .find_map(|s| row.select(s).next())
                .and_then(|t| t.value().attr("datetime"))
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(String::from),
        })
        .filter(|commit| !commit.is_empty())
        .collect()
}

/// Up to ten contributors. Commit counts stay as rendered.
pub fn parse_contributors(html: &str) -> Vec<ContributorRecord> {
    let Some(sel) = SELECTORS.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    document
        .select(&sel.contributor_items)
        .take(config::TOP_CONTRIBUTORS_LIMIT)
        .map(|item| ContributorRecord {
            username: item
                .select(&sel.contributor_name)
                .next()
                .map(text)
                .unwrap_or_default(),
            commits: item
                .select(&sel.contributor_commits)
                .next()
                .map(text)
                .unwrap_or_default(),
        })
        .filter(|c| !c.is_empty())
        .collect()
}

/// Open issue count from the issues tab counter. The `title` attribute
/// carries the exact number when the text is abbreviated.
pub fn parse_issue_count(html: &str) -> u64 {
    let Some(sel) = SELECTORS.as_ref() else {
        return 0;
    };
    let document = Html::parse_document(html);
    let Some(counter) = document.select(&sel.issue_count).next() else {
        return 0;
    };
    counter
        .value()
        .attr("title")
        .map(parse_count)
        .filter(|&n| n > 0)
        .unwrap_or_else(|| parse_count(&text(counter)))
}

fn first_text(scope: ElementRef, cascade: &[Selector]) -> Option<String> {
    cascade
        .iter()
        .find_map(|s| scope.select(s).next())
        .and_then(non_empty_text)
}
