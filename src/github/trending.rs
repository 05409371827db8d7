use std::sync::LazyLock;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use super::{FetchError, PageSource, Scraper, non_empty_text, text};
use crate::config;
use crate::model::{TimeRange, TrendingEntry, language_slug};
use crate::numbers::parse_count;

struct Selectors {
    /// Any container, for re-locating one inside its own fragment.
    container_any: Selector,
    /// Tried in order; the first that matches anything wins.
    containers: Vec<Selector>,
    titles: Vec<Selector>,
    anchor: Selector,
    descriptions: Vec<Selector>,
    languages: Vec<Selector>,
    span: Selector,
    span_or_div: Selector,
    avatar: Selector,
}

static SELECTORS: LazyLock<Option<Selectors>> = LazyLock::new(|| {
    let parse_all = |list: &[&str]| -> Option<Vec<Selector>> {
        list.iter().map(|s| Selector::parse(s).ok()).collect()
    };
    let selectors = (|| {
        Some(Selectors {
            container_any: Selector::parse("article.Box-row, div.Box-row").ok()?,
            containers: parse_all(&["article.Box-row", "div.Box-row"])?,
            titles: parse_all(&["h2.h3", "h1", "h2"])?,
            anchor: Selector::parse("a").ok()?,
            descriptions: parse_all(&["p.col-9", "p.color-fg-muted", "p"])?,
            languages: parse_all(&[
                "span[itemprop='programmingLanguage']",
                "span.color-fg-default",
            ])?,
            span: Selector::parse("span").ok()?,
            span_or_div: Selector::parse("span, div").ok()?,
            avatar: Selector::parse("img[alt]").ok()?,
        })
    })();
    if selectors.is_none() {
        tracing::error!("github: CSS selectors failed to parse, trending scraper is broken");
    }
    selectors
});

const PERIOD_PHRASES: &[&str] = &["stars today", "today", "stars this week", "this week"];

#[derive(Debug, Clone, Copy)]
enum Stat {
    Stars,
    Forks,
}

impl Stat {
    fn href_marker(self) -> &'static str {
        match self {
            Stat::Stars => "star",
            Stat::Forks => "fork",
        }
    }

    fn text_markers(self) -> &'static [&'static str] {
        match self {
            Stat::Stars => &["star", "⭐"],
            Stat::Forks => &["fork", "🍴"],
        }
    }
}

/// `{base}/trending[/{language}]?since={range}`. `language` is a display
/// name; "All" or empty means no filter.
pub fn trending_url(base: &str, language: &str, range: TimeRange) -> String {
    let lang_segment = language_slug(language).map_or(String::new(), |l| format!("/{l}"));
    format!(
        "{}/trending{}?since={}",
        base.trim_end_matches('/'),
        lang_segment,
        range
    )
}

impl<S: PageSource> Scraper<S> {
    /// Trending listing for `language` over `range`.
    ///
    /// Up to `max_attempts` tries. A transport failure or a page with no
    /// listing containers waits `retry_delay` and tries again; after the last
    /// attempt the result is empty.
    pub async fn fetch_trending(&self, language: &str, range: TimeRange) -> Vec<TrendingEntry> {
        let url = trending_url(self.config.base(), language, range);
        let attempts = self.config.max_attempts.max(1);

        for attempt in 1..=attempts {
            info!(attempt, attempts, %url, "github trending: fetching");

            match self.fetch_containers(&url).await {
                Ok(containers) if !containers.is_empty() => {
                    info!(containers = containers.len(), "github trending: page fetched");
                    return self.extract_entries(&containers).await;
                }
                Ok(_) => warn!(
                    attempt,
                    "github trending: no repository containers, page structure may have changed"
                ),
                Err(e) => warn!(attempt, error = %e, "github trending: fetch failed"),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        warn!(attempts, %url, "github trending: giving up");
        Vec::new()
    }

    async fn fetch_containers(&self, url: &str) -> Result<Vec<String>, FetchError> {
        let html = self
            .source
            .fetch(url, Some(self.config.trending_timeout))
            .await?;
        // spawn_blocking: scraper HTML parsing is CPU-bound.
        Ok(tokio::task::spawn_blocking(move || split_containers(&html)).await?)
    }

    async fn extract_entries(&self, containers: &[String]) -> Vec<TrendingEntry> {
        let mut entries = Vec::with_capacity(containers.len());
        for (i, container) in containers.iter().enumerate() {
            match extract_fragment(container, self.config.base()) {
                Some(entry) => {
                    debug!(index = i + 1, repo = %entry.name, "github trending: extracted");
                    entries.push(entry);
                }
                None => debug!(index = i + 1, "github trending: container skipped"),
            }
            tokio::time::sleep(self.config.item_pause()).await;
        }
        info!(entries = entries.len(), "github trending: extracted repositories");
        entries
    }
}

/// Outer HTML of every listing container on the page.
fn split_containers(html: &str) -> Vec<String> {
    let Some(sel) = SELECTORS.as_ref() else {
        return Vec::new();
    };
    let document = Html::parse_document(html);

    let containers: Vec<String> = sel
        .containers
        .iter()
        .map(|s| document.select(s).map(|el| el.html()).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
        .unwrap_or_default();

    // A valid trending page always has rows. A large page with none means
    // the markup changed under us.
    if containers.is_empty() && html.len() > 1000 {
        tracing::error!(
            html_len = html.len(),
            "github: 0 containers matched on non-empty page, CSS selectors may be stale"
        );
    }
    containers
}

fn extract_fragment(container_html: &str, base: &str) -> Option<TrendingEntry> {
    let sel = SELECTORS.as_ref()?;
    let fragment = Html::parse_fragment(container_html);
    let scope = fragment
        .select(&sel.container_any)
        .next()
        .unwrap_or_else(|| fragment.root_element());
    extract_entry(scope, base)
}

/// Every entry on a fetched trending page, without pacing.
pub fn parse_trending_html(html: &str, base: &str) -> Vec<TrendingEntry> {
    split_containers(html)
        .iter()
        .filter_map(|c| extract_fragment(c, base))
        .collect()
}

/// One listing container to an entry. `None` when name or URL is missing;
/// every other field falls back to its default.
pub fn extract_entry(container: ElementRef, base: &str) -> Option<TrendingEntry> {
    let sel = SELECTORS.as_ref()?;

    let link = sel
        .titles
        .iter()
        .flat_map(|s| container.select(s))
        .find_map(|heading| heading.select(&sel.anchor).next())?;

    let name: String = link.text().flat_map(str::split_whitespace).collect();
    let url = link
        .value()
        .attr("href")
        .and_then(|href| resolve_href(base, href))
        .unwrap_or_default();

    if name.is_empty() || url.is_empty() {
        debug!(?name, ?url, "github trending: missing name or url");
        return None;
    }

    let description = first_text(container, &sel.descriptions)
        .unwrap_or_else(|| config::NO_DESCRIPTION.to_string());
    let language = first_text(container, &sel.languages)
        .unwrap_or_else(|| config::UNKNOWN_LANGUAGE.to_string());

    let stars = stat(container, sel, Stat::Stars);
    let forks = stat(container, sel, Stat::Forks);
    let stars_today = stars_today(container, sel);

    let handles = contributors(container, sel);
    let contributors = if handles.is_empty() {
        config::NO_CONTRIBUTORS.to_string()
    } else {
        handles.join(", ")
    };

    if stars == 0 && forks == 0 {
        warn!(
            repo = %name,
            "parsed with 0 stars and 0 forks, sub-selectors may be stale"
        );
    }

    Some(TrendingEntry {
        name,
        url,
        description,
        language,
        stars,
        forks,
        stars_today,
        contributors,
    })
}

/// Absolute URL for `href`, joined onto `base` when relative.
fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(href) {
        return Some(url.into());
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => Some(url.into()),
        Err(e) => {
            debug!(error = %e, href, "github trending: unresolvable href");
            None
        }
    }
}

fn first_text(container: ElementRef, cascade: &[Selector]) -> Option<String> {
    cascade
        .iter()
        .find_map(|s| container.select(s).next())
        .and_then(non_empty_text)
}

fn stat(container: ElementRef, sel: &Selectors, which: Stat) -> u64 {
    let strategies: [fn(ElementRef, &Selectors, Stat) -> Option<u64>; 2] =
        [stat_from_links, stat_from_text];
    strategies
        .iter()
        .find_map(|strategy| strategy(container, sel, which))
        .unwrap_or(0)
}

/// Links pointing at `/stargazers` or `/forks`. Zero counts as not found.
fn stat_from_links(container: ElementRef, sel: &Selectors, which: Stat) -> Option<u64> {
    let marker = which.href_marker();
    container
        .select(&sel.anchor)
        .filter(|a| {
            let href = a.value().attr("href").unwrap_or_default().to_lowercase();
            let label = text(*a).to_lowercase();
            let is_star = href.contains("star") || label.contains("star");
            // a link that mentions both is a star link
            match which {
                Stat::Stars => is_star,
                Stat::Forks => !is_star && (href.contains(marker) || label.contains(marker)),
            }
        })
        .map(|a| parse_count(&text(a)))
        .find(|&n| n > 0)
}

/// Any span whose text carries the keyword or its emoji. The first hit is
/// taken even when it reads 0.
///
/// Known false-positive risk: unrelated text that happens to contain "star"
/// or "fork" (including "N stars today") is read as the total.
fn stat_from_text(container: ElementRef, sel: &Selectors, which: Stat) -> Option<u64> {
    let markers = which.text_markers();
    container
        .select(&sel.span)
        .map(text)
        .find(|t| {
            let lower = t.to_lowercase();
            markers.iter().any(|m| lower.contains(m))
        })
        .map(|t| parse_count(&t))
}

/// Count next to "stars today" / "this week". When matches nest, the
/// innermost one is read so a wrapper's other numbers don't leak in.
fn stars_today(container: ElementRef, sel: &Selectors) -> u64 {
    let mut matches = container.select(&sel.span_or_div).filter(|el| {
        let lower = text(*el).to_lowercase();
        PERIOD_PHRASES.iter().any(|p| lower.contains(p))
    });

    let Some(mut current) = matches.next() else {
        return 0;
    };
    // document order: nested matches come straight after their ancestor
    for next in matches {
        if next.ancestors().any(|a| a == *current) {
            current = next;
        } else {
            break;
        }
    }
    parse_count(&text(current))
}

/// Handles from avatar alt texts (`@handle`), up to five. The "Built by"
/// block is preferred, then any avatar in the container.
fn contributors(container: ElementRef, sel: &Selectors) -> Vec<String> {
    let handles_in = |scope: ElementRef| -> Vec<String> {
        scope
            .select(&sel.avatar)
            .filter_map(|img| img.value().attr("alt"))
            .filter_map(|alt| alt.trim().strip_prefix('@'))
            .filter(|h| !h.is_empty())
            .take(config::BUILT_BY_LIMIT)
            .map(String::from)
            .collect()
    };

    let built_by = container
        .select(&sel.span)
        .find(|span| text(*span).to_lowercase().contains("built by"))
        .and_then(|span| span.parent())
        .and_then(ElementRef::wrap)
        .map(handles_in)
        .unwrap_or_default();

    if built_by.is_empty() {
        handles_in(container)
    } else {
        built_by
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::ScraperConfig;
    use crate::github::tests::{FakeSource, test_scraper};

    const BASE: &str = "https://github.com";

    fn entry_from(container_html: &str) -> Option<TrendingEntry> {
        extract_fragment(container_html, BASE)
    }

    const FULL_ARTICLE: &str = r#"
        <article class="Box-row">
          <h2 class="h3 lh-condensed">
            <a href="/rust-lang/rust">
              <span class="text-normal">rust-lang /</span>
              rust
            </a>
          </h2>
          <p class="col-9 color-fg-muted my-1 pr-4">
            Empowering everyone to build reliable and efficient software.
          </p>
          <div class="f6 color-fg-muted mt-2">
            <span class="d-inline-block ml-0 mr-3">
              <span class="repo-language-color" style="background-color: #dea584"></span>
              <span itemprop="programmingLanguage">Rust</span>
            </span>
            <a class="Link Link--muted d-inline-block mr-3" href="/rust-lang/rust/stargazers">
              <svg aria-label="star"></svg>
              98,765
            </a>
            <a class="Link Link--muted d-inline-block mr-3" href="/rust-lang/rust/forks">
              <svg aria-label="fork"></svg>
              12.7k
            </a>
            <span class="d-inline-block mr-3">
              Built by
              <a href="/alice"><img class="avatar" alt="@alice" src="a.png"></a>
              <a href="/bob"><img class="avatar" alt="@bob" src="b.png"></a>
            </span>
            <span class="d-inline-block float-sm-right">
              <svg></svg>
              1,024 stars today
            </span>
          </div>
        </article>"#;

    #[test]
    fn extracts_a_full_listing_item() {
        let entry = entry_from(FULL_ARTICLE).expect("entry");
        assert_eq!(entry.name, "rust-lang/rust");
        assert_eq!(entry.url, "https://github.com/rust-lang/rust");
        assert_eq!(
            entry.description,
            "Empowering everyone to build reliable and efficient software."
        );
        assert_eq!(entry.language, "Rust");
        assert_eq!(entry.stars, 98_765);
        assert_eq!(entry.forks, 12_700);
        assert_eq!(entry.stars_today, 1024);
        assert_eq!(entry.contributors, "alice, bob");
    }

    #[test]
    fn heading_and_anchor_alone_yield_defaults() {
        let entry = entry_from(
            r#"<article class="Box-row"><h2><a href="/octocat/demo">octocat / demo</a></h2></article>"#,
        )
        .expect("not skipped");
        assert_eq!(entry.name, "octocat/demo");
        assert_eq!(entry.url, "https://github.com/octocat/demo");
        assert_eq!(entry.stars, 0);
        assert_eq!(entry.forks, 0);
        assert_eq!(entry.stars_today, 0);
        assert_eq!(entry.description, config::NO_DESCRIPTION);
        assert_eq!(entry.language, config::UNKNOWN_LANGUAGE);
        assert_eq!(entry.contributors, config::NO_CONTRIBUTORS);
    }

    #[test]
    fn container_without_anchor_is_skipped() {
        assert!(entry_from(r#"<article class="Box-row"><h2>octocat / demo</h2><p>text</p></article>"#).is_none());
    }

    #[test]
    fn anchor_without_href_is_skipped() {
        assert!(entry_from(r#"<article class="Box-row"><h2><a>octocat/demo</a></h2></article>"#).is_none());
    }

    #[test]
    fn absolute_href_is_kept() {
        let entry = entry_from(
            r#"<div class="Box-row"><h1><a href="https://example.com/a/b">a/b</a></h1></div>"#,
        )
        .unwrap();
        assert_eq!(entry.url, "https://example.com/a/b");
    }

    #[test]
    fn empty_description_uses_sentinel() {
        let entry = entry_from(
            r#"<article class="Box-row"><h2><a href="/a/b">a/b</a></h2><p class="col-9">   </p></article>"#,
        )
        .unwrap();
        assert_eq!(entry.description, config::NO_DESCRIPTION);
    }

    #[test]
    fn description_falls_back_to_any_paragraph() {
        let entry = entry_from(
            r#"<article class="Box-row"><h2><a href="/a/b">a/b</a></h2><p>plain paragraph</p></article>"#,
        )
        .unwrap();
        assert_eq!(entry.description, "plain paragraph");
    }

    #[test]
    fn language_falls_back_to_styled_span() {
        let entry = entry_from(
            r#"<article class="Box-row"><h2><a href="/a/b">a/b</a></h2><span class="color-fg-default">Go</span></article>"#,
        )
        .unwrap();
        assert_eq!(entry.language, "Go");
    }

    #[test]
    fn stats_fall_back_to_decorative_text() {
        let entry = entry_from(
            r#"<article class="Box-row">
                 <h2><a href="/a/b">a/b</a></h2>
                 <span>⭐ 1,234</span>
                 <span>🍴 340</span>
               </article>"#,
        )
        .unwrap();
        assert_eq!(entry.stars, 1234);
        assert_eq!(entry.forks, 340);
    }

    #[test]
    fn zero_link_count_falls_back_to_text() {
        let entry = entry_from(
            r#"<article class="Box-row">
                 <h2><a href="/a/b">a/b</a></h2>
                 <a href="/a/b/stargazers">n/a</a>
                 <span>512 stars</span>
               </article>"#,
        )
        .unwrap();
        assert_eq!(entry.stars, 512);
    }

    #[test]
    fn nested_period_count_reads_innermost_match() {
        let entry = entry_from(
            r#"<article class="Box-row">
                 <h2><a href="/a/b">a/b</a></h2>
                 <div class="f6"><a href="/a/b/stargazers">5,000</a><span>87 stars today</span></div>
               </article>"#,
        )
        .unwrap();
        assert_eq!(entry.stars, 5000);
        assert_eq!(entry.stars_today, 87);
    }

    #[test]
    fn weekly_phrase_ends_in_thousands_suffix() {
        // "...this week" ends in `k` and its prefix is not a number
        let entry = entry_from(
            r#"<article class="Box-row">
                 <h2><a href="/a/b">a/b</a></h2>
                 <span>87 stars this week</span>
               </article>"#,
        )
        .unwrap();
        assert_eq!(entry.stars_today, 0);
    }

    #[test]
    fn avatars_without_built_by_label_are_used_and_capped() {
        let avatars: String = (1..=7)
            .map(|i| format!(r#"<img alt="@user{i}" src="x">"#))
            .collect();
        let html = format!(
            r#"<article class="Box-row"><h2><a href="/a/b">a/b</a></h2><div>{avatars}<img alt="logo"></div></article>"#
        );
        let entry = entry_from(&html).unwrap();
        assert_eq!(entry.contributors, "user1, user2, user3, user4, user5");
    }

    #[test]
    fn trending_urls() {
        assert_eq!(
            trending_url(BASE, "All", TimeRange::Daily),
            "https://github.com/trending?since=daily"
        );
        assert_eq!(
            trending_url("https://github.com/", "Python", TimeRange::Weekly),
            "https://github.com/trending/python?since=weekly"
        );
        assert_eq!(
            trending_url(BASE, "C#", TimeRange::Monthly),
            "https://github.com/trending/c%23?since=monthly"
        );
    }

    fn page(articles: &[&str]) -> String {
        format!("<html><body><main>{}</main></body></html>", articles.concat())
    }

    #[test]
    fn page_parse_is_deterministic_and_skips_bad_rows() {
        let html = page(&[
            FULL_ARTICLE,
            r#"<article class="Box-row"><h2>no link</h2></article>"#,
            r#"<article class="Box-row"><h2><a href="/octocat/demo">octocat/demo</a></h2></article>"#,
        ]);
        let first = parse_trending_html(&html, BASE);
        let second = parse_trending_html(&html, BASE);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first[1].name, "octocat/demo");
    }

    #[test]
    fn div_containers_are_the_fallback() {
        let html = page(&[r#"<div class="Box-row"><h2><a href="/x/y">x/y</a></h2></div>"#]);
        let entries = parse_trending_html(&html, BASE);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "x/y");
    }

    #[tokio::test]
    async fn empty_pages_are_retried_three_times() {
        let url = "https://github.com/trending?since=daily";
        let scraper = test_scraper(FakeSource::new().page(url, "<html><body></body></html>"));

        let entries = scraper.fetch_trending("All", TimeRange::Daily).await;

        assert!(entries.is_empty());
        assert_eq!(scraper.source().call_count(), 3);
    }

    #[tokio::test]
    async fn transport_failures_are_retried_three_times() {
        let url = "https://github.com/trending/rust?since=weekly";
        let scraper = test_scraper(FakeSource::new().failing(url));

        let entries = scraper.fetch_trending("Rust", TimeRange::Weekly).await;

        assert!(entries.is_empty());
        assert_eq!(scraper.source().call_count(), 3);
    }

    #[tokio::test]
    async fn success_stops_retrying_and_uses_trending_deadline() {
        let url = "https://github.com/trending?since=monthly";
        let scraper = test_scraper(FakeSource::new().page(url, &page(&[FULL_ARTICLE])));

        let entries = scraper.fetch_trending("all", TimeRange::Monthly).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "rust-lang/rust");
        let calls = scraper.source().calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_delay_sits_between_attempts_only() {
        let url = "https://github.com/trending?since=daily";
        let scraper = Scraper::new(
            FakeSource::new().page(url, "<html><body></body></html>"),
            ScraperConfig::default(),
        );
        let start = tokio::time::Instant::now();

        let entries = scraper.fetch_trending("All", TimeRange::Daily).await;

        let elapsed = start.elapsed();
        assert!(entries.is_empty());
        assert_eq!(scraper.source().call_count(), 3);
        // two 2 s waits, none after the last attempt
        assert!(elapsed >= Duration::from_secs(4), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(5), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn items_are_paced() {
        const N: u32 = 4;
        let url = "https://github.com/trending?since=daily";
        let articles: Vec<String> = (0..N)
            .map(|i| format!(r#"<article class="Box-row"><h2><a href="/o/r{i}">o/r{i}</a></h2></article>"#))
            .collect();
        let refs: Vec<&str> = articles.iter().map(String::as_str).collect();
        let scraper = Scraper::new(
            FakeSource::new().page(url, &page(&refs)),
            ScraperConfig::default(),
        );
        let start = tokio::time::Instant::now();

        let entries = scraper.fetch_trending("All", TimeRange::Daily).await;

        let elapsed = start.elapsed();
        assert_eq!(entries.len(), N as usize);
        assert!(elapsed >= Duration::from_millis(100) * N, "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(300) * N, "{elapsed:?}");
    }
}
