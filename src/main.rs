use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use opentrend::config;
use opentrend::export::{self, ExportError};
use opentrend::metrics::{self, SortKey};
use opentrend::{FetchError, Scraper, ScraperConfig, TimeRange};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Site root to scrape. Falls back to OPENTREND_BASE_URL, then github.com.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List trending repositories.
    Trending {
        /// Display name such as "Rust" or "C#". "All" for every language.
        #[arg(short, long, default_value = "All")]
        language: String,

        #[arg(short, long, value_enum, default_value_t = TimeRange::Daily)]
        since: TimeRange,

        #[arg(short, long, value_enum, default_value_t = TrendingFormat::Table)]
        format: TrendingFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value_t = 0)]
        min_stars: u64,

        /// Keep only the N highest by --sort.
        #[arg(long)]
        top: Option<usize>,

        #[arg(long, value_enum, default_value_t = SortKey::Stars)]
        sort: SortKey,
    },
    /// Profile one repository and derive health metrics.
    Analyze {
        /// e.g. https://github.com/rust-lang/rust
        url: String,

        #[arg(short, long, value_enum, default_value_t = ReportFormat::Json)]
        format: ReportFormat,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the common language filters and their URL slugs.
    Languages,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TrendingFormat {
    Table,
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    /// Profile plus commit, contributor and health analysis.
    Json,
    /// Recent commits only.
    Csv,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to set up HTTP client: {0}")]
    Client(#[from] FetchError),
    #[error("failed to open {path}: {source}")]
    Output { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "opentrend failed");
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so stdout stays clean for CSV/JSON output.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn run(args: Args) -> Result<(), CliError> {
    if let Command::Languages = args.command {
        let mut out = io::stdout().lock();
        for name in config::LANGUAGES {
            let slug = opentrend::language_slug(name).unwrap_or_default();
            writeln!(out, "{name:<12} {slug}")?;
        }
        return Ok(());
    }

    let mut config = ScraperConfig::from_env();
    if let Some(url) = args.base_url {
        config = config.with_base_url(url);
    }
    let scraper = Scraper::http(config)?;

    match args.command {
        Command::Trending {
            language,
            since,
            format,
            output,
            min_stars,
            top,
            sort,
        } => {
            let entries = scraper.fetch_trending(&language, since).await;
            if entries.is_empty() {
                warn!(%language, %since, "no trending repositories found");
            }

            let mut entries = metrics::filter_by_stars(&entries, min_stars, None);
            if let Some(n) = top {
                entries = metrics::top_by(&entries, n, sort);
            }

            let stats = metrics::language_statistics(&entries);
            info!(
                repositories = entries.len(),
                languages = stats.total_languages,
                most_popular = %stats.most_popular_language,
                "trending summary"
            );

            let mut out = open_output(output.as_deref())?;
            match format {
                TrendingFormat::Table => {
                    let table = export::render_table(&metrics::score_entries(&entries));
                    out.write_all(table.as_bytes())?
                }
                TrendingFormat::Csv => export::write_csv(&mut out, &entries)?,
                TrendingFormat::Json => {
                    export::write_json(&mut out, &metrics::score_entries(&entries))?
                }
            }
            out.flush()?;
        }
        Command::Analyze {
            url,
            format,
            output,
        } => {
            let Some(profile) = scraper.analyze_repository(&url).await else {
                warn!(%url, "no repository profile available");
                return Ok(());
            };
            info!(
                name = %profile.name,
                stars = profile.stars,
                commits = profile.recent_commits.len(),
                contributors = profile.top_contributors.len(),
                "repository profiled"
            );

            let mut out = open_output(output.as_deref())?;
            match format {
                ReportFormat::Json => {
                    export::write_json(&mut out, &metrics::analyze_profile(profile))?
                }
                ReportFormat::Csv => export::write_csv(&mut out, &profile.recent_commits)?,
            }
            out.flush()?;
        }
        Command::Languages => {}
    }
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, CliError> {
    match path {
        Some(path) => {
            let file = File::create(path).map_err(|source| CliError::Output {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}
