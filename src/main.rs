use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use form13f::batch::{self, BatchOptions, BatchRunner, FundStatus};
use form13f::diff::{Comparison, latest_diff};
use form13f::metrics;
use form13f::report;
use form13f::resolver::{self, CikCache, CikResolver, FileCheckpoint};
use form13f::{Cik, FilingOptions, ResolverOptions, SecClient, SecConfig, Snapshot, SummaryOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "form13f", version)]
#[command(about = "Download, parse and compare SEC Form 13F-HR holdings")]
struct Cli {
    /// SEC.gov-required user agent (e.g. "MyApp you@example.com").
    #[arg(long, global = true, env = "SEC_USER_AGENT")]
    user_agent: Option<String>,

    /// Requests per second sent to SEC.gov.
    #[arg(long, global = true, default_value_t = 10)]
    rate_limit: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Download and parse the 13F-HR filings of every fund in a CIK list.
    Fetch {
        /// File with one CIK per line.
        #[arg(long, default_value = "cik_numbers.txt")]
        ciks: PathBuf,

        /// Directory receiving one fund_<cik> directory per fund.
        #[arg(short, long, default_value = "filings_13f")]
        output: PathBuf,

        /// Only filings made within this many years.
        #[arg(long, default_value_t = 7, conflicts_with = "since")]
        years: u32,

        /// Only filings made on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<NaiveDate>,

        /// At most this many filings per fund, newest first.
        #[arg(long)]
        limit: Option<usize>,

        /// Also collect 13F-HR/A amendments.
        #[arg(long)]
        amendments: bool,

        /// Skip the per-fund CSV and HTML exports.
        #[arg(long)]
        no_reports: bool,
    },

    /// Rebuild reports from a fund directory or a holdings CSV.
    Analyze {
        /// A fund_<cik> directory or an exported holdings CSV.
        input: PathBuf,

        /// Fund to analyze when the CSV holds several.
        #[arg(long)]
        cik: Option<Cik>,

        /// Where to write the reports. Defaults to the fund directory.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows in the top holdings table.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Resolve company names to CIKs, resuming from a cache file.
    Resolve {
        /// File with one company name per line.
        names: PathBuf,

        /// Resolution cache (name<TAB>CIK per line).
        #[arg(long, default_value = "cik_cache.tsv")]
        cache: PathBuf,

        /// Look up names again that were not found before.
        #[arg(long)]
        retry_not_found: bool,

        /// Also search the bulk cik-lookup-data.txt listing.
        #[arg(long)]
        lookup_data: bool,

        /// Do not use the ticker directory.
        #[arg(long)]
        no_tickers: bool,

        /// Save the cache after this many lookups.
        #[arg(long, default_value_t = 5)]
        checkpoint_every: usize,
    },

    /// Write the resolved CIKs of a cache as a CIK list.
    ExtractCiks {
        #[arg(long, default_value = "cik_cache.tsv")]
        cache: PathBuf,

        #[arg(short, long, default_value = "cik_numbers.txt")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Fetch {
            ref ciks,
            ref output,
            years,
            since,
            limit,
            amendments,
            no_reports,
        } => {
            let client = client(&cli)?;
            let mut filing_options = FilingOptions::new()
                .with_include_amendments(amendments)
                .with_lookback_years(Some(years));
            if let Some(since) = since {
                filing_options = filing_options.with_since(since);
            }
            if let Some(limit) = limit {
                filing_options = filing_options.with_limit(limit);
            }
            fetch(&client, ciks, output, filing_options, !no_reports).await
        }
        Command::Analyze {
            ref input,
            cik,
            ref output,
            top,
        } => analyze(input, cik, output.as_deref(), top),
        Command::Resolve {
            ref names,
            ref cache,
            retry_not_found,
            lookup_data,
            no_tickers,
            checkpoint_every,
        } => {
            let client = client(&cli)?;
            let options = ResolverOptions::new()
                .with_retry_not_found(retry_not_found)
                .with_lookup_data(lookup_data)
                .with_ticker_directory(!no_tickers)
                .with_checkpoint_every(checkpoint_every);
            resolve(&client, names, cache, options).await
        }
        Command::ExtractCiks { ref cache, ref output } => extract_ciks(cache, output),
    }
}

fn client(cli: &Cli) -> Result<SecClient> {
    let Some(user_agent) = cli.user_agent.as_deref().filter(|ua| !ua.trim().is_empty()) else {
        bail!("a user agent is required: pass --user-agent or set SEC_USER_AGENT");
    };
    let config = SecConfig {
        user_agent: user_agent.to_string(),
        rate_limit: cli.rate_limit,
        ..SecConfig::default()
    };
    SecClient::with_config(config).context("failed to create SEC client")
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}

async fn fetch(
    client: &SecClient,
    cik_file: &Path,
    output: &Path,
    filing_options: FilingOptions,
    fund_reports: bool,
) -> Result<()> {
    let ciks = batch::read_cik_list(cik_file)
        .with_context(|| format!("failed to read CIK list {}", cik_file.display()))?;
    if ciks.is_empty() {
        bail!("no CIKs found in {}", cik_file.display());
    }
    tracing::info!("Processing {} CIKs into {}", ciks.len(), output.display());

    let options = BatchOptions::new(output)
        .with_filing_options(filing_options)
        .with_fund_reports(fund_reports);
    let runner = BatchRunner::new(client, options);

    let pb = progress_bar(ciks.len());
    let report = runner
        .run(&ciks, |outcome| {
            pb.set_message(outcome.fund.to_string());
            pb.inc(1);
        })
        .await
        .context("batch run failed")?;
    pb.finish_and_clear();

    println!(
        "Collected {} of {} funds, {} holdings in total",
        report.collected(),
        report.funds.len(),
        report.total_holdings
    );
    for outcome in report.failed() {
        match &outcome.status {
            FundStatus::Empty => println!("  {}: no holdings", outcome.fund),
            FundStatus::Failed(reason) => println!("  {}: {}", outcome.fund, reason),
            FundStatus::Collected { .. } => {}
        }
    }
    match &report.combined_csv {
        Some(path) => println!("Combined holdings: {}", path.display()),
        None => println!("No holdings were found for any CIK"),
    }
    Ok(())
}

fn analyze(input: &Path, cik: Option<Cik>, output: Option<&Path>, top: usize) -> Result<()> {
    let history = load_history(input, cik)?;
    if history.is_empty() {
        bail!("no filings found in {}", input.display());
    }

    let output = match output {
        Some(dir) => dir.to_path_buf(),
        None if input.is_dir() => input.to_path_buf(),
        None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
    };
    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let summary_options = SummaryOptions::new().with_top_n(top);
    batch::write_fund_reports(&output, &history, &summary_options)
        .with_context(|| format!("failed to write reports to {}", output.display()))?;

    if let Some(overview) = metrics::overview(&history) {
        println!("Fund {}", overview.fund);
        println!(
            "  {} filings from {} to {}",
            overview.filings, overview.first_date, overview.last_date
        );
        println!("  Unique issuers: {}", overview.unique_issuers);
        println!("  Latest total value: ${}", overview.latest_value_usd);
        println!("  Top 10 concentration: {:.2}%", overview.concentration_pct);
    }

    if let (Comparison::Ready(diff), Some(current)) = (latest_diff(&history), history.last()) {
        let summary = metrics::summarize_with(current, &diff, &summary_options);
        println!(
            "  Since {}: {} new, {} closed, {} increased, {} decreased",
            summary.previous_date,
            summary.counts.new,
            summary.counts.closed,
            summary.counts.increased,
            summary.counts.decreased
        );
    }
    if let Comparison::Ready(series) = metrics::turnover(&history)? {
        println!("  Average turnover: {:.2}%", series.average());
    }
    println!("Reports written to {}", output.display());
    Ok(())
}

fn load_history(input: &Path, cik: Option<Cik>) -> Result<Vec<Snapshot>> {
    if input.is_dir() {
        return batch::load_fund_dir(input)
            .with_context(|| format!("failed to load {}", input.display()));
    }

    let snapshots = report::read_holdings(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let fund = match cik {
        Some(cik) => cik,
        None => {
            let mut funds: Vec<Cik> = snapshots.iter().map(Snapshot::fund).collect();
            funds.dedup();
            match funds.as_slice() {
                [only] => *only,
                [] => return Ok(Vec::new()),
                _ => bail!("{} holds several funds; pick one with --cik", input.display()),
            }
        }
    };
    Ok(snapshots.into_iter().filter(|s| s.fund() == fund).collect())
}

async fn resolve(client: &SecClient, names_file: &Path, cache_path: &Path, options: ResolverOptions) -> Result<()> {
    let names = std::fs::read_to_string(names_file)
        .with_context(|| format!("failed to read {}", names_file.display()))?;
    let names: Vec<&str> = names.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    let mut cache = CikCache::load(cache_path)
        .with_context(|| format!("failed to load cache {}", cache_path.display()))?;
    tracing::info!("Loaded {} cached names from {}", cache.len(), cache_path.display());

    let mut checkpoint = FileCheckpoint::new(cache_path);
    let mut resolver = CikResolver::new(client, options);
    let summary = resolver
        .resolve_all(names.iter().copied(), &mut cache, &mut checkpoint)
        .await
        .context("failed to save the resolution cache")?;

    println!(
        "Looked up {} names: {} found, {} not found, {} already cached",
        summary.looked_up(),
        summary.found,
        summary.not_found,
        summary.skipped
    );
    println!("Cache saved to {}", cache_path.display());
    Ok(())
}

fn extract_ciks(cache_path: &Path, output: &Path) -> Result<()> {
    let cache = CikCache::load(cache_path)
        .with_context(|| format!("failed to load cache {}", cache_path.display()))?;
    let ciks = resolver::extract_valid_ciks(&cache);
    report::write_cik_list(output, &ciks)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!(
        "Wrote {} CIKs to {} ({} names not found)",
        ciks.len(),
        output.display(),
        cache.not_found_count()
    );
    Ok(())
}
