use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands::*, TraceLevel};
use dotenv::{dotenv, var};
use serde::Serialize;
use sift_core::analysis::{apply_volatility_overrides, AnalysisSummary, AssetAnalysis};
use sift_core::backfill::{backfill_zero_volatility, volatility_sources};
use sift_core::config::parse_reference_date;
use sift_core::metrics::{extract_all, extract_column_rows, extract_metric_rows, MetricRow};
use sift_core::transactions::{collect_histories, HoldingHistory};
use sift_core::{analyze, Config, Pattern, Report};
use indicatif::MultiProgress;
use sift_util::{print_json, read_json, read_text, single_pb, spinner, write_json};
use std::path::Path;
use tracing::{debug, error, info, subscriber, trace, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod cli;

fn preprocess(trace_level: Level) -> Result<()> {
    dotenv().ok();
    let my_subscriber = FmtSubscriber::builder()
        .with_max_level(trace_level)
        .with_writer(std::io::stderr)
        .finish();
    subscriber::set_global_default(my_subscriber)?;
    Ok(())
}

/// Defaults, then the `--config` file, then env vars, then flags.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config: Config = match &cli.config {
        Some(path) => read_json(path)?,
        None => Config::default(),
    };

    if let Ok(date) = var("REFERENCE_END_DATE") {
        config.reference_end_date = parse_reference_date(&date)?;
    }
    if let Ok(depth) = var("SIFT_MAX_DEPTH") {
        config.max_depth = depth
            .trim()
            .parse()
            .with_context(|| format!("SIFT_MAX_DEPTH must be a positive integer, found {depth:?}"))?;
    }
    if let Some(date) = cli.reference_date {
        config.reference_end_date = date;
    }
    if let Some(depth) = cli.max_depth {
        config.max_depth = depth;
    }

    debug!(
        "reference end date {}, max depth {}",
        config.reference_end_date, config.max_depth
    );
    Ok(config)
}

fn load_report(multi: &MultiProgress, path: &Path, config: &Config) -> Result<Report> {
    let pb = spinner(multi, format!("loading {}", path.display()));
    let report = read_text(path).and_then(|text| {
        Report::parse(&text, config.max_depth)
            .with_context(|| format!("failed to decode {}", path.display()))
    });
    pb.finish_and_clear();
    let report = report?;

    if report.skipped_nodes > 0 {
        warn!(
            "{}: skipped {} malformed line(s)",
            path.display(),
            report.skipped_nodes
        );
    }
    trace!("{}: {} header(s)", path.display(), report.headers.len());
    Ok(report)
}

fn emit<T: Serialize + ?Sized>(out: Option<&Path>, value: &T) -> Result<()> {
    match out {
        Some(path) => {
            write_json(path, value)?;
            info!("output written to {}", path.display());
            Ok(())
        }
        None => print_json(value),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.trace {
        TraceLevel::TRACE => Level::TRACE,
        TraceLevel::DEBUG => Level::DEBUG,
        TraceLevel::INFO => Level::INFO,
        TraceLevel::WARN => Level::WARN,
        TraceLevel::ERROR => Level::ERROR,
    };

    preprocess(log_level)?;
    trace!("Command line input recorded: {cli:#?}");

    rayon::ThreadPoolBuilder::new()
        .num_threads(cli.threads.unwrap_or_else(num_cpus::get))
        .build_global()?;

    if let Err(e) = run(&cli) {
        error!("{e:#}");
        return Err(e);
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let out = cli.out.as_deref();
    let multi = MultiProgress::new();

    ////////////////////////////////////////////////////////////////////////////////////////////////////

    // cli framework:
    // "> sift <COMMAND>"
    match &cli.command {
        // "> sift metrics <REPORT>"
        // one flat record per asset, for the standard metrics
        Metrics { report } => {
            let report = load_report(&multi, report, &config)?;
            let table = extract_all(&report, &config.metric_rules, config.max_depth)?;
            info!("extracted metrics for {} asset(s)", table.len());
            emit(out, &table)?;
        }

        // ---------------------------------------------------------------------------
        // "> sift metric <REPORT> --include volatility"
        // one column only; rows with a null value are dropped
        Metric {
            report,
            include,
            exclude,
            name,
            any_column,
        } => {
            let report = load_report(&multi, report, &config)?;
            let pattern = Pattern {
                include: include.iter().map(|w| w.to_lowercase()).collect(),
                exclude: exclude.iter().map(|w| w.to_lowercase()).collect(),
            };
            let metric = match name {
                Some(name) => name.clone(),
                None => include.first().cloned().unwrap_or_else(|| "metric".into()),
            };
            let rows = if *any_column {
                extract_metric_rows(&report, &metric, &pattern, config.max_depth)?
            } else {
                extract_column_rows(&report, &metric, &pattern, config.max_depth)?
            };
            info!("extracted {metric:?} for {} asset(s)", rows.len());
            emit(out, &rows)?;
        }

        // ---------------------------------------------------------------------------
        // "> sift history <REPORT>"
        History { report } => {
            let report = load_report(&multi, report, &config)?;
            let histories = collect_histories(&report, config.reference_end_date, config.max_depth)?;
            info!("reconstructed {} holding histories", histories.len());
            emit(out, &histories)?;
        }

        ////////////////////////////////////////////////////////////////////////////////////////////////////

        // "> sift analyze --security <F> --metrics <F> [--history <F>]"
        Analyze {
            security,
            metrics,
            history,
        } => {
            let pb = multi.add(single_pb(4));

            pb.set_message("security preset");
            let security = load_report(&multi, security, &config)?;
            pb.inc(1);

            pb.set_message("metrics preset");
            let metrics_report = load_report(&multi, metrics, &config)?;
            let table = extract_all(&metrics_report, &config.metric_rules, config.max_depth)?;
            pb.inc(1);

            pb.set_message("histories");
            let histories: Vec<HoldingHistory> = match history {
                Some(path) => read_json(path)?,
                None => collect_histories(&security, config.reference_end_date, config.max_depth)?,
            };
            pb.inc(1);

            pb.set_message("valuation");
            let analyses = analyze(&security, &table, &histories, &config)?;
            pb.inc(1);
            pb.finish_and_clear();

            let summary = AnalysisSummary::of(&analyses);
            info!(
                "analysed {} asset(s): {} with volatility, {} with interest rate, {} with purchase price",
                summary.total_assets,
                summary.with_volatility,
                summary.with_interest_rate,
                summary.with_purchase_price
            );
            info!("total profit {:.2}", summary.total_profit);
            if summary.missing_reference_values > 0 {
                warn!(
                    "{} NAV lookup(s) fell before their series and counted as 0.0",
                    summary.missing_reference_values
                );
            }
            emit(out, &analyses)?;
        }

        // ---------------------------------------------------------------------------
        // "> sift override-volatility --analysis <F> --volatility <F>"
        OverrideVolatility {
            analysis,
            volatility,
        } => {
            let mut analyses: Vec<AssetAnalysis> = read_json(analysis)?;
            let rows: Vec<MetricRow> = read_json(volatility)?;
            let updated = apply_volatility_overrides(&mut analyses, &rows);
            info!(
                "overrode volatility on {updated} of {} asset(s) from {} row(s)",
                analyses.len(),
                rows.len()
            );
            emit(out, &analyses)?;
        }

        // ---------------------------------------------------------------------------
        // "> sift backfill-volatility --analysis <F> --preset <F>"
        BackfillVolatility { analysis, preset } => {
            let mut analyses: Vec<AssetAnalysis> = read_json(analysis)?;
            let preset = load_report(&multi, preset, &config)?;
            let sources = volatility_sources(&preset, config.max_depth)?;
            info!("{} non-zero volatility source(s)", sources.len());

            let stats = backfill_zero_volatility(&mut analyses, &sources);
            info!(
                "updated {} of {} zero volatilities ({} total assets)",
                stats.updated, stats.zero_volatility_count, stats.total_assets
            );
            info!(
                "matches: {} by name, {} by sell date, {} fallback",
                stats.matches.exact_name, stats.matches.by_sell_date, stats.matches.fallback
            );
            if !stats.not_updated.is_empty() {
                debug!("not updated: {:?}", stats.not_updated);
            }
            emit(out, &analyses)?;
        }
    }

    Ok(())
}
