use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Sets the level of tracing
    #[arg(long, global = true, ignore_case = true, default_value = "info")]
    pub trace: TraceLevel,

    /// Json file holding a full `Config`; env vars and flags override it
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Holdings still present on this date are open [env: REFERENCE_END_DATE]
    #[arg(long, global = true)]
    pub reference_date: Option<NaiveDate>,

    /// Deepest line nesting accepted [env: SIFT_MAX_DEPTH]
    #[arg(long, global = true)]
    pub max_depth: Option<usize>,

    /// Size of the worker pool; defaults to the number of cpus
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Write the output here instead of stdout
    #[arg(long, short, global = true)]
    pub out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Flatten a metrics preset into one record per asset.
    Metrics { report: PathBuf },

    /// Extract one metric column, e.g. `--include volatility` or
    /// `--include "common property" --include common_property --any-column`.
    Metric {
        report: PathBuf,

        /// Header words, any of which selects a column
        #[arg(long, required = true)]
        include: Vec<String>,

        /// Header words that disqualify a column
        #[arg(long)]
        exclude: Vec<String>,

        /// Key of the metric in each row; defaults to the first include word
        #[arg(long)]
        name: Option<String>,

        /// Treat every matching column as interchangeable and read the first
        /// one present on each line, instead of only the first matching column
        #[arg(long)]
        any_column: bool,
    },

    /// Reconstruct buy/sell histories from a security preset.
    History { report: PathBuf },

    /// Value every holding of a security preset.
    Analyze {
        #[arg(long)]
        security: PathBuf,

        #[arg(long)]
        metrics: PathBuf,

        /// Saved `history` output; reconstructed from `--security` when absent
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Overwrite analysis volatilities with `{"asset", "volatility"}` rows.
    OverrideVolatility {
        #[arg(long)]
        analysis: PathBuf,

        #[arg(long)]
        volatility: PathBuf,
    },

    /// Fill zero volatilities of an analysis from a volatility preset.
    BackfillVolatility {
        #[arg(long)]
        analysis: PathBuf,

        #[arg(long)]
        preset: PathBuf,
    },
}

#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceLevel {
    TRACE,
    DEBUG,
    INFO,
    WARN,
    ERROR,
}
