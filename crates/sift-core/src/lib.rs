//! Flattening of nested portfolio evaluation reports.
//!
//! A report is a tree of lines (`resultLine` -> `subLines` -> ...) with one
//! row of cell values per line, aligned with the report's headers.
//! ```rust
//! use sift_core::{metrics, Report, STANDARD_RULES};
//!
//! let payload = serde_json::json!({
//!     "headers": ["Volatility"],
//!     "resultLine": {"subLines": [{"name": "ACME", "values": [12.4]}]}
//! });
//! let report = Report::from_value(&payload, 100).unwrap();
//! let table = metrics::extract_all(&report, &STANDARD_RULES, 100).unwrap();
//! assert_eq!(table.get("ACME").unwrap().get("volatility").unwrap().as_f64(), Some(12.4));
//! ```
pub mod analysis;
pub mod backfill;
pub mod config;
pub mod error;
pub mod headers;
pub mod metrics;
pub mod report;
pub mod series;
pub mod transactions;
pub mod valuation;

pub use crate::analysis::{analyze, AnalysisSummary, AssetAnalysis};
pub use crate::backfill::{backfill_zero_volatility, volatility_sources, BackfillStats};
pub use crate::config::{Config, SeriesColumn, DEFAULT_MAX_DEPTH};
pub use crate::error::{Error, Result};
pub use crate::headers::{resolve_indices, MetricRules, Pattern, STANDARD_RULES};
pub use crate::metrics::{AssetMetricRecord, MetricRow, MetricTable};
pub use crate::report::{Cell, Header, MetricValue, Report, ReportNode};
pub use crate::series::{DailyChange, TimeSeries};
pub use crate::transactions::{reconstruct, HoldingHistory, TransactionEvent};
pub use crate::valuation::{compute_details, find_reference_value, TransactionDetail, Valuation};
