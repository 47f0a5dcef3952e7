use crate::config::Config;
use crate::error::Result;
use crate::headers::{INTEREST_RATE, PURCHASE_PRICE, VOLATILITY};
use crate::metrics::{MetricRow, MetricTable};
use crate::report::{MetricValue, Report, ReportNode};
use crate::series::{daily_changes, DailyChange};
use crate::transactions::HoldingHistory;
use crate::valuation::{compute_details, TransactionDetail};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Full asset analysis
//
////////////////////////////////////////////////////////////////////////////////////////////////////

// Output

// [
//      {
//          "asset": "iShares Core MSCI World",
//          "volatility": 12.4,
//          "interestRate": null,
//          "purchasePrice": 98.5,
//          "totalProfit": 210.7,
//          "transactionsDetail": [ {"buyDate": "2025-01-01", ...}, ... ],
//          "dailyChanges": [ {"date": "2025-01-01", "nav": 1041.2, ...}, ... ]
//      },
//      ...
// ]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAnalysis {
    pub asset: String,
    pub volatility: Option<MetricValue>,
    pub interest_rate: Option<MetricValue>,
    pub purchase_price: Option<MetricValue>,
    pub total_profit: f64,
    pub transactions_detail: Vec<TransactionDetail>,
    #[serde(default)]
    pub daily_changes: Vec<DailyChange>,

    #[serde(skip)]
    pub missing_reference_values: usize,
}

/// Analyse every named line of the security report that has a NAV series and
/// a known buy/sell history.
///
/// Lines are valued in parallel; the output keeps the report's pre-order.
pub fn analyze(
    security: &Report,
    metrics: &MetricTable,
    histories: &[HoldingHistory],
    config: &Config,
) -> Result<Vec<AssetAnalysis>> {
    let walk = security.lines(config.max_depth)?;

    // first history per asset wins
    let mut by_asset: HashMap<&str, &HoldingHistory> = HashMap::new();
    for history in histories {
        by_asset.entry(history.asset.as_str()).or_insert(history);
    }

    let analyses: Vec<AssetAnalysis> = walk
        .lines
        .par_iter()
        .filter_map(|line| analyze_line(line, metrics, &by_asset, config))
        .collect();

    debug!(
        "analysed {} of {} named line(s)",
        analyses.len(),
        walk.lines.len()
    );
    Ok(analyses)
}

fn analyze_line(
    line: &ReportNode,
    metrics: &MetricTable,
    histories: &HashMap<&str, &HoldingHistory>,
    config: &Config,
) -> Option<AssetAnalysis> {
    let asset = line.name()?;
    let Some(nav) = config.nav_column.find(line) else {
        trace!("{asset:?} has no NAV series");
        return None;
    };
    let Some(history) = histories.get(asset) else {
        trace!("{asset:?} has no buy/sell history");
        return None;
    };

    let record = metrics.get(asset);
    let metric = |key: &str| record.and_then(|r| r.get(key)).cloned();
    let purchase_price = metric(PURCHASE_PRICE);

    let valuation = compute_details(
        &history.transactions,
        &nav,
        purchase_price.as_ref().and_then(MetricValue::as_f64),
    );

    Some(AssetAnalysis {
        asset: asset.to_string(),
        volatility: metric(VOLATILITY),
        interest_rate: metric(INTEREST_RATE),
        purchase_price,
        total_profit: valuation.total_profit,
        transactions_detail: valuation.details,
        daily_changes: daily_changes(&nav),
        missing_reference_values: valuation.missing_reference_values,
    })
}

// -------------------------------------------------------------------------------------------------
// summary

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_assets: usize,
    pub with_volatility: usize,
    pub with_interest_rate: usize,
    pub with_purchase_price: usize,
    pub total_profit: f64,
    pub missing_reference_values: usize,
}

impl AnalysisSummary {
    pub fn of(analyses: &[AssetAnalysis]) -> Self {
        analyses.iter().fold(
            AnalysisSummary {
                total_assets: analyses.len(),
                ..Default::default()
            },
            |mut summary, a| {
                summary.with_volatility += a.volatility.is_some() as usize;
                summary.with_interest_rate += a.interest_rate.is_some() as usize;
                summary.with_purchase_price += a.purchase_price.is_some() as usize;
                summary.total_profit += a.total_profit;
                summary.missing_reference_values += a.missing_reference_values;
                summary
            },
        )
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Volatility rows & overrides
//
////////////////////////////////////////////////////////////////////////////////////////////////////

/// `{"asset": .., "volatility": ..}` for every analysis with a volatility.
pub fn volatility_rows(analyses: &[AssetAnalysis]) -> Vec<MetricRow> {
    analyses
        .iter()
        .filter_map(|a| {
            Some(MetricRow {
                asset: a.asset.clone(),
                metric: VOLATILITY.to_string(),
                value: a.volatility.clone()?,
            })
        })
        .collect()
}

/// Replace the volatility of each analysis whose asset appears in `rows`.
///
/// Unlike a merge, this overwrites existing values. When an asset appears in
/// several rows the last one wins. Returns the number of analyses updated.
pub fn apply_volatility_overrides(analyses: &mut [AssetAnalysis], rows: &[MetricRow]) -> usize {
    let overrides: HashMap<&str, &MetricValue> = rows
        .iter()
        .map(|row| (row.asset.as_str(), &row.value))
        .collect();

    let mut updated = 0;
    for analysis in analyses.iter_mut() {
        if let Some(value) = overrides.get(analysis.asset.as_str()) {
            analysis.volatility = Some((*value).clone());
            updated += 1;
        }
    }
    debug!("overrode volatility on {updated} asset(s)");
    updated
}
