use crate::error::Result;
use crate::report::{extract_time_series, Report};
use crate::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, trace};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Bought,
    Sold,
}

/// `{"action": "bought", "date": "2025-01-01"}`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub action: Action,
    pub date: NaiveDate,
}

impl TransactionEvent {
    pub fn bought(date: NaiveDate) -> Self {
        Self {
            action: Action::Bought,
            date,
        }
    }

    pub fn sold(date: NaiveDate) -> Self {
        Self {
            action: Action::Sold,
            date,
        }
    }
}

/// Infer buy/sell events from the days a holding shows up in a series.
///
/// The holding is bought on its first day. Any gap of more than one day
/// between consecutive days is read as a sale on the earlier day and a
/// re-purchase on the later one, whatever the gap length. The holding is
/// sold on its last day unless that day is `reference_end_date`, in which
/// case it is still open.
pub fn reconstruct(series: &TimeSeries, reference_end_date: NaiveDate) -> Vec<TransactionEvent> {
    let dates = series.dates();
    let (first, last) = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            trace!("empty series; no transactions");
            return vec![];
        }
    };

    let mut events = vec![TransactionEvent::bought(first)];
    for pair in dates.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if (next - current).num_days() > 1 {
            events.push(TransactionEvent::sold(current));
            events.push(TransactionEvent::bought(next));
        }
    }

    if last != reference_end_date {
        events.push(TransactionEvent::sold(last));
    }

    events
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Buy/sell history per asset
//
////////////////////////////////////////////////////////////////////////////////////////////////////

// Output

// [
//      {
//          "asset": "iShares Core MSCI World",
//          "transactions": [
//              {"action": "bought", "date": "2025-01-01"},
//              {"action": "sold", "date": "2025-03-14"},
//              ...
//          ],
//          "firstDate": "2025-01-01",
//          "lastDate": "2025-11-29"
//      },
//      ...
// ]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingHistory {
    pub asset: String,
    pub transactions: Vec<TransactionEvent>,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
}

impl HoldingHistory {
    /// Reconstruct the history of one asset; `None` for an empty series.
    pub fn from_series(
        asset: &str,
        series: &TimeSeries,
        reference_end_date: NaiveDate,
    ) -> Option<Self> {
        let transactions = reconstruct(series, reference_end_date);
        if transactions.is_empty() {
            return None;
        }
        Some(Self {
            asset: asset.to_string(),
            transactions,
            first_date: series.first_date()?,
            last_date: series.last_date()?,
        })
    }
}

/// Buy/sell history of every named line holding a time series.
///
/// The first time-series cell of a line is used. Lines producing the same
/// asset, first date, last date and transactions as an earlier line are
/// dropped.
pub fn collect_histories(
    report: &Report,
    reference_end_date: NaiveDate,
    max_depth: usize,
) -> Result<Vec<HoldingHistory>> {
    let walk = report.lines(max_depth)?;
    let mut seen: HashSet<(String, NaiveDate, NaiveDate, Vec<TransactionEvent>)> = HashSet::new();
    let mut histories = vec![];

    for line in walk.lines {
        let Some(asset) = line.name() else { continue };
        let Some(series) = line.values.iter().find_map(extract_time_series) else {
            trace!("{asset:?} has no time series");
            continue;
        };
        let Some(history) = HoldingHistory::from_series(asset, &series, reference_end_date) else {
            continue;
        };

        let key = (
            history.asset.clone(),
            history.first_date,
            history.last_date,
            history.transactions.clone(),
        );
        if seen.insert(key) {
            histories.push(history);
        } else {
            trace!("dropping duplicate history for {asset:?}");
        }
    }

    debug!("reconstructed {} holding histories", histories.len());
    Ok(histories)
}
