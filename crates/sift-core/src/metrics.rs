use crate::error::Result;
use crate::headers::{matching_indices, resolve_indices, MetricRules, Pattern};
use crate::report::{extract_time_series, MetricValue, Report, ReportNode};
use crate::series::TimeSeries;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap as Map, HashMap};
use tracing::{debug, trace};

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Flat per-asset records
//
////////////////////////////////////////////////////////////////////////////////////////////////////

// Output

// {
//      "asset": "iShares Core MSCI World",
//      "interest_rate": null,
//      "price": 104.2,
//      "purchase_price": 98.5,
//      "volatility": 12.4,
//      "timeSeries": { "nav_history": { "2025-01-01T00:00:00": 1041.2, ... } }
// }
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetricRecord {
    pub asset: String,

    /// Requested metric -> extracted value; `None` when unresolved or null.
    #[serde(flatten)]
    pub metrics: Map<String, Option<MetricValue>>,

    /// Every time-series cell of the line, keyed by its command (or `value_<index>`).
    #[serde(rename = "timeSeries", default, skip_serializing_if = "Map::is_empty")]
    pub time_series: Map<String, TimeSeries>,
}

impl AssetMetricRecord {
    pub fn new(asset: &str) -> Self {
        Self {
            asset: asset.to_string(),
            ..Default::default()
        }
    }

    pub fn with(mut self, key: &str, value: Option<MetricValue>) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.metrics.get(key).and_then(Option::as_ref)
    }

    /// Fill this record's gaps from `other`; a non-null value is never overwritten.
    pub fn merge(&mut self, other: AssetMetricRecord) {
        for (key, value) in other.metrics {
            let slot = self.metrics.entry(key).or_insert(None);
            if slot.is_none() {
                *slot = value;
            }
        }
        for (key, series) in other.time_series {
            self.time_series.entry(key).or_insert(series);
        }
    }
}

/// Records by asset name, in first-seen order; a recurring asset is merged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<AssetMetricRecord>", into = "Vec<AssetMetricRecord>")]
pub struct MetricTable {
    records: Vec<AssetMetricRecord>,
    index: HashMap<String, usize>,
}

impl MetricTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: AssetMetricRecord) {
        match self.index.get(&record.asset) {
            Some(&at) => {
                trace!("merging recurring asset {:?}", record.asset);
                self.records[at].merge(record);
            }
            None => {
                self.index.insert(record.asset.clone(), self.records.len());
                self.records.push(record);
            }
        }
    }

    pub fn get(&self, asset: &str) -> Option<&AssetMetricRecord> {
        self.index.get(asset).map(|&at| &self.records[at])
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetMetricRecord> {
        self.records.iter()
    }
}

impl FromIterator<AssetMetricRecord> for MetricTable {
    fn from_iter<I: IntoIterator<Item = AssetMetricRecord>>(iter: I) -> Self {
        let mut table = MetricTable::new();
        iter.into_iter().for_each(|record| table.insert(record));
        table
    }
}

impl From<Vec<AssetMetricRecord>> for MetricTable {
    fn from(records: Vec<AssetMetricRecord>) -> Self {
        records.into_iter().collect()
    }
}

impl From<MetricTable> for Vec<AssetMetricRecord> {
    fn from(table: MetricTable) -> Self {
        table.records
    }
}

/// Build the record of one named line from pre-resolved header indices.
pub fn extract_record(
    line: &ReportNode,
    asset: &str,
    indices: &Map<String, Option<usize>>,
) -> AssetMetricRecord {
    let metrics = indices
        .iter()
        .map(|(key, idx)| {
            let value = idx
                .and_then(|i| line.values.get(i))
                .and_then(|cell| cell.metric_value());
            (key.clone(), value)
        })
        .collect();

    let time_series = line
        .values
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let series = extract_time_series(cell)?;
            let label = match cell.command() {
                Some(command) => command.to_string(),
                None => format!("value_{idx}"),
            };
            Some((label, series))
        })
        .collect();

    AssetMetricRecord {
        asset: asset.to_string(),
        metrics,
        time_series,
    }
}

/// Flatten a report into one record per asset for the metrics named in `rules`.
pub fn extract_all(report: &Report, rules: &MetricRules, max_depth: usize) -> Result<MetricTable> {
    let indices = resolve_indices(&report.headers, rules);
    let walk = report.lines(max_depth)?;
    debug!(
        "extracting {} metric(s) from {} named line(s)",
        indices.len(),
        walk.lines.len()
    );

    let table = walk
        .lines
        .iter()
        .filter_map(|line| Some(extract_record(line, line.name()?, &indices)))
        .collect();
    Ok(table)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Single-metric rows
//
////////////////////////////////////////////////////////////////////////////////////////////////////

/// One `{"asset": .., "<metric>": ..}` row, e.g. `{"asset": "ACME", "volatility": 12.4}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "RowRepr", try_from = "RowRepr")]
pub struct MetricRow {
    pub asset: String,
    pub metric: String,
    pub value: MetricValue,
}

#[derive(Serialize, Deserialize)]
struct RowRepr {
    asset: String,
    #[serde(flatten)]
    rest: Map<String, MetricValue>,
}

impl From<MetricRow> for RowRepr {
    fn from(row: MetricRow) -> Self {
        RowRepr {
            asset: row.asset,
            rest: Map::from([(row.metric, row.value)]),
        }
    }
}

impl TryFrom<RowRepr> for MetricRow {
    type Error = String;

    fn try_from(repr: RowRepr) -> std::result::Result<Self, Self::Error> {
        let mut rest = repr.rest.into_iter();
        match (rest.next(), rest.next()) {
            (Some((metric, value)), None) => Ok(MetricRow {
                asset: repr.asset,
                metric,
                value,
            }),
            _ => Err(format!(
                "row for {:?} must hold exactly one metric besides \"asset\"",
                repr.asset
            )),
        }
    }
}

/// Rows of a single metric read from several interchangeable columns, e.g.
/// common-property-only.
///
/// All headers matching `pattern` are candidates; on each line the first
/// candidate that exists in its values is read, and the row is kept only when
/// that cell holds a non-null value.
pub fn extract_metric_rows(
    report: &Report,
    metric: &str,
    pattern: &Pattern,
    max_depth: usize,
) -> Result<Vec<MetricRow>> {
    let candidates = matching_indices(&report.headers, pattern);
    rows_from(report, metric, &candidates, max_depth)
}

/// Rows of a single metric read from the first matching column only, e.g.
/// volatility-only. A line too short for that column yields no row, even when
/// a later matching column would be in range.
pub fn extract_column_rows(
    report: &Report,
    metric: &str,
    pattern: &Pattern,
    max_depth: usize,
) -> Result<Vec<MetricRow>> {
    let candidates = matching_indices(&report.headers, pattern);
    rows_from(report, metric, &candidates[..candidates.len().min(1)], max_depth)
}

fn rows_from(
    report: &Report,
    metric: &str,
    candidates: &[usize],
    max_depth: usize,
) -> Result<Vec<MetricRow>> {
    if candidates.is_empty() {
        debug!("no header matches metric {metric:?}");
        return Ok(vec![]);
    }

    let walk = report.lines(max_depth)?;
    let rows = walk
        .lines
        .iter()
        .filter_map(|line| {
            let asset = line.name()?;
            let cell = candidates.iter().find_map(|&idx| line.values.get(idx))?;
            Some(MetricRow {
                asset: asset.to_string(),
                metric: metric.to_string(),
                value: cell.metric_value()?,
            })
        })
        .collect();
    Ok(rows)
}
