use crate::error::{Error, Result};
use crate::headers::{MetricRules, STANDARD_RULES};
use crate::report::{extract_time_series, ReportNode};
use crate::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Deepest line nesting accepted before a tree counts as malformed.
pub const DEFAULT_MAX_DEPTH: usize = 10_000;

/// Holdings still present on this date are treated as open.
pub fn default_reference_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 29).expect("2025-11-29 is a valid calendar date")
}

/// Read a `YYYY-MM-DD` reference date, e.g. from `REFERENCE_END_DATE`.
pub fn parse_reference_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| Error::InvalidDate(format!("{raw:?}: {e}")))
}

/// Settings shared by every extraction task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reference_end_date: NaiveDate,
    pub max_depth: usize,
    pub nav_column: SeriesColumn,
    pub metric_rules: MetricRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reference_end_date: default_reference_end_date(),
            max_depth: DEFAULT_MAX_DEPTH,
            nav_column: SeriesColumn::default(),
            metric_rules: STANDARD_RULES.clone(),
        }
    }
}

/// Locates a time-series column on a line: by the cell's `command`, or by
/// position when the cell carries no usable label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesColumn {
    pub command: String,
    pub fallback_index: Option<usize>,
}

impl Default for SeriesColumn {
    fn default() -> Self {
        Self {
            command: "nav_history".to_string(),
            fallback_index: Some(3),
        }
    }
}

impl SeriesColumn {
    /// The first time-series cell of `line` matching this column.
    pub fn find(&self, line: &ReportNode) -> Option<TimeSeries> {
        line.values
            .iter()
            .enumerate()
            .filter(|(idx, cell)| {
                cell.command() == Some(self.command.as_str()) || Some(*idx) == self.fallback_index
            })
            .find_map(|(_, cell)| extract_time_series(cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Cell;
    use serde_json::json;

    fn series_cell() -> Cell {
        Cell::raw(json!({"2025-01-01T00:00:00": 1.0}))
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.reference_end_date.to_string(), "2025-11-29");
        assert_eq!(config.max_depth, 10_000);
        assert_eq!(config.metric_rules.len(), 4);
    }

    #[test]
    fn reference_date_parsing() {
        assert_eq!(parse_reference_date(" 2025-06-30 ").unwrap().to_string(), "2025-06-30");
        assert!(matches!(parse_reference_date("30/06/2025"), Err(Error::InvalidDate(_))));
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let config: Config =
            serde_json::from_value(json!({"reference_end_date": "2025-06-30"})).unwrap();
        assert_eq!(config.reference_end_date.to_string(), "2025-06-30");
        assert_eq!(config.nav_column, SeriesColumn::default());
    }

    #[test]
    fn nav_column_by_command_or_index() {
        let column = SeriesColumn::default();

        let by_command = ReportNode::named("a").with_values(vec![
            Cell::scalar(1),
            series_cell().with_command("nav_history"),
        ]);
        assert!(column.find(&by_command).is_some());

        let by_index = ReportNode::named("b").with_values(vec![
            Cell::scalar(1),
            Cell::scalar(2),
            Cell::scalar(3),
            series_cell(),
        ]);
        assert!(column.find(&by_index).is_some());

        let neither = ReportNode::named("c").with_values(vec![series_cell().with_command("pl_history")]);
        assert!(column.find(&neither).is_none());
    }
}
