use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap as Map;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A date-keyed series of numeric values, as carried in a cell's `rawValue`.
///
/// ```json
/// {
///     "2025-01-01T00:00:00": 1041.2,
///     "2025-01-02T00:00:00": 1043.9,
///     ...
/// }
/// ```
///
/// Keys are kept as timestamps; every lookup that cares about days compares
/// calendar dates only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries(Map<NaiveDateTime, f64>);

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, at: NaiveDateTime, value: f64) {
        self.0.insert(at, value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Points in ascending timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDateTime, &f64)> {
        self.0.iter()
    }

    /// Distinct calendar dates, ascending; same-day timestamps collapse into one.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self.0.keys().map(|ts| ts.date()).collect();
        dates.dedup();
        dates
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.0.keys().next().map(|ts| ts.date())
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.0.keys().next_back().map(|ts| ts.date())
    }

    /// The latest point of the series.
    pub fn last(&self) -> Option<(NaiveDateTime, f64)> {
        self.0.iter().next_back().map(|(ts, v)| (*ts, *v))
    }

    /// Value on `date`, or else the value of the latest day strictly before it.
    ///
    /// When several timestamps share `date`, the earliest of them is used.
    pub fn on_or_before(&self, date: NaiveDate) -> Option<f64> {
        let start = date.and_time(NaiveTime::MIN);
        if let Some((ts, value)) = self.0.range(start..).next() {
            if ts.date() == date {
                return Some(*value);
            }
        }
        self.0.range(..start).next_back().map(|(_, v)| *v)
    }

    /// Reads a series out of a JSON object.
    ///
    /// Only a non-empty object whose keys are all ISO-8601 date-times and whose
    /// values are all numeric qualifies; anything else is `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if map.is_empty() {
            return None;
        }
        let mut series = Self::new();
        for (key, v) in map {
            series.insert(parse_timestamp(key)?, v.as_f64()?);
        }
        Some(series)
    }
}

impl FromIterator<(NaiveDateTime, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (NaiveDateTime, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Parse an ISO-8601 date-time key, e.g.,
///     `2025-01-01T00:00:00`
///     `2025-01-01T00:00:00.000Z`
///     `2025-01-01T00:00:00+01:00`
///     `2025-01-01T00:00:00+0100`
///
/// Offsets are dropped rather than applied, so the date part always matches
/// the literal text of the key.
pub fn parse_timestamp(key: &str) -> Option<NaiveDateTime> {
    if !key.contains('T') {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(key)
        .or_else(|_| DateTime::parse_from_str(key, "%Y-%m-%dT%H:%M:%S%.f%z"))
    {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(key, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(key, "%Y-%m-%dT%H:%M"))
        .ok()
}

impl Serialize for TimeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|(ts, v)| (ts.format(TIMESTAMP_FORMAT).to_string(), v)),
        )
    }
}

impl<'de> Deserialize<'de> for TimeSeries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Map<String, f64> = Deserialize::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, v)| match parse_timestamp(&key) {
                Some(ts) => Ok((ts, v)),
                None => Err(de::Error::custom(format!(
                    "expected an ISO-8601 date-time key, found {key:?}"
                ))),
            })
            .collect()
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Daily changes
//
////////////////////////////////////////////////////////////////////////////////////////////////////

/// Day-over-day movement of a NAV series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChange {
    pub date: NaiveDate,
    pub nav: f64,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
}

/// One entry per point of `nav`, in ascending order; the first has no change.
pub fn daily_changes(nav: &TimeSeries) -> Vec<DailyChange> {
    let mut prev: Option<f64> = None;
    nav.iter()
        .map(|(ts, &value)| {
            let change = prev.map(|p| value - p);
            let change_percent = match (prev, change) {
                (Some(p), Some(c)) if p != 0.0 => Some(c / p * 100.0),
                _ => None,
            };
            prev = Some(value);
            DailyChange {
                date: ts.date(),
                nav: value,
                change,
                change_percent,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_timestamp_variants() {
        assert_eq!(ts("2025-01-01T00:00:00").date(), date("2025-01-01"));
        assert_eq!(ts("2025-01-01T23:30:00.000Z").date(), date("2025-01-01"));
        assert_eq!(ts("2025-01-01T23:30:00+05:00").date(), date("2025-01-01"));
        assert_eq!(ts("2025-01-01T08:15").date(), date("2025-01-01"));
        assert_eq!(ts("2025-01-01T23:30:00+0100").date(), date("2025-01-01"));
        assert_eq!(ts("2025-01-01T23:30:00.250-0800").date(), date("2025-01-01"));
        assert!(parse_timestamp("2025-01-01").is_none());
        assert!(parse_timestamp("Total").is_none());
    }

    #[test]
    fn from_json_requires_dates_and_numbers() {
        let ok = json!({"2025-01-02T00:00:00": 2, "2025-01-01T00:00:00": 1.5});
        let series = TimeSeries::from_json(&ok).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), Some(date("2025-01-01")));

        let compact = json!({"2025-01-01T00:00:00+0100": 1.0, "2025-01-02T00:00:00+0100": 2.0});
        let series = TimeSeries::from_json(&compact).unwrap();
        assert_eq!(series.dates(), vec![date("2025-01-01"), date("2025-01-02")]);

        assert!(TimeSeries::from_json(&json!({})).is_none());
        assert!(TimeSeries::from_json(&json!(12.5)).is_none());
        assert!(TimeSeries::from_json(&json!({"2025-01-01T00:00:00": "n/a"})).is_none());
        assert!(TimeSeries::from_json(&json!({"2025-01-01T00:00:00": 1, "EUR": 2})).is_none());
    }

    #[test]
    fn same_day_timestamps_collapse_to_one_date() {
        let series: TimeSeries = [
            (ts("2025-01-01T00:00:00"), 1.0),
            (ts("2025-01-01T12:00:00"), 2.0),
            (ts("2025-01-03T00:00:00"), 3.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(series.dates(), vec![date("2025-01-01"), date("2025-01-03")]);
    }

    #[test]
    fn on_or_before_prefers_exact_then_latest_past() {
        let series: TimeSeries = [
            (ts("2025-01-01T00:00:00"), 10.0),
            (ts("2025-01-05T09:00:00"), 50.0),
            (ts("2025-01-05T18:00:00"), 55.0),
        ]
        .into_iter()
        .collect();

        assert_eq!(series.on_or_before(date("2025-01-05")), Some(50.0));
        assert_eq!(series.on_or_before(date("2025-01-03")), Some(10.0));
        assert_eq!(series.on_or_before(date("2025-02-01")), Some(55.0));
        assert_eq!(series.on_or_before(date("2024-12-31")), None);
    }

    #[test]
    fn serde_uses_timestamp_keys() {
        let series: TimeSeries = [(ts("2025-03-01T00:00:00.000Z"), 4.0)].into_iter().collect();
        let value = serde_json::to_value(&series).unwrap();
        assert_eq!(value, json!({"2025-03-01T00:00:00": 4.0}));

        let back: TimeSeries = serde_json::from_value(value).unwrap();
        assert_eq!(back, series);
        assert!(serde_json::from_value::<TimeSeries>(json!({"March": 1.0})).is_err());
    }

    #[test]
    fn daily_changes_track_previous_nav() {
        let nav: TimeSeries = [
            (ts("2025-01-01T00:00:00"), 0.0),
            (ts("2025-01-02T00:00:00"), 100.0),
            (ts("2025-01-03T00:00:00"), 150.0),
        ]
        .into_iter()
        .collect();

        let changes = daily_changes(&nav);
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].change, None);
        assert_eq!(changes[0].change_percent, None);
        assert_eq!(changes[1].change, Some(100.0));
        assert_eq!(changes[1].change_percent, None);
        assert_eq!(changes[2].change, Some(50.0));
        assert_eq!(changes[2].change_percent, Some(50.0));
        assert!(daily_changes(&TimeSeries::new()).is_empty());
    }
}
