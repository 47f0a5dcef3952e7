use crate::series::TimeSeries;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One value at a (line, header) position.
///
/// The payload mixes bare values with structured ones:
///
/// ```json
/// "values": [
///     12.4,
///     {"rawValue": 104.2, "value": "104.20 EUR", "command": "price"},
///     {"rawValue": {"2025-01-01T00:00:00": 1041.2, ...}, "command": "nav_history"},
///     ...
/// ]
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Cell {
    Scalar(Value),
    Structured(StructuredCell),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructuredCell {
    /// Preferred form; may hold a [`TimeSeries`].
    pub raw_value: Option<Value>,

    /// Display form, used when `raw_value` is absent or null.
    pub value: Option<Value>,

    /// Metric code of the cell, when the payload labels it.
    pub command: Option<String>,
}

impl Cell {
    pub fn scalar(value: impl Into<Value>) -> Self {
        Cell::Scalar(value.into())
    }

    pub fn raw(raw_value: impl Into<Value>) -> Self {
        Cell::Structured(StructuredCell {
            raw_value: Some(raw_value.into()),
            ..Default::default()
        })
    }

    pub fn with_command(self, command: &str) -> Self {
        let mut cell = match self {
            Cell::Structured(cell) => cell,
            Cell::Scalar(v) => StructuredCell {
                raw_value: Some(v),
                ..Default::default()
            },
        };
        cell.command = Some(command.to_string());
        Cell::Structured(cell)
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            Cell::Structured(cell) => cell.command.as_deref(),
            Cell::Scalar(_) => None,
        }
    }

    /// The cell's raw form: `rawValue` for structured cells, the value itself otherwise.
    pub fn raw_value(&self) -> Option<&Value> {
        match self {
            Cell::Structured(cell) => cell.raw_value.as_ref().filter(|v| !v.is_null()),
            Cell::Scalar(v) => Some(v).filter(|v| !v.is_null()),
        }
    }

    /// Normalised value of the cell; see [`MetricValue`].
    pub fn metric_value(&self) -> Option<MetricValue> {
        extract_scalar(self).map(MetricValue::from)
    }
}

/// `rawValue` if present and non-null, else `value` if non-null, else nothing.
/// A bare cell is its own value.
pub fn extract_scalar(cell: &Cell) -> Option<&Value> {
    match cell {
        Cell::Structured(cell) => cell
            .raw_value
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| cell.value.as_ref().filter(|v| !v.is_null())),
        Cell::Scalar(v) => Some(v).filter(|v| !v.is_null()),
    }
}

/// The cell's `rawValue`, when it is a date-keyed numeric series.
///
/// Absence of a series is the common case and is not an error.
pub fn extract_time_series(cell: &Cell) -> Option<TimeSeries> {
    match cell {
        Cell::Structured(cell) => cell.raw_value.as_ref().and_then(TimeSeries::from_json),
        Cell::Scalar(_) => None,
    }
}

// -------------------------------------------------------------------------------------------------
// (de)serialisation

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(mut map) => Cell::Structured(StructuredCell {
                raw_value: map.remove("rawValue"),
                value: map.remove("value"),
                command: match map.remove("command") {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                },
            }),
            other => Cell::Scalar(other),
        }
    }
}

impl From<Cell> for Value {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Scalar(v) => v,
            Cell::Structured(cell) => {
                let mut map = Map::new();
                if let Some(raw) = cell.raw_value {
                    map.insert("rawValue".to_string(), raw);
                }
                if let Some(value) = cell.value {
                    map.insert("value".to_string(), value);
                }
                if let Some(command) = cell.command {
                    map.insert("command".to_string(), Value::String(command));
                }
                Value::Object(map)
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Metric values
//
////////////////////////////////////////////////////////////////////////////////////////////////////

/// An extracted metric: a scalar, or a whole time series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Bool(bool),
    Text(String),
    Series(TimeSeries),
    Other(Value),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_series(&self) -> Option<&TimeSeries> {
        match self {
            MetricValue::Series(series) => Some(series),
            _ => None,
        }
    }
}

impl From<&Value> for MetricValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_f64() {
                Some(n) => MetricValue::Number(n),
                None => MetricValue::Other(value.clone()),
            },
            Value::Bool(b) => MetricValue::Bool(*b),
            Value::String(s) => MetricValue::Text(s.clone()),
            Value::Object(_) => match TimeSeries::from_json(value) {
                Some(series) => MetricValue::Series(series),
                None => MetricValue::Other(value.clone()),
            },
            other => MetricValue::Other(other.clone()),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(n: f64) -> Self {
        MetricValue::Number(n)
    }
}
