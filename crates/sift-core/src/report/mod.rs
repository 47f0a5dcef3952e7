/// Cells and the scalar / time-series normalisation of their values.
pub mod cell;

/// Lenient decoding of the evaluation payload into a [`Report`].
pub mod de;

/// Bounded pre-order traversal of the line tree.
pub mod walk;

pub use cell::{extract_scalar, extract_time_series, Cell, MetricValue, StructuredCell};
pub use walk::{walk, walk_forest, Walk};

use serde::Serialize;

/// An evaluation report, as returned by the upstream evaluation endpoint.
///
/// ```json
/// {
///     "headers": [ {"name": "Volatility", "command": "vola"}, "Price", ... ],
///     "resultLine": {
///         "subLines": [
///             {
///                 "name": "iShares Core MSCI World",
///                 "values": [ 12.4, {"rawValue": 104.2, "value": "104.20 EUR"}, ... ],
///                 "subLines": [ ... ]
///             },
///             ...
///         ]
///     }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub struct Report {
    pub headers: Vec<Header>,

    /// The `resultLine`; its own name is never emitted, only its descendants.
    pub root: ReportNode,

    /// `subLines` entries dropped while decoding because they were not objects.
    pub skipped_nodes: usize,
}

impl Report {
    /// Every named line of the report, in pre-order.
    pub fn lines(&self, max_depth: usize) -> crate::Result<Walk<'_>> {
        walk_forest(&self.root.children, max_depth)
    }
}

/// One line of the report tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ReportNode {
    pub name: Option<String>,

    /// Positionally aligned with [`Report::headers`].
    pub values: Vec<Cell>,

    #[serde(rename = "subLines")]
    pub children: Vec<ReportNode>,
}

impl ReportNode {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    /// The display name, if the line has a non-empty one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn with_values(mut self, values: Vec<Cell>) -> Self {
        self.values = values;
        self
    }

    pub fn with_children(mut self, children: Vec<ReportNode>) -> Self {
        self.children = children;
        self
    }
}

/// Column descriptor; either field may be empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub display_name: String,
    pub command: String,
}

impl Header {
    pub fn new(display_name: &str, command: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            command: command.to_string(),
        }
    }

    /// `(name, command)`, lower-cased for matching.
    pub fn lowered(&self) -> (String, String) {
        (self.display_name.to_lowercase(), self.command.to_lowercase())
    }
}
