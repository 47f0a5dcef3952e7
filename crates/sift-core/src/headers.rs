use crate::report::Header;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap as Map;
use tracing::debug;

pub const VOLATILITY: &str = "volatility";
pub const INTEREST_RATE: &str = "interest_rate";
pub const PURCHASE_PRICE: &str = "purchase_price";
pub const PRICE: &str = "price";
pub const COMMON_PROPERTY: &str = "common_property";

/// Metric key -> the pattern its header must satisfy.
pub type MetricRules = Map<String, Pattern>;

lazy_static! {
    /// The four metrics read from the metrics preset.
    ///
    /// `price` must not also claim the purchase-price column, hence its exclusions.
    pub static ref STANDARD_RULES: MetricRules = Map::from([
        (VOLATILITY.to_string(), Pattern::contains(&["volatility"])),
        (INTEREST_RATE.to_string(), Pattern::contains(&["interest"])),
        (PURCHASE_PRICE.to_string(), Pattern::contains(&["purchase", "buy"])),
        (PRICE.to_string(), Pattern::contains(&["price"]).excluding(&["purchase", "buy"])),
    ]);

    /// The common-property column, under either of its spellings.
    pub static ref COMMON_PROPERTY_PATTERN: Pattern =
        Pattern::contains(&["common_property", "common property"]);
}

/// Case-insensitive substring test over a header's name and command.
///
/// Matches when any `include` word occurs in either field and no `exclude`
/// word occurs in either field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Pattern {
    pub fn contains(words: &[&str]) -> Self {
        Self {
            include: words.iter().map(|w| w.to_lowercase()).collect(),
            exclude: vec![],
        }
    }

    pub fn excluding(mut self, words: &[&str]) -> Self {
        self.exclude.extend(words.iter().map(|w| w.to_lowercase()));
        self
    }

    /// `name` and `command` are expected lower-cased already.
    pub fn matches(&self, name: &str, command: &str) -> bool {
        let occurs = |word: &String| {
            let word = word.to_lowercase();
            name.contains(&word) || command.contains(&word)
        };
        self.include.iter().any(occurs) && !self.exclude.iter().any(occurs)
    }

    pub fn matches_header(&self, header: &Header) -> bool {
        let (name, command) = header.lowered();
        self.matches(&name, &command)
    }
}

/// Bind every metric of `rules` to a header index.
///
/// Headers are scanned in order and each still-unbound metric whose pattern
/// matches is bound to the current index; a bound metric is never rebound, so
/// the first matching header wins. Metrics no header satisfies map to `None`.
pub fn resolve_indices(headers: &[Header], rules: &MetricRules) -> Map<String, Option<usize>> {
    let mut resolved: Map<String, Option<usize>> =
        rules.keys().map(|key| (key.clone(), None)).collect();

    for (idx, header) in headers.iter().enumerate() {
        let (name, command) = header.lowered();
        for (key, pattern) in rules {
            let slot = resolved.entry(key.clone()).or_insert(None);
            if slot.is_none() && pattern.matches(&name, &command) {
                *slot = Some(idx);
            }
        }
    }

    for (key, idx) in &resolved {
        if idx.is_none() {
            debug!("no header matches metric {key:?}; it will be null on every record");
        }
    }

    resolved
}

/// Every header index matching `pattern`, in order.
pub fn matching_indices(headers: &[Header], pattern: &Pattern) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, header)| pattern.matches_header(header))
        .map(|(idx, _)| idx)
        .collect()
}
