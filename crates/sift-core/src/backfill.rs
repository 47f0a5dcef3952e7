use crate::analysis::AssetAnalysis;
use crate::error::Result;
use crate::report::{MetricValue, Report, ReportNode};
use crate::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

const VOLA_COMMAND: &str = "vola";
const LAST_SELL_DATE_COMMAND: &str = "last_sell_date";
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Normalise a sell date written as `YYYY-MM-DD`, `YYYY/MM/DD`, `MM/DD/YYYY`,
/// `DD/MM/YYYY` or an ISO timestamp. Ambiguous day/month pairs read as US.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.split('T').next().unwrap_or(raw).trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(day, fmt).ok())
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Volatility sources
//
////////////////////////////////////////////////////////////////////////////////////////////////////

// Input

// {
//      "headers": [ ... ],
//      "resultLine": {
//          "subLines": [
//              {
//                  "name": "iShares Core MSCI World",
//                  "values": [
//                      {"rawValue": 12.4, "command": "vola"},
//                      {"rawValue": "2025-03-14", "command": "last_sell_date"},
//                      ...
//                  ]
//              },
//              ...
//          ]
//      }
// }
#[derive(Clone, Debug, PartialEq)]
pub struct VolatilitySource {
    pub asset: String,
    pub volatility: f64,
    pub last_sell_date: Option<NaiveDate>,
}

/// Non-zero volatilities by asset, in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct VolatilitySources {
    sources: Vec<VolatilitySource>,
    index: HashMap<String, usize>,
}

impl VolatilitySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source; a recurring asset keeps the entry with a sell date, and
    /// between two dated entries the higher volatility.
    pub fn insert(&mut self, source: VolatilitySource) {
        if source.volatility == 0.0 {
            return;
        }
        let Some(&at) = self.index.get(&source.asset) else {
            self.index.insert(source.asset.clone(), self.sources.len());
            self.sources.push(source);
            return;
        };

        let known = &mut self.sources[at];
        match (known.last_sell_date, source.last_sell_date) {
            (None, Some(date)) => known.last_sell_date = Some(date),
            (Some(_), Some(date)) if source.volatility > known.volatility => {
                known.volatility = source.volatility;
                known.last_sell_date = Some(date);
            }
            _ => {}
        }
    }

    pub fn get(&self, asset: &str) -> Option<&VolatilitySource> {
        self.index.get(asset).map(|&at| &self.sources[at])
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VolatilitySource> {
        self.sources.iter()
    }
}

impl FromIterator<VolatilitySource> for VolatilitySources {
    fn from_iter<I: IntoIterator<Item = VolatilitySource>>(iter: I) -> Self {
        let mut sources = VolatilitySources::new();
        iter.into_iter().for_each(|source| sources.insert(source));
        sources
    }
}

fn line_source(line: &ReportNode, asset: &str) -> Option<VolatilitySource> {
    let mut volatility = None;
    let mut last_sell_date = None;

    for cell in &line.values {
        match cell.command() {
            Some(VOLA_COMMAND) => {
                let Some(raw) = cell.raw_value() else {
                    continue;
                };
                let found = match MetricValue::from(raw) {
                    MetricValue::Number(v) => Some(v),
                    MetricValue::Series(series) => latest(&series),
                    _ => None,
                };
                // a zero or unreadable cell never erases an earlier volatility
                if let Some(v) = found.filter(|v| *v != 0.0) {
                    volatility = Some(v);
                }
            }
            Some(LAST_SELL_DATE_COMMAND) => {
                let Some(raw) = cell.raw_value().and_then(|v| v.as_str()) else {
                    continue;
                };
                last_sell_date = parse_date(raw);
                if last_sell_date.is_none() {
                    warn!("unreadable last sell date {raw:?} on {asset:?}");
                }
            }
            _ => {}
        }
    }

    Some(VolatilitySource {
        asset: asset.to_string(),
        volatility: volatility?,
        last_sell_date,
    })
}

fn latest(series: &TimeSeries) -> Option<f64> {
    series.last().map(|(_, value)| value)
}

/// Every non-zero volatility in a volatility preset, with its last sell date.
pub fn volatility_sources(report: &Report, max_depth: usize) -> Result<VolatilitySources> {
    let walk = report.lines(max_depth)?;
    let sources: VolatilitySources = walk
        .lines
        .iter()
        .filter_map(|line| line_source(line, line.name()?))
        .collect();

    debug!(
        "{} volatility source(s), {} with a sell date",
        sources.len(),
        sources.iter().filter(|s| s.last_sell_date.is_some()).count()
    );
    Ok(sources)
}

////////////////////////////////////////////////////////////////////////////////////////////////////
//
// Matching
//
////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchKind {
    ExactName,
    BySellDate,
    Fallback,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VolatilityMatch<'a> {
    pub source: &'a VolatilitySource,
    pub kind: MatchKind,
}

/// The latest sell date across an analysis' transactions.
pub fn last_sell_date(analysis: &AssetAnalysis) -> Option<NaiveDate> {
    analysis
        .transactions_detail
        .iter()
        .map(|detail| detail.sell_date)
        .max()
}

/// Pick the source to lend its volatility to `asset`.
///
/// In order: the source of the same name; the first unmatched source sold on
/// `sell_date`; the first unmatched source with any sell date; the first
/// unmatched source. The name match ignores `already_matched`.
pub fn find_matching_volatility<'a>(
    asset: &str,
    sell_date: Option<NaiveDate>,
    sources: &'a VolatilitySources,
    already_matched: &HashSet<String>,
) -> Option<VolatilityMatch<'a>> {
    if let Some(source) = sources.get(asset) {
        return Some(VolatilityMatch {
            source,
            kind: MatchKind::ExactName,
        });
    }

    let mut unmatched = sources
        .iter()
        .filter(|source| !already_matched.contains(&source.asset));

    if let Some(date) = sell_date {
        if let Some(source) = unmatched
            .clone()
            .find(|source| source.last_sell_date == Some(date))
        {
            return Some(VolatilityMatch {
                source,
                kind: MatchKind::BySellDate,
            });
        }
    }

    unmatched
        .clone()
        .find(|source| source.last_sell_date.is_some())
        .or_else(|| unmatched.next())
        .map(|source| VolatilityMatch {
            source,
            kind: MatchKind::Fallback,
        })
}

// -------------------------------------------------------------------------------------------------
// backfill

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCounts {
    pub exact_name: usize,
    pub by_sell_date: usize,
    pub fallback: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillStats {
    pub total_assets: usize,
    pub zero_volatility_count: usize,
    pub updated: usize,
    pub not_updated: Vec<String>,
    pub matches: MatchCounts,
}

/// Give every analysis whose volatility is exactly zero the volatility of a
/// matching source.
///
/// Name and sell-date matches use their source up; fallback matches leave it
/// available. A null volatility is not a candidate.
pub fn backfill_zero_volatility(
    analyses: &mut [AssetAnalysis],
    sources: &VolatilitySources,
) -> BackfillStats {
    let mut stats = BackfillStats {
        total_assets: analyses.len(),
        ..Default::default()
    };
    let mut already_matched: HashSet<String> = HashSet::new();

    for analysis in analyses.iter_mut() {
        let is_zero = analysis.volatility.as_ref().and_then(MetricValue::as_f64) == Some(0.0);
        if !is_zero {
            continue;
        }
        stats.zero_volatility_count += 1;

        let sell_date = last_sell_date(analysis);
        let Some(found) =
            find_matching_volatility(&analysis.asset, sell_date, sources, &already_matched)
        else {
            trace!("no volatility for {:?} (sold {sell_date:?})", analysis.asset);
            stats.not_updated.push(analysis.asset.clone());
            continue;
        };

        match found.kind {
            MatchKind::ExactName => {
                stats.matches.exact_name += 1;
                already_matched.insert(found.source.asset.clone());
            }
            MatchKind::BySellDate => {
                stats.matches.by_sell_date += 1;
                already_matched.insert(found.source.asset.clone());
            }
            MatchKind::Fallback => stats.matches.fallback += 1,
        }

        trace!(
            "{:?}: 0.0 -> {} from {:?} ({:?})",
            analysis.asset,
            found.source.volatility,
            found.source.asset,
            found.kind
        );
        analysis.volatility = Some(MetricValue::Number(found.source.volatility));
        stats.updated += 1;
    }

    debug!(
        "backfilled {} of {} zero volatilities",
        stats.updated, stats.zero_volatility_count
    );
    stats
}
