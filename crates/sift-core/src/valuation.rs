use crate::series::TimeSeries;
use crate::transactions::{Action, TransactionEvent};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// One reconstructed buy -> sell (or buy -> still held) interval.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetail {
    pub buy_date: NaiveDate,
    pub sell_date: NaiveDate,
    pub purchase_price: f64,
    pub selling_price: f64,
    pub buy_reference_value: f64,
    pub sell_reference_value: f64,
    pub profit: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Valuation {
    pub total_profit: f64,

    #[serde(rename = "transactionsDetail")]
    pub details: Vec<TransactionDetail>,

    /// Lookups that found no NAV on or before their date and counted as `0.0`.
    #[serde(skip)]
    pub missing_reference_values: usize,
}

/// NAV on `date`, else the latest NAV strictly before it.
///
/// `None` when `date` precedes the whole series; callers count that as `0.0`.
pub fn find_reference_value(date: NaiveDate, series: &TimeSeries) -> Option<f64> {
    series.on_or_before(date)
}

/// Price every holding period of `events` against `nav`.
///
/// Each `bought` pairs with an immediately following `sold`; an unmatched
/// `bought` is closed synthetically at the last NAV point. Profit is the NAV
/// difference between the two dates. The purchase price is the override when
/// it is strictly positive, otherwise the buy-date NAV; the selling price is
/// always `purchase_price + profit`.
pub fn compute_details(
    events: &[TransactionEvent],
    nav: &TimeSeries,
    purchase_price_override: Option<f64>,
) -> Valuation {
    let Some((last_ts, last_nav)) = nav.last() else {
        trace!("no NAV series; nothing to value");
        return Valuation::default();
    };

    let mut valuation = Valuation::default();
    let reference = |date: NaiveDate, missing: &mut usize| -> f64 {
        find_reference_value(date, nav).unwrap_or_else(|| {
            trace!("no NAV on or before {date}; counting it as 0.0");
            *missing += 1;
            0.0
        })
    };

    let mut i = 0;
    while i < events.len() {
        let buy = events[i];
        if buy.action != Action::Bought {
            i += 1;
            continue;
        }

        let buy_reference_value = reference(buy.date, &mut valuation.missing_reference_values);
        let (sell_date, sell_reference_value) = match events.get(i + 1) {
            Some(sell) if sell.action == Action::Sold => {
                i += 2;
                let value = reference(sell.date, &mut valuation.missing_reference_values);
                (sell.date, value)
            }
            _ => {
                // still held; close at the last known NAV
                i += 1;
                (last_ts.date(), last_nav)
            }
        };

        let profit = sell_reference_value - buy_reference_value;
        let purchase_price = match purchase_price_override {
            Some(price) if price > 0.0 => price,
            _ => buy_reference_value,
        };

        valuation.total_profit += profit;
        valuation.details.push(TransactionDetail {
            buy_date: buy.date,
            sell_date,
            purchase_price,
            selling_price: purchase_price + profit,
            buy_reference_value,
            sell_reference_value,
            profit,
        });
    }

    valuation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::parse_timestamp;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn nav(points: &[(&str, f64)]) -> TimeSeries {
        points
            .iter()
            .map(|(d, v)| (parse_timestamp(&format!("{d}T00:00:00")).unwrap(), *v))
            .collect()
    }

    #[test]
    fn reference_value_is_idempotent_and_null_before_history() {
        let series = nav(&[("2025-01-02", 10.0), ("2025-01-05", 12.0)]);
        let d = date("2025-01-04");
        assert_eq!(find_reference_value(d, &series), Some(10.0));
        assert_eq!(find_reference_value(d, &series), find_reference_value(d, &series));
        assert_eq!(find_reference_value(date("2025-01-01"), &series), None);
    }

    #[test]
    fn closed_pair_uses_both_navs() {
        let series = nav(&[("2025-01-01", 100.0), ("2025-01-02", 110.0), ("2025-01-10", 130.0)]);
        let events = vec![
            TransactionEvent::bought(date("2025-01-01")),
            TransactionEvent::sold(date("2025-01-02")),
        ];
        let v = compute_details(&events, &series, None);
        assert_eq!(v.total_profit, 10.0);
        assert_eq!(v.details[0].purchase_price, 100.0);
        assert_eq!(v.details[0].selling_price, 110.0);
        assert_eq!(v.missing_reference_values, 0);
    }

    #[test]
    fn open_position_closes_at_last_nav() {
        let series = nav(&[("2025-01-01", 100.0), ("2025-11-29", 150.0)]);
        let events = vec![
            TransactionEvent::bought(date("2025-01-01")),
            TransactionEvent::sold(date("2025-01-01")),
            TransactionEvent::bought(date("2025-11-29")),
        ];
        let v = compute_details(&events, &series, None);
        assert_eq!(v.details.len(), 2);
        assert_eq!(v.details[0].profit, 0.0);
        assert_eq!(v.details[1].sell_date, date("2025-11-29"));
        assert_eq!(v.details[1].sell_reference_value, 150.0);
        assert_eq!(v.details[1].profit, 0.0);
    }

    #[test]
    fn unmatched_buy_mid_sequence_uses_last_nav() {
        let series = nav(&[("2025-01-01", 100.0), ("2025-01-05", 120.0), ("2025-02-01", 90.0)]);
        let events = vec![
            TransactionEvent::bought(date("2025-01-01")),
            TransactionEvent::bought(date("2025-01-05")),
            TransactionEvent::sold(date("2025-02-01")),
        ];
        let v = compute_details(&events, &series, None);
        assert_eq!(v.details.len(), 2);
        assert_eq!(v.details[0].sell_date, date("2025-02-01"));
        assert_eq!(v.details[0].profit, -10.0);
        assert_eq!(v.details[1].profit, -30.0);
        assert_eq!(v.total_profit, -40.0);
    }

    #[test]
    fn positive_override_sets_purchase_price_but_not_profit() {
        let series = nav(&[("2025-01-01", 100.0), ("2025-01-02", 110.0)]);
        let events = vec![
            TransactionEvent::bought(date("2025-01-01")),
            TransactionEvent::sold(date("2025-01-02")),
        ];
        let v = compute_details(&events, &series, Some(50.0));
        assert_eq!(v.details[0].purchase_price, 50.0);
        assert_eq!(v.details[0].selling_price, 60.0);
        assert_eq!(v.details[0].profit, 10.0);

        for ignored in [Some(0.0), Some(-5.0), None] {
            let v = compute_details(&events, &series, ignored);
            assert_eq!(v.details[0].purchase_price, 100.0);
        }
    }

    #[test]
    fn missing_reference_counts_as_zero() {
        let series = nav(&[("2025-02-01", 40.0)]);
        let events = vec![
            TransactionEvent::bought(date("2025-01-01")),
            TransactionEvent::sold(date("2025-01-15")),
        ];
        let v = compute_details(&events, &series, None);
        assert_eq!(v.details[0].buy_reference_value, 0.0);
        assert_eq!(v.details[0].sell_reference_value, 0.0);
        assert_eq!(v.total_profit, 0.0);
        assert_eq!(v.missing_reference_values, 2);
    }

    #[test]
    fn stray_sell_is_ignored_and_empty_nav_values_nothing() {
        let series = nav(&[("2025-01-01", 1.0)]);
        let events = vec![TransactionEvent::sold(date("2025-01-01"))];
        assert!(compute_details(&events, &series, None).details.is_empty());

        let events = vec![TransactionEvent::bought(date("2025-01-01"))];
        assert_eq!(compute_details(&events, &TimeSeries::new(), None), Valuation::default());
    }
}
