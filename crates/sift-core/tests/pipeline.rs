use chrono::NaiveDate;
use serde_json::{json, Value};
use sift_core::analysis::{apply_volatility_overrides, volatility_rows};
use sift_core::headers::{COMMON_PROPERTY, COMMON_PROPERTY_PATTERN};
use sift_core::metrics::{extract_all, extract_metric_rows};
use sift_core::transactions::collect_histories;
use sift_core::*;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn metrics_preset() -> Value {
    json!({
        "headers": [
            {"name": "Name", "command": "name"},
            {"name": "Volatility", "command": "vola"},
            {"name": "Interest Rate", "command": "interest"},
            {"name": "Purchase Price", "command": "purchase_price"},
            {"name": "Price", "command": "price"},
            {"name": "Common Property", "command": "common_property"}
        ],
        "resultLine": {
            "name": "Portfolio",
            "subLines": [
                {"name": "Equities", "subLines": [
                    {"name": "ACME", "values": [
                        "ACME", {"rawValue": 0.0, "value": "0.00 %"}, null,
                        {"rawValue": 90.0}, {"rawValue": 104.2}, "Core"
                    ]},
                    {"subLines": [
                        {"name": "Globex", "values": [
                            "Globex", {"rawValue": 8.5}, {"rawValue": 1.25},
                            {"rawValue": 0}, {"rawValue": 51.0}, null
                        ]}
                    ]}
                ]},
                "not a line"
            ]
        }
    })
}

fn security_preset() -> Value {
    json!({
        "headers": ["Name", "Ccy", "Qty", "NAV"],
        "resultLine": {"subLines": [
            {"name": "ACME", "values": ["ACME", "EUR", 10, {
                "rawValue": {
                    "2025-03-01T00:00:00": 100.0,
                    "2025-03-02T00:00:00": 104.0,
                    "2025-06-01T00:00:00": 98.0,
                    "2025-06-02T00:00:00": 101.0
                },
                "command": "nav_history"
            }]},
            {"name": "Globex", "values": ["Globex", "USD", 5, {
                "rawValue": {
                    "2025-11-27T00:00:00": 40.0,
                    "2025-11-28T00:00:00": 42.0,
                    "2025-11-29T00:00:00": 45.0
                },
                "command": "nav_history"
            }]}
        ]}
    })
}

fn volatility_preset() -> Value {
    json!({
        "headers": [],
        "resultLine": {"subLines": [
            {"name": "Initech", "values": [
                {"rawValue": 14.0, "command": "vola"},
                {"rawValue": "06/02/2025", "command": "last_sell_date"}
            ]},
            {"name": "Hooli", "values": [{"rawValue": 3.0, "command": "vola"}]}
        ]}
    })
}

#[test]
fn metrics_extraction_over_nested_groups() {
    let report = Report::from_value(&metrics_preset(), DEFAULT_MAX_DEPTH).unwrap();
    assert_eq!(report.skipped_nodes, 1);

    let table = extract_all(&report, &STANDARD_RULES, DEFAULT_MAX_DEPTH).unwrap();
    let assets: Vec<_> = table.iter().map(|r| r.asset.as_str()).collect();
    assert_eq!(assets, vec!["Equities", "ACME", "Globex"]);

    let globex = table.get("Globex").unwrap();
    assert_eq!(globex.get("volatility"), Some(&MetricValue::Number(8.5)));
    assert_eq!(globex.get("interest_rate"), Some(&MetricValue::Number(1.25)));
    assert_eq!(globex.get("price"), Some(&MetricValue::Number(51.0)));

    let common =
        extract_metric_rows(&report, COMMON_PROPERTY, &COMMON_PROPERTY_PATTERN, 100).unwrap();
    assert_eq!(
        serde_json::to_value(&common).unwrap(),
        json!([{"asset": "ACME", "common_property": "Core"}])
    );
}

#[test]
fn full_analysis_then_backfill() {
    let config = Config::default();
    let metrics_report = Report::from_value(&metrics_preset(), config.max_depth).unwrap();
    let security = Report::from_value(&security_preset(), config.max_depth).unwrap();
    let table = extract_all(&metrics_report, &config.metric_rules, config.max_depth).unwrap();

    let histories =
        collect_histories(&security, config.reference_end_date, config.max_depth).unwrap();
    assert_eq!(histories.len(), 2);
    assert_eq!(
        histories[0].transactions,
        vec![
            TransactionEvent::bought(day("2025-03-01")),
            TransactionEvent::sold(day("2025-03-02")),
            TransactionEvent::bought(day("2025-06-01")),
            TransactionEvent::sold(day("2025-06-02")),
        ]
    );
    assert_eq!(
        histories[1].transactions,
        vec![TransactionEvent::bought(day("2025-11-27"))]
    );

    let mut analyses = analyze(&security, &table, &histories, &config).unwrap();
    assert_eq!(analyses.len(), 2);

    let acme = &analyses[0];
    assert_eq!(acme.total_profit, 7.0);
    assert_eq!(acme.transactions_detail[0].purchase_price, 90.0);
    assert_eq!(acme.transactions_detail[0].selling_price, 94.0);
    assert_eq!(acme.transactions_detail[1].purchase_price, 90.0);

    // a zero purchase price falls back to the buy-date NAV
    let globex = &analyses[1];
    assert_eq!(globex.total_profit, 5.0);
    assert_eq!(globex.transactions_detail[0].purchase_price, 40.0);
    assert_eq!(globex.transactions_detail[0].sell_date, day("2025-11-29"));

    let summary = AnalysisSummary::of(&analyses);
    assert_eq!(summary.total_assets, 2);
    assert_eq!(summary.total_profit, 12.0);
    assert_eq!(summary.missing_reference_values, 0);

    let preset = Report::from_value(&volatility_preset(), config.max_depth).unwrap();
    let sources = volatility_sources(&preset, config.max_depth).unwrap();
    let stats = backfill_zero_volatility(&mut analyses, &sources);
    assert_eq!(stats.zero_volatility_count, 1);
    assert_eq!(stats.matches.by_sell_date, 1);
    assert_eq!(analyses[0].volatility, Some(MetricValue::Number(14.0)));

    let rows = volatility_rows(&analyses);
    assert_eq!(rows.len(), 2);

    let overrides: Vec<MetricRow> =
        serde_json::from_value(json!([{"asset": "Globex", "volatility": 9.0}])).unwrap();
    assert_eq!(apply_volatility_overrides(&mut analyses, &overrides), 1);
    assert_eq!(analyses[1].volatility, Some(MetricValue::Number(9.0)));

    let out = serde_json::to_value(&analyses[1]).unwrap();
    assert_eq!(out["asset"], "Globex");
    assert_eq!(out["totalProfit"], 5.0);
    assert_eq!(out["transactionsDetail"][0]["buyDate"], "2025-11-27");
    assert_eq!(out["dailyChanges"].as_array().unwrap().len(), 3);
    assert!(out.get("missingReferenceValues").is_none());
}

#[test]
fn malformed_depth_is_an_error_not_a_crash() {
    let mut line = json!({"name": "leaf"});
    for i in 0..50 {
        line = json!({"name": format!("level {i}"), "subLines": [line]});
    }
    let payload = json!({"headers": [], "resultLine": {"subLines": [line]}});
    let err = Report::from_value(&payload, 20).unwrap_err();
    assert!(matches!(err, Error::MalformedTree { limit: 20, .. }));
    assert!(Report::from_value(&payload, 100).is_ok());
}
