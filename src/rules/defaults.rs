//! Built-in rule set written when no rule file exists yet.

use crate::models::{Operator, Rule};
use std::collections::BTreeMap;

/// Returns the stock 2G/3G/4G rules.
pub fn default_rules() -> BTreeMap<String, Vec<Rule>> {
    let mut rules = BTreeMap::new();

    rules.insert(
        "2G".to_string(),
        vec![
            Rule::new("2G_CSSR_CS(%)", Operator::GreaterThan, 98.0).with_count_threshold(100.0),
            Rule::new("CDR_OPTIMUM", Operator::LessThan, 1.0).with_count_threshold(50.0),
            Rule::new("HSR_OPTIMUM", Operator::GreaterEqual, 98.0).with_count_threshold(100.0),
        ],
    );

    rules.insert(
        "3G".to_string(),
        vec![
            Rule::new("Call Setup Success Rate PS_OPTIMUM", Operator::GreaterThan, 98.0)
                .with_count("PS_Attempts", 100.0),
            Rule::new("Call Setup Success Rate CS_OPTIMUM", Operator::GreaterThan, 98.0)
                .with_count("CS_Attempts", 100.0),
            Rule::new("Call Drop Rate CS_OPTIMUM", Operator::LessThan, 1.0)
                .with_count("Dropped_Calls", 50.0),
            Rule::new("RTWP_optimum(dBm)", Operator::LessThan, -95.0),
            Rule::new("EVQI Bad+Poor_Optimum (%)", Operator::LessThan, 2.0)
                .with_count_threshold(100.0),
        ],
    );

    rules.insert(
        "4G".to_string(),
        vec![
            Rule::new("LTE Setup Success Rate_OPTIMUM(%)", Operator::GreaterThan, 99.0)
                .with_count("LTE_Attempts", 100.0),
            Rule::new("LTE Call Drop Rate_OPTIMUM", Operator::LessThan, 0.8)
                .with_count("LTE_Drops", 50.0),
            Rule::new("CSFB Success Rate_OPTIMUM(%)", Operator::GreaterThan, 99.5)
                .with_count_threshold(100.0),
        ],
    );

    rules
}
