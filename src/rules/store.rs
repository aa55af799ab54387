//! Rule store: technology key → ordered rule list, persisted as JSON.

use super::defaults::default_rules;
use crate::error::{AuditError, Result};
use crate::models::{Operator, Rule};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Ordered threshold rules per technology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleStore {
    technologies: BTreeMap<String, Vec<Rule>>,
}

impl RuleStore {
    /// Creates a store holding the built-in rules.
    pub fn with_defaults() -> Self {
        Self {
            technologies: default_rules(),
        }
    }

    /// Creates a store from an existing mapping, validating every rule.
    pub fn from_map(technologies: BTreeMap<String, Vec<Rule>>) -> Result<Self> {
        let store = Self { technologies };
        store.validate()?;
        Ok(store)
    }

    /// Parses a store from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let technologies: BTreeMap<String, Vec<Rule>> = serde_json::from_str(json)?;
        Self::from_map(technologies)
    }

    /// Serializes the store as 4-space indented JSON.
    pub fn to_json_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever writes UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Loads a store from a rule file.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| AuditError::io(path, e))?;
        let store = Self::from_json_str(&content)?;
        debug!(
            "Loaded {} rules for {} technologies from {}",
            store.rule_count(),
            store.technologies.len(),
            path.display()
        );
        Ok(store)
    }

    /// Loads the rule file, falling back to the built-in rules.
    ///
    /// A missing file is created with the defaults. A file that exists but
    /// cannot be parsed is left untouched and the defaults are used for this
    /// process only.
    pub fn load_or_init(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No rule file at {}, writing defaults", path.display());
            let store = Self::with_defaults();
            store.save(path)?;
            return Ok(store);
        }

        match Self::load(path) {
            Ok(store) => Ok(store),
            Err(AuditError::Json(e)) => {
                warn!(
                    "Rule file {} is not valid JSON ({}), using built-in rules",
                    path.display(),
                    e
                );
                Ok(Self::with_defaults())
            }
            Err(e) => Err(e),
        }
    }

    /// Writes the store to a rule file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = self.to_json_string()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| AuditError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| AuditError::io(path, e))?;
        info!("Saved {} rules to {}", self.rule_count(), path.display());
        Ok(())
    }

    /// Checks every rule in the store.
    pub fn validate(&self) -> Result<()> {
        for (tech, rules) in &self.technologies {
            for rule in rules {
                rule.validate()
                    .map_err(|e| AuditError::InvalidRule(format!("[{}] {}", tech, e)))?;
            }
        }
        Ok(())
    }

    /// Technology keys in sorted order.
    pub fn technologies(&self) -> Vec<&str> {
        self.technologies.keys().map(String::as_str).collect()
    }

    /// Rules for a technology; unknown keys have no rules.
    pub fn rules_for(&self, technology: &str) -> &[Rule] {
        self.technologies
            .get(technology)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The first rule of a technology reading the given KPI.
    pub fn rule_for_kpi(&self, technology: &str, kpi: &str) -> Option<&Rule> {
        self.rules_for(technology).iter().find(|r| r.kpi == kpi)
    }

    /// Every column the technology's rules read: KPI columns, then count columns.
    pub fn referenced_columns(&self, technology: &str) -> Vec<&str> {
        let rules = self.rules_for(technology);
        let mut columns: Vec<&str> = Vec::new();
        let kpis = rules.iter().map(|r| r.kpi.as_str());
        let counts = rules.iter().filter_map(|r| r.count_column.as_deref());
        for column in kpis.chain(counts) {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
        columns
    }

    /// Total number of rules across technologies.
    pub fn rule_count(&self) -> usize {
        self.technologies.values().map(Vec::len).sum()
    }

    /// Registers a technology with no rules. Returns false if it already exists.
    pub fn add_technology(&mut self, technology: &str) -> bool {
        if self.technologies.contains_key(technology) {
            return false;
        }
        self.technologies.insert(technology.to_string(), Vec::new());
        true
    }

    /// Appends a rule to a technology.
    pub fn add_rule(&mut self, technology: &str, rule: Rule) -> Result<()> {
        rule.validate()?;
        self.rules_mut(technology)?.push(rule);
        Ok(())
    }

    /// Replaces the rule at `index`, returning the previous rule.
    pub fn replace_rule(&mut self, technology: &str, index: usize, rule: Rule) -> Result<Rule> {
        rule.validate()?;
        let rules = self.rules_mut(technology)?;
        let slot = rules.get_mut(index).ok_or_else(|| {
            AuditError::InvalidRule(format!("no rule at index {} for {}", index, technology))
        })?;
        Ok(std::mem::replace(slot, rule))
    }

    /// Removes and returns the rule at `index`.
    pub fn remove_rule(&mut self, technology: &str, index: usize) -> Result<Rule> {
        let rules = self.rules_mut(technology)?;
        if index >= rules.len() {
            return Err(AuditError::InvalidRule(format!(
                "no rule at index {} for {}",
                index, technology
            )));
        }
        Ok(rules.remove(index))
    }

    fn rules_mut(&mut self, technology: &str) -> Result<&mut Vec<Rule>> {
        self.technologies
            .get_mut(technology)
            .ok_or_else(|| AuditError::UnknownTechnology(technology.to_string()))
    }
}

/// Parses `TECH|KPI|OP|THRESHOLD[|COUNT_COLUMN|COUNT_THRESHOLD]`.
///
/// An empty count column keeps the rule uncounted while still setting the
/// count threshold.
pub fn parse_rule_spec(spec: &str) -> Result<(String, Rule)> {
    let parts: Vec<&str> = spec.split('|').map(str::trim).collect();
    if !(parts.len() == 4 || parts.len() == 6) {
        return Err(AuditError::InvalidRule(format!(
            "expected TECH|KPI|OP|THRESHOLD[|COUNT_COLUMN|COUNT_THRESHOLD], got '{}'",
            spec
        )));
    }

    let technology = parts[0];
    if technology.is_empty() {
        return Err(AuditError::InvalidRule("technology is empty".to_string()));
    }
    let operator: Operator = parts[2].parse()?;
    let threshold = parse_number(parts[3], "threshold")?;

    let mut rule = Rule::new(parts[1], operator, threshold);
    if parts.len() == 6 {
        let count_threshold = parse_number(parts[5], "count threshold")?;
        rule = if parts[4].is_empty() {
            rule.with_count_threshold(count_threshold)
        } else {
            rule.with_count(parts[4], count_threshold)
        };
    }
    rule.validate()?;

    Ok((technology.to_string(), rule))
}

/// Parses a `TECH:INDEX` rule reference.
pub fn parse_rule_ref(spec: &str) -> Result<(String, usize)> {
    let (technology, index) = spec
        .rsplit_once(':')
        .ok_or_else(|| AuditError::InvalidRule(format!("expected TECH:INDEX, got '{}'", spec)))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|_| AuditError::InvalidRule(format!("invalid rule index '{}'", index)))?;
    Ok((technology.trim().to_string(), index))
}

/// Parses `TECH:INDEX|KPI|OP|THRESHOLD[|COUNT_COLUMN|COUNT_THRESHOLD]`.
pub fn parse_rule_replacement(spec: &str) -> Result<(String, usize, Rule)> {
    let (target, rule) = spec.split_once('|').ok_or_else(|| {
        AuditError::InvalidRule(format!("expected TECH:INDEX|KPI|OP|THRESHOLD, got '{}'", spec))
    })?;
    let (technology, index) = parse_rule_ref(target)?;
    let (_, rule) = parse_rule_spec(&format!("{}|{}", technology, rule))?;
    Ok((technology, index, rule))
}

fn parse_number(raw: &str, what: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| AuditError::InvalidRule(format!("invalid {} '{}'", what, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_technology_has_no_rules() {
        let store = RuleStore::with_defaults();
        assert!(store.rules_for("5G").is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");

        let store = RuleStore::with_defaults();
        store.save(&path).unwrap();
        let loaded = RuleStore::load(&path).unwrap();

        assert_eq!(store, loaded);
    }

    #[test]
    fn test_json_layout() {
        let mut store = RuleStore::default();
        store.add_technology("2G");
        store
            .add_rule("2G", Rule::new("CDR_OPTIMUM", Operator::LessThan, 1.0))
            .unwrap();

        let json = store.to_json_string().unwrap();
        assert!(json.contains("\n    \"2G\": ["));
        assert!(json.contains("\"operator\": \"<\""));
        assert!(!json.contains("count_column"));
    }

    #[test]
    fn test_parse_legacy_file() {
        let json = r#"{
            "3G": [
                {"kpi": "RTWP", "operator": "<", "threshold": -95, "count_threshold": 0},
                {"kpi": "CSSR", "operator": "=", "threshold": 100,
                 "count_column": "Attempts", "count_threshold": 10}
            ]
        }"#;

        let store = RuleStore::from_json_str(json).unwrap();
        let rules = store.rules_for("3G");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].threshold, -95.0);
        assert_eq!(rules[1].operator, Operator::Equal);
        assert_eq!(rules[1].count_column.as_deref(), Some("Attempts"));
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rules.json");

        let store = RuleStore::load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store, RuleStore::with_defaults());
    }

    #[test]
    fn test_load_or_init_keeps_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = RuleStore::load_or_init(&path).unwrap();
        assert_eq!(store, RuleStore::with_defaults());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
    }

    #[test]
    fn test_invalid_rule_rejected_on_load() {
        let json = r#"{"2G": [{"kpi": "", "operator": ">", "threshold": 1}]}"#;
        assert!(matches!(
            RuleStore::from_json_str(json),
            Err(AuditError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_edit_operations() {
        let mut store = RuleStore::with_defaults();
        let before = store.rules_for("2G").len();

        store
            .add_rule("2G", Rule::new("TCH_CONG", Operator::LessThan, 2.0))
            .unwrap();
        assert_eq!(store.rules_for("2G").len(), before + 1);

        let old = store
            .replace_rule("2G", 0, Rule::new("SDCCH_SR", Operator::GreaterThan, 97.0))
            .unwrap();
        assert_eq!(old.kpi, "2G_CSSR_CS(%)");
        assert_eq!(store.rules_for("2G")[0].kpi, "SDCCH_SR");

        let removed = store.remove_rule("2G", before).unwrap();
        assert_eq!(removed.kpi, "TCH_CONG");
        assert!(store.remove_rule("2G", 99).is_err());

        assert!(matches!(
            store.add_rule("5G", Rule::new("X", Operator::GreaterThan, 1.0)),
            Err(AuditError::UnknownTechnology(_))
        ));
        assert!(store.add_technology("5G"));
        assert!(!store.add_technology("5G"));
    }

    #[test]
    fn test_rule_for_kpi_and_columns() {
        let store = RuleStore::with_defaults();
        let rule = store.rule_for_kpi("4G", "LTE Call Drop Rate_OPTIMUM").unwrap();
        assert_eq!(rule.threshold, 0.8);

        let columns = store.referenced_columns("4G");
        assert!(columns.contains(&"LTE_Attempts"));
        assert!(columns.contains(&"CSFB Success Rate_OPTIMUM(%)"));
        assert_eq!(columns.len(), 5);
    }

    #[test]
    fn test_parse_rule_spec() {
        let (tech, rule) = parse_rule_spec("3G|CSSR| >= |98.5").unwrap();
        assert_eq!(tech, "3G");
        assert_eq!(rule, Rule::new("CSSR", Operator::GreaterEqual, 98.5));

        let (_, counted) = parse_rule_spec("4G|DCR|<|0.8|LTE_Attempts|100").unwrap();
        assert_eq!(counted.count_column.as_deref(), Some("LTE_Attempts"));
        assert_eq!(counted.count_threshold, 100.0);

        let (_, floor_only) = parse_rule_spec("4G|DCR|<|0.8||5").unwrap();
        assert!(floor_only.count_column.is_none());
        assert_eq!(floor_only.count_threshold, 5.0);
    }

    #[test]
    fn test_parse_rule_spec_rejects_bad_input() {
        assert!(parse_rule_spec("3G|CSSR|>=").is_err());
        assert!(parse_rule_spec("3G|CSSR|~|98").is_err());
        assert!(parse_rule_spec("3G|CSSR|>=|high").is_err());
        assert!(parse_rule_spec("|CSSR|>=|98").is_err());
        assert!(parse_rule_spec("3G||>=|98").is_err());
    }

    #[test]
    fn test_parse_rule_replacement() {
        let (tech, index, rule) = parse_rule_replacement("2G:1|CDR_OPTIMUM|<|1.5").unwrap();
        assert_eq!((tech.as_str(), index), ("2G", 1));
        assert_eq!(rule.threshold, 1.5);

        let mut store = RuleStore::with_defaults();
        let old = store.replace_rule(&tech, index, rule).unwrap();
        assert_eq!(old.threshold, 1.0);
        assert!(parse_rule_replacement("2G:1").is_err());
    }

    #[test]
    fn test_parse_rule_ref() {
        assert_eq!(parse_rule_ref("2G:3").unwrap(), ("2G".to_string(), 3));
        assert!(parse_rule_ref("2G").is_err());
        assert!(parse_rule_ref("2G:x").is_err());
    }
}
