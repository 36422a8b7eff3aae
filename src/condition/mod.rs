//! Entry and eligibility conditions
//!
//! Nodes and fragments carry ordered condition lists. All conditions must
//! pass for the owner to be eligible; evaluation is an AND-fold with no
//! short-circuit side effects. A condition that cannot be evaluated (a
//! dangling authored reference) is logged and treated as vacuously true so
//! one broken gate does not silence a whole scene.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// The blackboard conditions read from
///
/// A flat string-keyed store of JSON values owned by the runtime. Hosts
/// mirror whatever game state their gates need into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Facts {
    values: HashMap<String, serde_json::Value>,
}

impl Facts {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a raw value
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.values.insert(key.into(), value);
    }

    /// Set a boolean flag
    pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
        self.values.insert(key.into(), serde_json::Value::Bool(value));
    }

    /// Set an integer counter
    pub fn set_count(&mut self, key: impl Into<String>, value: i64) {
        self.values.insert(key.into(), serde_json::Value::from(value));
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Get a boolean flag, if the key holds one
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    /// Get an integer counter, if the key holds one
    pub fn count(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }
}

/// A boolean gate over the fact store
///
/// `None` means the condition could not be evaluated at all and is treated
/// as a pass by [`all_pass`], with a warning.
pub trait Condition: fmt::Debug + Send + Sync {
    /// Evaluate against the current facts
    fn evaluate(&self, facts: &Facts) -> Option<bool>;
}

/// AND-fold a condition list; empty lists pass
pub fn all_pass(conditions: &[Box<dyn Condition>], facts: &Facts) -> bool {
    for condition in conditions {
        match condition.evaluate(facts) {
            Some(true) => {}
            Some(false) => return false,
            None => {
                warn!(condition = ?condition, "condition could not be evaluated, treating as pass");
            }
        }
    }
    true
}

/// Passes when a flag is set to true
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagSet {
    /// Fact key to read
    pub key: String,
}

impl FlagSet {
    /// Gate on `key` being true
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Condition for FlagSet {
    fn evaluate(&self, facts: &Facts) -> Option<bool> {
        Some(facts.flag(&self.key).unwrap_or(false))
    }
}

/// Passes when a flag is absent or false
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagClear {
    /// Fact key to read
    pub key: String,
}

impl FlagClear {
    /// Gate on `key` being unset or false
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Condition for FlagClear {
    fn evaluate(&self, facts: &Facts) -> Option<bool> {
        Some(!facts.flag(&self.key).unwrap_or(false))
    }
}

/// Passes when a counter is at least a threshold; missing counters read as 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountAtLeast {
    /// Fact key to read
    pub key: String,
    /// Minimum value required to pass
    pub min: i64,
}

impl CountAtLeast {
    /// Gate on `key >= min`
    pub fn new(key: impl Into<String>, min: i64) -> Self {
        Self { key: key.into(), min }
    }
}

impl Condition for CountAtLeast {
    fn evaluate(&self, facts: &Facts) -> Option<bool> {
        Some(facts.count(&self.key).unwrap_or(0) >= self.min)
    }
}

/// A condition whose target no longer exists; always unevaluable
///
/// Models the dangling authored reference case so hosts and tests can
/// exercise the warn-and-pass path.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Unbound;

impl Condition for Unbound {
    fn evaluate(&self, _facts: &Facts) -> Option<bool> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gates(conditions: Vec<Box<dyn Condition>>) -> Vec<Box<dyn Condition>> {
        conditions
    }

    #[test]
    fn test_empty_condition_list_passes() {
        let facts = Facts::new();
        assert!(all_pass(&[], &facts));
    }

    #[test]
    fn test_all_pass_is_an_and_fold() {
        let mut facts = Facts::new();
        facts.set_flag("met_marla", true);
        facts.set_count("gold", 30);

        let passing = gates(vec![
            Box::new(FlagSet::new("met_marla")),
            Box::new(CountAtLeast::new("gold", 25)),
        ]);
        assert!(all_pass(&passing, &facts));

        let vetoed = gates(vec![
            Box::new(FlagSet::new("met_marla")),
            Box::new(CountAtLeast::new("gold", 100)),
        ]);
        assert!(!all_pass(&vetoed, &facts));
    }

    #[test]
    fn test_missing_flag_reads_as_false() {
        let facts = Facts::new();
        assert_eq!(FlagSet::new("never_set").evaluate(&facts), Some(false));
        assert_eq!(FlagClear::new("never_set").evaluate(&facts), Some(true));
    }

    #[test]
    fn test_unbound_condition_is_skipped_as_pass() {
        let facts = Facts::new();
        let conditions = gates(vec![Box::new(Unbound), Box::new(FlagClear::new("x"))]);
        assert!(all_pass(&conditions, &facts));
    }

    #[test]
    fn test_missing_counter_reads_as_zero() {
        let facts = Facts::new();
        assert_eq!(CountAtLeast::new("kills", 0).evaluate(&facts), Some(true));
        assert_eq!(CountAtLeast::new("kills", 1).evaluate(&facts), Some(false));
    }
}
