//! Stack parameter values
//!
//! A [`ParameterSet`] is the final key -> value map handed to a stack
//! deployment. Values are either scalars or ordered lists of scalars; lists
//! render comma-joined, which is what `List<...>` template parameters expect.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::dto::stack::StackParameter;

/// A single parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(String),
    List(Vec<String>),
}

impl ParamValue {
    /// Returns true when the value carries nothing usable
    ///
    /// Blank scalars and lists without a single non-blank item count as empty,
    /// so they fall through to the next resolution tier.
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Scalar(value) => value.trim().is_empty(),
            ParamValue::List(items) => items.iter().all(|item| item.trim().is_empty()),
        }
    }

    /// Renders the value the way the stack engine expects it
    pub fn render(&self) -> String {
        match self {
            ParamValue::Scalar(value) => value.clone(),
            ParamValue::List(items) => items.join(","),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Scalar(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Scalar(value.to_string())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        ParamValue::List(items)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(items: Vec<&str>) -> Self {
        ParamValue::List(items.into_iter().map(str::to_string).collect())
    }
}

/// Ordered mapping of parameter name -> value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    /// Creates an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, returning the set for chaining
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts or replaces a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Gets a parameter by name
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Gets a parameter only if it carries a usable value
    pub fn get_non_empty(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key).filter(|value| !value.is_empty())
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no parameters
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates parameters in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Renders the set as stack parameters (lists comma-joined)
    pub fn to_stack_parameters(&self) -> Vec<StackParameter> {
        self.0
            .iter()
            .map(|(key, value)| StackParameter {
                parameter_key: key.clone(),
                parameter_value: value.render(),
            })
            .collect()
    }

    /// Renders the set as `ParameterKey=K,ParameterValue=V` override tokens
    pub fn to_override_tokens(&self) -> Vec<String> {
        self.0
            .iter()
            .map(|(key, value)| format!("ParameterKey={},ParameterValue={}", key, value))
            .collect()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for (key, value) in iter {
            set.insert(key, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_render_comma_joined() {
        let params = ParameterSet::new()
            .with("ClusterName", "demo")
            .with("VpcId", "vpc-123")
            .with("SubnetIds", vec!["subnet-a", "subnet-b"]);

        let tokens = params.to_override_tokens();
        assert!(tokens.contains(&"ParameterKey=SubnetIds,ParameterValue=subnet-a,subnet-b".to_string()));
        assert!(tokens.contains(&"ParameterKey=VpcId,ParameterValue=vpc-123".to_string()));
    }

    #[test]
    fn test_stack_parameters_keep_key_order() {
        let params = ParameterSet::new().with("Memory", 2048u32).with("Cpu", 1024u32);

        let rendered = params.to_stack_parameters();
        assert_eq!(rendered[0].parameter_key, "Cpu");
        assert_eq!(rendered[0].parameter_value, "1024");
        assert_eq!(rendered[1].parameter_key, "Memory");
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let params = ParameterSet::new()
            .with("VpcId", "  ")
            .with("SubnetIds", ParamValue::List(vec![String::new()]))
            .with("ClusterName", "demo");

        assert!(params.get("VpcId").is_some());
        assert!(params.get_non_empty("VpcId").is_none());
        assert!(params.get_non_empty("SubnetIds").is_none());
        assert_eq!(
            params.get_non_empty("ClusterName"),
            Some(&ParamValue::Scalar("demo".to_string()))
        );
    }

    #[test]
    fn test_collect_from_pairs() {
        let params: ParameterSet = vec![("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("B").map(ParamValue::render), Some("2".to_string()));
    }
}
