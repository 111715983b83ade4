//! Matrix expansion.
//!
//! A job's `strategy.matrix` is a list of axes. [`expand`] turns it into
//! concrete combinations: the Cartesian product in declared axis order
//! (the last axis varies fastest), minus `exclude` matches, plus `include`
//! entries appended at the end.

use crate::config::{MatrixValue, StrategyConfig};
use indexmap::IndexMap;

/// One matrix axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixAxis {
    pub name: String,
    pub values: Vec<String>,
}

/// One concrete assignment of values to axes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixCombination(IndexMap<String, String>);

impl MatrixCombination {
    /// Set an axis value.
    pub fn insert(&mut self, axis: impl Into<String>, value: impl Into<String>) {
        self.0.insert(axis.into(), value.into());
    }

    /// Value of an axis.
    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }

    /// Axis/value pairs in axis order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values joined with `, `, e.g. `ubuntu, 21.04.0`. Empty without axes.
    pub fn label(&self) -> String {
        self.0.values().cloned().collect::<Vec<_>>().join(", ")
    }

    /// Whether every axis of `partial` has the same value here.
    pub fn matches(&self, partial: &IndexMap<String, MatrixValue>) -> bool {
        partial
            .iter()
            .all(|(axis, value)| self.get(axis) == Some(value.to_string().as_str()))
    }

    fn from_partial(partial: &IndexMap<String, MatrixValue>) -> Self {
        Self(
            partial
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
        )
    }
}

/// The axes of a strategy, values rendered as strings.
pub fn axes(strategy: &StrategyConfig) -> Vec<MatrixAxis> {
    strategy
        .matrix
        .iter()
        .map(|(name, values)| MatrixAxis {
            name: name.clone(),
            values: values.iter().map(ToString::to_string).collect(),
        })
        .collect()
}

/// Expand a job's strategy into combinations.
///
/// No strategy (or an empty matrix) yields exactly one empty combination.
pub fn expand(strategy: Option<&StrategyConfig>) -> Vec<MatrixCombination> {
    let Some(strategy) = strategy else {
        return vec![MatrixCombination::default()];
    };

    let mut combinations = vec![MatrixCombination::default()];
    for axis in axes(strategy) {
        let mut next = Vec::with_capacity(combinations.len() * axis.values.len());
        for base in &combinations {
            for value in &axis.values {
                let mut combination = base.clone();
                combination.insert(axis.name.clone(), value.clone());
                next.push(combination);
            }
        }
        combinations = next;
    }

    combinations.retain(|c| !strategy.exclude.iter().any(|ex| c.matches(ex)));

    for extra in &strategy.include {
        let combination = MatrixCombination::from_partial(extra);
        if !combinations.contains(&combination) {
            combinations.push(combination);
        }
    }

    if combinations.is_empty() && strategy.matrix.is_empty() {
        combinations.push(MatrixCombination::default());
    }

    combinations
}
