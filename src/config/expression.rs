//! `${{ ... }}` expressions in workflow values.
//!
//! # Syntax
//!
//! - `${{ matrix.runtime-version }}` - replaced with the operand's value
//! - `${{ event.number || event.ref }}` - first non-empty operand wins
//! - `${{ 'literal' }}` - single-quoted literal operand
//! - `$${{ escaped }}` - produces literal `${{ escaped }}` in output
//!
//! # Operands
//!
//! | Operand | Value |
//! |---------|-------|
//! | `workflow` | workflow name |
//! | `job` | job id |
//! | `run.id` | run identifier |
//! | `event.name`, `event.ref`, `event.number` | trigger event fields |
//! | `matrix.<axis>` | value of a matrix axis for this run |
//! | `params.runtime-version`, `params.interactive-output` | recognized run parameters |
//! | `env.<NAME>` | merged run environment |
//!
//! A known operand without a value (e.g. `event.number` on a push) resolves
//! to the empty string. An unknown operand is a validation error.

use crate::error::{ConveyorError, Result};
use std::collections::HashMap;

/// A segment of a string containing expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Literal text
    Literal(String),
    /// Expression body between `${{` and `}}`, trimmed
    Expression(String),
}

/// A single operand of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `'quoted text'`
    Literal(String),
    /// Dotted path like `matrix.runtime-version`
    Path(String),
}

/// Names of the recognized run parameters.
pub const PARAMETER_NAMES: &[&str] = &["runtime-version", "interactive-output"];

/// Parse a string into literal and expression segments.
pub fn parse_expressions(input: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("$${{") {
            // Escaped: keep everything up to and including the closing braces.
            literal.push_str("${{");
            match after.find("}}") {
                Some(end) => {
                    literal.push_str(&after[..end + 2]);
                    rest = &after[end + 2..];
                }
                None => {
                    literal.push_str(after);
                    rest = "";
                }
            }
        } else if let Some(after) = rest.strip_prefix("${{") {
            match after.find("}}") {
                Some(end) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Expression(after[..end].trim().to_string()));
                    rest = &after[end + 2..];
                }
                None => {
                    // Unterminated: treat as literal text.
                    literal.push_str(rest);
                    rest = "";
                }
            }
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                literal.push(c);
            }
            rest = chars.as_str();
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }

    segments
}

/// Check if a string contains any expression.
pub fn has_expressions(input: &str) -> bool {
    parse_expressions(input)
        .iter()
        .any(|seg| matches!(seg, Segment::Expression(_)))
}

/// Extract all expression bodies from a string.
pub fn extract_expressions(input: &str) -> Vec<String> {
    parse_expressions(input)
        .into_iter()
        .filter_map(|seg| match seg {
            Segment::Expression(expr) => Some(expr),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Split an expression body into its `||`-separated operands.
///
/// # Errors
///
/// Returns `ConfigValidationError` for empty operands, unterminated quotes
/// or unknown operand paths.
pub fn parse_operands(expr: &str) -> Result<Vec<Operand>> {
    let mut operands = Vec::new();

    for raw in expr.split("||") {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid(expr, "empty operand"));
        }

        if let Some(quoted) = raw.strip_prefix('\'') {
            let text = quoted
                .strip_suffix('\'')
                .ok_or_else(|| invalid(expr, "unterminated quote"))?;
            operands.push(Operand::Literal(text.to_string()));
            continue;
        }

        if !is_known_path(raw) {
            return Err(invalid(expr, &format!("unknown operand '{}'", raw)));
        }
        operands.push(Operand::Path(raw.to_string()));
    }

    Ok(operands)
}

fn is_known_path(path: &str) -> bool {
    match path {
        "workflow" | "job" | "run.id" | "event.name" | "event.ref" | "event.number" => true,
        _ => {
            if let Some(param) = path.strip_prefix("params.") {
                PARAMETER_NAMES.contains(&param)
            } else if let Some(axis) = path.strip_prefix("matrix.") {
                !axis.is_empty()
            } else if let Some(name) = path.strip_prefix("env.") {
                !name.is_empty()
            } else {
                false
            }
        }
    }
}

fn invalid(expr: &str, reason: &str) -> ConveyorError {
    ConveyorError::ConfigValidationError {
        message: format!("Invalid expression '${{{{ {} }}}}': {}", expr, reason),
    }
}

/// Values available to expressions for one run.
///
/// Paths are stored flat (`event.ref`, `matrix.os`); `env.*` lookups go
/// to [`ExpressionContext::env`].
#[derive(Debug, Clone, Default)]
pub struct ExpressionContext {
    /// Flat path -> value
    pub values: HashMap<String, String>,

    /// Run environment for `env.*`
    pub env: HashMap<String, String>,
}

impl ExpressionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a path value.
    pub fn with(mut self, path: &str, value: impl Into<String>) -> Self {
        self.values.insert(path.to_string(), value.into());
        self
    }

    /// Set a path value in place.
    pub fn set(&mut self, path: &str, value: impl Into<String>) {
        self.values.insert(path.to_string(), value.into());
    }

    /// Resolve a single path. Known paths without a value resolve to "".
    pub fn lookup(&self, path: &str) -> String {
        if let Some(name) = path.strip_prefix("env.") {
            return self.env.get(name).cloned().unwrap_or_default();
        }
        self.values.get(path).cloned().unwrap_or_default()
    }

    /// Evaluate an expression body: the first non-empty operand wins.
    pub fn evaluate(&self, expr: &str) -> Result<String> {
        for operand in parse_operands(expr)? {
            let value = match operand {
                Operand::Literal(text) => text,
                Operand::Path(path) => self.lookup(&path),
            };
            if !value.is_empty() {
                return Ok(value);
            }
        }
        Ok(String::new())
    }
}

/// Resolve every expression in a string.
///
/// # Errors
///
/// Returns `ConfigValidationError` if an expression is malformed or
/// references an unknown operand.
pub fn resolve_string(input: &str, context: &ExpressionContext) -> Result<String> {
    let mut result = String::with_capacity(input.len());

    for segment in parse_expressions(input) {
        match segment {
            Segment::Literal(text) => result.push_str(&text),
            Segment::Expression(expr) => result.push_str(&context.evaluate(&expr)?),
        }
    }

    Ok(result)
}
