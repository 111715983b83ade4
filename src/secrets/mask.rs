//! Redaction of secret values in captured output.

use super::SecretMatcher;
use std::collections::HashMap;

/// Masks secret values in step output.
///
/// Longer secrets are replaced first, so a secret that contains another
/// is never left half-masked.
///
/// # Example
///
/// ```
/// use conveyor::secrets::OutputMasker;
///
/// let mut masker = OutputMasker::new();
/// masker.add_secret("ghp_abc123");
///
/// let output = masker.mask("pushing with ghp_abc123");
/// assert_eq!(output, "pushing with [REDACTED]");
/// ```
#[derive(Debug, Clone)]
pub struct OutputMasker {
    secrets: Vec<String>,
    mask: String,
}

impl OutputMasker {
    /// Create a masker with the default `[REDACTED]` mask.
    pub fn new() -> Self {
        Self::with_mask("[REDACTED]")
    }

    /// Create a masker with a custom mask string.
    pub fn with_mask(mask: impl Into<String>) -> Self {
        Self {
            secrets: Vec::new(),
            mask: mask.into(),
        }
    }

    /// Register the values of every variable in `env` whose name the
    /// matcher flags as secret.
    ///
    /// ```
    /// use conveyor::secrets::{OutputMasker, SecretMatcher};
    /// use std::collections::HashMap;
    ///
    /// let env = HashMap::from([
    ///     ("GITHUB_TOKEN".to_string(), "ghp_abc".to_string()),
    ///     ("NXF_ANSI_LOG".to_string(), "false".to_string()),
    /// ]);
    /// let masker = OutputMasker::from_env(&env, &SecretMatcher::with_builtins());
    /// assert_eq!(masker.secret_count(), 1);
    /// ```
    pub fn from_env(env: &HashMap<String, String>, matcher: &SecretMatcher) -> Self {
        let mut masker = Self::new();
        for (name, value) in env {
            if matcher.is_secret(name) {
                masker.add_secret(value.clone());
            }
        }
        masker
    }

    /// Register a secret value. Empty strings are ignored.
    pub fn add_secret(&mut self, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() || self.secrets.contains(&value) {
            return;
        }
        self.secrets.push(value);
        self.secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
    }

    /// Register several secret values.
    pub fn add_secrets(&mut self, values: impl IntoIterator<Item = impl Into<String>>) {
        for value in values {
            self.add_secret(value);
        }
    }

    /// Replace every registered secret in `input`.
    pub fn mask(&self, input: &str) -> String {
        let mut result = input.to_string();
        for secret in &self.secrets {
            if result.contains(secret.as_str()) {
                result = result.replace(secret.as_str(), &self.mask);
            }
        }
        result
    }

    /// Number of registered secrets.
    pub fn secret_count(&self) -> usize {
        self.secrets.len()
    }
}

impl Default for OutputMasker {
    fn default() -> Self {
        Self::new()
    }
}
