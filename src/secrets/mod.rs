//! Secret detection and masking.
//!
//! - [`SecretMatcher`] - flags environment variable names that hold secrets
//! - [`OutputMasker`] - redacts their values from captured step output
//!
//! # Example
//!
//! ```
//! use conveyor::secrets::{OutputMasker, SecretMatcher};
//!
//! let matcher = SecretMatcher::with_builtins();
//! assert!(matcher.is_secret("GITHUB_TOKEN"));
//!
//! let mut masker = OutputMasker::new();
//! masker.add_secret("ghp_abc123");
//! assert!(!masker.mask("token ghp_abc123").contains("ghp_abc123"));
//! ```

pub mod mask;
pub mod pattern;

pub use mask::OutputMasker;
pub use pattern::{SecretMatcher, SecretPattern, BUILTIN_PATTERNS};
