//! # Env Parsing
//!
//! Validates raw `KEY=VALUE` text into an ordered [`EnvSet`].
//!
//! Rules:
//! - Empty lines and lines starting with `#` are skipped
//! - Every other line must be `KEY=VALUE` with `KEY` matching `[A-Za-z_][A-Za-z0-9_]*`
//! - `VALUE` is everything after the first `=` and is kept verbatim
//! - Keys must be unique
//!
//! Validation is a single pass that stops at the first offending line.

use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

static ENV_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)=(.*)$")
        .expect("Failed to compile ENV_LINE regex - this should never happen")
});

/// Error returned when env text cannot be validated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A line is neither blank, a comment, nor `KEY=VALUE`
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// A key appears more than once
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
}

/// A single validated `KEY=VALUE` pair
///
/// The value is scrubbed from memory on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct EnvEntry {
    key: String,
    value: String,
}

impl EnvEntry {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for EnvEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvEntry")
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Ordered set of env entries with unique keys
///
/// Only produced by [`validate`]. Entries keep the order of the input lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSet {
    entries: Vec<EnvEntry>,
}

impl EnvSet {
    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(EnvEntry::key)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(EnvEntry::value)
    }

    /// Render as an env file: one `KEY=VALUE` line per entry, in input order
    pub fn to_env_file(&self) -> Zeroizing<String> {
        let mut out = Zeroizing::new(String::new());
        for entry in &self.entries {
            out.push_str(&entry.key);
            out.push('=');
            out.push_str(&entry.value);
            out.push('\n');
        }
        out
    }
}

/// Validate env text into an [`EnvSet`]
///
/// Returns the first error encountered; later lines are not inspected.
pub fn validate(text: &str) -> Result<EnvSet, ValidationError> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for line in text.lines() {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some(captures) = ENV_LINE.captures(line) else {
            return Err(ValidationError::InvalidFormat(line.to_string()));
        };
        let key = &captures[1];
        let value = &captures[2];

        if !seen.insert(key.to_string()) {
            return Err(ValidationError::DuplicateKey(key.to_string()));
        }

        entries.push(EnvEntry {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    Ok(EnvSet { entries })
}
