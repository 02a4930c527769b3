//! Config Diff Engine
//!
//! Computes the minimal set of key additions and removals between two
//! versions of a share configuration record, and provides the
//! advanced-settings parsing helpers shared by the config editors.
//!
//! Advanced settings are free-form `key = value` lines layered on top of
//! the structured fields, used to express options the structured model
//! doesn't cover.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// =============================================================================
// Records
// =============================================================================

/// A flat-plus-list share configuration record
///
/// `fields` holds the structured key/value pairs in declaration order;
/// `name` is the identity field and never participates in a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareConfig {
    pub name: String,
    #[serde(default)]
    pub fields: IndexMap<String, String>,
    #[serde(default)]
    pub advanced_settings: Vec<String>,
}

impl ShareConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Minimal delta between two configuration records
///
/// Consumers must treat `add` as an idempotent upsert: an advanced-settings
/// key whose value changed appears here as an `add` with no paired
/// `remove`, because the remove pass operates on key-set difference only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfDiff {
    pub add: Vec<(String, String)>,
    pub remove: Vec<String>,
}

// =============================================================================
// Diff
// =============================================================================

/// Diff an old record (or its absence) against a new one
///
/// Structured-field adds come first, then advanced-settings adds; within
/// each group the new record's iteration order is preserved. Unchanged
/// entries are omitted.
pub fn generate_conf_diff(old: Option<&ShareConfig>, new: &ShareConfig) -> ConfDiff {
    let mut diff = ConfDiff::default();

    for (key, value) in &new.fields {
        let changed = match old {
            None => true,
            Some(old) => old.fields.get(key) != Some(value),
        };
        if changed {
            diff.add.push((key.clone(), value.clone()));
        }
    }

    match old {
        Some(old) => {
            for line in &new.advanced_settings {
                if !old.advanced_settings.contains(line) {
                    diff.add.push(split_setting_line(line));
                }
            }
            let new_keys: Vec<&str> = new
                .advanced_settings
                .iter()
                .map(|line| setting_key(line))
                .collect();
            for line in &old.advanced_settings {
                let key = setting_key(line);
                if !new_keys.contains(&key) {
                    diff.remove.push(key.to_string());
                }
            }
        }
        None => {
            for line in &new.advanced_settings {
                diff.add.push(split_setting_line(line));
            }
        }
    }

    diff
}

/// Split a `key = value` line on the first `=`, trimming both sides
fn split_setting_line(line: &str) -> (String, String) {
    match line.split_once('=') {
        Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
        None => (line.trim().to_string(), String::new()),
    }
}

/// Extract the key of a `key = value` line
fn setting_key(line: &str) -> &str {
    line.split('=').next().unwrap_or(line).trim()
}

// =============================================================================
// Advanced-Settings Helpers
// =============================================================================

/// Split raw advanced-settings text into normalized `key = value` lines
///
/// Trailing `#`-comments are stripped, blank lines and lines without a
/// `token = token` shape are discarded, and whitespace around the first
/// `=` is normalized to one space on each side. Output is stable under a
/// second pass.
pub fn split_advanced_settings(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let line = match line.find('#') {
                Some(idx) => &line[..idx],
                None => line,
            };
            let (key, value) = line.split_once('=')?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() || value.is_empty() {
                return None;
            }
            Some(format!("{} = {}", key, value))
        })
        .collect()
}

/// Join advanced-settings lines back into a block, dropping blank lines
pub fn join_advanced_settings<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Total truthiness test over config values
///
/// Case-insensitive membership in {"yes", "true", "1"}; everything else
/// is false.
pub fn str_to_bool(value: &str) -> bool {
    ["yes", "true", "1"]
        .iter()
        .any(|t| value.eq_ignore_ascii_case(t))
}
