//! Column name normalization and fuzzy resolution
//!
//! User-facing column labels rarely match what a pipeline wants to key on
//! ("Sales £ " vs `sales_pct`). This module builds a stable mapping from
//! original labels to canonical snake_case keys and resolves free-text
//! lookups against it.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Normalize a column label to its canonical snake_case form.
///
/// Lowercases, maps `%` to `pct`, collapses every run of non-alphanumeric
/// characters to a single underscore, and trims leading/trailing
/// underscores. An empty result falls back to `"column"` so the key is
/// never blank.
pub fn normalize_column_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase().replace('%', " pct ");

    let mut out = String::with_capacity(lowered.len());
    let mut pending_sep = false;
    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }

    if out.is_empty() {
        "column".to_string()
    } else {
        out
    }
}

/// Bidirectional mapping between original column labels and canonical keys.
///
/// Canonical keys are unique within one mapping; collisions after
/// normalization are broken with numeric suffixes (`_2`, `_3`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnMapping {
    entries: Vec<(String, String)>,
}

impl ColumnMapping {
    /// Build a mapping for the given original column labels, in order.
    pub fn build(columns: &[String]) -> Self {
        let mut entries: Vec<(String, String)> = Vec::with_capacity(columns.len());
        let mut used: Vec<String> = Vec::with_capacity(columns.len());

        for original in columns {
            let base = normalize_column_name(original);
            let mut candidate = base.clone();
            let mut idx = 2;
            while used.iter().any(|u| u == &candidate) {
                candidate = format!("{}_{}", base, idx);
                idx += 1;
            }
            used.push(candidate.clone());
            entries.push((original.clone(), candidate));
        }

        Self { entries }
    }

    /// Canonical key for an exact original label, if present.
    pub fn canonical(&self, original: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(orig, _)| orig == original)
            .map(|(_, key)| key.as_str())
    }

    /// All canonical keys, in original column order.
    pub fn canonical_keys(&self) -> Vec<String> {
        self.entries.iter().map(|(_, key)| key.clone()).collect()
    }

    /// Iterate `(original, canonical)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(orig, key)| (orig.as_str(), key.as_str()))
    }

    /// Number of mapped columns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no columns are mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a requested label to its canonical key.
    ///
    /// Matching order: exact original label, exact canonical key,
    /// case-insensitive original label, then normalized form against the
    /// canonical keys. Resolving a canonical key returns it unchanged, so
    /// resolution is idempotent.
    pub fn resolve(&self, requested: &str) -> Result<String> {
        if let Some(key) = self.canonical(requested) {
            return Ok(key.to_string());
        }

        if self.entries.iter().any(|(_, key)| key == requested) {
            return Ok(requested.to_string());
        }

        let requested_lower = requested.to_lowercase();
        if let Some((_, key)) = self
            .entries
            .iter()
            .find(|(orig, _)| orig.to_lowercase() == requested_lower)
        {
            return Ok(key.clone());
        }

        let normalized = normalize_column_name(requested);
        if self.entries.iter().any(|(_, key)| key == &normalized) {
            return Ok(normalized);
        }

        Err(ForecastError::ColumnNotFound(requested.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_collapses_punctuation_runs() {
        assert_eq!(normalize_column_name("  Sales £ "), "sales");
        assert_eq!(normalize_column_name("Unit--Price ($)"), "unit_price");
        assert_eq!(normalize_column_name("Growth %"), "growth_pct");
        assert_eq!(normalize_column_name("***"), "column");
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let mapping = ColumnMapping::build(&[
            "Sales".to_string(),
            "sales!".to_string(),
            "SALES".to_string(),
        ]);
        let keys = mapping.canonical_keys();
        assert_eq!(keys, vec!["sales", "sales_2", "sales_3"]);
    }
}
