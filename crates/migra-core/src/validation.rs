//! # Validation Module
//!
//! Reconciles freshly fetched source records with the destination snapshot,
//! and computes which fetched records are new to the destination.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Source-Driven Validation                             │
//! │                                                                         │
//! │  for each source record (in source order)                              │
//! │       │                                                                 │
//! │       ├── no key?             → skipped (cannot be looked up)          │
//! │       ├── key seen already?   → skipped (first occurrence wins)        │
//! │       │                                                                 │
//! │       ├── key ∉ destination?  → MissingInDestination { key }           │
//! │       │                                                                 │
//! │       └── key ∈ destination                                            │
//! │             │                                                           │
//! │             └── for each required field (in configured order)          │
//! │                   destination ≠ source?  → FieldMismatch {..}          │
//! │                                                                         │
//! │  Destination-only records are never reported.                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::types::{DestinationSnapshot, Discrepancy, Record};

// =============================================================================
// Validator
// =============================================================================

/// Produces the discrepancy report between source records and a
/// destination snapshot keyed by `key_field`.
///
/// ## Rules
/// - Only the first source record for a key is compared, as in
///   [`diff_new_records`]
/// - One `MissingInDestination` per absent key
/// - One `FieldMismatch` per key and differing field in `required_fields`
/// - `None` vs present is a difference; `null` vs absent is not
/// - Fields outside `required_fields` are never compared
///
/// ## Example
/// ```rust
/// use std::collections::HashMap;
/// use migra_core::{validation::validate, Discrepancy, Record};
///
/// let source = vec![Record::new().with("Email", "a@x")];
/// let report = validate(&source, &HashMap::new(), &[], "Email");
/// assert_eq!(report, vec![Discrepancy::MissingInDestination { key: "a@x".into() }]);
/// ```
pub fn validate(
    source_records: &[Record],
    destination: &DestinationSnapshot,
    required_fields: &[String],
    key_field: &str,
) -> Vec<Discrepancy> {
    let mut discrepancies = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for source in source_records {
        let Some(key) = source.key(key_field) else {
            continue;
        };
        if !seen.insert(key) {
            continue;
        }

        let Some(stored) = destination.get(key) else {
            discrepancies.push(Discrepancy::MissingInDestination {
                key: key.to_string(),
            });
            continue;
        };

        for field in required_fields {
            let source_value = source.get(field);
            let destination_value = stored.get(field);

            if source_value != destination_value {
                discrepancies.push(Discrepancy::FieldMismatch {
                    key: key.to_string(),
                    field: field.clone(),
                    source_value: source_value.cloned(),
                    destination_value: destination_value.cloned(),
                });
            }
        }
    }

    discrepancies
}

// =============================================================================
// Incremental Diff
// =============================================================================

/// Partition of a fetch against the destination's key set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementalDiff {
    /// Records whose key the destination has never seen, first occurrence only.
    pub new_records: Vec<Record>,

    /// Records already present in the destination.
    pub already_present: usize,

    /// Repeats of a key earlier in the same fetch.
    pub duplicates: usize,

    /// Records with no usable key.
    pub unkeyed: usize,
}

/// Splits `fetched` into records to insert and records to leave alone.
///
/// `existing_keys` is a snapshot taken once before the diff, so running the
/// same fetch against the post-insert snapshot yields no new records.
pub fn diff_new_records(
    fetched: Vec<Record>,
    existing_keys: &HashSet<String>,
    key_field: &str,
) -> IncrementalDiff {
    let mut diff = IncrementalDiff::default();
    let mut seen: HashSet<String> = HashSet::new();

    for record in fetched {
        let key = match record.key(key_field) {
            Some(key) => key.to_string(),
            None => {
                diff.unkeyed += 1;
                continue;
            }
        };

        if existing_keys.contains(&key) {
            diff.already_present += 1;
        } else if !seen.insert(key) {
            diff.duplicates += 1;
        } else {
            diff.new_records.push(record);
        }
    }

    diff
}

/// Counts source records that carry no usable key.
pub fn count_unkeyed(records: &[Record], key_field: &str) -> usize {
    records
        .iter()
        .filter(|r| r.key(key_field).is_none())
        .count()
}

// =============================================================================
// Unit Tests
// =============================================================================
