//! Schema Drift Detector
//!
//! Compares a previous and a current schema snapshot column by column.
//! This is the "git diff" for a tabular schema.

use crate::snapshot::changes::{ChangeRecord, ChangeType};
use crate::snapshot::store::SchemaSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a comparison.
///
/// "Nothing changed" is its own variant so it can never be confused with a
/// change set that happens to be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drift {
    NoDrift,
    Detected(ChangeSet),
}

/// Non-empty mapping of column name to its change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<String, ChangeRecord>);

impl ChangeSet {
    /// Returns `None` for an empty mapping
    pub fn new(changes: BTreeMap<String, ChangeRecord>) -> Option<Self> {
        if changes.is_empty() {
            None
        } else {
            Some(Self(changes))
        }
    }

    pub fn get(&self, column: &str) -> Option<&ChangeRecord> {
        self.0.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChangeRecord)> {
        self.0.iter()
    }

    pub fn columns(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn summary(&self) -> DriftSummary {
        let mut summary = DriftSummary {
            columns_added: 0,
            columns_removed: 0,
            columns_type_changed: 0,
            total_changes: self.0.len(),
            has_breaking_changes: false,
        };

        for record in self.0.values() {
            match record.change_type() {
                ChangeType::Added => summary.columns_added += 1,
                ChangeType::Removed => summary.columns_removed += 1,
                ChangeType::TypeChanged => summary.columns_type_changed += 1,
            }
            summary.has_breaking_changes |= record.is_breaking();
        }

        summary
    }
}

impl IntoIterator for ChangeSet {
    type Item = (String, ChangeRecord);
    type IntoIter = std::collections::btree_map::IntoIter<String, ChangeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Summary statistics for a change set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftSummary {
    pub columns_added: usize,
    pub columns_removed: usize,
    pub columns_type_changed: usize,
    pub total_changes: usize,
    pub has_breaking_changes: bool,
}

/// The detector that compares schema snapshots
pub struct DriftDetector;

impl DriftDetector {
    /// Compare two snapshots and return every column whose presence or type differs
    pub fn detect(previous: &SchemaSnapshot, current: &SchemaSnapshot) -> Drift {
        let mut changes = BTreeMap::new();

        // Added or retyped columns
        for (column, new_type) in current.columns() {
            match previous.get(column) {
                None => {
                    changes.insert(
                        column.clone(),
                        ChangeRecord::Added {
                            new_type: new_type.clone(),
                        },
                    );
                }
                Some(old_type) if old_type != new_type => {
                    changes.insert(
                        column.clone(),
                        ChangeRecord::TypeChanged {
                            old_type: old_type.clone(),
                            new_type: new_type.clone(),
                        },
                    );
                }
                Some(_) => {}
            }
        }

        // Removed columns
        for (column, old_type) in previous.columns() {
            if !current.contains(column) {
                changes.insert(
                    column.clone(),
                    ChangeRecord::Removed {
                        old_type: old_type.clone(),
                    },
                );
            }
        }

        match ChangeSet::new(changes) {
            Some(changes) => Drift::Detected(changes),
            None => Drift::NoDrift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::store::TypeDescriptor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn snapshot(pairs: &[(&str, &str)]) -> SchemaSnapshot {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn detected(drift: Drift) -> ChangeSet {
        match drift {
            Drift::Detected(changes) => changes,
            Drift::NoDrift => panic!("expected drift"),
        }
    }

    #[test]
    fn test_identical_snapshots_have_no_drift() {
        let a = snapshot(&[("id", "int"), ("name", "string")]);
        assert_eq!(DriftDetector::detect(&a, &a), Drift::NoDrift);

        let empty = snapshot(&[]);
        assert_eq!(DriftDetector::detect(&empty, &empty), Drift::NoDrift);
    }

    #[test]
    fn test_type_change_and_addition() {
        let previous = snapshot(&[("id", "int"), ("name", "string"), ("age", "int")]);
        let current = snapshot(&[
            ("id", "int"),
            ("name", "string"),
            ("age", "float"),
            ("email", "string"),
        ]);

        let changes = detected(DriftDetector::detect(&previous, &current));

        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes.get("age"),
            Some(&ChangeRecord::TypeChanged {
                old_type: "int".into(),
                new_type: "float".into(),
            })
        );
        assert_eq!(
            changes.get("email"),
            Some(&ChangeRecord::Added { new_type: "string".into() })
        );
        assert!(changes.get("id").is_none());
        assert!(changes.get("name").is_none());
    }

    #[test]
    fn test_empty_previous_reports_everything_added() {
        let changes = detected(DriftDetector::detect(&snapshot(&[]), &snapshot(&[("x", "int")])));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.get("x"), Some(&ChangeRecord::Added { new_type: "int".into() }));
    }

    #[test]
    fn test_empty_current_reports_everything_removed() {
        let previous = snapshot(&[("a", "int"), ("b", "bool")]);
        let changes = detected(DriftDetector::detect(&previous, &snapshot(&[])));
        assert!(changes
            .iter()
            .all(|(_, record)| record.change_type() == ChangeType::Removed));
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_disjoint_snapshots() {
        let previous = snapshot(&[("a", "int"), ("b", "string"), ("c", "date")]);
        let current = snapshot(&[("x", "int"), ("y", "string")]);

        let summary = detected(DriftDetector::detect(&previous, &current)).summary();
        assert_eq!(
            summary,
            DriftSummary {
                columns_added: 2,
                columns_removed: 3,
                columns_type_changed: 0,
                total_changes: 5,
                has_breaking_changes: true,
            }
        );
    }

    #[test]
    fn test_no_semantic_type_equivalence() {
        let previous = snapshot(&[("id", "int")]);
        let current = snapshot(&[("id", "integer")]);
        let changes = detected(DriftDetector::detect(&previous, &current));
        assert_eq!(changes.get("id").map(|r| r.change_type()), Some(ChangeType::TypeChanged));
    }

    #[test]
    fn test_structured_descriptors_compare_by_value() {
        let previous: SchemaSnapshot = [
            ("price", TypeDescriptor::from(json!({"type": "decimal", "scale": 2}))),
            ("qty", TypeDescriptor::from(json!(1))),
        ]
        .into_iter()
        .collect();
        let same: SchemaSnapshot = [
            ("price", TypeDescriptor::from(json!({"scale": 2, "type": "decimal"}))),
            ("qty", TypeDescriptor::from(json!(1))),
        ]
        .into_iter()
        .collect();
        let widened: SchemaSnapshot = [
            ("price", TypeDescriptor::from(json!({"type": "decimal", "scale": 4}))),
            ("qty", TypeDescriptor::from(json!(1.0))),
        ]
        .into_iter()
        .collect();

        assert_eq!(DriftDetector::detect(&previous, &same), Drift::NoDrift);
        assert_eq!(detected(DriftDetector::detect(&previous, &widened)).len(), 2);
    }

    #[test]
    fn test_detect_is_idempotent() {
        let previous = snapshot(&[("id", "int"), ("gone", "string")]);
        let current = snapshot(&[("id", "bigint"), ("new", "string")]);
        assert_eq!(
            DriftDetector::detect(&previous, &current),
            DriftDetector::detect(&previous, &current)
        );
    }

    #[test]
    fn test_empty_change_set_is_rejected() {
        assert!(ChangeSet::new(BTreeMap::new()).is_none());
    }
}
