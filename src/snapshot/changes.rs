//! Column change taxonomy
//!
//! A detected change is one of three shapes, each carrying only the types
//! that make sense for it.

use crate::snapshot::store::TypeDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of column change detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    #[serde(rename = "type_change")]
    TypeChanged,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::TypeChanged => "type_change",
        })
    }
}

/// Drift of a single column. The column name is the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change_type", rename_all = "snake_case")]
pub enum ChangeRecord {
    Added {
        new_type: TypeDescriptor,
    },
    Removed {
        old_type: TypeDescriptor,
    },
    #[serde(rename = "type_change")]
    TypeChanged {
        old_type: TypeDescriptor,
        new_type: TypeDescriptor,
    },
}

impl ChangeRecord {
    pub fn change_type(&self) -> ChangeType {
        match self {
            ChangeRecord::Added { .. } => ChangeType::Added,
            ChangeRecord::Removed { .. } => ChangeType::Removed,
            ChangeRecord::TypeChanged { .. } => ChangeType::TypeChanged,
        }
    }

    pub fn old_type(&self) -> Option<&TypeDescriptor> {
        match self {
            ChangeRecord::Added { .. } => None,
            ChangeRecord::Removed { old_type } | ChangeRecord::TypeChanged { old_type, .. } => {
                Some(old_type)
            }
        }
    }

    pub fn new_type(&self) -> Option<&TypeDescriptor> {
        match self {
            ChangeRecord::Removed { .. } => None,
            ChangeRecord::Added { new_type } | ChangeRecord::TypeChanged { new_type, .. } => {
                Some(new_type)
            }
        }
    }

    /// Removals and type changes can break code that reads the column
    pub fn is_breaking(&self) -> bool {
        !matches!(self, ChangeRecord::Added { .. })
    }

    /// Get a human-readable description of the change
    pub fn description(&self, column: &str) -> String {
        match self {
            ChangeRecord::Added { new_type } => {
                format!("Column {} added (type: {})", column, new_type)
            }
            ChangeRecord::Removed { old_type } => {
                format!("Column {} removed (type: {})", column, old_type)
            }
            ChangeRecord::TypeChanged { old_type, new_type } => {
                format!("Column {} type changed: {} → {}", column, old_type, new_type)
            }
        }
    }

    /// What the generated suggestion should address
    pub fn instruction(&self, column: &str) -> String {
        match self {
            ChangeRecord::Added { new_type } => format!(
                "Suggest how to add handling for the new column '{}' (type '{}') in the transformation script.",
                column, new_type
            ),
            ChangeRecord::Removed { .. } => format!(
                "Suggest how to remove references to the dropped column '{}' from the transformation script.",
                column
            ),
            ChangeRecord::TypeChanged { old_type, new_type } => format!(
                "Suggest how to cast or convert column '{}' from '{}' to the new type '{}' in the transformation script.",
                column, old_type, new_type
            ),
        }
    }

    /// Deterministic suggestion used when generation is unavailable
    pub fn manual_suggestion(&self, column: &str) -> String {
        match self {
            ChangeRecord::Added { .. } => format!(
                "Consider adding handling for new column '{}' in the transformation script.",
                column
            ),
            ChangeRecord::Removed { .. } => format!(
                "Remove references to column '{}' from the transformation script.",
                column
            ),
            ChangeRecord::TypeChanged { new_type, .. } => format!(
                "Cast or convert column '{}' to the new type '{}' in the transformation script.",
                column, new_type
            ),
        }
    }
}
