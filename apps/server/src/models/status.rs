//! Case run status catalog models.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::case_run_status;

pub const IDLE: &str = "IDLE";
pub const PASSED: &str = "PASSED";
pub const FAILED: &str = "FAILED";
pub const RUNNING: &str = "RUNNING";
pub const PAUSED: &str = "PAUSED";
pub const BLOCKED: &str = "BLOCKED";
pub const ERROR: &str = "ERROR";
pub const WAIVED: &str = "WAIVED";

/// Statuses that mean a case run has concluded.
pub const COMPLETE_STATUS_NAMES: [&str; 4] = [PASSED, ERROR, FAILED, WAIVED];

/// Concluded statuses that count as unsuccessful.
pub const FAILURE_STATUS_NAMES: [&str; 2] = [ERROR, FAILED];

/// Normalize a status name to its stored form (trimmed, upper case).
pub fn canonical_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// One entry of the case run status catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusDefinition {
    pub id: i32,
    /// Canonical upper-case name, e.g. "PASSED".
    pub name: String,
    pub sortkey: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub auto_blinddown: bool,
}

impl StatusDefinition {
    pub fn is_complete(&self) -> bool {
        COMPLETE_STATUS_NAMES.contains(&self.name.as_str())
    }

    pub fn is_failure(&self) -> bool {
        FAILURE_STATUS_NAMES.contains(&self.name.as_str())
    }

    pub fn is_idle(&self) -> bool {
        self.name == IDLE
    }
}

impl From<case_run_status::Model> for StatusDefinition {
    fn from(model: case_run_status::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sortkey: model.sortkey,
            description: model.description,
            auto_blinddown: model.auto_blinddown,
        }
    }
}

/// Request to add a status to the catalog.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewStatus {
    pub name: String,
    #[serde(default)]
    pub sortkey: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_auto_blinddown")]
    pub auto_blinddown: bool,
}

fn default_auto_blinddown() -> bool {
    true
}

/// Request to rename a status.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RenameStatusRequest {
    pub name: String,
}

/// Response listing the status catalog.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusListResponse {
    pub statuses: Vec<StatusDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: i32, name: &str) -> StatusDefinition {
        StatusDefinition {
            id,
            name: name.to_string(),
            sortkey: id,
            description: None,
            auto_blinddown: true,
        }
    }

    #[test]
    fn test_complete_and_failure_classes() {
        assert!(status(2, PASSED).is_complete());
        assert!(!status(2, PASSED).is_failure());
        assert!(status(3, FAILED).is_complete());
        assert!(status(3, FAILED).is_failure());
        assert!(status(7, ERROR).is_failure());
        assert!(status(8, WAIVED).is_complete());
        assert!(!status(8, WAIVED).is_failure());
        assert!(!status(6, BLOCKED).is_complete());
        assert!(!status(4, RUNNING).is_complete());
        assert!(status(1, IDLE).is_idle());
    }

    #[test]
    fn test_failure_class_is_subset_of_complete_class() {
        for name in FAILURE_STATUS_NAMES {
            assert!(COMPLETE_STATUS_NAMES.contains(&name));
        }
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(canonical_name(" passed "), "PASSED");
        assert_eq!(canonical_name("Waived"), "WAIVED");
    }
}
