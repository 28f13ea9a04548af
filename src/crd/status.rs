//! # GitOpsDeployment Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};

/// Status of the GitOpsDeployment resource
///
/// Owned by the controller; written once per reconcile cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsDeploymentStatus {
    /// Whether the last cycle applied every manifest
    #[serde(default)]
    pub synced: bool,
    /// Time of the last successful sync (RFC3339)
    #[serde(default)]
    pub last_sync_time: Option<String>,
    /// Conditions represent the latest available observations
    /// Holds at most one condition of type Ready; replaced wholesale on every update
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation the last successful cycle acted on
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl GitOpsDeploymentStatus {
    /// The Ready condition, if one has been recorded
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.r#type == crate::constants::CONDITION_READY)
    }
}

/// Condition status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Machine-readable reason (e.g. Reconciled, CloneFailed, ApplyFailed)
    pub reason: String,
    /// Human-readable detail
    pub message: String,
    /// Last transition time (RFC3339)
    pub last_transition_time: String,
}
