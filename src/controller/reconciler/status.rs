//! # Status Reporter
//!
//! Builds the Ready condition for a cycle's outcome. Pure; the caller persists.

use crate::constants::CONDITION_READY;
use crate::crd::{Condition, ConditionStatus, GitOpsDeploymentStatus};
use chrono::{DateTime, Utc};

/// Replace the conditions of `status` with a single Ready condition stamped now
pub fn update_status(
    status: &mut GitOpsDeploymentStatus,
    outcome: ConditionStatus,
    reason: &str,
    message: &str,
) {
    update_status_at(status, outcome, reason, message, Utc::now());
}

/// [`update_status`] with an explicit timestamp
pub fn update_status_at(
    status: &mut GitOpsDeploymentStatus,
    outcome: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) {
    status.conditions = vec![Condition {
        r#type: CONDITION_READY.to_string(),
        status: outcome,
        reason: reason.to_string(),
        message: message.to_string(),
        last_transition_time: now.to_rfc3339(),
    }];
}
