//! Node status values and the fixed-precedence combination rule.

use serde::{Deserialize, Serialize};

/// Status of a node as reported by one source, or compounded across all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Ready,
    Pending,
    TmpFail,
    Fail,
    Shutdown,
    Unknown,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            NodeStatus::Ready => "ready",
            NodeStatus::Pending => "pending",
            NodeStatus::TmpFail => "tmp_fail",
            NodeStatus::Fail => "fail",
            NodeStatus::Shutdown => "shutdown",
            NodeStatus::Unknown => "unknown",
        };
        f.write_str(tag)
    }
}

/// Combine the resource, service, and health sub-statuses into one
/// compound status.
///
/// Precedence, evaluated in this fixed order over the three inputs:
/// `Fail` wins if any input is `Fail`; else `Shutdown`; else `TmpFail`;
/// else `Pending` if any input is `Pending` or `Unknown`; else `Ready`.
pub fn combine(resource: NodeStatus, service: NodeStatus, health: NodeStatus) -> NodeStatus {
    use NodeStatus::*;
    let states = [resource, service, health];
    if states.iter().all(|s| *s == Ready) {
        Ready
    } else if states.contains(&Fail) {
        Fail
    } else if states.contains(&Shutdown) {
        Shutdown
    } else if states.contains(&TmpFail) {
        TmpFail
    } else {
        Pending
    }
}
