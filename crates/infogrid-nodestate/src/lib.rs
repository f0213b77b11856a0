//! infogrid-nodestate — multi-source node-status aggregation.
//!
//! An instance's compound status is combined from three sources: the
//! provisioning backend, the service composer, and the health check. A
//! failing health check is tolerated for a per-node grace window (backed by
//! the UDS failing-period bookkeeping) before it escalates to a failure.
//!
//! The providers here serve the `node.state`, `infrastructure.state`,
//! `infrastructure.started`, `node.attribute`, and
//! `infrastructure.userinfo` query keys.

pub mod collaborators;
pub mod provider;
pub mod status;

pub use collaborators::{HealthCheck, ResourceBackend, ServiceComposer};
pub use provider::{DynamicStateProvider, UserInfoProvider};
pub use status::{NodeStatus, combine};
