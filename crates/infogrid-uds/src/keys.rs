//! Backend key templates.
//!
//! These templates are a stable on-disk contract: external inspection and
//! migration tools reproduce them bit-for-bit. Change nothing here without
//! a data migration.

/// Root key of an infrastructure.
pub fn infra(infra_id: &str) -> String {
    format!("infra:{infra_id}")
}

/// Static description of an infrastructure.
pub fn infra_description(infra_id: &str) -> String {
    format!("infra:{infra_id}:description")
}

/// Dynamic state of an infrastructure (whole-document layout).
pub fn infra_state(infra_id: &str) -> String {
    format!("infra:{infra_id}:state")
}

/// Dynamic state of one node (per-node layout, one hash field per instance).
pub fn node_state(infra_id: &str, node_name: &str) -> String {
    format!("infra:{infra_id}:state:{node_name}")
}

/// Health-check failing-period bookkeeping, one hash field per node id.
pub fn infra_failtime(infra_id: &str) -> String {
    format!("infra:{infra_id}:failtime")
}

/// Scaling counters and pending requests, as hash fields.
pub fn infra_scaling(infra_id: &str) -> String {
    format!("infra:{infra_id}:scaling")
}

/// Archive of failed node instances.
pub fn failed_nodes(infra_id: &str) -> String {
    format!("infra:{infra_id}:failed_nodes")
}

/// A user's stored authentication data for one backend.
pub fn auth_data(backend_id: &str, user_id: &str) -> String {
    format!("auth:{backend_id}:{user_id}")
}

/// Backend connection/target information.
pub fn backend(backend_id: &str) -> String {
    format!("backend:{backend_id}")
}

/// Registered definitions of a node type.
pub fn node_def(node_type: &str) -> String {
    format!("node_def:{node_type}")
}

/// Auxiliary data of a service-composer instance.
pub fn service_composer(sc_id: &str) -> String {
    format!("service_composer:{sc_id}")
}

// ── Scaling hash sub-keys ──────────────────────────────────────────

/// Target instance count of a node.
pub fn scaling_target_count_field(node_name: &str) -> String {
    format!("node-count-{node_name}")
}

/// A pending create-node request.
pub fn scaling_create_field(node_name: &str, request_id: &str) -> String {
    format!("node-create:{node_name}:{request_id}")
}

/// A pending destroy-node request.
pub fn scaling_destroy_field(node_name: &str, request_id: &str) -> String {
    format!("node-destroy:{node_name}:{request_id}")
}
