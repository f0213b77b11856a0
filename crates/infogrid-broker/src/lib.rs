//! infogrid-broker — capability-keyed query dispatch for InfoGrid.
//!
//! Subsystems publish facts under dotted string keys (`node.state`,
//! `infrastructure.node_instances`, …) by implementing [`InfoProvider`].
//! Providers are composed into a process-wide hierarchy with [`InfoRouter`],
//! so callers can query any fact without knowing which subsystem produces it.
//!
//! # Architecture
//!
//! Each provider type builds one immutable [`HandlerTable`] (key → handler
//! function) at first use; the table is static routing data shared by all
//! instances of that type. A router resolves a key to its own local table
//! first, then to its sub-providers in declared order — a deterministic,
//! non-backtracking choice.

pub mod args;
pub mod error;
pub mod provider;
pub mod router;

pub use args::QueryArgs;
pub use error::{BrokerError, BrokerResult};
pub use provider::{HandlerFn, HandlerTable, InfoProvider};
pub use router::InfoRouter;
