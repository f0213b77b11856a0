//! infogrid-remote — the RPC bridge over the provider contract.
//!
//! The provider interface is designed so there is only one remote-access
//! method: `get`. The [`RemoteProviderStub`] serializes `(key, args,
//! kwargs)` into a request and suspends until the correlated response
//! arrives; the [`SkeletonServer`] consumes requests on a dedicated task,
//! invokes the wrapped provider, and maps exactly two error kinds onto
//! HTTP-flavored status codes (key-not-found → 404, bad-argument → 400).
//! Everything else is a transport-level failure.

pub mod skeleton;
pub mod stub;
pub mod transport;
pub mod wire;

pub use skeleton::{ProviderSkeleton, SkeletonServer};
pub use stub::RemoteProviderStub;
pub use transport::{ChannelTransport, Delivery, QueryTransport, TransportError, channel};
pub use wire::{
    QueryRequest, QueryResponse, STATUS_BAD_REQUEST, STATUS_NOT_FOUND, STATUS_OK,
};
